//! Newsletter subscriber repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Newsletter;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait NewsletterRepository: Send + Sync {
    async fn create(&self, email: &str) -> Result<Newsletter>;

    /// Exact (already normalised) address lookup
    async fn find_by_email(&self, email: &str) -> Result<Option<Newsletter>>;

    /// Newest subscribers first
    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<Newsletter>>;

    async fn count(&self) -> Result<i64>;

    async fn delete(&self, id: i64) -> Result<bool>;
}

pub struct SqlxNewsletterRepository {
    pool: DynDatabasePool,
}

impl SqlxNewsletterRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn NewsletterRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl NewsletterRepository for SqlxNewsletterRepository {
    async fn create(&self, email: &str) -> Result<Newsletter> {
        let now = Utc::now();
        const SQL: &str = "INSERT INTO newsletters (email, created_at, updated_at) VALUES (?, ?, ?)";
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SQL)
                .bind(email)
                .bind(now)
                .bind(now)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to add newsletter subscriber")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(SQL)
                .bind(email)
                .bind(now)
                .bind(now)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to add newsletter subscriber")?
                .last_insert_id() as i64,
        };

        Ok(Newsletter {
            id,
            email: email.to_string(),
            created_at: now,
            updated_at: now,
        })
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Newsletter>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => find_by_email_sqlite(self.pool.sqlite()?, email).await,
            DatabaseDriver::Mysql => find_by_email_mysql(self.pool.mysql()?, email).await,
        }
    }

    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<Newsletter>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_sqlite(self.pool.sqlite()?, offset, limit).await,
            DatabaseDriver::Mysql => list_mysql(self.pool.mysql()?, offset, limit).await,
        }
    }

    async fn count(&self) -> Result<i64> {
        const SQL: &str = "SELECT COUNT(*) FROM newsletters";
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query_scalar(SQL).fetch_one(self.pool.sqlite()?).await,
            DatabaseDriver::Mysql => sqlx::query_scalar(SQL).fetch_one(self.pool.mysql()?).await,
        }
        .context("Failed to count newsletter subscribers")?;
        Ok(count)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        const SQL: &str = "DELETE FROM newsletters WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SQL)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete newsletter subscriber")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(SQL)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete newsletter subscriber")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn find_by_email_sqlite(pool: &SqlitePool, email: &str) -> Result<Option<Newsletter>> {
    let row = sqlx::query(
        "SELECT id, email, created_at, updated_at FROM newsletters WHERE email = ?",
    )
    .bind(email)
    .fetch_optional(pool)
    .await
    .context("Failed to look up subscriber")?;

    row.map(|r| row_to_newsletter_sqlite(&r)).transpose()
}

async fn list_sqlite(pool: &SqlitePool, offset: i64, limit: i64) -> Result<Vec<Newsletter>> {
    let rows = sqlx::query(
        "SELECT id, email, created_at, updated_at FROM newsletters \
         ORDER BY id DESC LIMIT ? OFFSET ?",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .context("Failed to list subscribers")?;

    rows.iter().map(row_to_newsletter_sqlite).collect()
}

fn row_to_newsletter_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Newsletter> {
    Ok(Newsletter {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn find_by_email_mysql(pool: &MySqlPool, email: &str) -> Result<Option<Newsletter>> {
    let row = sqlx::query(
        "SELECT id, email, created_at, updated_at FROM newsletters WHERE email = ?",
    )
    .bind(email)
    .fetch_optional(pool)
    .await
    .context("Failed to look up subscriber")?;

    row.map(|r| row_to_newsletter_mysql(&r)).transpose()
}

async fn list_mysql(pool: &MySqlPool, offset: i64, limit: i64) -> Result<Vec<Newsletter>> {
    let rows = sqlx::query(
        "SELECT id, email, created_at, updated_at FROM newsletters \
         ORDER BY id DESC LIMIT ? OFFSET ?",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .context("Failed to list subscribers")?;

    rows.iter().map(row_to_newsletter_mysql).collect()
}

fn row_to_newsletter_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Newsletter> {
    Ok(Newsletter {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxNewsletterRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxNewsletterRepository::new(pool)
    }

    #[tokio::test]
    async fn test_subscribe_and_lookup() {
        let repo = setup_test_repo().await;

        let sub = repo.create("fan@example.com").await.unwrap();
        assert!(sub.id > 0);
        assert!(repo.find_by_email("fan@example.com").await.unwrap().is_some());
        assert!(repo.find_by_email("other@example.com").await.unwrap().is_none());
        assert!(repo.create("fan@example.com").await.is_err());
    }

    #[tokio::test]
    async fn test_list_count_delete() {
        let repo = setup_test_repo().await;
        for email in ["a@example.com", "b@example.com", "c@example.com"] {
            repo.create(email).await.unwrap();
        }
        assert_eq!(repo.count().await.unwrap(), 3);

        let page = repo.list(1, 10).await.unwrap();
        let emails: Vec<&str> = page.iter().map(|n| n.email.as_str()).collect();
        assert_eq!(emails, vec!["b@example.com", "a@example.com"]);

        assert!(repo.delete(page[0].id).await.unwrap());
        assert!(!repo.delete(page[0].id).await.unwrap());
        assert_eq!(repo.count().await.unwrap(), 2);
    }
}
