//! Contact message repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Contact, ContactForm};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait ContactRepository: Send + Sync {
    async fn create(&self, form: &ContactForm) -> Result<Contact>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Contact>>;

    /// Newest messages first
    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<Contact>>;

    async fn count(&self) -> Result<i64>;

    /// Returns false when no message had that id
    async fn delete(&self, id: i64) -> Result<bool>;
}

pub struct SqlxContactRepository {
    pool: DynDatabasePool,
}

impl SqlxContactRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ContactRepository> {
        Arc::new(Self::new(pool))
    }
}

const SELECT_CONTACT: &str =
    "SELECT id, subject, message, name, email, created_at, updated_at FROM contacts";

#[async_trait]
impl ContactRepository for SqlxContactRepository {
    async fn create(&self, form: &ContactForm) -> Result<Contact> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_contact_sqlite(self.pool.sqlite()?, form).await,
            DatabaseDriver::Mysql => create_contact_mysql(self.pool.mysql()?, form).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Contact>> {
        let sql = format!("{} WHERE id = ?", SELECT_CONTACT);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get contact")?;
                row.map(|r| row_to_contact_sqlite(&r)).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get contact")?;
                row.map(|r| row_to_contact_mysql(&r)).transpose()
            }
        }
    }

    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<Contact>> {
        let sql = format!("{} ORDER BY id DESC LIMIT ? OFFSET ?", SELECT_CONTACT);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(&sql)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list contacts")?;
                rows.iter().map(row_to_contact_sqlite).collect()
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(&sql)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list contacts")?;
                rows.iter().map(row_to_contact_mysql).collect()
            }
        }
    }

    async fn count(&self) -> Result<i64> {
        const SQL: &str = "SELECT COUNT(*) FROM contacts";
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query_scalar(SQL).fetch_one(self.pool.sqlite()?).await,
            DatabaseDriver::Mysql => sqlx::query_scalar(SQL).fetch_one(self.pool.mysql()?).await,
        }
        .context("Failed to count contacts")?;
        Ok(count)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        const SQL: &str = "DELETE FROM contacts WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SQL)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete contact")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(SQL)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete contact")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }
}

const INSERT_CONTACT: &str = "INSERT INTO contacts (subject, message, name, email, created_at, updated_at) \
     VALUES (?, ?, ?, ?, ?, ?)";

fn saved_contact(id: i64, form: &ContactForm, now: chrono::DateTime<Utc>) -> Contact {
    Contact {
        id,
        subject: form.subject.clone(),
        message: form.message.clone(),
        name: form.name.clone(),
        email: form.email.clone(),
        created_at: now,
        updated_at: now,
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_contact_sqlite(pool: &SqlitePool, form: &ContactForm) -> Result<Contact> {
    let now = Utc::now();
    let result = sqlx::query(INSERT_CONTACT)
        .bind(&form.subject)
        .bind(&form.message)
        .bind(&form.name)
        .bind(&form.email)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to save contact message")?;

    Ok(saved_contact(result.last_insert_rowid(), form, now))
}

fn row_to_contact_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Contact> {
    Ok(Contact {
        id: row.try_get("id")?,
        subject: row.try_get("subject")?,
        message: row.try_get("message")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_contact_mysql(pool: &MySqlPool, form: &ContactForm) -> Result<Contact> {
    let now = Utc::now();
    let result = sqlx::query(INSERT_CONTACT)
        .bind(&form.subject)
        .bind(&form.message)
        .bind(&form.name)
        .bind(&form.email)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to save contact message")?;

    Ok(saved_contact(result.last_insert_id() as i64, form, now))
}

fn row_to_contact_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Contact> {
    Ok(Contact {
        id: row.try_get("id")?,
        subject: row.try_get("subject")?,
        message: row.try_get("message")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxContactRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxContactRepository::new(pool)
    }

    fn form(subject: &str) -> ContactForm {
        ContactForm {
            subject: subject.to_string(),
            message: "Hello newsroom".to_string(),
            name: "Reader".to_string(),
            email: "reader@example.com".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_list_delete() {
        let repo = setup_test_repo().await;

        let first = repo.create(&form("first")).await.unwrap();
        let second = repo.create(&form("second")).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 2);

        let page = repo.list(0, 1).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, second.id);

        let fetched = repo.get_by_id(first.id).await.unwrap().unwrap();
        assert_eq!(fetched.subject, "first");
        assert_eq!(fetched.email, "reader@example.com");

        assert!(repo.delete(first.id).await.unwrap());
        assert!(repo.get_by_id(first.id).await.unwrap().is_none());
        assert_eq!(repo.count().await.unwrap(), 1);
    }
}
