//! Category repository
//!
//! - `CategoryRepository` trait defining category data access
//! - `SqlxCategoryRepository` implementing it for SQLite and MySQL

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Category, CategoryInput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Category repository trait
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn create(&self, input: &CategoryInput) -> Result<Category>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Category>>;

    /// List all categories ordered by name
    async fn list(&self) -> Result<Vec<Category>>;

    async fn update(&self, id: i64, input: &CategoryInput) -> Result<Category>;

    /// Delete a category. Its posts are removed by the foreign key cascade.
    async fn delete(&self, id: i64) -> Result<()>;

    /// Number of posts filed under the category, any status
    async fn count_posts(&self, id: i64) -> Result<i64>;
}

/// SQLx-based category repository implementation
pub struct SqlxCategoryRepository {
    pool: DynDatabasePool,
}

impl SqlxCategoryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CategoryRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CategoryRepository for SqlxCategoryRepository {
    async fn create(&self, input: &CategoryInput) -> Result<Category> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_category_sqlite(self.pool.sqlite()?, input).await,
            DatabaseDriver::Mysql => create_category_mysql(self.pool.mysql()?, input).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Category>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_category_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_category_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn list(&self) -> Result<Vec<Category>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_categories_sqlite(self.pool.sqlite()?).await,
            DatabaseDriver::Mysql => list_categories_mysql(self.pool.mysql()?).await,
        }
    }

    async fn update(&self, id: i64, input: &CategoryInput) -> Result<Category> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                update_category_sqlite(self.pool.sqlite()?, id, input).await
            }
            DatabaseDriver::Mysql => update_category_mysql(self.pool.mysql()?, id, input).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<()> {
        const SQL: &str = "DELETE FROM categories WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(SQL)
                    .bind(id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to delete category")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(SQL)
                    .bind(id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to delete category")?;
            }
        }
        Ok(())
    }

    async fn count_posts(&self, id: i64) -> Result<i64> {
        const SQL: &str = "SELECT COUNT(*) FROM posts WHERE category_id = ?";
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query_scalar(SQL)
                    .bind(id)
                    .fetch_one(self.pool.sqlite()?)
                    .await
            }
            DatabaseDriver::Mysql => {
                sqlx::query_scalar(SQL)
                    .bind(id)
                    .fetch_one(self.pool.mysql()?)
                    .await
            }
        }
        .context("Failed to count category posts")?;
        Ok(count)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_category_sqlite(pool: &SqlitePool, input: &CategoryInput) -> Result<Category> {
    let now = Utc::now();
    let result =
        sqlx::query("INSERT INTO categories (name, created_at, updated_at) VALUES (?, ?, ?)")
            .bind(&input.name)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create category")?;

    Ok(Category {
        id: result.last_insert_rowid(),
        name: input.name.clone(),
        created_at: now,
        updated_at: now,
    })
}

async fn get_category_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Category>> {
    let row = sqlx::query("SELECT id, name, created_at, updated_at FROM categories WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get category")?;

    row.map(|r| row_to_category_sqlite(&r)).transpose()
}

async fn list_categories_sqlite(pool: &SqlitePool) -> Result<Vec<Category>> {
    let rows =
        sqlx::query("SELECT id, name, created_at, updated_at FROM categories ORDER BY name, id")
            .fetch_all(pool)
            .await
            .context("Failed to list categories")?;

    rows.iter().map(row_to_category_sqlite).collect()
}

async fn update_category_sqlite(
    pool: &SqlitePool,
    id: i64,
    input: &CategoryInput,
) -> Result<Category> {
    sqlx::query("UPDATE categories SET name = ?, updated_at = ? WHERE id = ?")
        .bind(&input.name)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update category")?;

    get_category_sqlite(pool, id)
        .await?
        .context("Category not found after update")
}

fn row_to_category_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Category> {
    Ok(Category {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_category_mysql(pool: &MySqlPool, input: &CategoryInput) -> Result<Category> {
    let now = Utc::now();
    let result =
        sqlx::query("INSERT INTO categories (name, created_at, updated_at) VALUES (?, ?, ?)")
            .bind(&input.name)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create category")?;

    Ok(Category {
        id: result.last_insert_id() as i64,
        name: input.name.clone(),
        created_at: now,
        updated_at: now,
    })
}

async fn get_category_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Category>> {
    let row = sqlx::query("SELECT id, name, created_at, updated_at FROM categories WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get category")?;

    row.map(|r| row_to_category_mysql(&r)).transpose()
}

async fn list_categories_mysql(pool: &MySqlPool) -> Result<Vec<Category>> {
    let rows =
        sqlx::query("SELECT id, name, created_at, updated_at FROM categories ORDER BY name, id")
            .fetch_all(pool)
            .await
            .context("Failed to list categories")?;

    rows.iter().map(row_to_category_mysql).collect()
}

async fn update_category_mysql(
    pool: &MySqlPool,
    id: i64,
    input: &CategoryInput,
) -> Result<Category> {
    sqlx::query("UPDATE categories SET name = ?, updated_at = ? WHERE id = ?")
        .bind(&input.name)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update category")?;

    get_category_mysql(pool, id)
        .await?
        .context("Category not found after update")
}

fn row_to_category_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Category> {
    Ok(Category {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> (DynDatabasePool, SqlxCategoryRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxCategoryRepository::new(pool.clone());
        (pool, repo)
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (_pool, repo) = setup_test_repo().await;

        let created = repo.create(&CategoryInput::new("Sports")).await.unwrap();
        assert!(created.id > 0);

        let fetched = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Sports");
        assert!(repo.get_by_id(9999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_is_sorted_by_name() {
        let (_pool, repo) = setup_test_repo().await;
        for name in ["Tech", "Business", "Sports"] {
            repo.create(&CategoryInput::new(name)).await.unwrap();
        }

        let names: Vec<String> = repo
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Business", "Sports", "Tech"]);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (_pool, repo) = setup_test_repo().await;
        let created = repo.create(&CategoryInput::new("Wrold")).await.unwrap();

        let updated = repo
            .update(created.id, &CategoryInput::new("World"))
            .await
            .unwrap();
        assert_eq!(updated.name, "World");
        assert!(updated.updated_at >= created.updated_at);

        repo.delete(created.id).await.unwrap();
        assert!(repo.get_by_id(created.id).await.unwrap().is_none());
        assert_eq!(repo.count_posts(created.id).await.unwrap(), 0);
    }
}
