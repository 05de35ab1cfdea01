//! Tag repository
//!
//! Tags and the `post_tags` join table.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Tag, TagInput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlConnection, MySqlPool, Row, SqliteConnection, SqlitePool};
use std::sync::Arc;

/// Tag repository trait
#[async_trait]
pub trait TagRepository: Send + Sync {
    async fn create(&self, input: &TagInput) -> Result<Tag>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Tag>>;

    /// List all tags ordered by name
    async fn list(&self) -> Result<Vec<Tag>>;

    async fn update(&self, id: i64, input: &TagInput) -> Result<Tag>;

    async fn delete(&self, id: i64) -> Result<()>;

    /// Tags attached to a post, ordered by name
    async fn list_for_post(&self, post_id: i64) -> Result<Vec<Tag>>;

    /// Replace the set of tags attached to a post
    async fn set_post_tags(&self, post_id: i64, tag_ids: &[i64]) -> Result<()>;
}

/// SQLx-based tag repository implementation
pub struct SqlxTagRepository {
    pool: DynDatabasePool,
}

impl SqlxTagRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TagRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl TagRepository for SqlxTagRepository {
    async fn create(&self, input: &TagInput) -> Result<Tag> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_tag_sqlite(self.pool.sqlite()?, input).await,
            DatabaseDriver::Mysql => create_tag_mysql(self.pool.mysql()?, input).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Tag>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_tag_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_tag_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn list(&self) -> Result<Vec<Tag>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_tags_sqlite(self.pool.sqlite()?).await,
            DatabaseDriver::Mysql => list_tags_mysql(self.pool.mysql()?).await,
        }
    }

    async fn update(&self, id: i64, input: &TagInput) -> Result<Tag> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_tag_sqlite(self.pool.sqlite()?, id, input).await,
            DatabaseDriver::Mysql => update_tag_mysql(self.pool.mysql()?, id, input).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<()> {
        const SQL: &str = "DELETE FROM tags WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(SQL)
                    .bind(id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to delete tag")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(SQL)
                    .bind(id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to delete tag")?;
            }
        }
        Ok(())
    }

    async fn list_for_post(&self, post_id: i64) -> Result<Vec<Tag>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_tags_for_post_sqlite(self.pool.sqlite()?, post_id).await,
            DatabaseDriver::Mysql => list_tags_for_post_mysql(self.pool.mysql()?, post_id).await,
        }
    }

    async fn set_post_tags(&self, post_id: i64, tag_ids: &[i64]) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                set_post_tags_sqlite(self.pool.sqlite()?, post_id, tag_ids).await
            }
            DatabaseDriver::Mysql => {
                set_post_tags_mysql(self.pool.mysql()?, post_id, tag_ids).await
            }
        }
    }
}

const TAG_COLUMNS: &str = "t.id, t.name, t.created_at, t.updated_at";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_tag_sqlite(pool: &SqlitePool, input: &TagInput) -> Result<Tag> {
    let now = Utc::now();
    let result = sqlx::query("INSERT INTO tags (name, created_at, updated_at) VALUES (?, ?, ?)")
        .bind(&input.name)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create tag")?;

    Ok(Tag {
        id: result.last_insert_rowid(),
        name: input.name.clone(),
        created_at: now,
        updated_at: now,
    })
}

async fn get_tag_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Tag>> {
    let sql = format!("SELECT {} FROM tags t WHERE t.id = ?", TAG_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get tag")?;

    row.map(|r| row_to_tag_sqlite(&r)).transpose()
}

async fn list_tags_sqlite(pool: &SqlitePool) -> Result<Vec<Tag>> {
    let sql = format!("SELECT {} FROM tags t ORDER BY t.name, t.id", TAG_COLUMNS);
    let rows = sqlx::query(&sql)
        .fetch_all(pool)
        .await
        .context("Failed to list tags")?;

    rows.iter().map(row_to_tag_sqlite).collect()
}

async fn update_tag_sqlite(pool: &SqlitePool, id: i64, input: &TagInput) -> Result<Tag> {
    sqlx::query("UPDATE tags SET name = ?, updated_at = ? WHERE id = ?")
        .bind(&input.name)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update tag")?;

    get_tag_sqlite(pool, id)
        .await?
        .context("Tag not found after update")
}

async fn list_tags_for_post_sqlite(pool: &SqlitePool, post_id: i64) -> Result<Vec<Tag>> {
    let sql = format!(
        "SELECT {} FROM tags t INNER JOIN post_tags pt ON pt.tag_id = t.id \
         WHERE pt.post_id = ? ORDER BY t.name, t.id",
        TAG_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(post_id)
        .fetch_all(pool)
        .await
        .context("Failed to list tags for post")?;

    rows.iter().map(row_to_tag_sqlite).collect()
}

async fn set_post_tags_sqlite(pool: &SqlitePool, post_id: i64, tag_ids: &[i64]) -> Result<()> {
    let mut tx = pool.begin().await?;
    replace_post_tags_sqlite(&mut *tx, post_id, tag_ids).await?;
    tx.commit().await?;
    Ok(())
}

/// Swap the tag set of a post inside the caller's transaction
pub(crate) async fn replace_post_tags_sqlite(
    conn: &mut SqliteConnection,
    post_id: i64,
    tag_ids: &[i64],
) -> Result<()> {
    sqlx::query("DELETE FROM post_tags WHERE post_id = ?")
        .bind(post_id)
        .execute(&mut *conn)
        .await
        .context("Failed to clear post tags")?;
    for tag_id in tag_ids {
        sqlx::query("INSERT OR IGNORE INTO post_tags (post_id, tag_id) VALUES (?, ?)")
            .bind(post_id)
            .bind(tag_id)
            .execute(&mut *conn)
            .await
            .context("Failed to attach tag to post")?;
    }
    Ok(())
}

fn row_to_tag_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Tag> {
    Ok(Tag {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_tag_mysql(pool: &MySqlPool, input: &TagInput) -> Result<Tag> {
    let now = Utc::now();
    let result = sqlx::query("INSERT INTO tags (name, created_at, updated_at) VALUES (?, ?, ?)")
        .bind(&input.name)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create tag")?;

    Ok(Tag {
        id: result.last_insert_id() as i64,
        name: input.name.clone(),
        created_at: now,
        updated_at: now,
    })
}

async fn get_tag_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Tag>> {
    let sql = format!("SELECT {} FROM tags t WHERE t.id = ?", TAG_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get tag")?;

    row.map(|r| row_to_tag_mysql(&r)).transpose()
}

async fn list_tags_mysql(pool: &MySqlPool) -> Result<Vec<Tag>> {
    let sql = format!("SELECT {} FROM tags t ORDER BY t.name, t.id", TAG_COLUMNS);
    let rows = sqlx::query(&sql)
        .fetch_all(pool)
        .await
        .context("Failed to list tags")?;

    rows.iter().map(row_to_tag_mysql).collect()
}

async fn update_tag_mysql(pool: &MySqlPool, id: i64, input: &TagInput) -> Result<Tag> {
    sqlx::query("UPDATE tags SET name = ?, updated_at = ? WHERE id = ?")
        .bind(&input.name)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update tag")?;

    get_tag_mysql(pool, id)
        .await?
        .context("Tag not found after update")
}

async fn list_tags_for_post_mysql(pool: &MySqlPool, post_id: i64) -> Result<Vec<Tag>> {
    let sql = format!(
        "SELECT {} FROM tags t INNER JOIN post_tags pt ON pt.tag_id = t.id \
         WHERE pt.post_id = ? ORDER BY t.name, t.id",
        TAG_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(post_id)
        .fetch_all(pool)
        .await
        .context("Failed to list tags for post")?;

    rows.iter().map(row_to_tag_mysql).collect()
}

async fn set_post_tags_mysql(pool: &MySqlPool, post_id: i64, tag_ids: &[i64]) -> Result<()> {
    let mut tx = pool.begin().await?;
    replace_post_tags_mysql(&mut *tx, post_id, tag_ids).await?;
    tx.commit().await?;
    Ok(())
}

/// Swap the tag set of a post inside the caller's transaction
pub(crate) async fn replace_post_tags_mysql(
    conn: &mut MySqlConnection,
    post_id: i64,
    tag_ids: &[i64],
) -> Result<()> {
    sqlx::query("DELETE FROM post_tags WHERE post_id = ?")
        .bind(post_id)
        .execute(&mut *conn)
        .await
        .context("Failed to clear post tags")?;
    for tag_id in tag_ids {
        sqlx::query("INSERT IGNORE INTO post_tags (post_id, tag_id) VALUES (?, ?)")
            .bind(post_id)
            .bind(tag_id)
            .execute(&mut *conn)
            .await
            .context("Failed to attach tag to post")?;
    }
    Ok(())
}

fn row_to_tag_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Tag> {
    Ok(Tag {
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

    async fn setup_test_repo() -> (DynDatabasePool, SqlxTagRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxTagRepository::new(pool.clone());
        (pool, repo)
    }

    async fn insert_post(pool: &DynDatabasePool) -> i64 {
        let db = pool.sqlite().unwrap();
        sqlx::query("INSERT INTO users (username, password_hash) VALUES ('author', 'x')")
            .execute(db)
            .await
            .unwrap();
        sqlx::query("INSERT INTO categories (name) VALUES ('News')")
            .execute(db)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO posts (title, content, featured_image, author_id, category_id) \
             VALUES ('Hello', 'Body', 'post_images/x.jpg', 1, 1)",
        )
        .execute(db)
        .await
        .unwrap()
        .last_insert_rowid()
    }

    #[tokio::test]
    async fn test_crud() {
        let (_pool, repo) = setup_test_repo().await;

        let tag = repo.create(&TagInput::new("politics")).await.unwrap();
        assert_eq!(repo.get_by_id(tag.id).await.unwrap().unwrap().name, "politics");

        let renamed = repo.update(tag.id, &TagInput::new("policy")).await.unwrap();
        assert_eq!(renamed.name, "policy");

        repo.delete(tag.id).await.unwrap();
        assert!(repo.get_by_id(tag.id).await.unwrap().is_none());
        assert!(repo.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_post_tags_replaces_previous_set() {
        let (pool, repo) = setup_test_repo().await;
        let post_id = insert_post(&pool).await;

        let a = repo.create(&TagInput::new("alpha")).await.unwrap();
        let b = repo.create(&TagInput::new("beta")).await.unwrap();
        let c = repo.create(&TagInput::new("gamma")).await.unwrap();

        repo.set_post_tags(post_id, &[b.id, a.id, a.id]).await.unwrap();
        let names: Vec<String> = repo
            .list_for_post(post_id)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["alpha", "beta"]);

        repo.set_post_tags(post_id, &[c.id]).await.unwrap();
        let tags = repo.list_for_post(post_id).await.unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].id, c.id);

        repo.set_post_tags(post_id, &[]).await.unwrap();
        assert!(repo.list_for_post(post_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deleting_tag_detaches_it() {
        let (pool, repo) = setup_test_repo().await;
        let post_id = insert_post(&pool).await;
        let tag = repo.create(&TagInput::new("temp")).await.unwrap();
        repo.set_post_tags(post_id, &[tag.id]).await.unwrap();

        repo.delete(tag.id).await.unwrap();
        assert!(repo.list_for_post(post_id).await.unwrap().is_empty());
    }
}
