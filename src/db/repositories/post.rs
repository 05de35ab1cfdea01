//! Post repository
//!
//! Every public listing is the same shape of query: the active/published
//! predicate, an optional narrowing filter, an ordering and a slice.
//! `PostQuery` captures that shape once and renders it to SQL that runs
//! unchanged on SQLite and MySQL.

use crate::config::DatabaseDriver;
use crate::db::repositories::tag::{replace_post_tags_mysql, replace_post_tags_sqlite};
use crate::db::DynDatabasePool;
use crate::models::{Post, PostInput, PostStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::mysql::{MySql, MySqlArguments};
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Which posts a query may return at all
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// `status = 'active' AND published_at IS NOT NULL`
    Visible,
    /// No restriction (admin)
    Any,
}

/// Narrowing applied on top of the visibility predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostFilter {
    All,
    Category(i64),
    Tag(i64),
    /// Case-insensitive substring of the title or the content
    Search(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostOrder {
    /// `published_at DESC`
    NewestPublished,
    /// `views_count DESC`
    MostViewed,
    /// `id DESC`, newest row first
    NewestCreated,
}

/// Direction for previous/next navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Closest visible post with a smaller id
    Previous,
    /// Closest visible post with a larger id
    Next,
}

/// A composable post listing query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostQuery {
    pub visibility: Visibility,
    pub filter: PostFilter,
    pub published_since: Option<DateTime<Utc>>,
    pub order: PostOrder,
    pub offset: i64,
    pub limit: Option<i64>,
}

impl PostQuery {
    /// Active and published posts, newest first
    pub fn visible() -> Self {
        Self {
            visibility: Visibility::Visible,
            filter: PostFilter::All,
            published_since: None,
            order: PostOrder::NewestPublished,
            offset: 0,
            limit: None,
        }
    }

    /// Every post regardless of status, newest row first
    pub fn any() -> Self {
        Self {
            visibility: Visibility::Any,
            order: PostOrder::NewestCreated,
            ..Self::visible()
        }
    }

    pub fn filter(mut self, filter: PostFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn published_since(mut self, since: DateTime<Utc>) -> Self {
        self.published_since = Some(since);
        self
    }

    pub fn order(mut self, order: PostOrder) -> Self {
        self.order = order;
        self
    }

    pub fn slice(mut self, offset: i64, limit: i64) -> Self {
        self.offset = offset.max(0);
        self.limit = Some(limit.max(0));
        self
    }

    pub fn limit(self, limit: i64) -> Self {
        self.slice(0, limit)
    }

    fn where_clause(&self) -> (String, Vec<BindValue>) {
        let mut conditions: Vec<String> = Vec::new();
        let mut binds = Vec::new();

        if self.visibility == Visibility::Visible {
            conditions.push(VISIBLE_PREDICATE.to_string());
        }

        match &self.filter {
            PostFilter::All => {}
            PostFilter::Category(id) => {
                conditions.push("p.category_id = ?".to_string());
                binds.push(BindValue::Int(*id));
            }
            PostFilter::Tag(id) => {
                conditions.push(
                    "EXISTS (SELECT 1 FROM post_tags pt WHERE pt.post_id = p.id AND pt.tag_id = ?)"
                        .to_string(),
                );
                binds.push(BindValue::Int(*id));
            }
            PostFilter::Search(term) => {
                let pattern = format!("%{}%", escape_like(term));
                conditions.push(
                    "(p.title LIKE ? ESCAPE '!' OR p.content LIKE ? ESCAPE '!')".to_string(),
                );
                binds.push(BindValue::Text(pattern.clone()));
                binds.push(BindValue::Text(pattern));
            }
        }

        if let Some(since) = self.published_since {
            conditions.push("p.published_at >= ?".to_string());
            binds.push(BindValue::Time(since));
        }

        if conditions.is_empty() {
            (String::new(), binds)
        } else {
            (format!(" WHERE {}", conditions.join(" AND ")), binds)
        }
    }

    fn select_sql(&self) -> (String, Vec<BindValue>) {
        let (where_clause, binds) = self.where_clause();
        let order = match self.order {
            PostOrder::NewestPublished => "p.published_at DESC, p.id DESC",
            PostOrder::MostViewed => "p.views_count DESC, p.id DESC",
            PostOrder::NewestCreated => "p.id DESC",
        };
        let mut sql = format!(
            "SELECT {} FROM posts p{} ORDER BY {}",
            POST_COLUMNS, where_clause, order
        );
        match (self.limit, self.offset) {
            (Some(limit), offset) => sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset)),
            (None, 0) => {}
            (None, offset) => sql.push_str(&format!(" LIMIT {} OFFSET {}", i64::MAX, offset)),
        }
        (sql, binds)
    }

    fn count_sql(&self) -> (String, Vec<BindValue>) {
        let (where_clause, binds) = self.where_clause();
        (format!("SELECT COUNT(*) FROM posts p{}", where_clause), binds)
    }
}

/// Escape LIKE wildcards with `!` so user input only ever matches literally
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '!' | '%' | '_') {
            escaped.push('!');
        }
        escaped.push(c);
    }
    escaped
}

#[derive(Debug, Clone)]
enum BindValue {
    Int(i64),
    Text(String),
    Time(DateTime<Utc>),
}

const VISIBLE_PREDICATE: &str = "p.status = 'active' AND p.published_at IS NOT NULL";

const UPDATE_POST_SQL: &str = "UPDATE posts SET title = ?, content = ?, featured_image = ?, \
     category_id = ?, status = ?, published_at = ?, updated_at = ? WHERE id = ?";

const POST_COLUMNS: &str = "p.id, p.title, p.content, p.featured_image, p.author_id, \
     p.category_id, p.status, p.published_at, p.views_count, p.created_at, p.updated_at";

/// Post repository trait
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Insert a post and link `input.tag_ids` in one transaction
    async fn create(&self, author_id: i64, input: &PostInput) -> Result<Post>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>>;

    /// Replace the editable fields and tag set of a post in one transaction;
    /// author and view count are kept
    async fn update(&self, id: i64, input: &PostInput) -> Result<Post>;

    async fn delete(&self, id: i64) -> Result<()>;

    async fn increment_views(&self, id: i64) -> Result<()>;

    async fn find(&self, query: &PostQuery) -> Result<Vec<Post>>;

    /// Number of rows `query` matches, ignoring its ordering and slice
    async fn count(&self, query: &PostQuery) -> Result<i64>;

    /// Closest visible neighbour of `id` by primary key
    async fn adjacent(&self, id: i64, direction: Direction) -> Result<Option<Post>>;
}

/// SQLx-based post repository implementation
pub struct SqlxPostRepository {
    pool: DynDatabasePool,
}

impl SqlxPostRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PostRepository> {
        Arc::new(Self::new(pool))
    }
}

fn adjacent_sql(direction: Direction) -> String {
    let (cmp, order) = match direction {
        Direction::Previous => ("<", "DESC"),
        Direction::Next => (">", "ASC"),
    };
    format!(
        "SELECT {} FROM posts p WHERE {} AND p.id {} ? ORDER BY p.id {} LIMIT 1",
        POST_COLUMNS, VISIBLE_PREDICATE, cmp, order
    )
}

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn create(&self, author_id: i64, input: &PostInput) -> Result<Post> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_post_sqlite(self.pool.sqlite()?, author_id, input).await
            }
            DatabaseDriver::Mysql => create_post_mysql(self.pool.mysql()?, author_id, input).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>> {
        let sql = format!("SELECT {} FROM posts p WHERE p.id = ?", POST_COLUMNS);
        let binds = [BindValue::Int(id)];
        match self.pool.driver() {
            DatabaseDriver::Sqlite => fetch_optional_sqlite(self.pool.sqlite()?, &sql, &binds).await,
            DatabaseDriver::Mysql => fetch_optional_mysql(self.pool.mysql()?, &sql, &binds).await,
        }
    }

    async fn update(&self, id: i64, input: &PostInput) -> Result<Post> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_post_sqlite(self.pool.sqlite()?, id, input).await?,
            DatabaseDriver::Mysql => update_post_mysql(self.pool.mysql()?, id, input).await?,
        }

        self.get_by_id(id)
            .await?
            .context("Post not found after update")
    }

    async fn delete(&self, id: i64) -> Result<()> {
        const SQL: &str = "DELETE FROM posts WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(SQL)
                    .bind(id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to delete post")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(SQL)
                    .bind(id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to delete post")?;
            }
        }
        Ok(())
    }

    async fn increment_views(&self, id: i64) -> Result<()> {
        const SQL: &str = "UPDATE posts SET views_count = views_count + 1 WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(SQL)
                    .bind(id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to increment post views")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(SQL)
                    .bind(id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to increment post views")?;
            }
        }
        Ok(())
    }

    async fn find(&self, query: &PostQuery) -> Result<Vec<Post>> {
        let (sql, binds) = query.select_sql();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => fetch_all_sqlite(self.pool.sqlite()?, &sql, &binds).await,
            DatabaseDriver::Mysql => fetch_all_mysql(self.pool.mysql()?, &sql, &binds).await,
        }
    }

    async fn count(&self, query: &PostQuery) -> Result<i64> {
        let (sql, binds) = query.count_sql();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = bind_sqlite(sqlx::query(&sql), &binds)
                    .fetch_one(self.pool.sqlite()?)
                    .await
                    .context("Failed to count posts")?;
                Ok(row.try_get(0)?)
            }
            DatabaseDriver::Mysql => {
                let row = bind_mysql(sqlx::query(&sql), &binds)
                    .fetch_one(self.pool.mysql()?)
                    .await
                    .context("Failed to count posts")?;
                Ok(row.try_get(0)?)
            }
        }
    }

    async fn adjacent(&self, id: i64, direction: Direction) -> Result<Option<Post>> {
        let sql = adjacent_sql(direction);
        let binds = [BindValue::Int(id)];
        match self.pool.driver() {
            DatabaseDriver::Sqlite => fetch_optional_sqlite(self.pool.sqlite()?, &sql, &binds).await,
            DatabaseDriver::Mysql => fetch_optional_mysql(self.pool.mysql()?, &sql, &binds).await,
        }
    }
}

fn parse_status(raw: &str) -> Result<PostStatus> {
    raw.parse()
}

// ============================================================================
// SQLite implementations
// ============================================================================

fn bind_sqlite<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    binds: &'q [BindValue],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for value in binds {
        query = match value {
            BindValue::Int(v) => query.bind(*v),
            BindValue::Text(v) => query.bind(v.as_str()),
            BindValue::Time(v) => query.bind(*v),
        };
    }
    query
}

async fn fetch_all_sqlite(pool: &SqlitePool, sql: &str, binds: &[BindValue]) -> Result<Vec<Post>> {
    let rows = bind_sqlite(sqlx::query(sql), binds)
        .fetch_all(pool)
        .await
        .context("Failed to list posts")?;
    rows.iter().map(row_to_post_sqlite).collect()
}

async fn fetch_optional_sqlite(
    pool: &SqlitePool,
    sql: &str,
    binds: &[BindValue],
) -> Result<Option<Post>> {
    let row = bind_sqlite(sqlx::query(sql), binds)
        .fetch_optional(pool)
        .await
        .context("Failed to get post")?;
    row.map(|r| row_to_post_sqlite(&r)).transpose()
}

async fn create_post_sqlite(pool: &SqlitePool, author_id: i64, input: &PostInput) -> Result<Post> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;
    let result = sqlx::query(
        r#"
        INSERT INTO posts (title, content, featured_image, author_id, category_id,
                           status, published_at, views_count, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?, ?)
        "#,
    )
    .bind(&input.title)
    .bind(&input.content)
    .bind(&input.featured_image)
    .bind(author_id)
    .bind(input.category_id)
    .bind(input.status.as_str())
    .bind(input.published_at)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to create post")?;

    let id = result.last_insert_rowid();
    replace_post_tags_sqlite(&mut *tx, id, &input.tag_ids).await?;
    tx.commit().await?;

    Ok(new_post(id, author_id, input, now))
}

async fn update_post_sqlite(pool: &SqlitePool, id: i64, input: &PostInput) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query(UPDATE_POST_SQL)
        .bind(&input.title)
        .bind(&input.content)
        .bind(&input.featured_image)
        .bind(input.category_id)
        .bind(input.status.as_str())
        .bind(input.published_at)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to update post")?;

    replace_post_tags_sqlite(&mut *tx, id, &input.tag_ids).await?;
    tx.commit().await?;
    Ok(())
}

fn row_to_post_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Post> {
    let status: String = row.try_get("status")?;
    Ok(Post {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        featured_image: row.try_get("featured_image")?,
        author_id: row.try_get("author_id")?,
        category_id: row.try_get("category_id")?,
        status: parse_status(&status)?,
        published_at: row.try_get("published_at")?,
        views_count: row.try_get("views_count")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

fn bind_mysql<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    binds: &'q [BindValue],
) -> Query<'q, MySql, MySqlArguments> {
    for value in binds {
        query = match value {
            BindValue::Int(v) => query.bind(*v),
            BindValue::Text(v) => query.bind(v.as_str()),
            BindValue::Time(v) => query.bind(*v),
        };
    }
    query
}

async fn fetch_all_mysql(pool: &MySqlPool, sql: &str, binds: &[BindValue]) -> Result<Vec<Post>> {
    let rows = bind_mysql(sqlx::query(sql), binds)
        .fetch_all(pool)
        .await
        .context("Failed to list posts")?;
    rows.iter().map(row_to_post_mysql).collect()
}

async fn fetch_optional_mysql(
    pool: &MySqlPool,
    sql: &str,
    binds: &[BindValue],
) -> Result<Option<Post>> {
    let row = bind_mysql(sqlx::query(sql), binds)
        .fetch_optional(pool)
        .await
        .context("Failed to get post")?;
    row.map(|r| row_to_post_mysql(&r)).transpose()
}

async fn create_post_mysql(pool: &MySqlPool, author_id: i64, input: &PostInput) -> Result<Post> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;
    let result = sqlx::query(
        r#"
        INSERT INTO posts (title, content, featured_image, author_id, category_id,
                           status, published_at, views_count, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?, ?)
        "#,
    )
    .bind(&input.title)
    .bind(&input.content)
    .bind(&input.featured_image)
    .bind(author_id)
    .bind(input.category_id)
    .bind(input.status.as_str())
    .bind(input.published_at)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to create post")?;

    let id = result.last_insert_id() as i64;
    replace_post_tags_mysql(&mut *tx, id, &input.tag_ids).await?;
    tx.commit().await?;

    Ok(new_post(id, author_id, input, now))
}

async fn update_post_mysql(pool: &MySqlPool, id: i64, input: &PostInput) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query(UPDATE_POST_SQL)
        .bind(&input.title)
        .bind(&input.content)
        .bind(&input.featured_image)
        .bind(input.category_id)
        .bind(input.status.as_str())
        .bind(input.published_at)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to update post")?;

    replace_post_tags_mysql(&mut *tx, id, &input.tag_ids).await?;
    tx.commit().await?;
    Ok(())
}

fn row_to_post_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Post> {
    let status: String = row.try_get("status")?;
    Ok(Post {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        featured_image: row.try_get("featured_image")?,
        author_id: row.try_get("author_id")?,
        category_id: row.try_get("category_id")?,
        status: parse_status(&status)?,
        published_at: row.try_get("published_at")?,
        views_count: row.try_get("views_count")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn new_post(id: i64, author_id: i64, input: &PostInput, now: DateTime<Utc>) -> Post {
    Post {
        id,
        title: input.title.clone(),
        content: input.content.clone(),
        featured_image: input.featured_image.clone(),
        author_id,
        category_id: input.category_id,
        status: input.status,
        published_at: input.published_at,
        views_count: 0,
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use chrono::Duration;

    async fn setup_test_repo() -> (DynDatabasePool, SqlxPostRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let db = pool.sqlite().unwrap();
        sqlx::query("INSERT INTO users (username, password_hash) VALUES ('author', 'x')")
            .execute(db)
            .await
            .unwrap();
        sqlx::query("INSERT INTO categories (name) VALUES ('World'), ('Sports')")
            .execute(db)
            .await
            .unwrap();
        sqlx::query("INSERT INTO tags (name) VALUES ('breaking')")
            .execute(db)
            .await
            .unwrap();

        let repo = SqlxPostRepository::new(pool.clone());
        (pool, repo)
    }

    fn input(title: &str, published_at: Option<DateTime<Utc>>) -> PostInput {
        PostInput {
            title: title.to_string(),
            content: format!("Body of {}", title),
            featured_image: "post_images/2024/01/01/x.jpg".to_string(),
            category_id: 1,
            tag_ids: vec![],
            status: PostStatus::Active,
            published_at,
        }
    }

    fn days_ago(days: i64) -> Option<DateTime<Utc>> {
        Some(Utc::now() - Duration::days(days))
    }

    async fn set_views(pool: &DynDatabasePool, id: i64, views: i64) {
        sqlx::query("UPDATE posts SET views_count = ? WHERE id = ?")
            .bind(views)
            .bind(id)
            .execute(pool.sqlite().unwrap())
            .await
            .unwrap();
    }

    fn titles(posts: &[Post]) -> Vec<&str> {
        posts.iter().map(|p| p.title.as_str()).collect()
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off!"), "50!%!_off!!");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn test_select_sql_shapes() {
        let (sql, binds) = PostQuery::visible()
            .filter(PostFilter::Category(3))
            .order(PostOrder::MostViewed)
            .slice(2, 3)
            .select_sql();
        assert!(sql.contains("p.status = 'active' AND p.published_at IS NOT NULL"));
        assert!(sql.contains("p.category_id = ?"));
        assert!(sql.ends_with("ORDER BY p.views_count DESC, p.id DESC LIMIT 3 OFFSET 2"));
        assert_eq!(binds.len(), 1);

        let (sql, binds) = PostQuery::any().count_sql();
        assert_eq!(sql, "SELECT COUNT(*) FROM posts p");
        assert!(binds.is_empty());
    }

    #[tokio::test]
    async fn test_create_get_update_delete() {
        let (_pool, repo) = setup_test_repo().await;

        let created = repo.create(1, &input("First", days_ago(1))).await.unwrap();
        let fetched = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.title, "First");
        assert_eq!(fetched.status, PostStatus::Active);
        assert_eq!(fetched.views_count, 0);
        assert!(fetched.published_at.is_some());

        let mut changes = input("First, revised", None);
        changes.status = PostStatus::InActive;
        changes.category_id = 2;
        let updated = repo.update(created.id, &changes).await.unwrap();
        assert_eq!(updated.title, "First, revised");
        assert_eq!(updated.status, PostStatus::InActive);
        assert_eq!(updated.category_id, 2);
        assert!(updated.published_at.is_none());
        assert_eq!(updated.author_id, 1);

        repo.delete(created.id).await.unwrap();
        assert!(repo.get_by_id(created.id).await.unwrap().is_none());
    }

    async fn tag_links(pool: &DynDatabasePool, post_id: i64) -> Vec<i64> {
        sqlx::query_scalar("SELECT tag_id FROM post_tags WHERE post_id = ? ORDER BY tag_id")
            .bind(post_id)
            .fetch_all(pool.sqlite().unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_and_update_write_tags() {
        let (pool, repo) = setup_test_repo().await;

        let mut tagged = input("Tagged", days_ago(1));
        tagged.tag_ids = vec![1];
        let post = repo.create(1, &tagged).await.unwrap();
        assert_eq!(tag_links(&pool, post.id).await, vec![1]);

        tagged.tag_ids = vec![];
        repo.update(post.id, &tagged).await.unwrap();
        assert!(tag_links(&pool, post.id).await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_tag_write_rolls_back_post() {
        let (pool, repo) = setup_test_repo().await;

        let mut bad = input("Orphan", days_ago(1));
        bad.tag_ids = vec![999];
        assert!(repo.create(1, &bad).await.is_err());
        assert_eq!(repo.count(&PostQuery::any()).await.unwrap(), 0);

        let mut good = input("Kept", days_ago(1));
        good.tag_ids = vec![1];
        let post = repo.create(1, &good).await.unwrap();

        let mut changes = input("Renamed", days_ago(1));
        changes.tag_ids = vec![999];
        assert!(repo.update(post.id, &changes).await.is_err());

        let unchanged = repo.get_by_id(post.id).await.unwrap().unwrap();
        assert_eq!(unchanged.title, "Kept");
        assert_eq!(tag_links(&pool, post.id).await, vec![1]);
    }

    #[tokio::test]
    async fn test_visible_excludes_drafts_and_inactive() {
        let (_pool, repo) = setup_test_repo().await;

        repo.create(1, &input("Published", days_ago(1))).await.unwrap();
        repo.create(1, &input("Draft", None)).await.unwrap();
        let mut inactive = input("Inactive", days_ago(1));
        inactive.status = PostStatus::InActive;
        repo.create(1, &inactive).await.unwrap();

        let visible = repo.find(&PostQuery::visible()).await.unwrap();
        assert_eq!(titles(&visible), vec!["Published"]);
        assert_eq!(repo.count(&PostQuery::visible()).await.unwrap(), 1);
        assert_eq!(repo.count(&PostQuery::any()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_ordering_and_slicing() {
        let (pool, repo) = setup_test_repo().await;

        let mut ids = Vec::new();
        for (i, title) in ["a", "b", "c", "d", "e", "f"].iter().enumerate() {
            let post = repo
                .create(1, &input(title, days_ago(10 - i as i64)))
                .await
                .unwrap();
            ids.push(post.id);
        }
        for (id, views) in ids.iter().zip([5, 60, 10, 40, 20, 30]) {
            set_views(&pool, *id, views).await;
        }

        let newest = repo.find(&PostQuery::visible().limit(3)).await.unwrap();
        assert_eq!(titles(&newest), vec!["f", "e", "d"]);

        let most_viewed = PostQuery::visible().order(PostOrder::MostViewed);
        let top = repo.find(&most_viewed.clone().limit(1)).await.unwrap();
        assert_eq!(titles(&top), vec!["b"]);

        let secondary = repo.find(&most_viewed.slice(2, 3)).await.unwrap();
        assert_eq!(titles(&secondary), vec!["f", "e", "c"]);
    }

    #[tokio::test]
    async fn test_published_since() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(1, &input("old", days_ago(30))).await.unwrap();
        repo.create(1, &input("recent", days_ago(2))).await.unwrap();
        repo.create(1, &input("today", days_ago(0))).await.unwrap();

        let week = PostQuery::visible().published_since(Utc::now() - Duration::days(7));
        let posts = repo.find(&week).await.unwrap();
        assert_eq!(titles(&posts), vec!["today", "recent"]);
    }

    #[tokio::test]
    async fn test_category_and_tag_filters() {
        let (pool, repo) = setup_test_repo().await;
        let world = repo.create(1, &input("world", days_ago(2))).await.unwrap();
        let mut sports = input("sports", days_ago(1));
        sports.category_id = 2;
        repo.create(1, &sports).await.unwrap();

        sqlx::query("INSERT INTO post_tags (post_id, tag_id) VALUES (?, 1)")
            .bind(world.id)
            .execute(pool.sqlite().unwrap())
            .await
            .unwrap();

        let in_sports = PostQuery::visible().filter(PostFilter::Category(2));
        assert_eq!(titles(&repo.find(&in_sports).await.unwrap()), vec!["sports"]);

        let tagged = PostQuery::visible().filter(PostFilter::Tag(1));
        assert_eq!(titles(&repo.find(&tagged).await.unwrap()), vec!["world"]);
        assert_eq!(repo.count(&tagged).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_and_literal() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(1, &input("Rust Weekly", days_ago(1))).await.unwrap();
        let mut body_match = input("Other", days_ago(2));
        body_match.content = "a story about RUSTY bridges".to_string();
        repo.create(1, &body_match).await.unwrap();
        repo.create(1, &input("100% sure", days_ago(3))).await.unwrap();

        let rust = PostQuery::visible().filter(PostFilter::Search("rust".to_string()));
        assert_eq!(
            titles(&repo.find(&rust).await.unwrap()),
            vec!["Rust Weekly", "Other"]
        );

        let percent = PostQuery::visible().filter(PostFilter::Search("0%".to_string()));
        assert_eq!(titles(&repo.find(&percent).await.unwrap()), vec!["100% sure"]);

        let underscore = PostQuery::visible().filter(PostFilter::Search("_".to_string()));
        assert!(repo.find(&underscore).await.unwrap().is_empty());

        let everything = PostQuery::visible().filter(PostFilter::Search(String::new()));
        assert_eq!(repo.count(&everything).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_adjacent_skips_hidden_posts() {
        let (_pool, repo) = setup_test_repo().await;
        let first = repo.create(1, &input("1", days_ago(4))).await.unwrap();
        let hidden = repo.create(1, &input("2", None)).await.unwrap();
        let middle = repo.create(1, &input("3", days_ago(3))).await.unwrap();
        let last = repo.create(1, &input("4", days_ago(2))).await.unwrap();

        let prev = repo.adjacent(middle.id, Direction::Previous).await.unwrap();
        assert_eq!(prev.unwrap().id, first.id);
        let next = repo.adjacent(first.id, Direction::Next).await.unwrap();
        assert_eq!(next.unwrap().id, middle.id);
        assert!(repo.adjacent(first.id, Direction::Previous).await.unwrap().is_none());
        assert!(repo.adjacent(last.id, Direction::Next).await.unwrap().is_none());
        assert_ne!(hidden.id, middle.id);
    }

    #[tokio::test]
    async fn test_increment_views() {
        let (_pool, repo) = setup_test_repo().await;
        let post = repo.create(1, &input("viewed", days_ago(1))).await.unwrap();
        repo.increment_views(post.id).await.unwrap();
        repo.increment_views(post.id).await.unwrap();
        assert_eq!(repo.get_by_id(post.id).await.unwrap().unwrap().views_count, 2);
    }
}
