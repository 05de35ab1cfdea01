//! Services layer - business logic
//!
//! Services sit between the HTTP handlers and the repositories. They own
//! validation, cache invalidation and the composition of the public views.

pub mod category;
pub mod contact;
pub mod newsletter;
pub mod password;
pub mod post;
pub mod rate_limiter;
pub mod tag;
pub mod user;

pub use category::{CategoryService, CategoryServiceError};
pub use contact::{ContactService, ContactServiceError};
pub use newsletter::{NewsletterService, NewsletterServiceError};
pub use password::{hash_password, verify_password};
pub use post::{HomeSections, PostDetail, PostService, PostServiceError, HOME_CACHE_KEY};
pub use rate_limiter::LoginRateLimiter;
pub use tag::{TagService, TagServiceError};
pub use user::{UserService, UserServiceError};

#[cfg(test)]
pub(crate) mod test_support {
    //! Seeded services over an in-memory database

    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::repositories::{
        PostRepository, SqlxCategoryRepository, SqlxContactRepository, SqlxNewsletterRepository,
        SqlxPostRepository, SqlxTagRepository, SqlxUserRepository,
    };
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::{CategoryInput, CreateUserInput, PostInput, PostStatus, TagInput};
    use chrono::{Duration, Utc};
    use std::sync::Arc;

    pub struct Fixture {
        pub pool: DynDatabasePool,
        pub post_repo: Arc<dyn PostRepository>,
        pub posts: PostService,
        pub categories: CategoryService,
        pub tags: TagService,
        pub contacts: ContactService,
        pub newsletters: NewsletterService,
        pub author_id: i64,
        pub category_id: i64,
        pub tag_id: i64,
    }

    impl Fixture {
        /// One staff author, a "World" category and a "politics" tag.
        /// Listings page one post at a time.
        pub async fn new() -> Self {
            let pool = create_test_pool().await.expect("Failed to create test pool");
            migrations::run_migrations(&pool)
                .await
                .expect("Failed to run migrations");

            let cache = Arc::new(MemoryCache::new());
            let post_repo = SqlxPostRepository::boxed(pool.clone());
            let category_repo = SqlxCategoryRepository::boxed(pool.clone());
            let tag_repo = SqlxTagRepository::boxed(pool.clone());
            let user_repo = SqlxUserRepository::boxed(pool.clone());

            let author_id = user_repo
                .create(&CreateUserInput {
                    username: "editor".to_string(),
                    email: "editor@example.com".to_string(),
                    password_hash: "unused".to_string(),
                    is_staff: true,
                })
                .await
                .expect("Failed to create author")
                .id;
            let category_id = category_repo
                .create(&CategoryInput::new("World"))
                .await
                .expect("Failed to create category")
                .id;
            let tag_id = tag_repo
                .create(&TagInput::new("politics"))
                .await
                .expect("Failed to create tag")
                .id;

            Self {
                posts: PostService::new(
                    post_repo.clone(),
                    category_repo.clone(),
                    tag_repo.clone(),
                    user_repo,
                    cache.clone(),
                    1,
                ),
                categories: CategoryService::new(category_repo, cache.clone()),
                tags: TagService::new(tag_repo, cache),
                contacts: ContactService::new(SqlxContactRepository::boxed(pool.clone())),
                newsletters: NewsletterService::new(SqlxNewsletterRepository::boxed(pool.clone())),
                post_repo,
                pool,
                author_id,
                category_id,
                tag_id,
            }
        }

        pub fn input_for(&self, title: &str) -> PostInput {
            PostInput {
                title: title.to_string(),
                content: format!("Body of {}", title),
                featured_image: "post_images/2024/01/01/cover.jpg".to_string(),
                category_id: self.category_id,
                tag_ids: Vec::new(),
                status: PostStatus::Active,
                published_at: Some(Utc::now()),
            }
        }

        pub async fn set_views(&self, id: i64, views: i64) {
            let pool = self.pool.sqlite().expect("test pool is SQLite");
            sqlx::query("UPDATE posts SET views_count = ? WHERE id = ?")
                .bind(views)
                .bind(id)
                .execute(pool)
                .await
                .expect("Failed to set views");
        }
    }

    /// Insert a post through the repository, bypassing service caching.
    /// Inactive posts are left unpublished.
    pub async fn seed_post(fx: &Fixture, title: &str, days_ago: i64, status: PostStatus) -> i64 {
        let mut input = fx.input_for(title);
        input.status = status;
        input.published_at = match status {
            PostStatus::Active => Some(Utc::now() - Duration::days(days_ago)),
            PostStatus::InActive => None,
        };
        fx.post_repo
            .create(fx.author_id, &input)
            .await
            .expect("Failed to seed post")
            .id
    }
}
