//! Post service
//!
//! Composes the public post views (homepage sections, detail page,
//! listings, search) and the admin post CRUD on top of the repositories.
//! Posts leave this service as `PostCard`s, i.e. hydrated with their
//! category, author and tags.

use crate::cache::{CacheLayer, MemoryCache};
use crate::db::repositories::{
    CategoryRepository, Direction, PostFilter, PostOrder, PostQuery, PostRepository,
    TagRepository, UserRepository,
};
use crate::models::{
    field_errors, Author, Category, FieldErrors, Page, Paginator, Post, PostCard, PostInput, Tag,
};
use anyhow::Result;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use validator::Validate;

/// Cache key of the homepage sections
pub const HOME_CACHE_KEY: &str = "posts:home";
/// Pattern matching every post-derived cache entry
const POSTS_CACHE_PATTERN: &str = "posts:*";

const HOME_LATEST: i64 = 5;
const HOME_FEATURED_OFFSET: i64 = 2;
const HOME_FEATURED_COUNT: i64 = 3;
const HOME_WEEKLY: i64 = 7;
const WEEKLY_WINDOW_DAYS: i64 = 7;
const RECENT_POSTS: i64 = 5;
const ABOUT_POSTS: i64 = 5;
const ADMIN_MAX_PER_PAGE: i64 = 100;

#[derive(Debug, thiserror::Error)]
pub enum PostServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0:?}")]
    ValidationError(FieldErrors),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Everything the homepage shows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HomeSections {
    /// Latest published
    pub posts: Vec<PostCard>,
    /// Most viewed
    pub featured_post: Option<PostCard>,
    /// Third to fifth most viewed
    pub featured_posts: Vec<PostCard>,
    /// Published during the last week, newest first
    pub weekly_top_posts: Vec<PostCard>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostDetail {
    pub post: PostCard,
    pub previous_post: Option<PostCard>,
    pub next_post: Option<PostCard>,
    pub recent_posts: Vec<PostCard>,
}

/// How an unusable `page` parameter is handled
#[derive(Debug, Clone, Copy)]
enum PageResolution {
    /// Not an integer or out of range is a 404
    Strict,
    /// Fall back to the first or last page
    Lenient,
}

pub struct PostService {
    posts: Arc<dyn PostRepository>,
    categories: Arc<dyn CategoryRepository>,
    tags: Arc<dyn TagRepository>,
    users: Arc<dyn UserRepository>,
    cache: Arc<MemoryCache>,
    per_page: u32,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        categories: Arc<dyn CategoryRepository>,
        tags: Arc<dyn TagRepository>,
        users: Arc<dyn UserRepository>,
        cache: Arc<MemoryCache>,
        per_page: u32,
    ) -> Self {
        Self {
            posts,
            categories,
            tags,
            users,
            cache,
            per_page,
        }
    }

    // ========================================================================
    // Public views
    // ========================================================================

    pub async fn home(&self) -> Result<HomeSections, PostServiceError> {
        if let Some(sections) = self
            .cache
            .get::<HomeSections>(HOME_CACHE_KEY)
            .await
            .ok()
            .flatten()
        {
            return Ok(sections);
        }

        let latest = self.posts.find(&PostQuery::visible().limit(HOME_LATEST)).await?;
        let most_viewed = PostQuery::visible().order(PostOrder::MostViewed);
        let top = self.posts.find(&most_viewed.clone().limit(1)).await?;
        let featured = self
            .posts
            .find(&most_viewed.slice(HOME_FEATURED_OFFSET, HOME_FEATURED_COUNT))
            .await?;
        let weekly = self
            .posts
            .find(
                &PostQuery::visible()
                    .published_since(Utc::now() - Duration::days(WEEKLY_WINDOW_DAYS))
                    .limit(HOME_WEEKLY),
            )
            .await?;

        let sections = HomeSections {
            posts: self.cards(latest).await?,
            featured_post: self.cards(top).await?.into_iter().next(),
            featured_posts: self.cards(featured).await?,
            weekly_top_posts: self.cards(weekly).await?,
        };

        let _ = self
            .cache
            .set(HOME_CACHE_KEY, &sections, self.cache.default_ttl())
            .await;
        Ok(sections)
    }

    /// A visible post with its neighbours. Counts as one view.
    pub async fn detail(&self, id: i64) -> Result<PostDetail, PostServiceError> {
        let mut post = self
            .posts
            .get_by_id(id)
            .await?
            .filter(Post::is_visible)
            .ok_or_else(|| PostServiceError::NotFound(format!("post {}", id)))?;

        self.posts.increment_views(id).await?;
        post.views_count += 1;

        let previous = self.posts.adjacent(id, Direction::Previous).await?;
        let next = self.posts.adjacent(id, Direction::Next).await?;
        let recent = self
            .posts
            .find(
                &PostQuery::visible()
                    .order(PostOrder::MostViewed)
                    .limit(RECENT_POSTS),
            )
            .await?;

        Ok(PostDetail {
            post: self.card(post).await?,
            previous_post: self.cards(previous.into_iter().collect()).await?.pop(),
            next_post: self.cards(next.into_iter().collect()).await?.pop(),
            recent_posts: self.cards(recent).await?,
        })
    }

    pub async fn list(&self, page: Option<&str>) -> Result<Page<PostCard>, PostServiceError> {
        self.paginate(PostQuery::visible(), page, PageResolution::Strict)
            .await
    }

    pub async fn list_by_category(
        &self,
        category_id: i64,
        page: Option<&str>,
    ) -> Result<(Category, Page<PostCard>), PostServiceError> {
        let category = self
            .categories
            .get_by_id(category_id)
            .await?
            .ok_or_else(|| PostServiceError::NotFound(format!("category {}", category_id)))?;
        let query = PostQuery::visible().filter(PostFilter::Category(category_id));
        let page = self.paginate(query, page, PageResolution::Strict).await?;
        Ok((category, page))
    }

    pub async fn list_by_tag(
        &self,
        tag_id: i64,
        page: Option<&str>,
    ) -> Result<(Tag, Page<PostCard>), PostServiceError> {
        let tag = self
            .tags
            .get_by_id(tag_id)
            .await?
            .ok_or_else(|| PostServiceError::NotFound(format!("tag {}", tag_id)))?;
        let query = PostQuery::visible().filter(PostFilter::Tag(tag_id));
        let page = self.paginate(query, page, PageResolution::Strict).await?;
        Ok((tag, page))
    }

    pub async fn about_posts(&self) -> Result<Vec<PostCard>, PostServiceError> {
        let posts = self.posts.find(&PostQuery::visible().limit(ABOUT_POSTS)).await?;
        Ok(self.cards(posts).await?)
    }

    /// Case-insensitive match on title or content. An empty term matches
    /// every visible post.
    pub async fn search(
        &self,
        term: &str,
        page: Option<&str>,
    ) -> Result<Page<PostCard>, PostServiceError> {
        let query = PostQuery::visible().filter(PostFilter::Search(term.to_string()));
        self.paginate(query, page, PageResolution::Lenient).await
    }

    // ========================================================================
    // Admin
    // ========================================================================

    pub async fn get(&self, id: i64) -> Result<PostCard, PostServiceError> {
        let post = self.find_post(id).await?;
        Ok(self.card(post).await?)
    }

    /// Every post regardless of status, newest first
    pub async fn list_admin(
        &self,
        page: i64,
        per_page: i64,
    ) -> Result<Page<PostCard>, PostServiceError> {
        let per_page = per_page.clamp(1, ADMIN_MAX_PER_PAGE);
        let query = PostQuery::any().order(PostOrder::NewestCreated);
        let count = self.posts.count(&query).await?;
        let paginator = Paginator::new(count, per_page as u32);
        let number = page.clamp(1, paginator.num_pages());

        let posts = self
            .posts
            .find(&query.slice(paginator.offset(number), paginator.per_page()))
            .await?;
        Ok(paginator.page(number, self.cards(posts).await?))
    }

    pub async fn create(
        &self,
        author_id: i64,
        input: PostInput,
    ) -> Result<PostCard, PostServiceError> {
        let input = self.validate_input(input).await?;

        let post = self.posts.create(author_id, &input).await?;
        self.invalidate().await;

        tracing::info!(post_id = post.id, "Post created");
        Ok(self.card(post).await?)
    }

    pub async fn update(&self, id: i64, input: PostInput) -> Result<PostCard, PostServiceError> {
        self.find_post(id).await?;
        let input = self.validate_input(input).await?;

        let post = self.posts.update(id, &input).await?;
        self.invalidate().await;

        Ok(self.card(post).await?)
    }

    pub async fn delete(&self, id: i64) -> Result<(), PostServiceError> {
        self.find_post(id).await?;
        self.posts.delete(id).await?;
        self.invalidate().await;

        tracing::info!(post_id = id, "Post deleted");
        Ok(())
    }

    /// Drop cached homepage sections after any change that could show in them
    pub async fn invalidate(&self) {
        let _ = self.cache.delete_pattern(POSTS_CACHE_PATTERN).await;
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn find_post(&self, id: i64) -> Result<Post, PostServiceError> {
        self.posts
            .get_by_id(id)
            .await?
            .ok_or_else(|| PostServiceError::NotFound(format!("post {}", id)))
    }

    /// Field validation plus existence of the referenced category and tags.
    /// Tag ids come back de-duplicated.
    async fn validate_input(&self, mut input: PostInput) -> Result<PostInput, PostServiceError> {
        input.title = input.title.trim().to_string();
        input.featured_image = input.featured_image.trim().to_string();

        let mut errors = match input.validate() {
            Ok(()) => FieldErrors::new(),
            Err(e) => field_errors(&e),
        };

        if self.categories.get_by_id(input.category_id).await?.is_none() {
            errors
                .entry("category_id".to_string())
                .or_default()
                .push(format!("Unknown category {}", input.category_id));
        }

        let tag_ids: Vec<i64> = input
            .tag_ids
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        for tag_id in &tag_ids {
            if self.tags.get_by_id(*tag_id).await?.is_none() {
                errors
                    .entry("tag_ids".to_string())
                    .or_default()
                    .push(format!("Unknown tag {}", tag_id));
            }
        }
        input.tag_ids = tag_ids;

        if errors.is_empty() {
            Ok(input)
        } else {
            Err(PostServiceError::ValidationError(errors))
        }
    }

    async fn paginate(
        &self,
        query: PostQuery,
        raw_page: Option<&str>,
        resolution: PageResolution,
    ) -> Result<Page<PostCard>, PostServiceError> {
        let count = self.posts.count(&query).await?;
        let paginator = Paginator::new(count, self.per_page);
        let number = match resolution {
            PageResolution::Strict => paginator
                .validate_number(raw_page)
                .map_err(|e| PostServiceError::NotFound(e.to_string()))?,
            PageResolution::Lenient => paginator.clamp_number(raw_page),
        };

        let posts = self
            .posts
            .find(&query.slice(paginator.offset(number), paginator.per_page()))
            .await?;
        Ok(paginator.page(number, self.cards(posts).await?))
    }

    async fn card(&self, post: Post) -> Result<PostCard> {
        let mut cards = self.cards(vec![post]).await?;
        cards
            .pop()
            .ok_or_else(|| anyhow::anyhow!("Post card hydration produced no card"))
    }

    /// Attach category, author and tags to each post
    async fn cards(&self, posts: Vec<Post>) -> Result<Vec<PostCard>> {
        if posts.is_empty() {
            return Ok(Vec::new());
        }

        let categories: HashMap<i64, Category> = self
            .categories
            .list()
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();
        let mut authors: HashMap<i64, Option<Author>> = HashMap::new();

        let mut cards = Vec::with_capacity(posts.len());
        for post in posts {
            let author = match authors.get(&post.author_id) {
                Some(author) => author.clone(),
                None => {
                    let author = self.users.get_by_id(post.author_id).await?.map(|u| Author {
                        id: u.id,
                        username: u.username,
                    });
                    authors.insert(post.author_id, author.clone());
                    author
                }
            };
            let tags = self.tags.list_for_post(post.id).await?;

            cards.push(PostCard {
                category: categories.get(&post.category_id).cloned(),
                author,
                tags,
                post,
            });
        }
        Ok(cards)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PostStatus;
    use crate::services::test_support::{seed_post, Fixture};

    #[tokio::test]
    async fn test_home_sections() {
        let fx = Fixture::new().await;
        // Six visible posts, one per day, with distinct view counts
        let views = [5, 60, 10, 40, 20, 30];
        let mut ids = Vec::new();
        for (i, v) in views.iter().enumerate() {
            let id = seed_post(&fx, &format!("Story {}", i), 10 - i as i64, PostStatus::Active).await;
            fx.set_views(id, *v).await;
            ids.push(id);
        }
        seed_post(&fx, "Hidden", 0, PostStatus::InActive).await;

        let home = fx.posts.home().await.unwrap();
        let latest: Vec<i64> = home.posts.iter().map(|c| c.post.id).collect();
        assert_eq!(latest, vec![ids[5], ids[4], ids[3], ids[2], ids[1]]);

        assert_eq!(home.featured_post.as_ref().unwrap().post.id, ids[1]);
        // views ordered: 60, 40, 30, 20, 10, 5 -> slots 2..5 are 30, 20, 10
        let featured: Vec<i64> = home.featured_posts.iter().map(|c| c.post.id).collect();
        assert_eq!(featured, vec![ids[5], ids[4], ids[2]]);

        // Published 10..5 days ago; only the five and six day old posts are
        // inside the week
        let weekly: Vec<i64> = home.weekly_top_posts.iter().map(|c| c.post.id).collect();
        assert_eq!(weekly, vec![ids[5], ids[4]]);

        let card = &home.posts[0];
        assert_eq!(card.category.as_ref().unwrap().name, "World");
        assert_eq!(card.author.as_ref().unwrap().username, "editor");
    }

    #[tokio::test]
    async fn test_home_is_cached_until_a_write() {
        let fx = Fixture::new().await;
        seed_post(&fx, "First", 1, PostStatus::Active).await;
        assert_eq!(fx.posts.home().await.unwrap().posts.len(), 1);

        // Inserted behind the service's back: served from cache
        seed_post(&fx, "Second", 1, PostStatus::Active).await;
        assert_eq!(fx.posts.home().await.unwrap().posts.len(), 1);

        fx.posts.invalidate().await;
        assert_eq!(fx.posts.home().await.unwrap().posts.len(), 2);
    }

    #[tokio::test]
    async fn test_detail_counts_view_and_finds_neighbours() {
        let fx = Fixture::new().await;
        let a = seed_post(&fx, "A", 3, PostStatus::Active).await;
        let hidden = seed_post(&fx, "B", 2, PostStatus::InActive).await;
        let c = seed_post(&fx, "C", 1, PostStatus::Active).await;

        let detail = fx.posts.detail(c).await.unwrap();
        assert_eq!(detail.post.post.views_count, 1);
        assert_eq!(detail.previous_post.unwrap().post.id, a);
        assert!(detail.next_post.is_none());
        assert_eq!(detail.recent_posts.len(), 2);

        let again = fx.posts.detail(c).await.unwrap();
        assert_eq!(again.post.post.views_count, 2);

        assert!(matches!(
            fx.posts.detail(hidden).await,
            Err(PostServiceError::NotFound(_))
        ));
        assert!(matches!(
            fx.posts.detail(9999).await,
            Err(PostServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_is_strict_about_pages() {
        let fx = Fixture::new().await;
        for i in 0..3 {
            seed_post(&fx, &format!("P{}", i), 3 - i, PostStatus::Active).await;
        }

        let first = fx.posts.list(None).await.unwrap();
        assert_eq!(first.num_pages, 3);
        assert_eq!(first.items[0].post.title, "P2");

        let last = fx.posts.list(Some("3")).await.unwrap();
        assert_eq!(last.items[0].post.title, "P0");
        assert!(!last.has_next);

        assert!(matches!(
            fx.posts.list(Some("4")).await,
            Err(PostServiceError::NotFound(_))
        ));
        assert!(matches!(
            fx.posts.list(Some("abc")).await,
            Err(PostServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_search_is_lenient_about_pages() {
        let fx = Fixture::new().await;
        seed_post(&fx, "Rust in space", 2, PostStatus::Active).await;
        seed_post(&fx, "Gardening", 1, PostStatus::Active).await;

        let page = fx.posts.search("RUST", None).await.unwrap();
        assert_eq!(page.count, 1);

        let all = fx.posts.search("", Some("99")).await.unwrap();
        assert_eq!(all.count, 2);
        assert_eq!(all.number, 2);

        let junk = fx.posts.search("", Some("x")).await.unwrap();
        assert_eq!(junk.number, 1);
    }

    #[tokio::test]
    async fn test_listing_by_unknown_category_or_tag() {
        let fx = Fixture::new().await;
        assert!(matches!(
            fx.posts.list_by_category(404, None).await,
            Err(PostServiceError::NotFound(_))
        ));
        assert!(matches!(
            fx.posts.list_by_tag(404, None).await,
            Err(PostServiceError::NotFound(_))
        ));

        let (category, page) = fx
            .posts
            .list_by_category(fx.category_id, None)
            .await
            .unwrap();
        assert_eq!(category.name, "World");
        assert_eq!(page.count, 0);
        assert_eq!(page.num_pages, 1);
    }

    #[tokio::test]
    async fn test_admin_create_validates_references() {
        let fx = Fixture::new().await;
        let input = PostInput {
            title: "  Budget day  ".to_string(),
            content: "Numbers".to_string(),
            featured_image: "post_images/a.jpg".to_string(),
            category_id: 9999,
            tag_ids: vec![fx.tag_id, 777],
            status: PostStatus::Active,
            published_at: Some(Utc::now()),
        };

        match fx.posts.create(fx.author_id, input.clone()).await {
            Err(PostServiceError::ValidationError(errors)) => {
                assert!(errors.contains_key("category_id"));
                assert_eq!(errors["tag_ids"], vec!["Unknown tag 777".to_string()]);
            }
            other => panic!("expected validation error, got {:?}", other.map(|c| c.post.id)),
        }

        let valid = PostInput {
            category_id: fx.category_id,
            tag_ids: vec![fx.tag_id, fx.tag_id],
            ..input
        };
        let card = fx.posts.create(fx.author_id, valid).await.unwrap();
        assert_eq!(card.post.title, "Budget day");
        assert_eq!(card.tags.len(), 1);
    }

    #[tokio::test]
    async fn test_admin_list_update_delete() {
        let fx = Fixture::new().await;
        let id = seed_post(&fx, "Draft", 0, PostStatus::InActive).await;

        let page = fx.posts.list_admin(1, 10).await.unwrap();
        assert_eq!(page.count, 1);

        let mut input = fx.input_for("Draft");
        input.status = PostStatus::Active;
        input.tag_ids = vec![fx.tag_id];
        let updated = fx.posts.update(id, input).await.unwrap();
        assert_eq!(updated.post.status, PostStatus::Active);
        assert_eq!(updated.tags[0].id, fx.tag_id);

        fx.posts.delete(id).await.unwrap();
        assert!(matches!(
            fx.posts.get(id).await,
            Err(PostServiceError::NotFound(_))
        ));
        assert!(matches!(
            fx.posts.delete(id).await,
            Err(PostServiceError::NotFound(_))
        ));
    }
}
