//! Tag service

use crate::cache::{CacheLayer, MemoryCache};
use crate::db::repositories::TagRepository;
use crate::models::{field_errors, FieldErrors, Tag, TagInput};
use std::sync::Arc;
use validator::Validate;

#[derive(Debug, thiserror::Error)]
pub enum TagServiceError {
    #[error("Tag not found: {0}")]
    NotFound(i64),

    #[error("Validation error: {0:?}")]
    ValidationError(FieldErrors),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct TagService {
    repo: Arc<dyn TagRepository>,
    cache: Arc<MemoryCache>,
}

impl TagService {
    pub fn new(repo: Arc<dyn TagRepository>, cache: Arc<MemoryCache>) -> Self {
        Self { repo, cache }
    }

    pub async fn list(&self) -> Result<Vec<Tag>, TagServiceError> {
        Ok(self.repo.list().await?)
    }

    pub async fn get(&self, id: i64) -> Result<Tag, TagServiceError> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or(TagServiceError::NotFound(id))
    }

    pub async fn create(&self, input: &TagInput) -> Result<Tag, TagServiceError> {
        let input = input.normalized();
        input
            .validate()
            .map_err(|e| TagServiceError::ValidationError(field_errors(&e)))?;
        Ok(self.repo.create(&input).await?)
    }

    pub async fn update(&self, id: i64, input: &TagInput) -> Result<Tag, TagServiceError> {
        self.get(id).await?;
        let input = input.normalized();
        input
            .validate()
            .map_err(|e| TagServiceError::ValidationError(field_errors(&e)))?;

        let tag = self.repo.update(id, &input).await?;
        let _ = self.cache.delete_pattern("posts:*").await;
        Ok(tag)
    }

    /// Removing a tag detaches it from its posts; the posts stay.
    pub async fn delete(&self, id: i64) -> Result<(), TagServiceError> {
        self.get(id).await?;
        self.repo.delete(id).await?;
        let _ = self.cache.delete_pattern("posts:*").await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PostStatus;
    use crate::services::test_support::{seed_post, Fixture};

    #[tokio::test]
    async fn test_crud() {
        let fx = Fixture::new().await;

        let tag = fx.tags.create(&TagInput::new(" economy ")).await.unwrap();
        assert_eq!(tag.name, "economy");

        let renamed = fx.tags.update(tag.id, &TagInput::new("markets")).await.unwrap();
        assert_eq!(renamed.name, "markets");

        let names: Vec<String> = fx.tags.list().await.unwrap().into_iter().map(|t| t.name).collect();
        assert!(names.contains(&"markets".to_string()));

        fx.tags.delete(tag.id).await.unwrap();
        assert!(matches!(
            fx.tags.get(tag.id).await,
            Err(TagServiceError::NotFound(_))
        ));
        assert!(matches!(
            fx.tags.delete(tag.id).await,
            Err(TagServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_empty_name() {
        let fx = Fixture::new().await;
        assert!(matches!(
            fx.tags.create(&TagInput::new("")).await,
            Err(TagServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_keeps_posts() {
        let fx = Fixture::new().await;
        let post_id = seed_post(&fx, "Tagged", 1, PostStatus::Active).await;
        let mut input = fx.input_for("Tagged");
        input.tag_ids = vec![fx.tag_id];
        fx.posts.update(post_id, input).await.unwrap();

        fx.tags.delete(fx.tag_id).await.unwrap();
        let card = fx.posts.get(post_id).await.unwrap();
        assert!(card.tags.is_empty());
    }
}
