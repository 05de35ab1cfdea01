//! Category service
//!
//! Category CRUD for the admin API and the category list shown in the
//! navigation of every page. Deleting a category deletes its posts.

use crate::cache::{CacheLayer, MemoryCache};
use crate::db::repositories::CategoryRepository;
use crate::models::{field_errors, Category, CategoryInput, FieldErrors};
use std::sync::Arc;
use validator::Validate;

#[derive(Debug, thiserror::Error)]
pub enum CategoryServiceError {
    #[error("Category not found: {0}")]
    NotFound(i64),

    #[error("Validation error: {0:?}")]
    ValidationError(FieldErrors),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct CategoryService {
    repo: Arc<dyn CategoryRepository>,
    cache: Arc<MemoryCache>,
}

impl CategoryService {
    pub fn new(repo: Arc<dyn CategoryRepository>, cache: Arc<MemoryCache>) -> Self {
        Self { repo, cache }
    }

    pub async fn list(&self) -> Result<Vec<Category>, CategoryServiceError> {
        Ok(self.repo.list().await?)
    }

    pub async fn get(&self, id: i64) -> Result<Category, CategoryServiceError> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or(CategoryServiceError::NotFound(id))
    }

    pub async fn create(&self, input: &CategoryInput) -> Result<Category, CategoryServiceError> {
        let input = validated(input)?;
        let category = self.repo.create(&input).await?;
        tracing::info!(category_id = category.id, name = %category.name, "Category created");
        Ok(category)
    }

    pub async fn update(
        &self,
        id: i64,
        input: &CategoryInput,
    ) -> Result<Category, CategoryServiceError> {
        self.get(id).await?;
        let input = validated(input)?;
        let category = self.repo.update(id, &input).await?;
        self.invalidate_posts().await;
        Ok(category)
    }

    pub async fn delete(&self, id: i64) -> Result<(), CategoryServiceError> {
        self.get(id).await?;
        let posts = self.repo.count_posts(id).await?;
        self.repo.delete(id).await?;
        self.invalidate_posts().await;

        tracing::info!(category_id = id, removed_posts = posts, "Category deleted");
        Ok(())
    }

    /// Post cards embed their category
    async fn invalidate_posts(&self) {
        let _ = self.cache.delete_pattern("posts:*").await;
    }
}

fn validated(input: &CategoryInput) -> Result<CategoryInput, CategoryServiceError> {
    let input = input.normalized();
    input
        .validate()
        .map_err(|e| CategoryServiceError::ValidationError(field_errors(&e)))?;
    Ok(input)
}
