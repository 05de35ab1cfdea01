//! Newsletter service

use crate::db::repositories::NewsletterRepository;
use crate::models::{field_errors, FieldErrors, Newsletter, NewsletterForm, Page, Paginator};
use std::sync::Arc;
use validator::Validate;

#[derive(Debug, thiserror::Error)]
pub enum NewsletterServiceError {
    #[error("Subscriber not found: {0}")]
    NotFound(i64),

    #[error("Validation error: {0:?}")]
    ValidationError(FieldErrors),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct NewsletterService {
    repo: Arc<dyn NewsletterRepository>,
}

impl NewsletterService {
    pub fn new(repo: Arc<dyn NewsletterRepository>) -> Self {
        Self { repo }
    }

    /// Subscribe an address. Subscribing twice returns the existing row.
    pub async fn subscribe(
        &self,
        form: &NewsletterForm,
    ) -> Result<Newsletter, NewsletterServiceError> {
        let form = NewsletterForm {
            email: normalize_email(&form.email),
        };
        form.validate()
            .map_err(|e| NewsletterServiceError::ValidationError(field_errors(&e)))?;

        if let Some(existing) = self.repo.find_by_email(&form.email).await? {
            return Ok(existing);
        }

        match self.repo.create(&form.email).await {
            Ok(subscriber) => {
                tracing::info!(subscriber_id = subscriber.id, "Newsletter subscription added");
                Ok(subscriber)
            }
            // Lost a race against a concurrent subscribe of the same address
            Err(err) => match self.repo.find_by_email(&form.email).await? {
                Some(existing) => Ok(existing),
                None => Err(err.into()),
            },
        }
    }

    pub async fn list(
        &self,
        page: i64,
        per_page: u32,
    ) -> Result<Page<Newsletter>, NewsletterServiceError> {
        let paginator = Paginator::new(self.repo.count().await?, per_page);
        let number = page.clamp(1, paginator.num_pages());
        let items = self
            .repo
            .list(paginator.offset(number), paginator.per_page())
            .await?;
        Ok(paginator.page(number, items))
    }

    pub async fn delete(&self, id: i64) -> Result<(), NewsletterServiceError> {
        if self.repo.delete(id).await? {
            Ok(())
        } else {
            Err(NewsletterServiceError::NotFound(id))
        }
    }
}

/// Trim and lowercase the domain part, leaving the local part as typed
fn normalize_email(email: &str) -> String {
    let email = email.trim();
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{}@{}", local, domain.to_lowercase()),
        None => email.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::Fixture;

    fn form(email: &str) -> NewsletterForm {
        NewsletterForm {
            email: email.to_string(),
        }
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Ann@Example.COM "), "Ann@example.com");
        assert_eq!(normalize_email("no-at-sign"), "no-at-sign");
    }

    #[tokio::test]
    async fn test_subscribe_is_idempotent() {
        let fx = Fixture::new().await;
        let first = fx.newsletters.subscribe(&form("reader@example.com")).await.unwrap();
        let again = fx
            .newsletters
            .subscribe(&form(" reader@EXAMPLE.com"))
            .await
            .unwrap();
        assert_eq!(first.id, again.id);
        assert_eq!(fx.newsletters.list(1, 10).await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_subscribe_rejects_bad_email() {
        let fx = Fixture::new().await;
        for bad in ["", "nope", "a@"] {
            assert!(matches!(
                fx.newsletters.subscribe(&form(bad)).await,
                Err(NewsletterServiceError::ValidationError(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_delete() {
        let fx = Fixture::new().await;
        let sub = fx.newsletters.subscribe(&form("x@example.com")).await.unwrap();
        fx.newsletters.delete(sub.id).await.unwrap();
        assert!(matches!(
            fx.newsletters.delete(sub.id).await,
            Err(NewsletterServiceError::NotFound(_))
        ));
    }
}
