//! Contact service
//!
//! Stores messages sent through the contact page and serves them to the
//! admin inbox.

use crate::db::repositories::ContactRepository;
use crate::models::{field_errors, Contact, ContactForm, FieldErrors, Page, Paginator};
use std::sync::Arc;
use validator::Validate;

#[derive(Debug, thiserror::Error)]
pub enum ContactServiceError {
    #[error("Contact message not found: {0}")]
    NotFound(i64),

    #[error("Validation error: {0:?}")]
    ValidationError(FieldErrors),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct ContactService {
    repo: Arc<dyn ContactRepository>,
}

impl ContactService {
    pub fn new(repo: Arc<dyn ContactRepository>) -> Self {
        Self { repo }
    }

    pub async fn submit(&self, form: &ContactForm) -> Result<Contact, ContactServiceError> {
        let form = form.normalized();
        form.validate()
            .map_err(|e| ContactServiceError::ValidationError(field_errors(&e)))?;

        let contact = self.repo.create(&form).await?;
        tracing::info!(contact_id = contact.id, "Contact message received");
        Ok(contact)
    }

    pub async fn list(&self, page: i64, per_page: u32) -> Result<Page<Contact>, ContactServiceError> {
        let paginator = Paginator::new(self.repo.count().await?, per_page);
        let number = page.clamp(1, paginator.num_pages());
        let items = self
            .repo
            .list(paginator.offset(number), paginator.per_page())
            .await?;
        Ok(paginator.page(number, items))
    }

    pub async fn get(&self, id: i64) -> Result<Contact, ContactServiceError> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or(ContactServiceError::NotFound(id))
    }

    pub async fn delete(&self, id: i64) -> Result<(), ContactServiceError> {
        if self.repo.delete(id).await? {
            Ok(())
        } else {
            Err(ContactServiceError::NotFound(id))
        }
    }
}
