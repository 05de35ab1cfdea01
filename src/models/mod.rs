//! Data models
//!
//! Database entities, admin/form input types and the pagination helpers
//! shared by the public listings and the admin API.

mod category;
mod contact;
mod newsletter;
mod pagination;
mod post;
mod session;
mod tag;
mod user;

pub use category::{Category, CategoryInput};
pub use contact::{Contact, ContactForm};
pub use newsletter::{Newsletter, NewsletterForm};
pub use pagination::{InvalidPage, Page, Paginator};
pub use post::{Author, Post, PostCard, PostInput, PostStatus};
pub use session::Session;
pub use tag::{Tag, TagInput};
pub use user::{CreateUserInput, User};

use std::collections::BTreeMap;

/// Field name to human readable messages, as rendered next to form inputs
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Flatten `validator` errors into `FieldErrors`
pub fn field_errors(errors: &validator::ValidationErrors) -> FieldErrors {
    errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let messages = errs
                .iter()
                .map(|e| match &e.message {
                    Some(message) => message.to_string(),
                    None => format!("Invalid value ({})", e.code),
                })
                .collect();
            (field.to_string(), messages)
        })
        .collect()
}
