//! Database repositories
//!
//! One repository per entity, each a trait plus an SQLx implementation
//! that dispatches on the configured driver.

pub mod category;
pub mod contact;
pub mod newsletter;
pub mod post;
pub mod session;
pub mod tag;
pub mod user;

pub use category::{CategoryRepository, SqlxCategoryRepository};
pub use contact::{ContactRepository, SqlxContactRepository};
pub use newsletter::{NewsletterRepository, SqlxNewsletterRepository};
pub use post::{
    Direction, PostFilter, PostOrder, PostQuery, PostRepository, SqlxPostRepository, Visibility,
};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use tag::{SqlxTagRepository, TagRepository};
pub use user::{SqlxUserRepository, UserRepository};
