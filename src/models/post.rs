//! Post model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use super::{Category, Tag};

/// A news article
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,
    /// Media-relative path, e.g. `post_images/2024/05/01/<uuid>.jpg`
    pub featured_image: String,
    pub author_id: i64,
    pub category_id: i64,
    pub status: PostStatus,
    /// Unset means the post is a draft, whatever its status
    pub published_at: Option<DateTime<Utc>>,
    pub views_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// Active and published: the predicate every public view applies
    pub fn is_visible(&self) -> bool {
        self.status == PostStatus::Active && self.published_at.is_some()
    }
}

/// Post status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PostStatus {
    #[default]
    #[serde(rename = "active")]
    Active,
    #[serde(rename = "in_active")]
    InActive,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Active => "active",
            PostStatus::InActive => "in_active",
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(PostStatus::Active),
            "in_active" => Ok(PostStatus::InActive),
            _ => Err(anyhow::anyhow!("Invalid post status: {}", s)),
        }
    }
}

/// Admin input for creating or replacing a post
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PostInput {
    #[validate(length(min = 1, max = 250, message = "Title must be 1-250 characters"))]
    pub title: String,
    #[validate(length(min = 1, message = "Content is required"))]
    pub content: String,
    #[validate(length(min = 1, max = 255, message = "Featured image is required"))]
    pub featured_image: String,
    pub category_id: i64,
    #[serde(default)]
    pub tag_ids: Vec<i64>,
    #[serde(default)]
    pub status: PostStatus,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

/// Public author details shown next to a post
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Author {
    pub id: i64,
    pub username: String,
}

/// A post together with everything a template shows around it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostCard {
    #[serde(flatten)]
    pub post: Post,
    pub category: Option<Category>,
    pub author: Option<Author>,
    pub tags: Vec<Tag>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> PostInput {
        PostInput {
            title: "Election results".to_string(),
            content: "Counting continues.".to_string(),
            featured_image: "post_images/2024/05/01/a.jpg".to_string(),
            category_id: 1,
            tag_ids: vec![],
            status: PostStatus::Active,
            published_at: None,
        }
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&PostStatus::InActive).unwrap(),
            "\"in_active\""
        );
        assert_eq!("active".parse::<PostStatus>().unwrap(), PostStatus::Active);
        assert!("inactive".parse::<PostStatus>().is_err());
    }

    #[test]
    fn test_input_defaults_to_active() {
        let parsed: PostInput = serde_json::from_str(
            r#"{"title":"t","content":"c","featured_image":"x.jpg","category_id":3}"#,
        )
        .unwrap();
        assert_eq!(parsed.status, PostStatus::Active);
        assert!(parsed.tag_ids.is_empty());
        assert!(parsed.published_at.is_none());
    }

    #[test]
    fn test_input_validation() {
        assert!(input().validate().is_ok());

        let mut long_title = input();
        long_title.title = "x".repeat(251);
        assert!(long_title.validate().is_err());

        let mut no_image = input();
        no_image.featured_image.clear();
        let errors = no_image.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("featured_image"));
    }
}
