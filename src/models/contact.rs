//! Contact message model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// A message sent through the contact page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: i64,
    pub subject: String,
    pub message: String,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields posted by the contact form
///
/// Missing fields deserialize as empty strings so the form can be
/// re-rendered with per-field errors instead of being rejected outright.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ContactForm {
    #[serde(default)]
    #[validate(length(min = 1, max = 200, message = "Subject must be 1-200 characters"))]
    pub subject: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Message is required"))]
    pub message: String,
    #[serde(default)]
    #[validate(length(min = 1, max = 50, message = "Name must be 1-50 characters"))]
    pub name: String,
    #[serde(default)]
    #[validate(
        email(message = "Enter a valid email address"),
        length(max = 254, message = "Email must be at most 254 characters")
    )]
    pub email: String,
}

impl ContactForm {
    pub fn normalized(&self) -> Self {
        Self {
            subject: self.subject.trim().to_string(),
            message: self.message.trim().to_string(),
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_form_validation() {
        let form = ContactForm {
            subject: "Tip".to_string(),
            message: "There is a story here".to_string(),
            name: "Ann".to_string(),
            email: "ann@example.com".to_string(),
        };
        assert!(form.validate().is_ok());

        let errors = ContactForm::default().validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("subject"));
        assert!(fields.contains_key("message"));
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("email"));
    }

    #[test]
    fn test_normalized_trims_whitespace() {
        let form = ContactForm {
            subject: "  Hi ".to_string(),
            message: "\n".to_string(),
            name: " Bo".to_string(),
            email: " bo@example.com ".to_string(),
        }
        .normalized();
        assert_eq!(form.subject, "Hi");
        assert_eq!(form.email, "bo@example.com");
        assert!(form.validate().unwrap_err().field_errors().contains_key("message"));
    }
}
