//! Contact page and newsletter signup

use axum::{
    extract::{rejection::FormRejection, State},
    http::HeaderMap,
    response::Html,
    routing::{get, post},
    Form, Json, Router,
};
use serde::Serialize;

use crate::api::middleware::{AppState, PageError};
use crate::models::{ContactForm, FieldErrors, NewsletterForm};
use crate::services::{ContactServiceError, NewsletterServiceError};

pub const CONTACT_SUCCESS: &str = "Successfully submitted your query. We will contact you soon.";
pub const CONTACT_FAILURE: &str = "Cannot submit your query. Something went wrong.";
pub const NEWSLETTER_SUCCESS: &str = "Successfully submitted to our newsletter.";
pub const NEWSLETTER_FAILURE: &str = "Something went wrong.";
pub const NEWSLETTER_NOT_AJAX: &str = "Cannot process. Must be an ajax request.";

/// One-shot notice shown above the contact form
#[derive(Debug, Serialize)]
struct FlashMessage {
    level: &'static str,
    message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct NewsletterResponse {
    pub success: bool,
    pub message: &'static str,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/contact", get(contact_page).post(contact_submit))
        .route("/newsletter", post(newsletter_subscribe))
}

/// GET /contact
async fn contact_page(State(state): State<AppState>) -> Result<Html<String>, PageError> {
    render_contact(&state, &ContactForm::default(), None, &FieldErrors::new()).await
}

/// POST /contact
///
/// Always answers with the contact page: the submitted values are echoed
/// back together with a success or error notice.
async fn contact_submit(
    State(state): State<AppState>,
    Form(form): Form<ContactForm>,
) -> Result<Html<String>, PageError> {
    match state.contact_service.submit(&form).await {
        Ok(_) => {
            let notice = FlashMessage {
                level: "success",
                message: CONTACT_SUCCESS,
            };
            render_contact(&state, &form, Some(notice), &FieldErrors::new()).await
        }
        Err(ContactServiceError::ValidationError(errors)) => {
            let notice = FlashMessage {
                level: "error",
                message: CONTACT_FAILURE,
            };
            render_contact(&state, &form, Some(notice), &errors).await
        }
        Err(err) => Err(PageError::Internal(err.into())),
    }
}

async fn render_contact(
    state: &AppState,
    form: &ContactForm,
    notice: Option<FlashMessage>,
    errors: &FieldErrors,
) -> Result<Html<String>, PageError> {
    let messages: Vec<FlashMessage> = notice.into_iter().collect();

    let mut context = state.base_context().await?;
    context.insert("form", form);
    context.insert("messages", &messages);
    context.insert("errors", errors);
    state.render("contact.html", &context)
}

fn is_ajax(headers: &HeaderMap) -> bool {
    headers
        .get("x-requested-with")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == "XMLHttpRequest")
}

/// POST /newsletter
///
/// AJAX only. The outcome is reported in the body; the status is always 200.
async fn newsletter_subscribe(
    State(state): State<AppState>,
    headers: HeaderMap,
    form: Result<Form<NewsletterForm>, FormRejection>,
) -> Json<NewsletterResponse> {
    if !is_ajax(&headers) {
        return Json(NewsletterResponse {
            success: false,
            message: NEWSLETTER_NOT_AJAX,
        });
    }

    let Ok(Form(form)) = form else {
        return Json(NewsletterResponse {
            success: false,
            message: NEWSLETTER_FAILURE,
        });
    };

    let success = match state.newsletter_service.subscribe(&form).await {
        Ok(_) => true,
        Err(NewsletterServiceError::ValidationError(_)) => false,
        Err(err) => {
            tracing::error!("Newsletter signup failed: {}", err);
            false
        }
    };

    Json(NewsletterResponse {
        success,
        message: if success {
            NEWSLETTER_SUCCESS
        } else {
            NEWSLETTER_FAILURE
        },
    })
}
