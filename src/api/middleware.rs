//! API middleware and shared HTTP plumbing
//!
//! Contains:
//! - `AppState`, the services shared by every handler
//! - `ApiError`, the JSON error body of the admin API
//! - `PageError`, the HTML error path of the public site
//! - Session authentication for staff routes

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tera::Context as TeraContext;

use crate::cache::create_cache;
use crate::config::{Config, SiteConfig, UploadConfig};
use crate::db::repositories::{
    SqlxCategoryRepository, SqlxContactRepository, SqlxNewsletterRepository, SqlxPostRepository,
    SqlxSessionRepository, SqlxTagRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::User;
use crate::services::{
    CategoryService, CategoryServiceError, ContactService, ContactServiceError, LoginRateLimiter,
    NewsletterService, NewsletterServiceError, PostService, PostServiceError, TagService,
    TagServiceError, UserService, UserServiceError,
};
use crate::theme::ThemeEngine;

/// Name of the cookie carrying the session token
pub const SESSION_COOKIE: &str = "session";

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub post_service: Arc<PostService>,
    pub category_service: Arc<CategoryService>,
    pub tag_service: Arc<TagService>,
    pub contact_service: Arc<ContactService>,
    pub newsletter_service: Arc<NewsletterService>,
    pub user_service: Arc<UserService>,
    pub rate_limiter: Arc<LoginRateLimiter>,
    pub theme_engine: Arc<ThemeEngine>,
    pub site: Arc<SiteConfig>,
    pub upload_config: Arc<UploadConfig>,
}

impl AppState {
    /// Wire repositories, services and the theme over an open pool
    pub fn new(config: &Config, pool: DynDatabasePool) -> anyhow::Result<Self> {
        let cache = create_cache(&config.cache);

        let post_repo = SqlxPostRepository::boxed(pool.clone());
        let category_repo = SqlxCategoryRepository::boxed(pool.clone());
        let tag_repo = SqlxTagRepository::boxed(pool.clone());
        let user_repo = SqlxUserRepository::boxed(pool.clone());

        let post_service = PostService::new(
            post_repo,
            category_repo.clone(),
            tag_repo.clone(),
            user_repo.clone(),
            cache.clone(),
            config.site.posts_per_page,
        );
        let user_service = UserService::new(
            user_repo,
            SqlxSessionRepository::boxed(pool.clone()),
            config.site.session_ttl_hours,
        );
        let theme_engine = ThemeEngine::new(&config.theme.path, &config.theme.active)?;

        Ok(Self {
            post_service: Arc::new(post_service),
            category_service: Arc::new(CategoryService::new(category_repo, cache.clone())),
            tag_service: Arc::new(TagService::new(tag_repo, cache)),
            contact_service: Arc::new(ContactService::new(SqlxContactRepository::boxed(
                pool.clone(),
            ))),
            newsletter_service: Arc::new(NewsletterService::new(
                SqlxNewsletterRepository::boxed(pool),
            )),
            user_service: Arc::new(user_service),
            rate_limiter: Arc::new(LoginRateLimiter::new()),
            theme_engine: Arc::new(theme_engine),
            site: Arc::new(config.site.clone()),
            upload_config: Arc::new(config.upload.clone()),
        })
    }

    /// Context every page template receives: site info plus the
    /// category and tag lists for the navigation
    pub async fn base_context(&self) -> Result<TeraContext, PageError> {
        let categories = self
            .category_service
            .list()
            .await
            .map_err(|e| PageError::Internal(e.into()))?;
        let tags = self
            .tag_service
            .list()
            .await
            .map_err(|e| PageError::Internal(e.into()))?;

        let mut context = TeraContext::new();
        context.insert("site", self.site.as_ref());
        context.insert("categories", &categories);
        context.insert("tags", &tags);
        Ok(context)
    }

    pub fn render(&self, template: &str, context: &TeraContext) -> Result<Html<String>, PageError> {
        self.theme_engine
            .render(template, context)
            .map(Html)
            .map_err(PageError::Internal)
    }
}

// ============================================================================
// JSON errors
// ============================================================================

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn rate_limited(message: impl Into<String>, retry_after: u64) -> Self {
        Self::with_details(
            "RATE_LIMITED",
            message,
            serde_json::json!({ "retry_after": retry_after }),
        )
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    /// Log the cause and hide it from the client
    pub fn internal(err: anyhow::Error) -> Self {
        tracing::error!("Request failed: {:#}", err);
        Self::internal_error("Internal server error")
    }

    fn invalid_fields(details: impl Serialize) -> Self {
        Self::with_details(
            "VALIDATION_ERROR",
            "Invalid input",
            serde_json::to_value(details).unwrap_or_default(),
        )
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "RATE_LIMITED" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<PostServiceError> for ApiError {
    fn from(err: PostServiceError) -> Self {
        match err {
            PostServiceError::NotFound(what) => Self::not_found(format!("Not found: {}", what)),
            PostServiceError::ValidationError(fields) => Self::invalid_fields(fields),
            PostServiceError::InternalError(e) => Self::internal(e),
        }
    }
}

impl From<CategoryServiceError> for ApiError {
    fn from(err: CategoryServiceError) -> Self {
        match err {
            CategoryServiceError::NotFound(_) => Self::not_found(err.to_string()),
            CategoryServiceError::ValidationError(fields) => Self::invalid_fields(fields),
            CategoryServiceError::InternalError(e) => Self::internal(e),
        }
    }
}

impl From<TagServiceError> for ApiError {
    fn from(err: TagServiceError) -> Self {
        match err {
            TagServiceError::NotFound(_) => Self::not_found(err.to_string()),
            TagServiceError::ValidationError(fields) => Self::invalid_fields(fields),
            TagServiceError::InternalError(e) => Self::internal(e),
        }
    }
}

impl From<ContactServiceError> for ApiError {
    fn from(err: ContactServiceError) -> Self {
        match err {
            ContactServiceError::NotFound(_) => Self::not_found(err.to_string()),
            ContactServiceError::ValidationError(fields) => Self::invalid_fields(fields),
            ContactServiceError::InternalError(e) => Self::internal(e),
        }
    }
}

impl From<NewsletterServiceError> for ApiError {
    fn from(err: NewsletterServiceError) -> Self {
        match err {
            NewsletterServiceError::NotFound(_) => Self::not_found(err.to_string()),
            NewsletterServiceError::ValidationError(fields) => Self::invalid_fields(fields),
            NewsletterServiceError::InternalError(e) => Self::internal(e),
        }
    }
}

impl From<UserServiceError> for ApiError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::InvalidCredentials => Self::unauthorized(err.to_string()),
            UserServiceError::Forbidden => Self::forbidden(err.to_string()),
            UserServiceError::NotFound(_) => Self::not_found(err.to_string()),
            UserServiceError::InternalError(e) => Self::internal(e),
        }
    }
}

// ============================================================================
// HTML errors
// ============================================================================

/// Marker left on a 404 response so `render_error_pages` can fill in the page
#[derive(Debug, Clone)]
struct NotFoundPage(String);

/// Error returned by the public page handlers
#[derive(Debug)]
pub enum PageError {
    NotFound(String),
    Internal(anyhow::Error),
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        match self {
            PageError::NotFound(message) => {
                let mut response = StatusCode::NOT_FOUND.into_response();
                response.extensions_mut().insert(NotFoundPage(message));
                response
            }
            PageError::Internal(err) => {
                tracing::error!("Page failed: {:#}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Html("<h1>Server Error (500)</h1>"),
                )
                    .into_response()
            }
        }
    }
}

impl From<PostServiceError> for PageError {
    fn from(err: PostServiceError) -> Self {
        match err {
            PostServiceError::NotFound(_) => PageError::NotFound(err.to_string()),
            PostServiceError::ValidationError(fields) => {
                PageError::Internal(anyhow::anyhow!("Unexpected validation error: {:?}", fields))
            }
            PostServiceError::InternalError(e) => PageError::Internal(e),
        }
    }
}

impl From<anyhow::Error> for PageError {
    fn from(err: anyhow::Error) -> Self {
        PageError::Internal(err)
    }
}

/// Render 404.html into responses produced by `PageError::NotFound`
pub async fn render_error_pages(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    let Some(NotFoundPage(message)) = response.extensions().get::<NotFoundPage>().cloned() else {
        return response;
    };

    let page = async {
        let mut context = state.base_context().await?;
        context.insert("message", &message);
        state.render("404.html", &context)
    };
    match page.await {
        Ok(html) => (StatusCode::NOT_FOUND, html).into_response(),
        Err(err) => {
            if let PageError::Internal(e) = err {
                tracing::error!("Failed to render 404 page: {:#}", e);
            }
            (StatusCode::NOT_FOUND, Html("<h1>Not Found</h1>")).into_response()
        }
    }
}

// ============================================================================
// Authentication
// ============================================================================

/// Authenticated staff user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

/// Session token from the `Authorization: Bearer` header or the session cookie
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
    {
        return Some(token.to_string());
    }

    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|cookie| {
        cookie
            .trim()
            .strip_prefix(SESSION_COOKIE)
            .and_then(|rest| rest.strip_prefix('='))
            .filter(|token| !token.is_empty())
            .map(str::to_string)
    })
}

/// Only staff with a live session pass
pub async fn require_staff(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_session_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    let user = state
        .user_service
        .validate_session(&token)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))?;

    if !user.is_staff {
        return Err(ApiError::forbidden("Staff access required"));
    }

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(name: header::HeaderName, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_extract_session_token_from_cookie() {
        let headers = headers(header::COOKIE, "theme=dark; session=abc-123; other=1");
        assert_eq!(extract_session_token(&headers), Some("abc-123".to_string()));
    }

    #[test]
    fn test_extract_session_token_from_bearer() {
        let headers = headers(header::AUTHORIZATION, "Bearer tok-9");
        assert_eq!(extract_session_token(&headers), Some("tok-9".to_string()));
    }

    #[test]
    fn test_extract_session_token_ignores_lookalikes() {
        let headers = headers(header::COOKIE, "sessionid=abc; session=");
        assert!(extract_session_token(&headers).is_none());
        assert!(extract_session_token(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_api_error_status_codes() {
        assert_eq!(ApiError::unauthorized("x").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::forbidden("x").status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::validation_error("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::rate_limited("x", 60).status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            ApiError::internal_error("x").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_validation_error_carries_fields() {
        let mut fields = crate::models::FieldErrors::new();
        fields.insert("title".to_string(), vec!["Title is required".to_string()]);

        let error: ApiError = PostServiceError::ValidationError(fields).into();
        assert_eq!(error.error.code, "VALIDATION_ERROR");
        assert_eq!(
            error.error.details.unwrap()["title"][0],
            "Title is required"
        );
    }

    #[test]
    fn test_login_errors_map_to_auth_codes() {
        let error: ApiError = UserServiceError::InvalidCredentials.into();
        assert_eq!(error.status(), StatusCode::UNAUTHORIZED);
        let error: ApiError = UserServiceError::Forbidden.into();
        assert_eq!(error.status(), StatusCode::FORBIDDEN);
    }
}
