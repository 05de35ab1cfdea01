//! Admin inbox: contact messages and newsletter subscribers

use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};

use crate::api::common::{AdminPaginationQuery, ApiPath, ApiQuery};
use crate::api::middleware::{ApiError, AppState};
use crate::models::{Contact, Newsletter, Page};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/contacts", get(list_contacts))
        .route("/contacts/{id}", get(get_contact).delete(delete_contact))
        .route("/newsletters", get(list_newsletters))
        .route("/newsletters/{id}", delete(delete_newsletter))
}

/// Newest first
async fn list_contacts(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<AdminPaginationQuery>,
) -> Result<Json<Page<Contact>>, ApiError> {
    let page = state
        .contact_service
        .list(query.page, query.page_size())
        .await?;
    Ok(Json(page))
}

async fn get_contact(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Contact>, ApiError> {
    Ok(Json(state.contact_service.get(id).await?))
}

async fn delete_contact(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    state.contact_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_newsletters(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<AdminPaginationQuery>,
) -> Result<Json<Page<Newsletter>>, ApiError> {
    let page = state
        .newsletter_service
        .list(query.page, query.page_size())
        .await?;
    Ok(Json(page))
}

async fn delete_newsletter(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    state.newsletter_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
