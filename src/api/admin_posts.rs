//! Admin post endpoints
//!
//! - GET /api/admin/posts - Every post, any status, newest first
//! - POST /api/admin/posts - Create a post authored by the caller
//! - GET/PUT/DELETE /api/admin/posts/{id}

use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};

use crate::api::common::{AdminPaginationQuery, ApiJson, ApiPath, ApiQuery};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{Page, PostCard, PostInput};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route(
            "/posts/{id}",
            get(get_post).put(update_post).delete(delete_post),
        )
}

async fn list_posts(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<AdminPaginationQuery>,
) -> Result<Json<Page<PostCard>>, ApiError> {
    let page = state
        .post_service
        .list_admin(query.page, i64::from(query.page_size()))
        .await?;
    Ok(Json(page))
}

async fn create_post(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(input): ApiJson<PostInput>,
) -> Result<(StatusCode, Json<PostCard>), ApiError> {
    let post = state.post_service.create(user.0.id, input).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

async fn get_post(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<PostCard>, ApiError> {
    Ok(Json(state.post_service.get(id).await?))
}

async fn update_post(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<PostInput>,
) -> Result<Json<PostCard>, ApiError> {
    Ok(Json(state.post_service.update(id, input).await?))
}

async fn delete_post(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    state.post_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
