//! Public site pages
//!
//! Server-rendered pages of the news site. Unknown ids and unusable page
//! numbers end up as `PageError::NotFound`, which is rendered with
//! `404.html`.

use axum::{
    extract::{Path, Query, State},
    response::Html,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{AppState, PageError};
use crate::models::{Page, PostCard};

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
    pub page: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/post/{id}", get(detail))
        .route("/posts", get(list))
        .route("/category/{id}", get(category))
        .route("/tag/{id}", get(tag))
        .route("/about", get(about))
        .route("/search", get(search))
        .route("/health", get(health))
}

/// Path ids that are not integers match no page
fn parse_id(raw: &str) -> Result<i64, PageError> {
    raw.parse()
        .map_err(|_| PageError::NotFound(format!("No page matches '{}'", raw)))
}

/// GET /
async fn home(State(state): State<AppState>) -> Result<Html<String>, PageError> {
    let sections = state.post_service.home().await?;

    let mut context = state.base_context().await?;
    context.insert("posts", &sections.posts);
    context.insert("featured_post", &sections.featured_post);
    context.insert("featured_posts", &sections.featured_posts);
    context.insert("weekly_top_posts", &sections.weekly_top_posts);
    state.render("home.html", &context)
}

/// GET /post/{id}
///
/// Only active, published posts are reachable by id; drafts and inactive
/// posts get the 404 page even to staff. Each successful render counts as
/// one view, so `views_count` drives the "popular" sections.
async fn detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Html<String>, PageError> {
    let detail = state.post_service.detail(parse_id(&id)?).await?;

    let mut context = state.base_context().await?;
    context.insert("post", &detail.post);
    context.insert("previous_post", &detail.previous_post);
    context.insert("next_post", &detail.next_post);
    context.insert("recent_posts", &detail.recent_posts);
    state.render("detail.html", &context)
}

/// GET /posts
async fn list(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, PageError> {
    let page = state.post_service.list(query.page.as_deref()).await?;
    render_list(&state, page, "/posts?", |_| {}).await
}

/// GET /category/{id}
async fn category(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, PageError> {
    let id = parse_id(&id)?;
    let (category, page) = state
        .post_service
        .list_by_category(id, query.page.as_deref())
        .await?;
    let base = format!("/category/{}?", id);
    render_list(&state, page, &base, |context| {
        context.insert("category", &category)
    })
    .await
}

/// GET /tag/{id}
async fn tag(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, PageError> {
    let id = parse_id(&id)?;
    let (tag, page) = state
        .post_service
        .list_by_tag(id, query.page.as_deref())
        .await?;
    let base = format!("/tag/{}?", id);
    render_list(&state, page, &base, |context| context.insert("tag", &tag)).await
}

async fn render_list(
    state: &AppState,
    page: Page<PostCard>,
    page_base: &str,
    extra: impl FnOnce(&mut tera::Context),
) -> Result<Html<String>, PageError> {
    let mut context = state.base_context().await?;
    context.insert("posts", &page.items);
    context.insert("page_obj", &page);
    context.insert("page_base", page_base);
    extra(&mut context);
    state.render("list.html", &context)
}

/// GET /about
async fn about(State(state): State<AppState>) -> Result<Html<String>, PageError> {
    let posts = state.post_service.about_posts().await?;

    let mut context = state.base_context().await?;
    context.insert("posts", &posts);
    state.render("about.html", &context)
}

/// GET /search
///
/// A missing query searches for the empty string, i.e. lists everything.
/// Bad page numbers fall back to the first or last page.
async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Html<String>, PageError> {
    let term = query.query.unwrap_or_default();
    let page = state
        .post_service
        .search(term.trim(), query.page.as_deref())
        .await?;

    let mut context = state.base_context().await?;
    context.insert("page_obj", &page);
    context.insert("query", &term);
    state.render("search_list.html", &context)
}

/// GET /health
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Fallback for every unmatched path
pub async fn not_found() -> PageError {
    PageError::NotFound("The page you were looking for does not exist.".to_string())
}
