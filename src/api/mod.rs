//! HTTP layer - handlers and routing
//!
//! - Public site pages (server-rendered with the active theme)
//! - Contact form and newsletter signup
//! - Staff JSON API under `/api` (auth, posts, categories, tags, inbox, uploads)
//! - Uploaded media under `/media`

pub mod admin_inbox;
pub mod admin_posts;
pub mod admin_taxonomy;
pub mod auth;
pub mod common;
pub mod forms;
pub mod middleware;
pub mod site;
pub mod upload;

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, services::ServeDir, trace::TraceLayer,
};

pub use middleware::{ApiError, AppState, AuthenticatedUser, PageError};

/// Multipart framing on top of the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Build the `/api` router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    let body_limit = state.upload_config.max_file_size as usize + MULTIPART_OVERHEAD;

    // Staff only
    let admin_routes = Router::new()
        .merge(admin_posts::router())
        .merge(admin_taxonomy::router())
        .merge(admin_inbox::router())
        .merge(upload::router().layer(DefaultBodyLimit::max(body_limit)));

    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .nest("/admin", admin_routes)
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::require_staff,
        ));

    Router::new()
        .nest("/auth", auth::public_router())
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> anyhow::Result<Router> {
    let origin = cors_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("Invalid CORS origin: {}", cors_origin))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);

    let media = ServeDir::new(&state.upload_config.path);

    Ok(Router::new()
        .merge(site::router())
        .merge(forms::router())
        .nest("/api", build_api_router(state.clone()).layer(cors))
        .nest_service("/media", media)
        .fallback(site::not_found)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::render_error_pages,
        ))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}
