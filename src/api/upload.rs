//! Featured image uploads
//!
//! POST /api/admin/uploads accepts multipart/form-data with a single file
//! field named "file". Images are stored under the media root as
//! `post_images/YYYY/MM/DD/<uuid>.<ext>`; the returned `path` is what a
//! post's `featured_image` holds.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use tokio::fs;
use uuid::Uuid;

use crate::api::middleware::{ApiError, AppState};

/// Response for successful upload
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    /// Relative to the media root
    pub path: String,
    pub url: String,
    pub size: u64,
    pub content_type: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/uploads", post(upload_image))
}

async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let config = &state.upload_config;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation_error(format!("Failed to read multipart: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        if !config.is_type_allowed(&content_type) {
            return Err(ApiError::validation_error(format!(
                "Invalid file type: {}. Allowed types: {}",
                content_type,
                config.allowed_types.join(", ")
            )));
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::validation_error(format!("Failed to read file: {}", e)))?;

        if data.is_empty() {
            return Err(ApiError::validation_error("The submitted file is empty"));
        }
        if data.len() as u64 > config.max_file_size {
            return Err(ApiError::validation_error(format!(
                "File too large. Maximum size: {} bytes ({} MB)",
                config.max_file_size,
                config.max_file_size / 1024 / 1024
            )));
        }

        let relative = image_path(Utc::now(), config.extension_for(&content_type));
        let target = config.path.join(&relative);
        save(&target, &data).await?;

        tracing::info!(path = %relative, size = data.len(), "Image uploaded");
        return Ok((
            StatusCode::CREATED,
            Json(UploadResponse {
                url: format!("/media/{}", relative),
                path: relative,
                size: data.len() as u64,
                content_type,
            }),
        ));
    }

    Err(ApiError::validation_error("No file provided"))
}

/// `post_images/YYYY/MM/DD/<uuid>.<ext>`
fn image_path(now: DateTime<Utc>, ext: &str) -> String {
    format!(
        "post_images/{}/{}.{}",
        now.format("%Y/%m/%d"),
        Uuid::new_v4(),
        ext
    )
}

async fn save(target: &Path, data: &[u8]) -> Result<(), ApiError> {
    if let Some(dir) = target.parent() {
        fs::create_dir_all(dir)
            .await
            .map_err(|e| ApiError::internal(anyhow::anyhow!("Failed to create {:?}: {}", dir, e)))?;
    }
    fs::write(target, data)
        .await
        .map_err(|e| ApiError::internal(anyhow::anyhow!("Failed to save {:?}: {}", target, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_image_path_layout() {
        let now = Utc.with_ymd_and_hms(2024, 3, 7, 12, 0, 0).unwrap();
        let path = image_path(now, "png");

        assert!(path.starts_with("post_images/2024/03/07/"));
        assert!(path.ends_with(".png"));
        let name = path.rsplit('/').next().unwrap();
        assert!(Uuid::parse_str(name.trim_end_matches(".png")).is_ok());
    }

    #[test]
    fn test_image_paths_are_unique() {
        let now = Utc::now();
        assert_ne!(image_path(now, "jpg"), image_path(now, "jpg"));
    }

    #[tokio::test]
    async fn test_save_creates_directories() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("post_images/2024/01/02/a.jpg");

        save(&target, b"jpeg").await.unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"jpeg");
    }
}
