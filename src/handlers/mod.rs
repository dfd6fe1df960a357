// src/handlers/mod.rs

use axum::extract::Multipart;

use crate::error::AppError;

pub mod admin;
pub mod auth;
pub mod interaction;
pub mod notifications;
pub mod posts;
pub mod users;

/// Reads the `file` field of a multipart upload.
///
/// Returns the raw bytes and the declared content type; other fields are ignored.
pub(crate) async fn read_file_field(mut multipart: Multipart) -> Result<(Vec<u8>, String), AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();

        let bytes = field.bytes().await.map_err(|e| {
            tracing::warn!(error = %e, "Failed to read upload file bytes");
            AppError::BadRequest("Failed to read file data".to_string())
        })?;

        return Ok((bytes.to_vec(), content_type));
    }

    Err(AppError::BadRequest("No file data provided".to_string()))
}
