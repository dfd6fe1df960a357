// src/storage.rs

//! Object storage for avatars and post images.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::AppError;

/// Largest accepted upload, in bytes.
pub const MAX_UPLOAD_BYTES: usize = 2 * 1024 * 1024;

pub const ALLOWED_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/png"];

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Stores `bytes` under `key` and returns the public URL of the object.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, AppError>;
}

/// Checks upload preconditions before anything reaches storage.
pub fn check_upload(bytes: &[u8], content_type: &str) -> Result<(), AppError> {
    if bytes.is_empty() {
        return Err(AppError::BadRequest("No file data provided".to_string()));
    }
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(AppError::BadRequest("File size exceeds 2MB.".to_string()));
    }
    if !ALLOWED_CONTENT_TYPES.contains(&content_type) {
        return Err(AppError::BadRequest(
            "Invalid file format. Only JPEG/PNG allowed.".to_string(),
        ));
    }
    Ok(())
}

/// Object key for an upload: `<bucket>/<owner>/<random>.<ext>`.
pub fn object_key(bucket: &str, owner_id: i64, content_type: &str) -> String {
    let ext = match content_type {
        "image/png" => "png",
        _ => "jpg",
    };
    format!(
        "{}/{}/{}.{}",
        bucket,
        owner_id,
        uuid::Uuid::new_v4().simple(),
        ext
    )
}

/// Stores objects on local disk; `tower_http::services::ServeDir` serves them
/// back under `base_url`.
pub struct LocalObjectStorage {
    root: PathBuf,
    base_url: String,
}

impl LocalObjectStorage {
    pub fn new(root: impl Into<PathBuf>, base_url: &str) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ObjectStorage for LocalObjectStorage {
    async fn put(&self, key: &str, bytes: Vec<u8>, _content_type: &str) -> Result<String, AppError> {
        if key.split('/').any(|part| part.is_empty() || part == "..") {
            return Err(AppError::BadRequest("Invalid object key".to_string()));
        }

        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Upstream(format!("Storage unavailable: {}", e)))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| AppError::Upstream(format!("Upload failed: {}", e)))?;

        tracing::debug!(key, "stored object");
        Ok(format!("{}/{}", self.base_url, key))
    }
}
