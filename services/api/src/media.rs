//! Storage for uploaded post images
//!
//! Uploads are decoded before anything touches the disk, so only real
//! images are ever written. Files land under `<root>/uploads/post/` with a
//! random name and the canonical extension of the detected format. Decoding
//! runs on the blocking pool.

use axum::body::Bytes;
use image::ImageFormat;
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// Directory, relative to the media root, holding post images
pub const POST_IMAGE_DIR: &str = "uploads/post";

/// Errors raised while storing an upload
#[derive(Error, Debug)]
pub enum MediaError {
    /// The payload is not a decodable image
    #[error("{0}")]
    InvalidImage(String),

    /// The file could not be written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The decoding task did not complete
    #[error("Image decoding task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Local filesystem media storage
#[derive(Debug, Clone)]
pub struct MediaStorage {
    root: PathBuf,
    max_bytes: usize,
}

impl MediaStorage {
    pub fn new(root: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            root: root.into(),
            max_bytes,
        }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Validate and persist a post image, returning its path relative to the root
    pub async fn store_post_image(&self, content: Bytes) -> Result<String, MediaError> {
        if content.is_empty() {
            return Err(MediaError::InvalidImage(
                "The submitted file is empty.".to_string(),
            ));
        }

        if content.len() > self.max_bytes {
            return Err(MediaError::InvalidImage(format!(
                "Ensure the file is at most {} bytes.",
                self.max_bytes
            )));
        }

        let format = {
            let content = content.clone();
            tokio::task::spawn_blocking(move || detect_format(&content)).await??
        };
        let extension = format.extensions_str().first().copied().unwrap_or("img");

        let relative = format!("{}/{}.{}", POST_IMAGE_DIR, Uuid::new_v4(), extension);
        let target = self.root.join(&relative);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, &content).await?;

        info!("Stored post image at {}", target.display());
        Ok(relative)
    }
}

/// Detect the image format and make sure the payload fully decodes
fn detect_format(content: &[u8]) -> Result<ImageFormat, MediaError> {
    let invalid = || {
        MediaError::InvalidImage(
            "Upload a valid image. The file you uploaded was either not an image or a corrupted image."
                .to_string(),
        )
    };

    let format = image::guess_format(content).map_err(|_| invalid())?;
    image::load_from_memory_with_format(content, format).map_err(|_| invalid())?;
    Ok(format)
}
