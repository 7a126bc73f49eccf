//! Asset upload collaborator.
//!
//! The editor hands file bytes to an [`AssetUploader`] and keeps only the
//! durable [`ImageRef`] it gets back.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::errors::AppError;
use crate::models::ImageRef;

/// Image extensions accepted for upload.
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "svg", "avif"];

/// Path the server mounts the upload directory under.
pub const UPLOAD_URL_PREFIX: &str = "/uploads";

/// A single file selected for upload.
#[derive(Debug, Clone)]
pub struct AssetUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl AssetUpload {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }

    /// Read a file from disk.
    pub async fn from_path(path: &Path) -> Result<Self, AppError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            AppError::Validation(format!("Cannot read image {}: {}", path.display(), e))
        })?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self { filename, bytes })
    }

    /// Lower-cased image extension, or a validation error.
    pub fn image_extension(&self) -> Result<String, AppError> {
        let ext = Path::new(&self.filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        if !IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            return Err(AppError::Validation(format!(
                "Unsupported image type: {}",
                self.filename
            )));
        }
        Ok(ext)
    }

    pub fn validate(&self) -> Result<String, AppError> {
        if self.bytes.is_empty() {
            return Err(AppError::Validation(format!(
                "Image {} is empty",
                self.filename
            )));
        }
        self.image_extension()
    }
}

/// Durable storage for uploaded images.
#[async_trait]
pub trait AssetUploader: Send + Sync {
    async fn upload(&self, upload: AssetUpload) -> Result<ImageRef, AppError>;
}

/// Stores uploads as files in a directory served under `url_prefix`.
#[derive(Debug, Clone)]
pub struct FsAssetStore {
    dir: PathBuf,
    url_prefix: String,
}

impl FsAssetStore {
    pub fn new(dir: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            url_prefix: url_prefix.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl AssetUploader for FsAssetStore {
    async fn upload(&self, upload: AssetUpload) -> Result<ImageRef, AppError> {
        let ext = upload.validate()?;

        tokio::fs::create_dir_all(&self.dir).await?;

        let public_id = uuid::Uuid::new_v4().to_string();
        let file_name = format!("{}.{}", public_id, ext);
        tokio::fs::write(self.dir.join(&file_name), &upload.bytes).await?;

        tracing::info!(
            "Stored upload {} ({} bytes) as {}",
            upload.filename,
            upload.bytes.len(),
            file_name
        );

        Ok(ImageRef {
            public_id,
            url: format!("{}/{}", self.url_prefix, file_name),
        })
    }
}
