//! Asset Server
//!
//! Serves published files from a fixed root with year-long immutable caching.
//! Any request that would leave the root is rejected, and rejections look the
//! same as missing files to the outside.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use ml_core::config::ONE_YEAR_SECONDS;
use ml_core::MediaError;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, instrument, warn};

use crate::mime::asset_mime_type;

const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AssetError {
    #[error("Asset not found: {0}")]
    NotFound(String),
    #[error("Asset path rejected: {0}")]
    Rejected(String),
}

impl From<AssetError> for MediaError {
    fn from(err: AssetError) -> Self {
        match err {
            AssetError::NotFound(path) => MediaError::NotFound {
                entity: "Asset",
                id: path,
            },
            AssetError::Rejected(path) => MediaError::Rejected(path),
        }
    }
}

/// A resolved asset ready to be written out
#[derive(Debug, Clone)]
pub struct Asset {
    pub bytes: Bytes,
    pub mime_type: String,
    pub max_age_seconds: u64,
    pub expires_at: DateTime<Utc>,
}

impl Asset {
    /// Directive for both shared caches and the client
    pub fn cache_control(&self) -> String {
        format!(
            "public, max-age={0}, s-maxage={0}, immutable",
            self.max_age_seconds
        )
    }

    /// Expiry timestamp as an HTTP date
    pub fn expires(&self) -> String {
        self.expires_at.format(HTTP_DATE_FORMAT).to_string()
    }
}

#[derive(Debug, Clone)]
pub struct AssetServer {
    root: PathBuf,
    max_age_seconds: u64,
}

impl AssetServer {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            max_age_seconds: ONE_YEAR_SECONDS,
        }
    }

    pub fn with_max_age(mut self, seconds: u64) -> Self {
        self.max_age_seconds = seconds;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read the asset at `raw_path`, a URL-encoded path relative to the root
    #[instrument(skip(self))]
    pub async fn serve(&self, raw_path: &str) -> Result<Asset, AssetError> {
        let relative = normalize_relative_path(raw_path)?;
        let candidate = self.root.join(&relative);

        let canonical = fs::canonicalize(&candidate)
            .await
            .map_err(|_| AssetError::NotFound(raw_path.to_string()))?;
        let canonical_root = fs::canonicalize(&self.root).await.map_err(|e| {
            warn!(root = ?self.root, error = %e, "Asset root unavailable");
            AssetError::NotFound(raw_path.to_string())
        })?;

        // Symlinks can still point outside the root after normalization
        if canonical.strip_prefix(&canonical_root).is_err() {
            warn!(path = ?canonical, root = ?canonical_root, "Asset path escapes root");
            return Err(AssetError::Rejected(raw_path.to_string()));
        }

        let metadata = fs::metadata(&canonical)
            .await
            .map_err(|_| AssetError::NotFound(raw_path.to_string()))?;
        if !metadata.is_file() {
            return Err(AssetError::NotFound(raw_path.to_string()));
        }

        let bytes = fs::read(&canonical)
            .await
            .map_err(|_| AssetError::NotFound(raw_path.to_string()))?;
        let mime_type = asset_mime_type(&canonical, &bytes);
        debug!(path = ?canonical, mime_type = %mime_type, size = bytes.len(), "Asset served");

        Ok(Asset {
            bytes: Bytes::from(bytes),
            mime_type,
            max_age_seconds: self.max_age_seconds,
            expires_at: Utc::now() + Duration::seconds(self.max_age_seconds as i64),
        })
    }
}

/// Decode and lexically resolve a relative path
///
/// `.` segments and empty segments are dropped and `..` pops the previous
/// segment. Popping past the start rejects the whole path.
pub fn normalize_relative_path(raw: &str) -> Result<PathBuf, AssetError> {
    let decoded =
        urlencoding::decode(raw).map_err(|_| AssetError::Rejected(raw.to_string()))?;
    if decoded.contains('\0') {
        return Err(AssetError::Rejected(raw.to_string()));
    }

    let unified = decoded.replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(AssetError::Rejected(raw.to_string()));
                }
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        return Err(AssetError::NotFound(raw.to_string()));
    }

    Ok(segments.iter().collect())
}
