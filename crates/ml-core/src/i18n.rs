//! Translation lookup table
//!
//! A process-wide table loaded from a flat JSON object (`{"key": "message"}`)
//! with an explicit load/refresh lifecycle. Consumers only ever read through
//! [`Translations::translate`] or take a [`Translations::snapshot`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::error::MediaError;
use crate::result::MediaResult;

pub const IMAGES_UPDATED: &str = "media.images_updated";
pub const IMAGES_REMOVED: &str = "media.images_removed";
pub const IMAGES_SORTED: &str = "media.images_sorted";

/// Built-in English messages used when a key is not loaded
fn fallback(key: &str) -> Option<&'static str> {
    match key {
        IMAGES_UPDATED => Some("Images updated"),
        IMAGES_REMOVED => Some("Images removed"),
        IMAGES_SORTED => Some("Images sorted"),
        _ => None,
    }
}

#[derive(Debug, Default)]
pub struct Translations {
    source: Option<PathBuf>,
    entries: RwLock<HashMap<String, String>>,
}

impl Translations {
    /// An empty table answering with built-in messages only
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(entries: HashMap<String, String>) -> Self {
        Self {
            source: None,
            entries: RwLock::new(entries),
        }
    }

    /// Load a table from a JSON file and remember the file for [`refresh`](Self::refresh)
    pub fn load(path: impl AsRef<Path>) -> MediaResult<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = Self::read_file(&path)?;
        info!(path = ?path, count = entries.len(), "Translations loaded");

        Ok(Self {
            source: Some(path),
            entries: RwLock::new(entries),
        })
    }

    /// Re-read the source file, replacing the table wholesale
    pub fn refresh(&self) -> MediaResult<usize> {
        let Some(path) = &self.source else {
            debug!("Translations have no source file, nothing to refresh");
            return Ok(self.entries.read().len());
        };

        let entries = Self::read_file(path)?;
        let count = entries.len();
        *self.entries.write() = entries;
        info!(path = ?path, count = count, "Translations refreshed");

        Ok(count)
    }

    fn read_file(path: &Path) -> MediaResult<HashMap<String, String>> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| MediaError::Config(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&raw)
            .map_err(|e| MediaError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Look up a message, falling back to the built-in text and then the key
    pub fn translate(&self, key: &str) -> String {
        if let Some(message) = self.entries.read().get(key) {
            return message.clone();
        }
        fallback(key).map(str::to_string).unwrap_or_else(|| key.to_string())
    }

    /// Copy of the currently loaded table
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.entries.read().clone()
    }
}
