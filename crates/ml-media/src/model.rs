//! Media attachment model

use std::collections::BTreeMap;
use std::str::FromStr;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use ml_core::{Id, MediaError};
use serde::{Deserialize, Serialize};

pub const TITLE: &str = "title";
pub const ALT: &str = "alt";

/// Files strictly larger than this are classified as large
pub const LARGE_FILE_THRESHOLD: u64 = 100_000;

/// Display names longer than this are truncated
pub const DISPLAY_NAME_LIMIT: usize = 20;

const ELLIPSIS: &str = " (...)";

/// A named, ordered attachment point on a record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotKey {
    pub record_type: String,
    pub record_id: String,
    pub field: String,
}

impl SlotKey {
    pub fn new(
        record_type: impl Into<String>,
        record_id: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        Self {
            record_type: record_type.into(),
            record_id: record_id.into(),
            field: field.into(),
        }
    }
}

impl std::fmt::Display for SlotKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.record_type, self.record_id, self.field)
    }
}

impl FromStr for SlotKey {
    type Err = MediaError;

    /// Parse `"<record type>/<record id>/<field>"`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        match parts.as_slice() {
            [record_type, record_id, field]
                if !record_type.is_empty() && !record_id.is_empty() && !field.is_empty() =>
            {
                Ok(Self::new(*record_type, *record_id, *field))
            }
            _ => Err(MediaError::NotFound {
                entity: "Slot",
                id: s.to_string(),
            }),
        }
    }
}

/// Mutable string metadata of an attachment
///
/// Always contains `title` and `alt`. Any other key is stored as given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomProperties(BTreeMap<String, String>);

impl Default for CustomProperties {
    fn default() -> Self {
        Self::new()
    }
}

impl CustomProperties {
    pub fn new() -> Self {
        let mut map = BTreeMap::new();
        map.insert(TITLE.to_string(), String::new());
        map.insert(ALT.to_string(), String::new());
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn title(&self) -> &str {
        self.get(TITLE).unwrap_or_default()
    }

    pub fn alt(&self) -> &str {
        self.get(ALT).unwrap_or_default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Last write wins per key; keys absent from `updates` are untouched
    pub fn merge<K, V>(&mut self, updates: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in updates {
            self.set(key, value);
        }
    }

    /// The subset that survives a replace: `title`, `alt` and the given extra keys
    pub fn carry_over(&self, extra_keys: &[String]) -> CustomProperties {
        let mut carried = CustomProperties::new();
        carried.set(TITLE, self.title());
        carried.set(ALT, self.alt());
        for key in extra_keys {
            if let Some(value) = self.get(key) {
                carried.set(key.clone(), value);
            }
        }
        carried
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }
}

/// A media object bound to a slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    /// Attachment ID, never reused
    pub id: Id,
    /// Owning slot
    pub slot: SlotKey,
    /// Storage key of the bytes
    pub content_ref: String,
    /// Original filename
    pub file_name: String,
    /// MIME content type
    pub mime_type: String,
    /// File size in bytes
    pub size: u64,
    /// SHA256 digest
    pub digest: String,
    pub custom_properties: CustomProperties,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Attachment {
    pub fn new(
        id: Id,
        slot: SlotKey,
        content_ref: impl Into<String>,
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        size: u64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            slot,
            content_ref: content_ref.into(),
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            size,
            digest: String::new(),
            custom_properties: CustomProperties::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_digest(mut self, digest: impl Into<String>) -> Self {
        self.digest = digest.into();
        self
    }

    pub fn with_properties(mut self, properties: CustomProperties) -> Self {
        self.custom_properties = properties;
        self
    }

    pub fn size_class(&self) -> SizeClass {
        SizeClass::of(self.size)
    }

    /// Human-readable file size
    pub fn human_size(&self) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];

        if self.size == 0 {
            return "0 B".to_string();
        }

        let mut value = self.size as f64;
        let mut unit = 0;
        while value >= 1024.0 && unit < UNITS.len() - 1 {
            value /= 1024.0;
            unit += 1;
        }

        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// Uploaded bytes plus client-supplied metadata
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: None,
            data: data.into(),
        }
    }

    pub fn content_type(mut self, ct: impl Into<String>) -> Self {
        self.content_type = Some(ct.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeClass {
    Normal,
    Large,
}

impl SizeClass {
    pub fn of(size: u64) -> Self {
        if size > LARGE_FILE_THRESHOLD {
            Self::Large
        } else {
            Self::Normal
        }
    }
}

/// Shorten a file name for display, marking the cut with an ellipsis
pub fn truncate_display_name(name: &str, limit: usize) -> String {
    if name.chars().count() <= limit {
        return name.to_string();
    }
    let head: String = name.chars().take(limit).collect();
    format!("{}{}", head.trim_end(), ELLIPSIS)
}

/// What the caller needs to refresh its view after a replace
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplaySummary {
    pub file_id: Id,
    pub file_url: String,
    pub file_name: String,
    pub display_name: String,
    pub size_class: SizeClass,
    pub human_size: String,
}

impl DisplaySummary {
    pub fn new(attachment: &Attachment, file_url: impl Into<String>) -> Self {
        Self {
            file_id: attachment.id,
            file_url: file_url.into(),
            file_name: attachment.file_name.clone(),
            display_name: truncate_display_name(&attachment.file_name, DISPLAY_NAME_LIMIT),
            size_class: attachment.size_class(),
            human_size: attachment.human_size(),
        }
    }
}
