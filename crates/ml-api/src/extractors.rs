//! Application state and request extraction helpers

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::Multipart;
use ml_core::config::AppConfig;
use ml_core::i18n::Translations;
use ml_core::MediaResult;
use ml_media::{
    AssetServer, LocalStorage, MediaService, MemoryAttachmentRegistry, StaticSchema, Storage,
    Upload,
};
use tracing::info;

use crate::error::{ApiError, ApiResult};

/// Media service as wired into the HTTP layer
pub type Media = MediaService<MemoryAttachmentRegistry, dyn Storage>;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub media: Arc<Media>,
    pub assets: Arc<AssetServer>,
    pub translations: Arc<Translations>,
}

impl AppState {
    pub fn new(media: Media, assets: AssetServer, translations: Translations) -> Self {
        Self {
            media: Arc::new(media),
            assets: Arc::new(assets),
            translations: Arc::new(translations),
        }
    }

    /// Wire local storage, the configured schema and translations
    pub fn from_config(config: &AppConfig) -> MediaResult<Self> {
        let storage: Arc<dyn Storage> = Arc::new(LocalStorage::new(
            &config.storage.local_path,
            config.storage.base_url.clone(),
        ));
        let media = MediaService::new(
            Arc::new(MemoryAttachmentRegistry::new()),
            storage,
            Arc::new(StaticSchema::new(config.schema.clone())),
        );

        let assets =
            AssetServer::new(&config.assets.root).with_max_age(config.assets.max_age_seconds);

        let translations = match &config.i18n.translations_path {
            Some(path) => Translations::load(path)?,
            None => Translations::new(),
        };

        info!(
            storage = %config.storage.local_path,
            assets = %config.assets.root,
            locale = %config.i18n.locale,
            "Application state ready"
        );

        Ok(Self::new(media, assets, translations))
    }

    pub fn translate(&self, key: &str) -> String {
        self.translations.translate(key)
    }
}

/// A multipart form carrying one `file` part plus plain text fields
#[derive(Debug)]
pub struct UploadForm {
    pub upload: Upload,
    pub fields: BTreeMap<String, String>,
}

impl UploadForm {
    pub async fn read(mut multipart: Multipart) -> ApiResult<Self> {
        let mut upload = None;
        let mut fields = BTreeMap::new();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(format!("Malformed multipart body: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();

            if name == "file" {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                // Browsers send octet-stream for anything they cannot name
                let content_type = field
                    .content_type()
                    .filter(|ct| *ct != "application/octet-stream")
                    .map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read file: {}", e)))?;

                let mut file = Upload::new(file_name, data);
                if let Some(ct) = content_type {
                    file = file.content_type(ct);
                }
                upload = Some(file);
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read {}: {}", name, e)))?;
                fields.insert(name, value);
            }
        }

        let upload = upload.ok_or_else(|| ApiError::bad_request("Missing file part"))?;
        Ok(Self { upload, fields })
    }
}
