//! Configuration types and loading

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One year, the lifetime of every served asset
pub const ONE_YEAR_SECONDS: u64 = 31_536_000;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Media byte storage configuration
    pub storage: StorageConfig,

    /// Static asset serving configuration
    pub assets: AssetsConfig,

    /// Translation table configuration
    pub i18n: I18nConfig,

    /// Declared extra property keys per media field
    pub schema: SchemaConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_seconds: u64,
    pub max_body_size_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_seconds: 60,
            max_body_size_bytes: 64 * 1024 * 1024, // 64MB
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Local directory holding stored media bytes
    pub local_path: String,
    /// Public base URL that content references are served under
    pub base_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            local_path: "/var/medialib/storage".to_string(),
            base_url: "/storage".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AssetsConfig {
    /// Fixed root every asset path is resolved against
    pub root: String,
    /// Cache lifetime advertised to shared caches and clients
    pub max_age_seconds: u64,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            root: "/var/medialib/assets".to_string(),
            max_age_seconds: ONE_YEAR_SECONDS,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct I18nConfig {
    /// JSON file with a flat key -> message table
    pub translations_path: Option<String>,
    pub locale: String,
}

impl Default for I18nConfig {
    fn default() -> Self {
        Self {
            translations_path: None,
            locale: "en".to_string(),
        }
    }
}

/// Field schema declarations, keyed by `"<record type>/<field>"`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SchemaConfig {
    pub fields: HashMap<String, Vec<String>>,
}

impl SchemaConfig {
    pub fn declare(
        &mut self,
        record_type: &str,
        field: &str,
        extra_fields: impl IntoIterator<Item = impl Into<String>>,
    ) {
        self.fields.insert(
            format!("{}/{}", record_type, field),
            extra_fields.into_iter().map(Into::into).collect(),
        );
    }

    pub fn extra_fields(&self, record_type: &str, field: &str) -> Option<&[String]> {
        self.fields
            .get(&format!("{}/{}", record_type, field))
            .map(Vec::as_slice)
    }
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
    #[error("Config file error: {0}")]
    FileError(String),
}

impl AppConfig {
    /// Load configuration from an optional file layered with `MEDIALIB__*`
    /// environment variables (e.g. `MEDIALIB__SERVER__PORT`)
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("MEDIALIB").separator("__"))
            .build()
            .map_err(|e| ConfigError::FileError(e.to_string()))?;

        settings
            .try_deserialize()
            .map_err(|e| ConfigError::FileError(e.to_string()))
    }

    /// Override fields from conventional flat environment variables
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        // Server
        if let Ok(host) = std::env::var("HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("PORT") {
            self.server.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                key: "PORT".to_string(),
                message: format!("'{}' is not a port number", port),
            })?;
        }

        // Storage
        if let Ok(path) = std::env::var("MEDIALIB_STORAGE_PATH") {
            self.storage.local_path = path;
        }
        if let Ok(url) = std::env::var("MEDIALIB_STORAGE_URL") {
            self.storage.base_url = url;
        }

        // Assets
        if let Ok(root) = std::env::var("MEDIALIB_ASSETS_PATH") {
            self.assets.root = root;
        }

        // Translations
        if let Ok(path) = std::env::var("MEDIALIB_TRANSLATIONS_PATH") {
            self.i18n.translations_path = Some(path);
        }
        if let Ok(locale) = std::env::var("MEDIALIB_LOCALE") {
            self.i18n.locale = locale;
        }

        Ok(())
    }

    /// Get the server address
    pub fn server_addr(&self) -> std::net::SocketAddr {
        use std::net::SocketAddr;
        let ip: std::net::IpAddr = self.server.host.parse().unwrap_or([0, 0, 0, 0].into());
        SocketAddr::new(ip, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.assets.max_age_seconds, ONE_YEAR_SECONDS);
        assert!(config.schema.fields.is_empty());
    }

    #[test]
    fn test_schema_declarations() {
        let mut schema = SchemaConfig::default();
        schema.declare("posts", "gallery", ["caption", "credit"]);

        assert_eq!(
            schema.extra_fields("posts", "gallery"),
            Some(&["caption".to_string(), "credit".to_string()][..])
        );
        assert_eq!(schema.extra_fields("posts", "cover"), None);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("medialib.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[server]
port = 9090

[assets]
root = "/srv/assets"

[schema.fields]
"posts/gallery" = ["caption"]
"#
        )
        .unwrap();

        let config = AppConfig::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.assets.root, "/srv/assets");
        assert_eq!(
            config.schema.extra_fields("posts", "gallery"),
            Some(&["caption".to_string()][..])
        );
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = AppConfig::load("/nonexistent/medialib").unwrap();
        assert_eq!(config.storage.base_url, "/storage");
    }

    #[test]
    fn test_server_addr() {
        let config = AppConfig::default();
        let addr = config.server_addr();
        assert_eq!(addr.port(), 8080);
    }
}
