//! Health Check System
//!
//! Reports whether the byte store and the asset root are usable.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

const WRITE_PROBE: &str = ".medialib-health";

/// Health check status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy | Self::Degraded)
    }

    fn worst(self, other: Self) -> Self {
        match (self, other) {
            (Self::Unhealthy, _) | (_, Self::Unhealthy) => Self::Unhealthy,
            (Self::Degraded, _) | (_, Self::Degraded) => Self::Degraded,
            _ => Self::Healthy,
        }
    }
}

/// Individual component health
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub response_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Overall health report
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub components: Vec<ComponentHealth>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl HealthReport {
    pub fn http_status(&self) -> StatusCode {
        match self.status {
            HealthStatus::Healthy => StatusCode::OK,
            HealthStatus::Degraded => StatusCode::OK,
            HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Health checker configuration
#[derive(Debug, Clone)]
pub struct HealthConfig {
    /// Cache duration for health results
    pub cache_duration: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            cache_duration: Duration::from_secs(10),
        }
    }
}

/// Cached health result
struct CachedHealth {
    report: HealthReport,
    cached_at: Instant,
}

/// Health checker service
pub struct HealthChecker {
    config: HealthConfig,
    start_time: Instant,
    cache: RwLock<Option<CachedHealth>>,
    storage_root: PathBuf,
    assets_root: PathBuf,
}

impl HealthChecker {
    pub fn new(
        config: HealthConfig,
        storage_root: impl Into<PathBuf>,
        assets_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            config,
            start_time: Instant::now(),
            cache: RwLock::new(None),
            storage_root: storage_root.into(),
            assets_root: assets_root.into(),
        }
    }

    /// Get cached health or perform checks
    pub async fn check(&self) -> HealthReport {
        {
            let cache = self.cache.read().await;
            if let Some(ref cached) = *cache {
                if cached.cached_at.elapsed() < self.config.cache_duration {
                    debug!("Returning cached health report");
                    return cached.report.clone();
                }
            }
        }

        let report = self.perform_checks().await;

        {
            let mut cache = self.cache.write().await;
            *cache = Some(CachedHealth {
                report: report.clone(),
                cached_at: Instant::now(),
            });
        }

        report
    }

    async fn perform_checks(&self) -> HealthReport {
        let components = vec![self.check_storage().await, self.check_assets().await];
        let status = components
            .iter()
            .fold(HealthStatus::Healthy, |acc, c| acc.worst(c.status));

        HealthReport {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            components,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Uploads land here, so it must accept writes
    async fn check_storage(&self) -> ComponentHealth {
        let start = Instant::now();

        let (status, message) = if !is_dir(&self.storage_root).await {
            (HealthStatus::Unhealthy, "Storage directory missing".to_string())
        } else {
            let probe = self.storage_root.join(WRITE_PROBE);
            match tokio::fs::write(&probe, b"ok").await {
                Ok(()) => {
                    let _ = tokio::fs::remove_file(&probe).await;
                    (HealthStatus::Healthy, "Storage writable".to_string())
                }
                Err(e) => (HealthStatus::Unhealthy, format!("Storage not writable: {}", e)),
            }
        };

        if status != HealthStatus::Healthy {
            warn!(path = ?self.storage_root, message = %message, "Storage check failed");
        }

        ComponentHealth {
            name: "storage".to_string(),
            status,
            message: Some(message),
            response_time_ms: start.elapsed().as_millis() as u64,
            details: Some(serde_json::json!({ "path": self.storage_root.display().to_string() })),
        }
    }

    /// Missing assets break the admin screens but not the media operations
    async fn check_assets(&self) -> ComponentHealth {
        let start = Instant::now();

        let (status, message) = if is_dir(&self.assets_root).await {
            (HealthStatus::Healthy, "Asset root readable")
        } else {
            warn!(path = ?self.assets_root, "Asset root missing");
            (HealthStatus::Degraded, "Asset root missing")
        };

        ComponentHealth {
            name: "assets".to_string(),
            status,
            message: Some(message.to_string()),
            response_time_ms: start.elapsed().as_millis() as u64,
            details: Some(serde_json::json!({ "path": self.assets_root.display().to_string() })),
        }
    }
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}

/// Application state containing health checker
pub struct HealthState {
    pub health: Arc<HealthChecker>,
}

/// Simple liveness check
pub async fn liveness() -> &'static str {
    "OK"
}

/// Readiness check
pub async fn readiness(State(state): State<Arc<HealthState>>) -> (StatusCode, Json<HealthReport>) {
    let report = state.health.check().await;
    let status = report.http_status();
    (status, Json(report))
}
