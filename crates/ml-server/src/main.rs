//! MediaLib RS Server
//!
//! HTTP server for the ordered media attachment store.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{extract::DefaultBodyLimit, routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ml_api::AppState;
use ml_core::config::AppConfig;

mod health;

use health::{HealthChecker, HealthConfig, HealthState};

const DEFAULT_CONFIG_FILE: &str = "medialib";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging
    init_tracing();

    // Load configuration
    dotenvy::dotenv().ok();
    let config_file =
        std::env::var("MEDIALIB_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
    let mut config = AppConfig::load(&config_file).unwrap_or_else(|e| {
        warn!("Failed to load config file {}: {}, using defaults", config_file, e);
        AppConfig::default()
    });
    config.apply_env().context("invalid environment configuration")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.server.host,
        port = config.server.port,
        "Starting MediaLib RS"
    );

    tokio::fs::create_dir_all(&config.storage.local_path)
        .await
        .with_context(|| format!("cannot create storage directory {}", config.storage.local_path))?;

    let app_state = AppState::from_config(&config)?;
    let health_state = Arc::new(HealthState {
        health: Arc::new(HealthChecker::new(
            HealthConfig::default(),
            &config.storage.local_path,
            &config.assets.root,
        )),
    });

    // Build router
    let app = build_router(app_state, health_state, &config);

    // Start server
    let addr = config.server_addr();
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "info,ml_server=debug,ml_api=debug,ml_media=debug,tower_http=debug".into()
            }),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .init();
}

/// Build the application router
fn build_router(state: AppState, health: Arc<HealthState>, config: &AppConfig) -> Router {
    let health_routes = Router::new()
        .route("/health", get(health::liveness))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(health);

    Router::new()
        .merge(health_routes)
        .merge(ml_api::router().with_state(state))
        .layer(DefaultBodyLimit::max(config.server.max_body_size_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(Duration::from_secs(
                    config.server.request_timeout_seconds,
                )))
                .layer(CompressionLayer::new())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn test_app(dir: &tempfile::TempDir) -> Router {
        let mut config = AppConfig::default();
        config.storage.local_path = dir.path().join("storage").display().to_string();
        config.assets.root = dir.path().join("assets").display().to_string();
        std::fs::create_dir_all(&config.storage.local_path).unwrap();
        std::fs::create_dir_all(&config.assets.root).unwrap();
        std::fs::write(dir.path().join("assets/site.css"), "body{}").unwrap();

        let state = AppState::from_config(&config).unwrap();
        let health = Arc::new(HealthState {
            health: Arc::new(HealthChecker::new(
                HealthConfig::default(),
                &config.storage.local_path,
                &config.assets.root,
            )),
        });

        build_router(state, health, &config)
    }

    async fn status_of(app: Router, uri: &str) -> StatusCode {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_health_endpoints() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(&dir);

        assert_eq!(status_of(app.clone(), "/health").await, StatusCode::OK);
        assert_eq!(status_of(app.clone(), "/health/live").await, StatusCode::OK);
        assert_eq!(status_of(app, "/health/ready").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_media_routes_are_mounted() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(&dir);

        assert_eq!(status_of(app.clone(), "/media/posts/1/gallery").await, StatusCode::OK);
        assert_eq!(status_of(app.clone(), "/assets?path=site.css").await, StatusCode::OK);
        assert_eq!(
            status_of(app, "/assets?path=..%2F..%2Fetc%2Fpasswd").await,
            StatusCode::NOT_FOUND
        );
    }
}
