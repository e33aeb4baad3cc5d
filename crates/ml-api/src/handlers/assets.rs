//! Published asset handler

use axum::{
    extract::{Query, State},
    http::{
        header::{CACHE_CONTROL, CONTENT_TYPE, EXPIRES},
        StatusCode,
    },
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::debug;

use crate::extractors::AppState;

#[derive(Debug, Deserialize)]
pub struct AssetQuery {
    pub path: Option<String>,
}

/// Serve a published asset
///
/// GET /assets?path=<url-encoded relative path>
///
/// Missing and rejected paths both answer with an empty 404.
pub async fn serve_asset(
    State(state): State<AppState>,
    Query(query): Query<AssetQuery>,
) -> Response {
    let Some(path) = query.path else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match state.assets.serve(&path).await {
        Ok(asset) => (
            [
                (CONTENT_TYPE, asset.mime_type.clone()),
                (CACHE_CONTROL, asset.cache_control()),
                (EXPIRES, asset.expires()),
            ],
            asset.bytes,
        )
            .into_response(),
        Err(e) => {
            debug!(error = %e, "Asset unavailable");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}
