//! Translation table handlers

use std::collections::HashMap;

use axum::{extract::State, Json};
use ml_core::Envelope;

use crate::error::ApiResult;
use crate::extractors::AppState;

/// GET /translations
pub async fn list_translations(State(state): State<AppState>) -> Json<HashMap<String, String>> {
    Json(state.translations.snapshot())
}

/// Re-read the translation file
///
/// POST /translations/refresh
pub async fn refresh_translations(
    State(state): State<AppState>,
) -> ApiResult<Json<Envelope<usize>>> {
    let count = state.translations.refresh()?;
    Ok(Json(Envelope::success("Translations refreshed", count)))
}
