use axum::{extract::State, Json};

use crate::errors::AppError;
use crate::settings::{PipelineSettings, SettingsPatch};
use crate::state::AppState;

/// GET /api/config
pub async fn handle_get_config(State(state): State<AppState>) -> Json<PipelineSettings> {
    Json(PipelineSettings::clone(&state.settings.snapshot()))
}

/// PATCH /api/config
/// Runs already in progress keep the settings they started with.
pub async fn handle_patch_config(
    State(state): State<AppState>,
    Json(patch): Json<SettingsPatch>,
) -> Result<Json<PipelineSettings>, AppError> {
    let updated = state.settings.update(patch)?;
    Ok(Json(PipelineSettings::clone(&updated)))
}
