use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::pipeline::registry::SearchStatus;
use crate::models::job::{MatchResult, TailoredOutput};
use crate::pipeline::{
    EmailRequest, JobOutcome, RunState, ScoreRequest, SearchRequest, SingleJobRequest,
    TailorRequest,
};
use crate::state::AppState;

/// POST /api/search
/// Validates the request, then runs the pipeline in the background.
pub async fn handle_start_search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let search = state.pipeline.prepare(request)?;
    let tracker = state.searches.start();
    info!(
        "Search {} accepted: '{}'",
        tracker.id, search.params.keywords
    );

    let pipeline = state.pipeline.clone();
    let task_tracker = tracker.clone();
    tokio::spawn(async move {
        pipeline.run_search(search, &task_tracker).await;
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "search_id": tracker.id,
            "state": RunState::Started,
        })),
    ))
}

/// GET /api/search/:id
pub async fn handle_get_search(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SearchStatus>, AppError> {
    state
        .searches
        .get(id)
        .map(|tracker| Json(tracker.status()))
        .ok_or_else(|| AppError::NotFound(format!("search {id}")))
}

/// POST /api/search/:id/cancel
/// Jobs already in flight finish; nothing new starts.
pub async fn handle_cancel_search(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    match state.searches.cancel(id) {
        None => Err(AppError::NotFound(format!("search {id}"))),
        Some(false) => Err(AppError::Conflict(format!("search {id} has already finished"))),
        Some(true) => {
            info!("Search {id} cancellation requested");
            Ok((
                StatusCode::ACCEPTED,
                Json(json!({ "search_id": id, "cancelled": true })),
            ))
        }
    }
}

/// POST /api/pipeline
/// Scores, tailors and notifies a single job supplied in the request body.
pub async fn handle_run_single(
    State(state): State<AppState>,
    Json(request): Json<SingleJobRequest>,
) -> Result<Json<JobOutcome>, AppError> {
    let outcome = state.pipeline.run_single(request).await?;
    Ok(Json(outcome))
}

/// POST /api/score
pub async fn handle_score(
    State(state): State<AppState>,
    Json(request): Json<ScoreRequest>,
) -> Result<Json<MatchResult>, AppError> {
    let matched = state.pipeline.score_only(request).await?;
    Ok(Json(matched))
}

/// POST /api/tailor
pub async fn handle_tailor(
    State(state): State<AppState>,
    Json(request): Json<TailorRequest>,
) -> Result<Json<TailoredOutput>, AppError> {
    let tailored = state.pipeline.tailor_only(request).await?;
    Ok(Json(tailored))
}

/// POST /api/send-email
/// Mails documents the caller already has; no job record is involved.
pub async fn handle_send_email(
    State(state): State<AppState>,
    Json(request): Json<EmailRequest>,
) -> Result<Json<Value>, AppError> {
    let recipient = state.pipeline.send_email(request).await?;
    Ok(Json(json!({ "status": "sent", "recipient": recipient })))
}
