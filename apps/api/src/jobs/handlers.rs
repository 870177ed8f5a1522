use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::errors::AppError;
use crate::jobs::JobFilter;
use crate::models::job::JobRecord;
use crate::state::AppState;

const DEFAULT_LIST_LIMIT: usize = 100;

#[derive(Debug, Default, Deserialize)]
pub struct NotifyRequest {
    pub recipient: Option<String>,
}

/// GET /api/jobs?status=&platform=&min_score=&search_id=&limit=
pub async fn handle_list_jobs(
    State(state): State<AppState>,
    Query(mut filter): Query<JobFilter>,
) -> Result<Json<Vec<JobRecord>>, AppError> {
    filter.limit = Some(filter.limit.unwrap_or(DEFAULT_LIST_LIMIT));
    Ok(Json(state.store.list(&filter).await?))
}

/// GET /api/jobs/:id
pub async fn handle_get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobRecord>, AppError> {
    state
        .store
        .get(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("job {id}")))
}

/// POST /api/jobs/:id/notify
/// Resends the match email for a job whose earlier delivery failed.
pub async fn handle_notify_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<NotifyRequest>>,
) -> Result<Json<JobRecord>, AppError> {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let record = state
        .pipeline
        .retry_notification(&id, request.recipient.as_deref())
        .await?;
    Ok(Json(record))
}
