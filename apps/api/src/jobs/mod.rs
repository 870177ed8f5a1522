//! Job store: deduplicating, append-only persistence for job records.
//!
//! Records are keyed by `platform:listing_id`. Ingesting a known key is a no-op.
//! Status changes go through [`JobStore::update_status`], which enforces the
//! forward-only lifecycle. Nothing is ever deleted.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::job::{JobRecord, JobStatus, MatchResult, NewJob, TailoredOutput};

pub mod handlers;
pub mod memory;
pub mod postgres;

pub use memory::MemoryJobStore;
pub use postgres::PgJobStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Invalid status transition {from} → {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("Payload does not match target status {0}")]
    PayloadMismatch(JobStatus),

    #[error("Job store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => StoreError::NotFound("row not found".to_string()),
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}

/// Result of ingesting a listing.
#[derive(Debug, Clone)]
pub enum UpsertOutcome {
    New(JobRecord),
    AlreadyKnown(JobRecord),
}

impl UpsertOutcome {
    pub fn record(&self) -> &JobRecord {
        match self {
            UpsertOutcome::New(r) | UpsertOutcome::AlreadyKnown(r) => r,
        }
    }
}

/// Data that accompanies a status change.
#[derive(Debug, Clone)]
pub enum StatusPayload {
    Score(MatchResult),
    Tailoring(TailoredOutput),
    Delivered,
    Failure(String),
}

impl StatusPayload {
    fn target(&self) -> JobStatus {
        match self {
            StatusPayload::Score(_) => JobStatus::Scored,
            StatusPayload::Tailoring(_) => JobStatus::Tailored,
            StatusPayload::Delivered => JobStatus::Notified,
            StatusPayload::Failure(_) => JobStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub platform: Option<String>,
    pub min_score: Option<u8>,
    pub search_id: Option<Uuid>,
    pub limit: Option<usize>,
}

impl JobFilter {
    pub fn matches(&self, record: &JobRecord) -> bool {
        self.status.map_or(true, |s| record.status == s)
            && self
                .platform
                .as_deref()
                .map_or(true, |p| record.platform.eq_ignore_ascii_case(p))
            && self
                .min_score
                .map_or(true, |min| record.match_score.is_some_and(|s| s >= min))
            && self.search_id.map_or(true, |id| record.search_id == Some(id))
    }
}

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Inserts a Pending record unless the key is already known.
    async fn upsert(&self, job: NewJob) -> Result<UpsertOutcome, StoreError>;

    async fn get(&self, id: &str) -> Result<Option<JobRecord>, StoreError>;

    /// Matching records, newest first.
    async fn list(&self, filter: &JobFilter) -> Result<Vec<JobRecord>, StoreError>;

    /// Moves a record to `status`, attaching `payload`. Rejects illegal transitions.
    async fn update_status(
        &self,
        id: &str,
        status: JobStatus,
        payload: StatusPayload,
    ) -> Result<JobRecord, StoreError>;

    /// Records a failed delivery without touching the status.
    async fn record_notify_failure(&self, id: &str, message: &str)
        -> Result<JobRecord, StoreError>;
}

/// Validates and applies a transition to an in-memory copy of a record.
pub fn apply_transition(
    record: &mut JobRecord,
    status: JobStatus,
    payload: StatusPayload,
) -> Result<(), StoreError> {
    if payload.target() != status {
        return Err(StoreError::PayloadMismatch(status));
    }
    if !record.status.can_transition_to(status) {
        return Err(StoreError::InvalidTransition {
            from: record.status,
            to: status,
        });
    }

    match payload {
        StatusPayload::Score(result) => {
            record.match_score = Some(result.score);
            record.rationale = Some(result.rationale);
            record.missing_skills = result.missing_skills;
        }
        StatusPayload::Tailoring(output) => {
            record.suggestions = output.suggestions;
            record.cover_letter = Some(output.cover_letter);
        }
        StatusPayload::Delivered => {
            record.notify_error = None;
        }
        StatusPayload::Failure(reason) => {
            record.error = Some(reason);
        }
    }
    record.status = status;
    record.updated_at = Utc::now();
    Ok(())
}
