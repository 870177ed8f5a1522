//! Pipeline: search → dedupe → score → tailor → notify.
//!
//! [`Pipeline`] drives one search request through the stages and produces a
//! [`SearchReport`]. Per-job failures are collected, not propagated; only a dead
//! store, a search where every source failed, or one where every new job failed
//! fails the run as a whole.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::jobs::StoreError;
use crate::llm_client::retry::Retryable;
use crate::llm_client::LlmError;
use crate::models::job::JobStatus;
use crate::notify::NotifyError;
use crate::scoring::ScoreError;
use crate::sources::SourceError;
use crate::tailoring::TailorError;

pub mod handlers;
pub mod orchestrator;
pub mod registry;

pub use orchestrator::{Pipeline, PipelineOptions};
pub use registry::SearchRegistry;

/// Coarse error taxonomy shared by every stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Failed now, may work later (timeouts, 5xx, SMTP hiccups).
    TransientExternal,
    /// The external service rejected the request outright.
    PermanentExternal,
    /// The response could not be parsed or was out of range.
    Format,
    /// A status change was refused by the store.
    Transition,
    /// A dependency stayed down through every retry.
    DependencyUnavailable,
}

pub trait Classify {
    fn kind(&self) -> ErrorKind;
}

impl Classify for LlmError {
    fn kind(&self) -> ErrorKind {
        match self {
            LlmError::Unavailable { .. } => ErrorKind::DependencyUnavailable,
            LlmError::Parse(_) | LlmError::EmptyContent => ErrorKind::Format,
            e if e.is_transient() => ErrorKind::TransientExternal,
            _ => ErrorKind::PermanentExternal,
        }
    }
}

impl Classify for ScoreError {
    fn kind(&self) -> ErrorKind {
        match self {
            ScoreError::Llm(e) => e.kind(),
            ScoreError::Format(_) => ErrorKind::Format,
        }
    }
}

impl Classify for TailorError {
    fn kind(&self) -> ErrorKind {
        match self {
            TailorError::Llm(e) => e.kind(),
            TailorError::Format(_) => ErrorKind::Format,
        }
    }
}

impl Classify for NotifyError {
    fn kind(&self) -> ErrorKind {
        match self {
            NotifyError::Send(_) => ErrorKind::TransientExternal,
            NotifyError::Address(_) | NotifyError::NoRecipient | NotifyError::NothingToSend(_) => {
                ErrorKind::PermanentExternal
            }
        }
    }
}

impl Classify for StoreError {
    fn kind(&self) -> ErrorKind {
        match self {
            StoreError::InvalidTransition { .. } | StoreError::PayloadMismatch(_) => {
                ErrorKind::Transition
            }
            StoreError::NotFound(_) => ErrorKind::PermanentExternal,
            StoreError::Unavailable(_) => ErrorKind::DependencyUnavailable,
        }
    }
}

impl Classify for SourceError {
    fn kind(&self) -> ErrorKind {
        if self.retryable {
            ErrorKind::TransientExternal
        } else {
            ErrorKind::PermanentExternal
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Score,
    Tailor,
    Notify,
}

/// A failure attached to one job; never aborts its siblings.
#[derive(Debug, Clone, Serialize)]
pub struct JobError {
    pub stage: Stage,
    pub kind: ErrorKind,
    pub message: String,
}

impl JobError {
    pub fn new<E: Classify + std::fmt::Display>(stage: Stage, error: &E) -> Self {
        Self {
            stage,
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Lifecycle of one search request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Started,
    Scraping,
    Scoring,
    Tailoring,
    Notifying,
    Completed,
    Failed,
    Cancelled,
}

impl RunState {
    pub fn is_finished(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed | RunState::Cancelled)
    }
}

fn default_true() -> bool {
    true
}

fn default_job_title() -> String {
    "Position".to_string()
}

fn default_company() -> String {
    "Company".to_string()
}

/// Body of `POST /api/search`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchRequest {
    pub keywords: Option<String>,
    pub location: Option<String>,
    pub platforms: Option<Vec<String>>,
    pub results_per_site: Option<u32>,
    pub hours_old: Option<u32>,
    /// Overrides the configured resume for this run.
    pub resume_text: Option<String>,
    pub applicant_name: Option<String>,
    /// Overrides the configured notification recipient.
    pub recipient: Option<String>,
    /// When false the run stops after scoring.
    #[serde(default = "default_true")]
    pub auto_pipeline: bool,
}

/// Body of `POST /api/pipeline`: one job supplied by hand.
#[derive(Debug, Clone, Deserialize)]
pub struct SingleJobRequest {
    pub title: String,
    pub company: String,
    pub description: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub location: String,
    pub resume_text: Option<String>,
    pub applicant_name: Option<String>,
    pub recipient: Option<String>,
}

/// Body of `POST /api/score`: a resume scored against a pasted description.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoreRequest {
    /// Falls back to the configured resume.
    pub resume: Option<String>,
    pub job_description: String,
    #[serde(default = "default_job_title")]
    pub job_title: String,
    #[serde(default = "default_company")]
    pub company_name: String,
}

/// Body of `POST /api/tailor`.
#[derive(Debug, Clone, Deserialize)]
pub struct TailorRequest {
    pub resume: Option<String>,
    pub job_description: String,
    #[serde(default)]
    pub missing_skills: Vec<String>,
    pub applicant_name: Option<String>,
    #[serde(default = "default_job_title")]
    pub job_title: String,
    #[serde(default = "default_company")]
    pub company_name: String,
}

/// Body of `POST /api/send-email`: documents produced elsewhere, mailed as-is.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailRequest {
    pub recipient_email: String,
    pub applicant_name: Option<String>,
    #[serde(default = "default_job_title")]
    pub job_title: String,
    #[serde(default = "default_company")]
    pub company_name: String,
    #[serde(default)]
    pub job_url: String,
    #[serde(default)]
    pub resume_suggestions: Vec<String>,
    pub cover_letter: String,
    #[serde(default)]
    pub match_score: u8,
}

/// Where one job ended up in this run.
#[derive(Debug, Clone, Serialize)]
pub struct JobOutcome {
    pub job_id: String,
    pub platform: String,
    pub title: String,
    pub company: String,
    pub status: JobStatus,
    pub score: Option<u8>,
    pub error: Option<JobError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchReport {
    pub search_id: Uuid,
    pub state: RunState,
    pub keywords: String,
    pub fetched: usize,
    pub new_jobs: usize,
    /// Known jobs still Pending from an interrupted run, picked up again.
    pub resumed: usize,
    pub duplicates: usize,
    pub scored: usize,
    pub tailored: usize,
    pub notified: usize,
    pub failed: usize,
    pub source_errors: Vec<SourceError>,
    pub outcomes: Vec<JobOutcome>,
    /// Why the run failed as a whole.
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SearchReport {
    pub fn new(search_id: Uuid, keywords: String) -> Self {
        Self {
            search_id,
            state: RunState::Started,
            keywords,
            fetched: 0,
            new_jobs: 0,
            resumed: 0,
            duplicates: 0,
            scored: 0,
            tailored: 0,
            notified: 0,
            failed: 0,
            source_errors: Vec::new(),
            outcomes: Vec::new(),
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Email notifications are not configured")]
    NotifierDisabled,

    #[error("{0}")]
    Notify(#[from] NotifyError),

    /// The AI model call behind a stand-alone score or tailor request failed.
    #[error("{message}")]
    Upstream { kind: ErrorKind, message: String },
}

impl PipelineError {
    pub fn upstream<E: Classify + std::fmt::Display>(error: &E) -> Self {
        PipelineError::Upstream {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

impl From<StoreError> for PipelineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => PipelineError::NotFound(id),
            StoreError::Unavailable(msg) => PipelineError::StoreUnavailable(msg),
            other => PipelineError::Conflict(other.to_string()),
        }
    }
}
