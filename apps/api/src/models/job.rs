use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a job record.
///
/// Records only move forward: Pending → Scored → Tailored → Notified.
/// Failed is terminal and reachable from any non-terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Scored,
    Tailored,
    Notified,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Scored => "scored",
            JobStatus::Tailored => "tailored",
            JobStatus::Notified => "notified",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Notified | JobStatus::Failed)
    }

    /// Whether `self → next` is a legal transition.
    ///
    /// Scored → Scored is allowed so a re-score overwrites the previous result.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, next),
            (Pending, Scored)
                | (Scored, Scored)
                | (Scored, Tailored)
                | (Tailored, Notified)
                | (Pending, Failed)
                | (Scored, Failed)
                | (Tailored, Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "scored" => Ok(JobStatus::Scored),
            "tailored" => Ok(JobStatus::Tailored),
            "notified" => Ok(JobStatus::Notified),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status '{other}'")),
        }
    }
}

/// Builds the deterministic store key for a listing.
pub fn job_key(platform: &str, external_id: &str) -> String {
    format!("{}:{}", platform.trim().to_lowercase(), external_id.trim())
}

/// A normalized listing produced by a job source, not yet persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewJob {
    pub platform: String,
    pub external_id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub description: String,
    pub url: String,
    pub date_posted: String,
    pub search_id: Option<Uuid>,
}

impl NewJob {
    pub fn key(&self) -> String {
        job_key(&self.platform, &self.external_id)
    }
}

/// AI-assigned match between a resume and a job. Score is always within 0..=100.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub score: u8,
    pub rationale: String,
    pub missing_skills: Vec<String>,
}

/// Resume suggestions (in order) plus a cover letter body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TailoredOutput {
    pub suggestions: Vec<String>,
    pub cover_letter: String,
}

/// A persisted job listing and everything the pipeline has learned about it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub platform: String,
    pub external_id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub description: String,
    pub url: String,
    pub date_posted: String,
    pub status: JobStatus,
    pub match_score: Option<u8>,
    pub rationale: Option<String>,
    pub missing_skills: Vec<String>,
    pub suggestions: Vec<String>,
    pub cover_letter: Option<String>,
    pub error: Option<String>,
    pub notify_error: Option<String>,
    pub search_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// Fresh Pending record for a newly ingested listing.
    pub fn from_new(job: NewJob) -> Self {
        let now = Utc::now();
        Self {
            id: job.key(),
            platform: job.platform,
            external_id: job.external_id,
            title: job.title,
            company: job.company,
            location: job.location,
            description: job.description,
            url: job.url,
            date_posted: job.date_posted,
            status: JobStatus::Pending,
            match_score: None,
            rationale: None,
            missing_skills: Vec::new(),
            suggestions: Vec::new(),
            cover_letter: None,
            error: None,
            notify_error: None,
            search_id: job.search_id,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn match_result(&self) -> Option<MatchResult> {
        self.match_score.map(|score| MatchResult {
            score,
            rationale: self.rationale.clone().unwrap_or_default(),
            missing_skills: self.missing_skills.clone(),
        })
    }
}
