use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::debug;
use uuid::Uuid;

use super::{apply_transition, JobFilter, JobStore, StatusPayload, StoreError, UpsertOutcome};
use crate::models::job::{JobRecord, JobStatus, NewJob};

const JOB_COLUMNS: &str = "id, platform, external_id, title, company, location, description, \
     url, date_posted, status, match_score, rationale, missing_skills, suggestions, \
     cover_letter, error, notify_error, search_id, created_at, updated_at";

#[derive(Debug, FromRow)]
struct JobRow {
    id: String,
    platform: String,
    external_id: String,
    title: String,
    company: String,
    location: String,
    description: String,
    url: String,
    date_posted: String,
    status: String,
    match_score: Option<i16>,
    rationale: Option<String>,
    missing_skills: Vec<String>,
    suggestions: Vec<String>,
    cover_letter: Option<String>,
    error: Option<String>,
    notify_error: Option<String>,
    search_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<JobRow> for JobRecord {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<JobStatus>()
            .map_err(StoreError::Unavailable)?;
        let match_score = row
            .match_score
            .map(|s| {
                u8::try_from(s)
                    .map_err(|_| StoreError::Unavailable(format!("stored score {s} out of range")))
            })
            .transpose()?;

        Ok(JobRecord {
            id: row.id,
            platform: row.platform,
            external_id: row.external_id,
            title: row.title,
            company: row.company,
            location: row.location,
            description: row.description,
            url: row.url,
            date_posted: row.date_posted,
            status,
            match_score,
            rationale: row.rationale,
            missing_skills: row.missing_skills,
            suggestions: row.suggestions,
            cover_letter: row.cover_letter,
            error: row.error,
            notify_error: row.notify_error,
            search_id: row.search_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// PostgreSQL-backed job store.
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, id: &str) -> Result<Option<JobRecord>, StoreError> {
        let row = sqlx::query_as::<_, JobRow>(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(JobRecord::try_from).transpose()
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn upsert(&self, job: NewJob) -> Result<UpsertOutcome, StoreError> {
        let record = JobRecord::from_new(job);

        // ON CONFLICT DO NOTHING keeps concurrent ingests of the same key down to one row.
        let inserted = sqlx::query_as::<_, JobRow>(&format!(
            "INSERT INTO jobs (id, platform, external_id, title, company, location, description, \
             url, date_posted, status, search_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12) \
             ON CONFLICT (id) DO NOTHING \
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(&record.id)
        .bind(&record.platform)
        .bind(&record.external_id)
        .bind(&record.title)
        .bind(&record.company)
        .bind(&record.location)
        .bind(&record.description)
        .bind(&record.url)
        .bind(&record.date_posted)
        .bind(JobStatus::Pending.as_str())
        .bind(record.search_id)
        .bind(record.created_at)
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some(row) => Ok(UpsertOutcome::New(JobRecord::try_from(row)?)),
            None => {
                debug!("Job {} already known", record.id);
                let existing = self
                    .fetch(&record.id)
                    .await?
                    .ok_or_else(|| StoreError::NotFound(record.id.clone()))?;
                Ok(UpsertOutcome::AlreadyKnown(existing))
            }
        }
    }

    async fn get(&self, id: &str) -> Result<Option<JobRecord>, StoreError> {
        self.fetch(id).await
    }

    async fn list(&self, filter: &JobFilter) -> Result<Vec<JobRecord>, StoreError> {
        let rows = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs \
             WHERE ($1::text IS NULL OR status = $1) \
               AND ($2::text IS NULL OR LOWER(platform) = LOWER($2)) \
               AND ($3::smallint IS NULL OR match_score >= $3) \
               AND ($4::uuid IS NULL OR search_id = $4) \
             ORDER BY created_at DESC, id ASC \
             LIMIT $5"
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.platform.as_deref())
        .bind(filter.min_score.map(i16::from))
        .bind(filter.search_id)
        .bind(filter.limit.map(|l| i64::try_from(l).unwrap_or(i64::MAX)))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(JobRecord::try_from).collect()
    }

    async fn update_status(
        &self,
        id: &str,
        status: JobStatus,
        payload: StatusPayload,
    ) -> Result<JobRecord, StoreError> {
        let current = self
            .fetch(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let from = current.status;

        let mut updated = current;
        apply_transition(&mut updated, status, payload)?;

        // Guarded on the status we read so a concurrent writer cannot be overwritten.
        let result = sqlx::query(
            "UPDATE jobs SET status = $3, match_score = $4, rationale = $5, \
             missing_skills = $6, suggestions = $7, cover_letter = $8, error = $9, \
             notify_error = $10, updated_at = $11 \
             WHERE id = $1 AND status = $2",
        )
        .bind(id)
        .bind(from.as_str())
        .bind(updated.status.as_str())
        .bind(updated.match_score.map(i16::from))
        .bind(&updated.rationale)
        .bind(&updated.missing_skills)
        .bind(&updated.suggestions)
        .bind(&updated.cover_letter)
        .bind(&updated.error)
        .bind(&updated.notify_error)
        .bind(updated.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let now = self
                .fetch(id)
                .await?
                .map(|r| r.status)
                .unwrap_or(from);
            return Err(StoreError::InvalidTransition { from: now, to: status });
        }
        Ok(updated)
    }

    async fn record_notify_failure(
        &self,
        id: &str,
        message: &str,
    ) -> Result<JobRecord, StoreError> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "UPDATE jobs SET notify_error = $2, updated_at = NOW() WHERE id = $1 \
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(id)
        .bind(message)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        JobRecord::try_from(row)
    }
}
