use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{apply_transition, JobFilter, JobStore, StatusPayload, StoreError, UpsertOutcome};
use crate::models::job::{JobRecord, JobStatus, NewJob};

/// Process-local store used when no database is configured, and in tests.
#[derive(Default)]
pub struct MemoryJobStore {
    records: RwLock<HashMap<String, JobRecord>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn upsert(&self, job: NewJob) -> Result<UpsertOutcome, StoreError> {
        let key = job.key();
        let mut records = self.records.write().await;
        if let Some(existing) = records.get(&key) {
            return Ok(UpsertOutcome::AlreadyKnown(existing.clone()));
        }
        let record = JobRecord::from_new(job);
        records.insert(key, record.clone());
        Ok(UpsertOutcome::New(record))
    }

    async fn get(&self, id: &str) -> Result<Option<JobRecord>, StoreError> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn list(&self, filter: &JobFilter) -> Result<Vec<JobRecord>, StoreError> {
        let records = self.records.read().await;
        let mut matched: Vec<JobRecord> =
            records.values().filter(|r| filter.matches(r)).cloned().collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        if let Some(limit) = filter.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    async fn update_status(
        &self,
        id: &str,
        status: JobStatus,
        payload: StatusPayload,
    ) -> Result<JobRecord, StoreError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        // Work on a copy so a rejected transition leaves the stored record untouched.
        let mut updated = record.clone();
        apply_transition(&mut updated, status, payload)?;
        *record = updated.clone();
        Ok(updated)
    }

    async fn record_notify_failure(
        &self,
        id: &str,
        message: &str,
    ) -> Result<JobRecord, StoreError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        record.notify_error = Some(message.to_string());
        record.updated_at = chrono::Utc::now();
        Ok(record.clone())
    }
}
