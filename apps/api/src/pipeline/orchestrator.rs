use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::registry::SearchTracker;
use super::{
    EmailRequest, ErrorKind, JobError, JobOutcome, PipelineError, RunState, ScoreRequest,
    SearchReport, SearchRequest, SingleJobRequest, Stage, TailorRequest,
};
use crate::jobs::{JobStore, StatusPayload, StoreError, UpsertOutcome};
use crate::llm_client::retry::RetryPolicy;
use crate::llm_client::TextModel;
use crate::models::job::{JobRecord, JobStatus, MatchResult, NewJob, TailoredOutput};
use crate::models::resume::ResumeProfile;
use crate::notify::Notifier;
use crate::scoring::Scorer;
use crate::settings::{PipelineSettings, SettingsHandle};
use crate::sources::{
    fetch_all, SearchParams, SourceSet, DEFAULT_HOURS_OLD, DEFAULT_PLATFORMS,
    DEFAULT_RESULTS_PER_SITE,
};
use crate::tailoring::Tailor;

/// Characters of the resume used as search keywords when none are given.
const KEYWORD_FALLBACK_CHARS: usize = 80;
const MAX_RESULTS_PER_SITE: u32 = 100;

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub default_location: String,
    pub default_results_per_site: u32,
    pub default_hours_old: u32,
    /// Upper bound on jobs processed at once within a stage.
    pub max_concurrency: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            default_location: "Remote".to_string(),
            default_results_per_site: DEFAULT_RESULTS_PER_SITE,
            default_hours_old: DEFAULT_HOURS_OLD,
            max_concurrency: 5,
        }
    }
}

/// A validated search, ready to run in the background.
#[derive(Debug, Clone)]
pub struct PreparedSearch {
    pub params: SearchParams,
    resume: Arc<ResumeProfile>,
    recipient: Option<String>,
    auto_pipeline: bool,
}

/// Everything a job task needs, fixed for the duration of one run.
struct RunInputs {
    settings: Arc<PipelineSettings>,
    resume: Arc<ResumeProfile>,
    recipient: Option<String>,
}

enum StepOutcome {
    /// The job went through the stage.
    Done(JobRecord),
    /// The job failed this stage; siblings carry on.
    JobFailed(JobRecord, JobError),
    /// Not started because the run was cancelled or aborted.
    Skipped,
    /// The store is unreachable; the run stops.
    StoreDown(String),
}

/// Per-run bookkeeping, in ingest order.
#[derive(Default)]
struct Outcomes {
    order: Vec<String>,
    by_id: HashMap<String, JobOutcome>,
}

impl Outcomes {
    fn record(&mut self, job: &JobRecord, error: Option<JobError>) {
        let entry = self.by_id.entry(job.id.clone()).or_insert_with(|| {
            self.order.push(job.id.clone());
            JobOutcome {
                job_id: job.id.clone(),
                platform: job.platform.clone(),
                title: job.title.clone(),
                company: job.company.clone(),
                status: job.status,
                score: job.match_score,
                error: None,
            }
        });
        entry.status = job.status;
        entry.score = job.match_score;
        if error.is_some() {
            entry.error = error;
        }
    }

    fn into_vec(mut self) -> Vec<JobOutcome> {
        self.order
            .iter()
            .filter_map(|id| self.by_id.remove(id))
            .collect()
    }
}

pub struct Pipeline {
    store: Arc<dyn JobStore>,
    sources: SourceSet,
    scorer: Scorer,
    tailor: Tailor,
    notifier: Option<Notifier>,
    settings: Arc<SettingsHandle>,
    resume: Option<ResumeProfile>,
    options: PipelineOptions,
    /// Bounds job work across every run and single-job request.
    gate: Arc<Semaphore>,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn JobStore>,
        sources: SourceSet,
        model: Arc<dyn TextModel>,
        policy: RetryPolicy,
        settings: Arc<SettingsHandle>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            store,
            sources,
            scorer: Scorer::new(model.clone(), policy.clone()),
            tailor: Tailor::new(model, policy),
            notifier: None,
            settings,
            resume: None,
            gate: Arc::new(Semaphore::new(options.max_concurrency.max(1))),
            options,
        }
    }

    pub fn with_notifier(mut self, notifier: Option<Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Resume used when a request does not carry its own.
    pub fn with_resume(mut self, resume: Option<ResumeProfile>) -> Self {
        self.resume = resume.filter(|r| !r.is_empty());
        self
    }

    pub fn notifications_enabled(&self) -> bool {
        self.notifier.is_some()
    }

    fn resolve_resume(
        &self,
        text: Option<String>,
        applicant_name: Option<String>,
    ) -> Result<Arc<ResumeProfile>, PipelineError> {
        let name = applicant_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        if let Some(text) = text.filter(|t| !t.trim().is_empty()) {
            let name = name
                .or_else(|| self.resume.as_ref().map(|r| r.applicant_name.clone()))
                .unwrap_or_default();
            return Ok(Arc::new(ResumeProfile::new(name, text.trim())));
        }
        match &self.resume {
            Some(default) => {
                let mut resume = default.clone();
                if let Some(name) = name {
                    resume.applicant_name = name;
                }
                Ok(Arc::new(resume))
            }
            None => Err(PipelineError::InvalidRequest(
                "resume text is required: pass resume_text or configure RESUME_PATH".to_string(),
            )),
        }
    }

    /// Validates a search request and fills in defaults.
    pub fn prepare(&self, request: SearchRequest) -> Result<PreparedSearch, PipelineError> {
        let has_keywords = request
            .keywords
            .as_deref()
            .is_some_and(|k| !k.trim().is_empty());
        let has_resume = request
            .resume_text
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty())
            || self.resume.is_some();
        if !has_keywords && !has_resume {
            return Err(PipelineError::InvalidRequest(
                "keywords or resume text are required".to_string(),
            ));
        }

        let resume = self.resolve_resume(request.resume_text, request.applicant_name)?;
        let keywords = match request.keywords.map(|k| k.trim().to_string()) {
            Some(k) if !k.is_empty() => k,
            _ => resume.snippet(KEYWORD_FALLBACK_CHARS).trim().to_string(),
        };

        let results_per_site = request
            .results_per_site
            .unwrap_or(self.options.default_results_per_site);
        if results_per_site == 0 || results_per_site > MAX_RESULTS_PER_SITE {
            return Err(PipelineError::InvalidRequest(format!(
                "results_per_site must be between 1 and {MAX_RESULTS_PER_SITE}"
            )));
        }

        let platforms = match request.platforms {
            Some(p) if !p.is_empty() => p,
            _ => DEFAULT_PLATFORMS.iter().map(|p| p.to_string()).collect(),
        };
        let location = request
            .location
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| self.options.default_location.clone());

        Ok(PreparedSearch {
            params: SearchParams {
                keywords,
                location,
                platforms,
                results_per_site,
                hours_old: request.hours_old.unwrap_or(self.options.default_hours_old),
            },
            resume,
            recipient: request.recipient,
            auto_pipeline: request.auto_pipeline,
        })
    }

    /// Runs a prepared search to completion and records the final report on `tracker`.
    pub async fn run_search(
        self: &Arc<Self>,
        search: PreparedSearch,
        tracker: &SearchTracker,
    ) -> SearchReport {
        let mut report = SearchReport::new(tracker.id, search.params.keywords.clone());
        let inputs = Arc::new(RunInputs {
            settings: self.settings.snapshot(),
            resume: search.resume.clone(),
            recipient: search.recipient.clone(),
        });
        info!(
            "Search {} started: '{}' on {:?} (threshold {})",
            tracker.id, search.params.keywords, search.params.platforms, inputs.settings.match_threshold
        );

        let mut outcomes = Outcomes::default();
        let result = self
            .drive(&search, &inputs, tracker, &mut report, &mut outcomes)
            .await;
        report.outcomes = outcomes.into_vec();
        tally(&mut report);

        match result {
            Ok(state) => report.state = state,
            Err(message) => {
                error!("Search {} failed: {message}", tracker.id);
                report.state = RunState::Failed;
                report.error = Some(message);
            }
        }
        let processed = report.new_jobs + report.resumed;
        if report.state == RunState::Completed && processed > 0 && report.failed == processed {
            report.state = RunState::Failed;
            report.error = Some(format!("all {processed} jobs failed"));
        }
        report.finished_at = Some(Utc::now());

        info!(
            "Search {} {:?}: fetched={} new={} scored={} tailored={} notified={} failed={}",
            tracker.id,
            report.state,
            report.fetched,
            report.new_jobs,
            report.scored,
            report.tailored,
            report.notified,
            report.failed
        );
        tracker.finish(report.clone());
        report
    }

    async fn drive(
        self: &Arc<Self>,
        search: &PreparedSearch,
        inputs: &Arc<RunInputs>,
        tracker: &SearchTracker,
        report: &mut SearchReport,
        outcomes: &mut Outcomes,
    ) -> Result<RunState, String> {
        let cancel = &tracker.cancel;
        if cancel.is_cancelled() {
            return Ok(RunState::Cancelled);
        }

        // Scraping
        tracker.set_state(RunState::Scraping);
        let fetched = fetch_all(&self.sources, &search.params).await;
        report.fetched = fetched.listings.len();
        report.source_errors = fetched.errors.clone();
        if fetched.all_failed() {
            let reasons: Vec<String> = fetched.errors.iter().map(|e| e.to_string()).collect();
            return Err(format!("all sources failed: {}", reasons.join("; ")));
        }

        // Dedupe
        let mut fresh = Vec::new();
        for mut listing in fetched.listings {
            listing.search_id = Some(tracker.id);
            match self.store.upsert(listing).await {
                Ok(UpsertOutcome::New(record)) => {
                    outcomes.record(&record, None);
                    fresh.push(record);
                }
                // Left Pending by an interrupted run.
                Ok(UpsertOutcome::AlreadyKnown(record)) if record.status == JobStatus::Pending => {
                    outcomes.record(&record, None);
                    report.resumed += 1;
                    fresh.push(record);
                }
                Ok(UpsertOutcome::AlreadyKnown(_)) => report.duplicates += 1,
                Err(StoreError::Unavailable(msg)) => {
                    return Err(format!("job store unavailable: {msg}"))
                }
                Err(e) => warn!("Skipping listing: {e}"),
            }
        }
        report.new_jobs = fresh.len() - report.resumed;
        info!(
            "Search {}: {} new jobs, {} resumed, {} already known",
            tracker.id, report.new_jobs, report.resumed, report.duplicates
        );
        if fresh.is_empty() {
            return Ok(RunState::Completed);
        }

        // Scoring
        if cancel.is_cancelled() {
            return Ok(RunState::Cancelled);
        }
        tracker.set_state(RunState::Scoring);
        let scored = self
            .run_stage(fresh, cancel, outcomes, {
                let inputs = inputs.clone();
                move |this, job| {
                    let inputs = inputs.clone();
                    async move { this.score_step(job, &inputs).await }
                }
            })
            .await?;
        if cancel.is_cancelled() {
            return Ok(RunState::Cancelled);
        }
        if !search.auto_pipeline {
            return Ok(RunState::Completed);
        }

        // Tailoring
        let matches: Vec<JobRecord> = scored
            .into_iter()
            .filter(|job| job.match_score.is_some_and(|s| inputs.settings.is_match(s)))
            .collect();
        if matches.is_empty() {
            return Ok(RunState::Completed);
        }
        tracker.set_state(RunState::Tailoring);
        let tailored = self
            .run_stage(matches, cancel, outcomes, {
                let inputs = inputs.clone();
                move |this, job| {
                    let inputs = inputs.clone();
                    async move { this.tailor_step(job, &inputs).await }
                }
            })
            .await?;
        if cancel.is_cancelled() {
            return Ok(RunState::Cancelled);
        }

        // Notifying
        if tailored.is_empty() || self.notifier.is_none() {
            return Ok(RunState::Completed);
        }
        tracker.set_state(RunState::Notifying);
        self.run_stage(tailored, cancel, outcomes, {
            let inputs = inputs.clone();
            move |this, job| {
                let inputs = inputs.clone();
                async move { this.notify_step(job, &inputs).await }
            }
        })
        .await?;
        if cancel.is_cancelled() {
            return Ok(RunState::Cancelled);
        }

        Ok(RunState::Completed)
    }

    /// Runs `step` over `jobs` with bounded concurrency. Returns the jobs that made it
    /// through, or an error when the store went down.
    async fn run_stage<F, Fut>(
        self: &Arc<Self>,
        jobs: Vec<JobRecord>,
        cancel: &CancellationToken,
        outcomes: &mut Outcomes,
        step: F,
    ) -> Result<Vec<JobRecord>, String>
    where
        F: Fn(Arc<Self>, JobRecord) -> Fut,
        Fut: Future<Output = StepOutcome> + Send + 'static,
    {
        let abort = cancel.child_token();
        let mut tasks = JoinSet::new();
        let mut results = Vec::new();

        let mut pending = jobs.into_iter();
        while let Some(job) = pending.next() {
            let permit = tokio::select! {
                biased;
                _ = abort.cancelled() => None,
                permit = self.gate.clone().acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                results.push(StepOutcome::Skipped);
                results.extend(pending.by_ref().map(|_| StepOutcome::Skipped));
                break;
            };

            let fut = step(self.clone(), job);
            let abort = abort.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let outcome = fut.await;
                if matches!(outcome, StepOutcome::StoreDown(_)) {
                    abort.cancel();
                }
                outcome
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => results.push(outcome),
                Err(e) => error!("Job task failed to complete: {e}"),
            }
        }

        let mut advanced = Vec::new();
        let mut store_down = None;
        for outcome in results {
            match outcome {
                StepOutcome::Done(job) => {
                    outcomes.record(&job, None);
                    advanced.push(job);
                }
                StepOutcome::JobFailed(job, err) => outcomes.record(&job, Some(err)),
                StepOutcome::Skipped => {}
                StepOutcome::StoreDown(msg) => store_down = Some(msg),
            }
        }
        match store_down {
            Some(msg) => Err(format!("job store unavailable: {msg}")),
            None => Ok(advanced),
        }
    }

    async fn score_step(&self, job: JobRecord, inputs: &RunInputs) -> StepOutcome {
        match self.scorer.score(&job, &inputs.resume, &inputs.settings).await {
            Ok(result) => {
                let score = result.score;
                match self
                    .store
                    .update_status(&job.id, JobStatus::Scored, StatusPayload::Score(result))
                    .await
                {
                    Ok(record) => {
                        info!("Scored {} ({} at {}): {score}", record.id, record.title, record.company);
                        StepOutcome::Done(record)
                    }
                    Err(e) => store_failure(job, Stage::Score, e),
                }
            }
            Err(e) => {
                warn!("Scoring {} failed: {e}", job.id);
                self.fail_job(job, JobError::new(Stage::Score, &e)).await
            }
        }
    }

    async fn tailor_step(&self, job: JobRecord, inputs: &RunInputs) -> StepOutcome {
        let Some(matched) = job.match_result() else {
            let err = JobError {
                stage: Stage::Tailor,
                kind: ErrorKind::Transition,
                message: "job has no score".to_string(),
            };
            return StepOutcome::JobFailed(job, err);
        };

        match self
            .tailor
            .tailor(&job, &inputs.resume, &matched, &inputs.settings)
            .await
        {
            Ok(output) => match self
                .store
                .update_status(&job.id, JobStatus::Tailored, StatusPayload::Tailoring(output))
                .await
            {
                Ok(record) => {
                    info!("Tailored {}", record.id);
                    StepOutcome::Done(record)
                }
                Err(e) => store_failure(job, Stage::Tailor, e),
            },
            Err(e) => {
                warn!("Tailoring {} failed: {e}", job.id);
                self.fail_job(job, JobError::new(Stage::Tailor, &e)).await
            }
        }
    }

    async fn notify_step(&self, job: JobRecord, inputs: &RunInputs) -> StepOutcome {
        let Some(notifier) = &self.notifier else {
            return StepOutcome::Skipped;
        };

        match notifier
            .notify(&job, &inputs.resume.applicant_name, inputs.recipient.as_deref())
            .await
        {
            Ok(()) => match self
                .store
                .update_status(&job.id, JobStatus::Notified, StatusPayload::Delivered)
                .await
            {
                Ok(record) => StepOutcome::Done(record),
                Err(e) => store_failure(job, Stage::Notify, e),
            },
            Err(e) => {
                warn!("Notifying {} failed, kept for manual retry: {e}", job.id);
                let err = JobError::new(Stage::Notify, &e);
                match self.store.record_notify_failure(&job.id, &e.to_string()).await {
                    Ok(record) => StepOutcome::JobFailed(record, err),
                    Err(StoreError::Unavailable(msg)) => StepOutcome::StoreDown(msg),
                    Err(_) => StepOutcome::JobFailed(job, err),
                }
            }
        }
    }

    /// Marks the job Failed with the stage error attached.
    async fn fail_job(&self, job: JobRecord, err: JobError) -> StepOutcome {
        let reason = format!("{:?} failed ({:?}): {}", err.stage, err.kind, err.message);
        match self
            .store
            .update_status(&job.id, JobStatus::Failed, StatusPayload::Failure(reason))
            .await
        {
            Ok(record) => StepOutcome::JobFailed(record, err),
            Err(StoreError::Unavailable(msg)) => StepOutcome::StoreDown(msg),
            Err(e) => {
                warn!("Could not mark {} failed: {e}", job.id);
                StepOutcome::JobFailed(job, err)
            }
        }
    }

    /// Scores one hand-supplied job and, if it matches, tailors and notifies.
    pub async fn run_single(
        &self,
        request: SingleJobRequest,
    ) -> Result<JobOutcome, PipelineError> {
        if request.title.trim().is_empty()
            || request.company.trim().is_empty()
            || request.description.trim().is_empty()
        {
            return Err(PipelineError::InvalidRequest(
                "title, company and description are required".to_string(),
            ));
        }
        let resume = self.resolve_resume(request.resume_text, request.applicant_name)?;
        let inputs = RunInputs {
            settings: self.settings.snapshot(),
            resume,
            recipient: request.recipient,
        };

        let listing = NewJob {
            platform: "manual".to_string(),
            external_id: Uuid::new_v4().to_string(),
            title: request.title.trim().to_string(),
            company: request.company.trim().to_string(),
            location: request.location.trim().to_string(),
            description: request.description.trim().to_string(),
            url: request.url.trim().to_string(),
            date_posted: Utc::now().format("%Y-%m-%d").to_string(),
            search_id: None,
        };
        let record = self.store.upsert(listing).await?.record().clone();
        info!("Manual pipeline started for {}", record.id);
        let _permit = self.gate.acquire().await.ok();

        let id = record.id.clone();
        let mut outcomes = Outcomes::default();
        outcomes.record(&record, None);

        let single = |outcomes: Outcomes| {
            outcomes
                .into_vec()
                .pop()
                .ok_or_else(|| PipelineError::NotFound(id.clone()))
        };

        let Some(job) = absorb(self.score_step(record, &inputs).await, &mut outcomes)? else {
            return single(outcomes);
        };
        if !job.match_score.is_some_and(|s| inputs.settings.is_match(s)) {
            return single(outcomes);
        }
        let Some(job) = absorb(self.tailor_step(job, &inputs).await, &mut outcomes)? else {
            return single(outcomes);
        };
        if self.notifier.is_some() {
            absorb(self.notify_step(job, &inputs).await, &mut outcomes)?;
        }
        single(outcomes)
    }

    /// Scores a pasted job description without storing anything.
    pub async fn score_only(&self, request: ScoreRequest) -> Result<MatchResult, PipelineError> {
        require("job_description", &request.job_description)?;
        let resume = self.resolve_resume(request.resume, None)?;
        let settings = self.settings.snapshot();
        let job = unsaved_record(
            &request.job_title,
            &request.company_name,
            &request.job_description,
            "",
        );

        let _permit = self.gate.acquire().await.ok();
        self.scorer
            .score(&job, &resume, &settings)
            .await
            .map_err(|e| PipelineError::upstream(&e))
    }

    /// Produces suggestions and a cover letter for a pasted job description.
    pub async fn tailor_only(&self, request: TailorRequest) -> Result<TailoredOutput, PipelineError> {
        require("job_description", &request.job_description)?;
        let resume = self.resolve_resume(request.resume, request.applicant_name)?;
        let settings = self.settings.snapshot();
        let job = unsaved_record(
            &request.job_title,
            &request.company_name,
            &request.job_description,
            "",
        );
        let matched = MatchResult {
            score: 0,
            rationale: String::new(),
            missing_skills: request.missing_skills,
        };

        let _permit = self.gate.acquire().await.ok();
        self.tailor
            .tailor(&job, &resume, &matched, &settings)
            .await
            .map_err(|e| PipelineError::upstream(&e))
    }

    /// Mails caller-supplied documents. Returns the recipient.
    pub async fn send_email(&self, request: EmailRequest) -> Result<String, PipelineError> {
        let notifier = self
            .notifier
            .as_ref()
            .ok_or(PipelineError::NotifierDisabled)?;
        require("recipient_email", &request.recipient_email)?;
        require("cover_letter", &request.cover_letter)?;
        if request.match_score > 100 {
            return Err(PipelineError::InvalidRequest(
                "match_score must be between 0 and 100".to_string(),
            ));
        }

        let mut job = unsaved_record(
            &request.job_title,
            &request.company_name,
            "",
            &request.job_url,
        );
        job.status = JobStatus::Tailored;
        job.match_score = Some(request.match_score);
        job.suggestions = request
            .resume_suggestions
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        job.cover_letter = Some(request.cover_letter.trim().to_string());

        let applicant = request
            .applicant_name
            .or_else(|| self.resume.as_ref().map(|r| r.applicant_name.clone()))
            .unwrap_or_default();
        let recipient = request.recipient_email.trim().to_string();
        notifier.notify(&job, &applicant, Some(&recipient)).await?;
        info!("Sent documents for {} at {} to {recipient}", job.title, job.company);
        Ok(recipient)
    }

    /// Resends the match email for a Tailored job.
    pub async fn retry_notification(
        &self,
        id: &str,
        recipient: Option<&str>,
    ) -> Result<JobRecord, PipelineError> {
        let notifier = self
            .notifier
            .as_ref()
            .ok_or(PipelineError::NotifierDisabled)?;
        let job = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(id.to_string()))?;
        if job.status != JobStatus::Tailored {
            return Err(PipelineError::Conflict(format!(
                "job {id} is {}, only tailored jobs can be notified",
                job.status
            )));
        }

        let applicant = self
            .resume
            .as_ref()
            .map(|r| r.applicant_name.as_str())
            .unwrap_or_default();
        match notifier.notify(&job, applicant, recipient).await {
            Ok(()) => {
                let record = self
                    .store
                    .update_status(id, JobStatus::Notified, StatusPayload::Delivered)
                    .await?;
                info!("Manual notification sent for {id}");
                Ok(record)
            }
            Err(e) => {
                warn!("Manual notification for {id} failed: {e}");
                self.store.record_notify_failure(id, &e.to_string()).await?;
                Err(e.into())
            }
        }
    }
}

fn require(field: &str, value: &str) -> Result<(), PipelineError> {
    if value.trim().is_empty() {
        return Err(PipelineError::InvalidRequest(format!("{field} is required")));
    }
    Ok(())
}

/// A record for the stand-alone endpoints; never written to the store.
fn unsaved_record(title: &str, company: &str, description: &str, url: &str) -> JobRecord {
    JobRecord::from_new(NewJob {
        platform: "manual".to_string(),
        external_id: Uuid::new_v4().to_string(),
        title: title.trim().to_string(),
        company: company.trim().to_string(),
        location: String::new(),
        description: description.trim().to_string(),
        url: url.trim().to_string(),
        date_posted: Utc::now().format("%Y-%m-%d").to_string(),
        search_id: None,
    })
}

/// A store error during a stage: fatal when the store is down, otherwise the job's.
fn store_failure(job: JobRecord, stage: Stage, e: StoreError) -> StepOutcome {
    match e {
        StoreError::Unavailable(msg) => StepOutcome::StoreDown(msg),
        other => {
            warn!("Store rejected {:?} update for {}: {other}", stage, job.id);
            let err = JobError::new(stage, &other);
            StepOutcome::JobFailed(job, err)
        }
    }
}

/// Folds a single-job step into `outcomes`; `None` means the job stops here.
fn absorb(step: StepOutcome, outcomes: &mut Outcomes) -> Result<Option<JobRecord>, PipelineError> {
    match step {
        StepOutcome::Done(job) => {
            outcomes.record(&job, None);
            Ok(Some(job))
        }
        StepOutcome::JobFailed(job, err) => {
            outcomes.record(&job, Some(err));
            Ok(None)
        }
        StepOutcome::Skipped => Ok(None),
        StepOutcome::StoreDown(msg) => Err(PipelineError::StoreUnavailable(msg)),
    }
}

fn tally(report: &mut SearchReport) {
    let outcomes = &report.outcomes;
    report.scored = outcomes.iter().filter(|o| o.score.is_some()).count();
    report.tailored = outcomes
        .iter()
        .filter(|o| matches!(o.status, JobStatus::Tailored | JobStatus::Notified))
        .count();
    report.notified = outcomes
        .iter()
        .filter(|o| o.status == JobStatus::Notified)
        .count();
    report.failed = outcomes
        .iter()
        .filter(|o| o.status == JobStatus::Failed)
        .count();
}
