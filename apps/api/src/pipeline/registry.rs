use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use super::{RunState, SearchReport};

/// How long a finished search stays queryable.
pub const FINISHED_RETENTION: Duration = Duration::from_secs(60 * 60);
/// Finished searches kept at most, newest first.
pub const MAX_FINISHED: usize = 200;

/// Live handle on one background search.
pub struct SearchTracker {
    pub id: Uuid,
    pub cancel: CancellationToken,
    started_at: DateTime<Utc>,
    state: Mutex<RunState>,
    report: Mutex<Option<SearchReport>>,
    finished_at: Mutex<Option<Instant>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchStatus {
    pub search_id: Uuid,
    pub state: RunState,
    pub started_at: DateTime<Utc>,
    pub report: Option<SearchReport>,
}

impl SearchTracker {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            cancel: CancellationToken::new(),
            started_at: Utc::now(),
            state: Mutex::new(RunState::Started),
            report: Mutex::new(None),
            finished_at: Mutex::new(None),
        }
    }

    pub fn set_state(&self, state: RunState) {
        let mut guard = match self.state.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        // A finished run stays finished.
        if !guard.is_finished() {
            *guard = state;
        }
    }

    pub fn state(&self) -> RunState {
        match self.state.lock() {
            Ok(g) => *g,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn finish(&self, report: SearchReport) {
        self.set_state(report.state);
        let mut guard = match self.report.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(report);
        let mut finished_at = match self.finished_at.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        *finished_at = Some(Instant::now());
    }

    fn finished_at(&self) -> Option<Instant> {
        match self.finished_at.lock() {
            Ok(g) => *g,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn status(&self) -> SearchStatus {
        let report = match self.report.lock() {
            Ok(g) => g.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        SearchStatus {
            search_id: self.id,
            state: self.state(),
            started_at: self.started_at,
            report,
        }
    }
}

/// In-process index of running and recently finished searches.
///
/// Finished searches are dropped once older than `retention`, and beyond
/// `max_finished` the oldest go first. Running searches are never evicted.
pub struct SearchRegistry {
    searches: RwLock<HashMap<Uuid, Arc<SearchTracker>>>,
    retention: Duration,
    max_finished: usize,
}

impl Default for SearchRegistry {
    fn default() -> Self {
        Self::with_limits(FINISHED_RETENTION, MAX_FINISHED)
    }
}

impl SearchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(retention: Duration, max_finished: usize) -> Self {
        Self {
            searches: RwLock::new(HashMap::new()),
            retention,
            max_finished,
        }
    }

    pub fn start(&self) -> Arc<SearchTracker> {
        let tracker = Arc::new(SearchTracker::new(Uuid::new_v4()));
        let mut searches = match self.searches.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.evict(&mut searches);
        searches.insert(tracker.id, tracker.clone());
        tracker
    }

    fn evict(&self, searches: &mut HashMap<Uuid, Arc<SearchTracker>>) {
        let before = searches.len();
        searches.retain(|_, t| {
            t.finished_at()
                .map_or(true, |at| at.elapsed() < self.retention)
        });

        let mut finished: Vec<(Instant, Uuid)> = searches
            .values()
            .filter_map(|t| t.finished_at().map(|at| (at, t.id)))
            .collect();
        if finished.len() > self.max_finished {
            finished.sort();
            let excess = finished.len() - self.max_finished;
            for (_, id) in finished.into_iter().take(excess) {
                searches.remove(&id);
            }
        }

        let evicted = before - searches.len();
        if evicted > 0 {
            debug!("Evicted {evicted} finished searches");
        }
    }

    pub fn get(&self, id: Uuid) -> Option<Arc<SearchTracker>> {
        let searches = match self.searches.read() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        searches.get(&id).cloned()
    }

    /// Requests cancellation. Returns false for unknown or already finished runs.
    pub fn cancel(&self, id: Uuid) -> Option<bool> {
        let tracker = self.get(id)?;
        if tracker.state().is_finished() {
            return Some(false);
        }
        tracker.cancel.cancel();
        Some(true)
    }
}
