//! Job sources: one adapter per listing platform.
//!
//! [`fetch_all`] queries every requested platform concurrently and keeps going
//! when one of them fails; failures come back as per-platform [`SourceError`]s.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::models::job::NewJob;

pub mod gateway;

pub const DEFAULT_PLATFORMS: [&str; 4] = ["indeed", "linkedin", "glassdoor", "zip_recruiter"];
pub const DEFAULT_RESULTS_PER_SITE: u32 = 10;
pub const DEFAULT_HOURS_OLD: u32 = 72;

#[derive(Debug, Clone, Error, Serialize)]
#[error("{platform}: {message}")]
pub struct SourceError {
    pub platform: String,
    pub message: String,
    /// False when asking again cannot help (unknown platform, rejected query).
    pub retryable: bool,
}

impl SourceError {
    pub fn new(platform: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            message: message.into(),
            retryable: true,
        }
    }

    pub fn unsupported(platform: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            message: "unsupported platform".to_string(),
            retryable: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchParams {
    pub keywords: String,
    pub location: String,
    pub platforms: Vec<String>,
    pub results_per_site: u32,
    pub hours_old: u32,
}

#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub listings: Vec<NewJob>,
    pub errors: Vec<SourceError>,
    /// Platforms that answered, with or without listings.
    pub succeeded: usize,
}

impl FetchOutcome {
    /// True when platforms were queried and none of them answered.
    pub fn all_failed(&self) -> bool {
        self.succeeded == 0 && !self.errors.is_empty()
    }
}

#[async_trait]
pub trait JobSource: Send + Sync {
    /// Platform name as used in requests and job keys (`linkedin`, `indeed`, ...).
    fn platform(&self) -> &str;

    async fn fetch(&self, params: &SearchParams) -> Result<Vec<NewJob>, SourceError>;
}

/// Sources keyed by platform name.
#[derive(Clone, Default)]
pub struct SourceSet {
    sources: HashMap<String, Arc<dyn JobSource>>,
}

impl SourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, source: Arc<dyn JobSource>) -> Self {
        self.sources
            .insert(source.platform().to_lowercase(), source);
        self
    }

    pub fn get(&self, platform: &str) -> Option<Arc<dyn JobSource>> {
        self.sources.get(&platform.trim().to_lowercase()).cloned()
    }

    pub fn platforms(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sources.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Queries all platforms named in `params` concurrently.
pub async fn fetch_all(sources: &SourceSet, params: &SearchParams) -> FetchOutcome {
    let mut outcome = FetchOutcome::default();
    let mut tasks = JoinSet::new();

    let mut requested: Vec<String> = Vec::new();
    for platform in &params.platforms {
        let name = platform.trim().to_lowercase();
        if !requested.contains(&name) {
            requested.push(name);
        }
    }

    for platform in requested {
        match sources.get(&platform) {
            Some(source) => {
                let params = params.clone();
                tasks.spawn(async move { source.fetch(&params).await });
            }
            None => outcome.errors.push(SourceError::unsupported(platform)),
        }
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(listings)) => {
                outcome.succeeded += 1;
                outcome.listings.extend(listings);
            }
            Ok(Err(e)) => {
                warn!("Source {} failed: {}", e.platform, e.message);
                outcome.errors.push(e);
            }
            Err(e) => {
                warn!("Source task aborted: {e}");
                outcome.errors.push(SourceError::new("unknown", e.to_string()));
            }
        }
    }

    info!(
        "Fetched {} listings ({} platform errors)",
        outcome.listings.len(),
        outcome.errors.len()
    );
    outcome
}
