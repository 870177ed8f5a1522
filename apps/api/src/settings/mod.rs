//! Runtime-mutable pipeline settings (match threshold, model id).
//!
//! Readers take an `Arc` snapshot; `update` swaps the whole value, so a run that
//! already took its snapshot keeps it until it finishes.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

pub mod handlers;

pub const DEFAULT_MATCH_THRESHOLD: u8 = 75;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Minimum score (inclusive) that triggers tailoring and notification.
    pub match_threshold: u8,
    /// AI model identifier used for scoring and tailoring.
    pub model: String,
}

impl PipelineSettings {
    pub fn is_match(&self, score: u8) -> bool {
        score >= self.match_threshold
    }
}

/// Partial update accepted by `PATCH /api/config`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsPatch {
    /// Wider than the stored value so out-of-range input reaches validation.
    pub match_threshold: Option<u16>,
    pub model: Option<String>,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("match_threshold must be between 0 and 100, got {0}")]
    ThresholdOutOfRange(u16),

    #[error("model must not be empty")]
    EmptyModel,
}

/// Values persisted across restarts. Only the fields present are applied.
#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedSettings {
    match_threshold: Option<u8>,
    model: Option<String>,
}

pub struct SettingsHandle {
    current: RwLock<Arc<PipelineSettings>>,
    persist_path: Option<PathBuf>,
}

impl SettingsHandle {
    pub fn new(initial: PipelineSettings) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
            persist_path: None,
        }
    }

    /// Starts from `defaults`, overlaid with whatever was saved at `path`.
    pub fn load(defaults: PipelineSettings, path: Option<PathBuf>) -> Self {
        let mut settings = defaults;
        if let Some(persisted) = path.as_deref().and_then(read_persisted) {
            if let Some(threshold) = persisted.match_threshold.filter(|t| *t <= 100) {
                settings.match_threshold = threshold;
            }
            if let Some(model) = persisted.model.filter(|m| !m.trim().is_empty()) {
                settings.model = model;
            }
            info!(
                "Restored pipeline settings: threshold={}, model={}",
                settings.match_threshold, settings.model
            );
        }
        Self {
            current: RwLock::new(Arc::new(settings)),
            persist_path: path,
        }
    }

    pub fn snapshot(&self) -> Arc<PipelineSettings> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Validates the patch and atomically replaces the active settings.
    pub fn update(&self, patch: SettingsPatch) -> Result<Arc<PipelineSettings>, SettingsError> {
        let threshold = match patch.match_threshold {
            Some(raw) => match u8::try_from(raw) {
                Ok(t) if t <= 100 => Some(t),
                _ => return Err(SettingsError::ThresholdOutOfRange(raw)),
            },
            None => None,
        };
        if let Some(model) = &patch.model {
            if model.trim().is_empty() {
                return Err(SettingsError::EmptyModel);
            }
        }

        let updated = {
            let mut guard = match self.current.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let mut next = PipelineSettings::clone(&guard);
            if let Some(threshold) = threshold {
                next.match_threshold = threshold;
            }
            if let Some(model) = patch.model {
                next.model = model.trim().to_string();
            }
            let next = Arc::new(next);
            *guard = next.clone();
            next
        };

        info!(
            "Pipeline settings updated: threshold={}, model={}",
            updated.match_threshold, updated.model
        );
        self.persist(&updated);
        Ok(updated)
    }

    fn persist(&self, settings: &PipelineSettings) {
        let Some(path) = &self.persist_path else {
            return;
        };
        let persisted = PersistedSettings {
            match_threshold: Some(settings.match_threshold),
            model: Some(settings.model.clone()),
        };
        let result = serde_json::to_string_pretty(&persisted)
            .map_err(std::io::Error::from)
            .and_then(|json| std::fs::write(path, json));
        if let Err(e) = result {
            warn!("Failed to persist settings to {}: {e}", path.display());
        }
    }
}

fn read_persisted(path: &Path) -> Option<PersistedSettings> {
    let contents = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&contents) {
        Ok(persisted) => Some(persisted),
        Err(e) => {
            warn!("Ignoring unreadable settings file {}: {e}", path.display());
            None
        }
    }
}
