use std::sync::Arc;

use crate::jobs::JobStore;
use crate::pipeline::{Pipeline, SearchRegistry};
use crate::settings::SettingsHandle;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn JobStore>,
    pub pipeline: Arc<Pipeline>,
    /// Background searches started since boot.
    pub searches: Arc<SearchRegistry>,
    pub settings: Arc<SettingsHandle>,
}
