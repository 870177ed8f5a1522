mod config;
mod db;
mod errors;
mod jobs;
mod llm_client;
mod models;
mod notify;
mod pipeline;
mod routes;
mod scoring;
mod settings;
mod sources;
mod state;
mod tailoring;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::jobs::{JobStore, MemoryJobStore, PgJobStore};
use crate::llm_client::LlmClient;
use crate::models::resume::ResumeProfile;
use crate::notify::{Notifier, SmtpMailer};
use crate::pipeline::{Pipeline, PipelineOptions, SearchRegistry};
use crate::routes::build_router;
use crate::settings::{PipelineSettings, SettingsHandle};
use crate::sources::gateway::ScraperGatewaySource;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting ResumeFlow API v{}", env!("CARGO_PKG_VERSION"));

    // Job store: PostgreSQL when configured, otherwise process memory
    let store: Arc<dyn JobStore> = match &config.database_url {
        Some(url) => Arc::new(PgJobStore::new(create_pool(url).await?)),
        None => {
            warn!("DATABASE_URL not set; job records will not survive a restart");
            Arc::new(MemoryJobStore::new())
        }
    };

    let llm = LlmClient::with_base_url(
        config.anthropic_api_key.clone(),
        config.anthropic_base_url.clone(),
    )?;
    info!("LLM client initialized (model: {})", config.llm_model);

    let sources = ScraperGatewaySource::all(&config.scraper_url)?;
    info!(
        "Scraper gateway at {} (platforms: {})",
        config.scraper_url,
        sources.platforms().join(", ")
    );

    let notifier = match &config.smtp {
        Some(smtp) => {
            let mailer = SmtpMailer::new(smtp)?;
            info!("SMTP notifications enabled via {}:{}", smtp.host, smtp.port);
            Some(Notifier::new(Arc::new(mailer), config.notify_recipient.clone()))
        }
        None => {
            warn!("SMTP credentials not set; match notifications are disabled");
            None
        }
    };

    let settings = Arc::new(SettingsHandle::load(
        PipelineSettings {
            match_threshold: config.match_threshold,
            model: config.llm_model.clone(),
        },
        config.config_state_path.clone(),
    ));

    let resume = config.resume_path.as_deref().and_then(|path| {
        match ResumeProfile::load(path, &config.applicant_name) {
            Ok(resume) => {
                info!("Loaded resume from {}", path.display());
                Some(resume)
            }
            Err(e) => {
                warn!("Could not load resume: {e:#}");
                None
            }
        }
    });

    let pipeline = Pipeline::new(
        store.clone(),
        sources,
        Arc::new(llm),
        config.retry.clone(),
        settings.clone(),
        PipelineOptions {
            default_location: config.default_location.clone(),
            default_results_per_site: config.default_results_each,
            max_concurrency: config.max_concurrency,
            ..Default::default()
        },
    )
    .with_notifier(notifier)
    .with_resume(resume);

    // Build app state
    let state = AppState {
        store,
        pipeline: Arc::new(pipeline),
        searches: Arc::new(SearchRegistry::new()),
        settings,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
