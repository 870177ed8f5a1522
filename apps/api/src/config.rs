use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::llm_client::retry::RetryPolicy;
use crate::llm_client::{ANTHROPIC_API_URL, DEFAULT_MODEL};
use crate::notify::SmtpSettings;
use crate::settings::DEFAULT_MATCH_THRESHOLD;

/// Application configuration loaded from environment variables.
/// Startup fails if a required variable is missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    pub anthropic_base_url: String,
    pub llm_model: String,
    pub match_threshold: u8,
    /// Absent means the in-memory job store.
    pub database_url: Option<String>,
    pub scraper_url: String,
    pub default_location: String,
    pub default_results_each: u32,
    pub max_concurrency: usize,
    pub retry: RetryPolicy,
    /// Absent when SMTP credentials are not configured; notifications are then off.
    pub smtp: Option<SmtpSettings>,
    pub notify_recipient: Option<String>,
    pub config_state_path: Option<PathBuf>,
    pub resume_path: Option<PathBuf>,
    pub applicant_name: String,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let match_threshold: u8 = parse_env("MATCH_THRESHOLD", DEFAULT_MATCH_THRESHOLD)?;
        anyhow::ensure!(
            match_threshold <= 100,
            "MATCH_THRESHOLD must be between 0 and 100"
        );

        let retry = RetryPolicy::new(
            parse_env("LLM_MAX_ATTEMPTS", 4)?,
            Duration::from_millis(parse_env("LLM_BASE_DELAY_MS", 5000)?),
            Duration::from_millis(parse_env("LLM_MAX_DELAY_MS", 60_000)?),
            parse_env("LLM_RETRY_JITTER", 0.2)?,
        );

        let smtp = match (optional_env("SMTP_USERNAME"), optional_env("SMTP_PASSWORD")) {
            (Some(username), Some(password)) => Some(SmtpSettings {
                host: env_or("SMTP_HOST", "smtp.gmail.com"),
                port: parse_env("SMTP_PORT", 587)?,
                from: optional_env("SMTP_FROM").unwrap_or_else(|| username.clone()),
                username,
                password,
            }),
            _ => None,
        };

        Ok(Config {
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            anthropic_base_url: env_or("ANTHROPIC_BASE_URL", ANTHROPIC_API_URL),
            llm_model: env_or("LLM_MODEL", DEFAULT_MODEL),
            match_threshold,
            database_url: optional_env("DATABASE_URL"),
            scraper_url: env_or("SCRAPER_URL", "http://localhost:8001"),
            default_location: env_or("DEFAULT_LOCATION", "Remote"),
            default_results_each: parse_env("DEFAULT_RESULTS_EACH", 10)?,
            max_concurrency: parse_env::<usize>("MAX_CONCURRENCY", 5)?.max(1),
            retry,
            smtp,
            notify_recipient: optional_env("NOTIFY_RECIPIENT"),
            config_state_path: optional_env("CONFIG_STATE_PATH").map(PathBuf::from),
            resume_path: optional_env("RESUME_PATH").map(PathBuf::from),
            applicant_name: env_or("APPLICANT_NAME", ""),
            port: parse_env("PORT", 8080).context("PORT must be a valid port number")?,
            rust_log: env_or("RUST_LOG", "info"),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Set and non-blank, or `None`.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    optional_env(key).unwrap_or_else(|| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Invalid value for {key} ('{raw}'): {e}")),
        None => Ok(default),
    }
}
