//! Adapter for the scraping gateway, an HTTP service that wraps JobSpy and
//! returns one JSON row per listing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

use super::{JobSource, SearchParams, SourceError, SourceSet, DEFAULT_PLATFORMS};
use crate::models::job::NewJob;

/// Descriptions longer than this are cut to keep prompts bounded.
pub const MAX_DESCRIPTION_CHARS: usize = 6000;

#[derive(Debug, Default, Deserialize)]
struct ScrapedRow {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    title: Value,
    #[serde(default)]
    company: Value,
    #[serde(default)]
    location: Value,
    #[serde(default)]
    job_url: Value,
    #[serde(default)]
    description: Value,
    #[serde(default)]
    date_posted: Value,
    #[serde(default)]
    job_type: Value,
    #[serde(default)]
    min_amount: Value,
    #[serde(default)]
    max_amount: Value,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScrapeResponse {
    Rows(Vec<ScrapedRow>),
    Wrapped { jobs: Vec<ScrapedRow> },
}

impl ScrapeResponse {
    fn into_rows(self) -> Vec<ScrapedRow> {
        match self {
            ScrapeResponse::Rows(rows) | ScrapeResponse::Wrapped { jobs: rows } => rows,
        }
    }
}

/// One gateway-backed source per platform; all share the same HTTP client.
#[derive(Clone)]
pub struct ScraperGatewaySource {
    client: Client,
    base_url: String,
    platform: String,
}

impl ScraperGatewaySource {
    pub fn new(client: Client, base_url: &str, platform: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            platform: platform.to_lowercase(),
        }
    }

    /// Sources for every platform the gateway supports.
    pub fn all(base_url: &str) -> Result<SourceSet, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(180))
            .build()?;
        Ok(DEFAULT_PLATFORMS.iter().fold(SourceSet::new(), |set, platform| {
            set.with(Arc::new(Self::new(client.clone(), base_url, platform)))
        }))
    }

    fn normalize(&self, row: ScrapedRow, params: &SearchParams) -> Option<NewJob> {
        let title = clean(&row.title);
        let company = clean(&row.company);
        if title.is_empty() && company.is_empty() {
            return None;
        }
        let url = clean(&row.job_url);
        let external_id = match clean(&row.id) {
            id if !id.is_empty() => id,
            _ if !url.is_empty() => digest(&url),
            _ => digest(&format!("{title}|{company}")),
        };

        let mut description = clean(&row.description);
        if description.is_empty() {
            description = compose_description(&row);
        }
        let description: String = description.chars().take(MAX_DESCRIPTION_CHARS).collect();

        let location = match clean(&row.location) {
            l if l.is_empty() => params.location.clone(),
            l => l,
        };

        Some(NewJob {
            platform: self.platform.clone(),
            external_id,
            title,
            company,
            location,
            description,
            url,
            date_posted: clean(&row.date_posted),
            search_id: None,
        })
    }
}

#[async_trait]
impl JobSource for ScraperGatewaySource {
    fn platform(&self) -> &str {
        &self.platform
    }

    async fn fetch(&self, params: &SearchParams) -> Result<Vec<NewJob>, SourceError> {
        let err = |message: String| SourceError::new(self.platform.clone(), message);

        let response = self
            .client
            .get(format!("{}/scrape", self.base_url))
            .query(&[
                ("site_name", self.platform.as_str()),
                ("search_term", params.keywords.as_str()),
                ("location", params.location.as_str()),
            ])
            .query(&[
                ("results_wanted", params.results_per_site),
                ("hours_old", params.hours_old),
            ])
            .send()
            .await
            .map_err(|e| err(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let mut e = err(format!("gateway returned HTTP {}", status.as_u16()));
            e.retryable = status.is_server_error() || status.as_u16() == 429;
            return Err(e);
        }

        let rows = response
            .json::<ScrapeResponse>()
            .await
            .map_err(|e| err(format!("invalid gateway response: {e}")))?
            .into_rows();

        let listings: Vec<NewJob> = rows
            .into_iter()
            .filter_map(|row| self.normalize(row, params))
            .collect();
        debug!("{} returned {} listings", self.platform, listings.len());
        Ok(listings)
    }
}

/// String value of a scraped field; null and NaN placeholders become empty.
fn clean(value: &Value) -> String {
    let text = match value {
        Value::Null => return String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.is_finite() && f.fract() == 0.0 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    };
    match text.to_ascii_lowercase().as_str() {
        "nan" | "none" | "null" => String::new(),
        _ => text,
    }
}

fn compose_description(row: &ScrapedRow) -> String {
    let mut parts = Vec::new();
    let job_type = clean(&row.job_type);
    if !job_type.is_empty() {
        parts.push(format!("Type: {job_type}"));
    }
    let min = clean(&row.min_amount);
    if !min.is_empty() {
        parts.push(format!("Salary: ${}–${}", min, clean(&row.max_amount)));
    }
    if parts.is_empty() {
        "No description available".to_string()
    } else {
        parts.join(" | ")
    }
}

fn digest(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}
