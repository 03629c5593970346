use crate::candidate::Candidate;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HomepageConfig {
    pub enabled: bool,
    /// Per-request timeout in seconds.
    pub timeout: u64,
    pub user_agent: String,
}

impl Default for HomepageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout: 8,
            user_agent: concat!("biotools-annotate/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Probes a candidate's homepage and records what it found on the candidate.
#[async_trait]
pub trait HomepageScraper: Send + Sync {
    /// Returns `true` when a request was made.
    async fn scrape(&self, candidate: &mut Candidate) -> bool;
}

pub struct HttpHomepageScraper {
    client: Client,
}

impl HttpHomepageScraper {
    pub fn new(config: &HomepageConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout.max(1)))
            .user_agent(config.user_agent.clone())
            .build()
            .expect("Failed to build HTTP client");
        Self { client }
    }
}

#[async_trait]
impl HomepageScraper for HttpHomepageScraper {
    async fn scrape(&self, candidate: &mut Candidate) -> bool {
        let homepage = match candidate.homepage.as_deref().map(str::trim) {
            Some(h) if h.starts_with("http://") || h.starts_with("https://") => h.to_string(),
            _ => return false,
        };

        match self.client.get(&homepage).send().await {
            Ok(response) => {
                let status = response.status();
                candidate.homepage_status = Some(json!(status.as_u16()));
                candidate.homepage_error = if status.is_client_error() || status.is_server_error() {
                    Some(format!("HTTP {}", status.as_u16()))
                } else {
                    None
                };
                debug!(homepage = %homepage, status = status.as_u16(), "Homepage probed");
            }
            Err(e) => {
                let message = if e.is_timeout() {
                    "timeout".to_string()
                } else {
                    e.to_string()
                };
                debug!(homepage = %homepage, error = %message, "Homepage unreachable");
                candidate.homepage_status = None;
                candidate.homepage_error = Some(message);
            }
        }
        candidate
            .extra
            .insert("homepage_scraped".to_string(), Value::Bool(true));
        true
    }
}
