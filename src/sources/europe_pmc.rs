//! Europe PMC publication lookups
//!
//! Abstracts are fetched for the first publication identifier of each
//! candidate and stored on the candidate for the scoring prompt.

use crate::candidate::Candidate;
use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_SEARCH_URL: &str = "https://www.ebi.ac.uk/europepmc/webservices/rest/search";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EuropePmcConfig {
    pub enabled: bool,
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout: u64,
    /// Identifiers tried per candidate before giving up.
    pub max_publications: usize,
}

impl Default for EuropePmcConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: DEFAULT_SEARCH_URL.to_string(),
            timeout: 15,
            max_publications: 1,
        }
    }
}

pub type ProgressCallback<'a> = &'a (dyn Fn(usize, usize) + Send + Sync);

#[async_trait]
pub trait PublicationEnricher: Send + Sync {
    /// Enriches candidates in place, returning how many gained an abstract.
    async fn enrich(&self, candidates: &mut [Candidate], progress: ProgressCallback<'_>) -> Result<usize>;
}

/// Europe PMC search query for a `kind:value` identifier.
pub fn build_query(identifier: &str) -> Option<String> {
    let (kind, value) = identifier.split_once(':')?;
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    match kind {
        "pmid" => Some(format!("EXT_ID:{} AND SRC:MED", value)),
        "pmcid" => Some(format!("PMCID:{}", value.to_uppercase())),
        "doi" => Some(format!("DOI:\"{}\"", value)),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PublicationMetadata {
    pub title: Option<String>,
    pub abstract_text: Option<String>,
}

/// First result of a search response; markup is stripped from the abstract.
pub fn parse_search_response(body: &Value) -> Option<PublicationMetadata> {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    let tags = TAGS.get_or_init(|| Regex::new(r"<[^>]+>").expect("valid regex"));

    let result = body.pointer("/resultList/result/0")?;
    let text = |key: &str| {
        result
            .get(key)
            .and_then(Value::as_str)
            .map(|s| tags.replace_all(s, "").trim().to_string())
            .filter(|s| !s.is_empty())
    };
    Some(PublicationMetadata {
        title: text("title"),
        abstract_text: text("abstractText"),
    })
}

pub struct EuropePmcClient {
    client: Client,
    config: EuropePmcConfig,
}

impl EuropePmcClient {
    pub fn new(config: EuropePmcConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout.max(1)))
            .build()
            .expect("Failed to build HTTP client");
        Self { client, config }
    }

    pub async fn lookup(&self, identifier: &str) -> Result<Option<PublicationMetadata>> {
        let Some(query) = build_query(identifier) else {
            return Ok(None);
        };
        let response = self
            .client
            .get(&self.config.base_url)
            .query(&[
                ("query", query.as_str()),
                ("format", "json"),
                ("resultType", "core"),
                ("pageSize", "1"),
            ])
            .send()
            .await?
            .error_for_status()?;
        let body: Value = response.json().await?;
        Ok(parse_search_response(&body))
    }
}

#[async_trait]
impl PublicationEnricher for EuropePmcClient {
    async fn enrich(&self, candidates: &mut [Candidate], progress: ProgressCallback<'_>) -> Result<usize> {
        let total = candidates.len();
        let mut enriched = 0;

        for (idx, candidate) in candidates.iter_mut().enumerate() {
            if candidate.publication_abstract.is_none() {
                let identifiers = candidate.publication_identifiers();
                for identifier in identifiers.iter().take(self.config.max_publications.max(1)) {
                    match self.lookup(identifier).await {
                        Ok(Some(metadata)) if metadata.abstract_text.is_some() => {
                            candidate.publication_abstract = metadata.abstract_text;
                            if let Some(title) = metadata.title {
                                candidate
                                    .extra
                                    .insert("publication_title".to_string(), Value::String(title));
                            }
                            enriched += 1;
                            break;
                        }
                        Ok(_) => debug!(identifier = %identifier, "No Europe PMC abstract"),
                        Err(e) => warn!(identifier = %identifier, error = %e, "Europe PMC lookup failed"),
                    }
                }
            }
            progress(idx + 1, total);
        }
        Ok(enriched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use yare::parameterized;

    #[parameterized(
        pmid = { "pmid:12345", Some("EXT_ID:12345 AND SRC:MED") },
        pmcid = { "pmcid:pmc999", Some("PMCID:PMC999") },
        doi = { "doi:10.1093/nar/gkab1", Some("DOI:\"10.1093/nar/gkab1\"") },
        empty_value = { "doi: ", None },
        unknown_kind = { "isbn:123", None },
        no_separator = { "12345", None },
    )]
    fn test_build_query(identifier: &str, expected: Option<&str>) {
        assert_eq!(build_query(identifier).as_deref(), expected);
    }

    #[test]
    fn test_parse_search_response() {
        let body = json!({
            "resultList": {"result": [{
                "title": "ToolX: fast alignment",
                "abstractText": "<h4>Motivation</h4>ToolX aligns reads."
            }]}
        });
        let metadata = parse_search_response(&body).unwrap();
        assert_eq!(metadata.title.as_deref(), Some("ToolX: fast alignment"));
        assert_eq!(metadata.abstract_text.as_deref(), Some("MotivationToolX aligns reads."));

        assert!(parse_search_response(&json!({"resultList": {"result": []}})).is_none());
    }
}
