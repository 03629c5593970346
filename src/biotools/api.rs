//! bio.tools REST API client
//!
//! Lookups, remote schema validation and entry creation. Lookups and
//! validation are single-shot; creation retries server errors and timeouts
//! with the fixed-delay [`RetryPolicy`].

use crate::util::RetryPolicy;
use reqwest::{Client, StatusCode};
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_API_BASE: &str = "https://bio.tools/api/tool/";
pub const DEFAULT_VALIDATE_URL: &str = "https://bio.tools/api/tool/validate/";
pub const DEFAULT_TOKEN_FILE: &str = ".bt_token";

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);
const WRITE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bio.tools API error for {id}: HTTP {status}")]
    Status { id: String, status: u16 },

    #[error("bio.tools API error for {id}: {source}")]
    Request {
        id: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Trimmed token file contents; `None` when missing, unreadable or empty.
pub fn read_token(path: Option<&Path>) -> Option<String> {
    let path = path.unwrap_or_else(|| Path::new(DEFAULT_TOKEN_FILE));
    let token = std::fs::read_to_string(path).ok()?;
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RemoteValidation {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl RemoteValidation {
    fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            errors: vec![error.into()],
        }
    }

    /// The endpoint refused the token rather than the entry.
    pub fn is_auth_failure(&self) -> bool {
        self.errors
            .iter()
            .any(|e| e.contains("401") || e.contains("Authentication"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOutcome {
    pub success: bool,
    pub biotools_id: String,
    pub status_code: Option<u16>,
    pub error: Option<String>,
}

/// Failure eligible for another upload attempt.
#[derive(Debug)]
struct Transient {
    status_code: Option<u16>,
    message: String,
}

impl fmt::Display for Transient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

pub struct BioToolsApi {
    api_base: String,
    validate_url: String,
    token: Option<String>,
    client: Client,
}

impl BioToolsApi {
    pub fn new(api_base: impl Into<String>, validate_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            api_base: api_base.into(),
            validate_url: validate_url.into(),
            token,
            client: Client::new(),
        }
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request.header("Accept", "application/json");
        match &self.token {
            Some(token) => request.header("Authorization", format!("Token {}", token)),
            None => request,
        }
    }

    /// Registry record for `tool_id`, `None` on 404.
    pub async fn fetch_entry(&self, tool_id: &str) -> Result<Option<Value>, ApiError> {
        let url = format!("{}/{}?format=json", self.api_base.trim_end_matches('/'), tool_id);
        debug!(url = %url, "Fetching bio.tools entry");

        let request_error = |source| ApiError::Request {
            id: tool_id.to_string(),
            source,
        };
        let response = self
            .authorize(self.client.get(&url))
            .timeout(LOOKUP_TIMEOUT)
            .send()
            .await
            .map_err(request_error)?;

        match response.status() {
            StatusCode::OK => response.json().await.map(Some).map_err(request_error),
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(ApiError::Status {
                id: tool_id.to_string(),
                status: status.as_u16(),
            }),
        }
    }

    /// Runs the registry's own validator over one entry.
    pub async fn validate_entry(&self, entry: &Map<String, Value>) -> RemoteValidation {
        let response = self
            .authorize(self.client.post(self.validate_url.trim_end_matches('/')))
            .json(entry)
            .timeout(WRITE_TIMEOUT)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return RemoteValidation::invalid("Validation request timed out"),
            Err(e) => return RemoteValidation::invalid(format!("Validation error: {}", e)),
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        match status {
            StatusCode::OK => RemoteValidation {
                valid: true,
                errors: Vec::new(),
            },
            StatusCode::BAD_REQUEST => {
                let errors = match serde_json::from_str::<Value>(&body) {
                    Ok(data) => flatten_error_body(&data),
                    Err(_) => vec![format!("Validation failed: {}", truncate(&body, 200))],
                };
                RemoteValidation {
                    valid: false,
                    errors: if errors.is_empty() {
                        vec![format!("Validation failed with status {}", status.as_u16())]
                    } else {
                        errors
                    },
                }
            }
            other => RemoteValidation::invalid(format!(
                "API error {}: {}",
                other.as_u16(),
                truncate(&body, 200)
            )),
        }
    }

    /// Creates a registry entry.
    ///
    /// 201 uploads, 409 means the entry already exists, 400 and 401 fail
    /// immediately. 5xx answers and timeouts are retried per `retry`.
    pub async fn create_entry(&self, entry: &Map<String, Value>, retry: RetryPolicy) -> CreateOutcome {
        let biotools_id = entry
            .get("biotoolsID")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let result = retry
            .run(|_| self.create_once(entry, &biotools_id), |_: &Transient| true)
            .await;

        match result {
            Ok(outcome) => outcome,
            Err(last) => CreateOutcome {
                success: false,
                biotools_id,
                status_code: last.status_code,
                error: Some(format!("{} after {} retries", last.message, retry.max_retries)),
            },
        }
    }

    async fn create_once(&self, entry: &Map<String, Value>, biotools_id: &str) -> Result<CreateOutcome, Transient> {
        let response = self
            .authorize(self.client.post(&self.api_base))
            .json(entry)
            .timeout(WRITE_TIMEOUT)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return Err(Transient {
                    status_code: None,
                    message: "Request timeout".to_string(),
                })
            }
            Err(e) => {
                return Ok(self.failed(biotools_id, None, format!("Request failed: {}", e)));
            }
        };

        let status = response.status().as_u16();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        match status {
            200 | 201 => Ok(CreateOutcome {
                success: true,
                biotools_id: body
                    .get("biotoolsID")
                    .and_then(Value::as_str)
                    .unwrap_or(biotools_id)
                    .to_string(),
                status_code: Some(status),
                error: None,
            }),
            409 => Ok(self.failed(biotools_id, Some(status), "Entry already exists".to_string())),
            400 => Ok(self.failed(
                biotools_id,
                Some(status),
                format!("Validation error: {}", flatten_error_body(&body).join("; ")),
            )),
            401 => Ok(self.failed(
                biotools_id,
                Some(status),
                format!("Authentication failed: {}", detail(&body)),
            )),
            500..=599 => {
                warn!(id = biotools_id, status, "bio.tools server error");
                Err(Transient {
                    status_code: Some(status),
                    message: format!("Server error {}", status),
                })
            }
            other => Ok(self.failed(
                biotools_id,
                Some(other),
                format!("Unexpected response {}: {}", other, detail(&body)),
            )),
        }
    }

    fn failed(&self, biotools_id: &str, status_code: Option<u16>, error: String) -> CreateOutcome {
        CreateOutcome {
            success: false,
            biotools_id: biotools_id.to_string(),
            status_code,
            error: Some(error),
        }
    }
}

fn detail(body: &Value) -> String {
    body.get("detail")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string())
}

/// Error messages from the shapes the registry uses for 400 bodies.
fn flatten_error_body(data: &Value) -> Vec<String> {
    match data {
        Value::Object(map) => {
            for key in ["errors", "error", "message"] {
                match map.get(key) {
                    Some(Value::Array(items)) => return items.iter().map(value_text).collect(),
                    Some(value) => return vec![value_text(value)],
                    None => {}
                }
            }
            let mut errors = Vec::new();
            for (key, value) in map {
                match value {
                    Value::Array(items) => {
                        errors.extend(items.iter().map(|v| format!("{}: {}", key, value_text(v))))
                    }
                    other => errors.push(format!("{}: {}", key, value_text(other))),
                }
            }
            errors
        }
        Value::Array(items) => items.iter().map(value_text).collect(),
        Value::Null => Vec::new(),
        other => vec![value_text(other)],
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
