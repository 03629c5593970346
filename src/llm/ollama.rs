//! Ollama HTTP client
//!
//! Talks to the `/api/generate` endpoint of a local Ollama server. The server
//! streams newline-delimited JSON fragments; the client concatenates them,
//! recovers a JSON object from the text and hands it back together with the
//! trace state of the call.
//!
//! Connection-class failures (unreachable host, timeouts, HTTP error status)
//! are retried with a fixed delay. A response that contains no JSON object is
//! a [`LlmError::Generation`] and is not retried.
//!
//! Every call is appended to the exchange log and failed attempts are
//! written to the trace file; successful attempts are traced by the caller
//! once it has validated the response.

use super::client::{GenerateRequest, Generation, HealthStatus, TextGenerator};
use super::error::LlmError;
use super::extract::{collect_stream, recover_json};
use super::trace::{ExchangeLog, TraceEntry, TracePayload, TraceStatus, TraceWriter};
use crate::util::RetryPolicy;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const DEFAULT_HOST: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llama3.2";

const PING_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolved client settings.
#[derive(Debug, Clone, PartialEq)]
pub struct OllamaConfig {
    pub host: String,
    pub model: String,
    pub temperature: f64,
    pub top_p: f64,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub timeout: Duration,
    /// Context window override; `None` keeps the model default.
    pub num_ctx: Option<u32>,
    /// Sends `format: "json"` with every request.
    pub force_json_format: bool,
    pub llm_log: PathBuf,
    pub llm_trace: PathBuf,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.01,
            top_p: 1.0,
            max_retries: 3,
            retry_backoff: Duration::from_secs(2),
            timeout: Duration::from_secs(300),
            num_ctx: None,
            force_json_format: true,
            llm_log: PathBuf::from("out/logs/ollama/ollama.log"),
            llm_trace: PathBuf::from("out/ollama/trace.jsonl"),
        }
    }
}

impl OllamaConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.retry_backoff)
    }

    /// Temperature floors at 0; non-finite values use the default.
    fn resolve_temperature(&self, requested: Option<f64>) -> f64 {
        match requested {
            Some(t) if t.is_finite() => t.max(0.0),
            _ => self.temperature.max(0.0),
        }
    }

    /// `top_p` must be positive, otherwise the default applies.
    fn resolve_top_p(&self, requested: Option<f64>) -> f64 {
        match requested {
            Some(p) if p.is_finite() && p > 0.0 => p,
            _ => self.top_p,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    temperature: f64,
    top_p: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Debug, Clone, Serialize)]
struct OllamaOptions {
    num_ctx: u32,
}

impl OllamaRequest {
    /// Request options as recorded in the trace.
    fn trace_options(&self) -> Map<String, Value> {
        let mut options = Map::new();
        options.insert("model".to_string(), Value::from(self.model.clone()));
        options.insert("temperature".to_string(), Value::from(self.temperature));
        options.insert("top_p".to_string(), Value::from(self.top_p));
        if let Some(format) = self.format {
            options.insert("format".to_string(), Value::from(format));
        }
        if let Some(seed) = self.seed {
            options.insert("seed".to_string(), Value::from(seed));
        }
        if let Some(extra) = &self.options {
            options.insert("options".to_string(), serde_json::json!({ "num_ctx": extra.num_ctx }));
        }
        options
    }
}

pub struct OllamaClient {
    config: OllamaConfig,
    /// Shared HTTP client with connection pooling
    http_client: Client,
    exchange_log: ExchangeLog,
    trace_writer: TraceWriter,
}

impl OllamaClient {
    pub fn new(config: OllamaConfig) -> Self {
        // Only fails when the TLS backend cannot initialize.
        let http_client = Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(20)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            exchange_log: ExchangeLog::new(config.llm_log.clone()),
            trace_writer: TraceWriter::new(config.llm_trace.clone()),
            http_client,
            config,
        }
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    fn build_request(&self, request: &GenerateRequest) -> OllamaRequest {
        OllamaRequest {
            model: request
                .model
                .clone()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| self.config.model.clone()),
            prompt: request.prompt.clone(),
            temperature: self.config.resolve_temperature(request.temperature),
            top_p: self.config.resolve_top_p(request.top_p),
            format: self.config.force_json_format.then_some("json"),
            seed: request.seed,
            options: self.config.num_ctx.map(|num_ctx| OllamaOptions { num_ctx }),
        }
    }

    async fn attempt(&self, request: &GenerateRequest, attempt: u32) -> Result<Generation, LlmError> {
        let url = format!("{}/api/generate", self.config.host.trim_end_matches('/'));
        let body = self.build_request(request);
        let request_value = serde_json::to_value(&body).unwrap_or(Value::Null);
        let attempt_no = request.trace_context.attempt.or(Some(attempt));
        let mut trace = TracePayload::new(
            &request.prompt,
            body.trace_options(),
            attempt_no,
            &request.trace_context.prompt_kind,
        )
        .with_http_attempt(attempt);

        debug!(
            model = %body.model,
            prompt_length = body.prompt.len(),
            attempt,
            "Sending request to Ollama"
        );
        let start = Instant::now();

        let raw = match self.send(&url, &body).await {
            Ok(raw) => raw,
            Err(e) => {
                trace.response_text = e.to_string();
                self.exchange_log.record(&request_value, &e.to_string(), false);
                self.trace_writer
                    .write(&TraceEntry::new(&trace, TraceStatus::ConnectionError, None, &[]));
                return Err(e);
            }
        };

        let stream = collect_stream(&raw);
        let output = stream.effective_output();
        trace.response_text = if output.is_empty() { raw.clone() } else { output.to_string() };

        match recover_json(&stream, &raw) {
            Some(json_text) => {
                self.exchange_log.record(&request_value, &json_text, true);
                info!(
                    model = %body.model,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Ollama generation completed"
                );
                Ok(Generation { json_text, trace })
            }
            None => {
                self.exchange_log.record(&request_value, output, false);
                self.trace_writer
                    .write(&TraceEntry::new(&trace, TraceStatus::GenerationError, None, &[]));
                warn!(model = %body.model, "No valid JSON object found in Ollama response");
                Err(LlmError::generation(
                    "No valid JSON object found in Ollama response",
                    trace,
                ))
            }
        }
    }

    async fn send(&self, url: &str, body: &OllamaRequest) -> Result<String, LlmError> {
        let response = self
            .http_client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                LlmError::connection(format!(
                    "Failed to connect to Ollama at {}: {}",
                    self.config.host, e
                ))
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            LlmError::connection(format!(
                "Failed to connect to Ollama at {}: {}",
                self.config.host, e
            ))
        })?;

        if !status.is_success() {
            if status.as_u16() == 404 && text.contains("not found") {
                return Err(LlmError::connection(format!(
                    "Model '{}' not found in Ollama. Available models: ollama list",
                    body.model
                )));
            }
            return Err(LlmError::connection(format!("Ollama HTTP error: {}", status)));
        }

        Ok(text)
    }
}

#[async_trait]
impl TextGenerator for OllamaClient {
    async fn generate(&self, request: GenerateRequest) -> Result<Generation, LlmError> {
        self.config
            .retry_policy()
            .run(|attempt| self.attempt(&request, attempt), LlmError::is_retryable)
            .await
    }

    async fn ping(&self) -> HealthStatus {
        let url = format!("{}/api/tags", self.config.host.trim_end_matches('/'));
        debug!("Checking Ollama health at {}", url);

        let result = self
            .http_client
            .get(&url)
            .timeout(PING_TIMEOUT)
            .send()
            .await
            .and_then(|r| r.error_for_status());

        match result {
            Ok(_) => HealthStatus::healthy(),
            Err(e) if e.is_connect() => HealthStatus::unhealthy(format!(
                "Connection failed: Ollama service not available at {}",
                self.config.host
            )),
            Err(e) if e.is_timeout() => HealthStatus::unhealthy(format!(
                "Timeout: Ollama service at {} took too long to respond",
                self.config.host
            )),
            Err(e) => HealthStatus::unhealthy(format!("Request failed: {}", e)),
        }
    }

    fn write_trace_entry(
        &self,
        payload: &TracePayload,
        status: TraceStatus,
        response_json: Option<&Value>,
        schema_errors: &[String],
    ) {
        self.trace_writer
            .write(&TraceEntry::new(payload, status, response_json, schema_errors));
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model_info(&self) -> Option<String> {
        Some(format!("{} @ {}", self.config.model, self.config.host))
    }
}

impl fmt::Debug for OllamaClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OllamaClient")
            .field("host", &self.config.host)
            .field("model", &self.config.model)
            .field("timeout", &self.config.timeout)
            .finish()
    }
}
