//! Exchange log and structured trace
//!
//! Both sinks are append-only and best-effort: a write failure is logged at
//! `warn` and otherwise ignored, never surfaced to the request.

use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// Per-call trace state built before the request is sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TracePayload {
    pub trace_id: String,
    pub prompt: String,
    /// Resolved request options (model, temperature, top_p, format, seed, options).
    pub options: Map<String, Value>,
    /// Scorer attempt (base prompt, repair prompt).
    pub attempt: Option<u32>,
    /// Transport attempt within one scorer attempt, counting from 1.
    pub http_attempt: Option<u32>,
    pub prompt_kind: String,
    pub response_text: String,
}

impl TracePayload {
    pub fn new(prompt: &str, options: Map<String, Value>, attempt: Option<u32>, prompt_kind: &str) -> Self {
        Self {
            trace_id: uuid::Uuid::new_v4().simple().to_string(),
            prompt: prompt.to_string(),
            options,
            attempt,
            http_attempt: None,
            prompt_kind: prompt_kind.to_string(),
            response_text: String::new(),
        }
    }

    pub fn with_http_attempt(mut self, http_attempt: u32) -> Self {
        self.http_attempt = Some(http_attempt);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceStatus {
    Ok,
    SchemaError,
    GenerationError,
    ConnectionError,
}

impl TraceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TraceStatus::Ok => "ok",
            TraceStatus::SchemaError => "schema_error",
            TraceStatus::GenerationError => "generation_error",
            TraceStatus::ConnectionError => "connection_error",
        }
    }
}

/// One line of the trace file.
#[derive(Debug, Clone, Serialize)]
pub struct TraceEntry<'a> {
    pub trace_id: &'a str,
    pub timestamp: String,
    pub attempt: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_attempt: Option<u32>,
    pub prompt_kind: &'a str,
    pub prompt: &'a str,
    pub request_options: &'a Map<String, Value>,
    pub response_text: &'a str,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_json: Option<&'a Value>,
    #[serde(skip_serializing_if = "no_errors")]
    pub schema_errors: &'a [String],
}

fn no_errors(errors: &&[String]) -> bool {
    errors.is_empty()
}

impl<'a> TraceEntry<'a> {
    pub fn new(
        payload: &'a TracePayload,
        status: TraceStatus,
        response_json: Option<&'a Value>,
        schema_errors: &'a [String],
    ) -> Self {
        Self {
            trace_id: &payload.trace_id,
            timestamp: Utc::now().to_rfc3339(),
            attempt: payload.attempt,
            http_attempt: payload.http_attempt,
            prompt_kind: &payload.prompt_kind,
            prompt: &payload.prompt,
            request_options: &payload.options,
            response_text: &payload.response_text,
            status: status.as_str(),
            response_json,
            schema_errors,
        }
    }
}

/// Serialized appends to one file, creating parent directories first.
#[derive(Debug)]
struct AppendFile {
    path: PathBuf,
    lock: Mutex<()>,
}

impl AppendFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    fn append(&self, text: &str) {
        let _guard = match self.lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = append_to(&self.path, text) {
            warn!(path = %self.path.display(), error = %e, "Failed to append LLM log");
        }
    }
}

fn append_to(path: &Path, text: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(text.as_bytes())
}

/// Human-readable request/response log.
#[derive(Debug)]
pub struct ExchangeLog {
    file: AppendFile,
}

impl ExchangeLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: AppendFile::new(path.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.file.path
    }

    /// Appends one `BEGIN`/`END` block. JSON responses are pretty-printed.
    pub fn record(&self, request: &Value, response_text: &str, is_json: bool) {
        self.file.append(&format_exchange(request, response_text, is_json));
    }
}

pub fn format_exchange(request: &Value, response_text: &str, is_json: bool) -> String {
    let request_pretty = serde_json::to_string_pretty(request).unwrap_or_else(|_| request.to_string());
    let mut response_pretty = if is_json {
        serde_json::from_str::<Value>(response_text)
            .ok()
            .and_then(|v| serde_json::to_string_pretty(&v).ok())
            .unwrap_or_else(|| response_text.to_string())
    } else {
        response_text.to_string()
    };
    if !response_pretty.ends_with('\n') {
        response_pretty.push('\n');
    }

    format!(
        "==== BEGIN OLLAMA REQUEST\ntimestamp: {}\n{}\n---- RESPONSE\n{}==== END OLLAMA REQUEST\n\n",
        Utc::now().to_rfc3339(),
        request_pretty,
        response_pretty
    )
}

/// Line-delimited JSON trace of every attempt.
#[derive(Debug)]
pub struct TraceWriter {
    file: AppendFile,
}

impl TraceWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: AppendFile::new(path.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.file.path
    }

    pub fn write(&self, entry: &TraceEntry<'_>) {
        match serde_json::to_string(entry) {
            Ok(line) => self.file.append(&format!("{}\n", line)),
            Err(e) => warn!(error = %e, "Failed to serialize trace entry"),
        }
    }
}
