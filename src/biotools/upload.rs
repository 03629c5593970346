use crate::biotools::api::BioToolsApi;
use crate::util::RetryPolicy;
use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const UPLOAD_REPORT_FILE: &str = "upload_report.csv";
const REGISTRY_TOOL_URL: &str = "https://bio.tools/api/tool";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Uploaded,
    Failed,
    Skipped,
}

impl UploadStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            UploadStatus::Uploaded => "uploaded",
            UploadStatus::Failed => "failed",
            UploadStatus::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub biotools_id: String,
    pub status: UploadStatus,
    pub error: Option<String>,
    pub response_code: Option<u16>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Default)]
pub struct UploadReport {
    pub results: Vec<UploadResult>,
}

impl UploadReport {
    pub fn push(&mut self, result: UploadResult) {
        self.results.push(result);
    }

    pub fn count(&self, status: UploadStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }
}

/// Submits each entry in turn. 409 answers are recorded as skipped.
pub async fn upload_entries(
    api: &BioToolsApi,
    entries: &[Map<String, Value>],
    retry: RetryPolicy,
) -> UploadReport {
    let mut report = UploadReport::default();
    for (index, entry) in entries.iter().enumerate() {
        let outcome = api.create_entry(entry, retry).await;
        let status = match (outcome.success, outcome.status_code) {
            (true, _) => UploadStatus::Uploaded,
            (false, Some(409)) => UploadStatus::Skipped,
            (false, _) => UploadStatus::Failed,
        };
        match status {
            UploadStatus::Uploaded => info!(id = %outcome.biotools_id, "Uploaded entry"),
            UploadStatus::Skipped => info!(id = %outcome.biotools_id, "Entry already registered, skipped"),
            UploadStatus::Failed => warn!(
                id = %outcome.biotools_id,
                index,
                error = outcome.error.as_deref().unwrap_or_default(),
                "Upload failed"
            ),
        }
        report.push(UploadResult {
            biotools_id: outcome.biotools_id,
            status,
            error: outcome.error,
            response_code: outcome.status_code,
            timestamp: Utc::now().to_rfc3339(),
        });
    }
    report
}

/// Reads a payload file written by the `run` command.
pub fn load_payload(path: &Path) -> Result<Vec<Map<String, Value>>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read payload {}", path.display()))?;
    let value: Value = serde_json::from_str(&text)
        .with_context(|| format!("Payload {} is not valid JSON", path.display()))?;
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("list") {
            Some(Value::Array(items)) => items,
            _ => anyhow::bail!("Payload {} must be a JSON list", path.display()),
        },
        _ => anyhow::bail!("Payload {} must be a JSON list", path.display()),
    };
    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect())
}

/// Writes `upload_report.csv` into `dir`.
pub fn write_upload_report_csv(report: &UploadReport, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(UPLOAD_REPORT_FILE);
    let mut writer = csv::Writer::from_path(&path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    writer.write_record([
        "biotoolsID",
        "status",
        "error",
        "response_code",
        "timestamp",
        "bio_tools_url",
    ])?;
    for result in &report.results {
        let url = if result.status == UploadStatus::Uploaded {
            format!("{}/{}", REGISTRY_TOOL_URL, result.biotools_id)
        } else {
            String::new()
        };
        writer.write_record([
            result.biotools_id.clone(),
            result.status.as_str().to_string(),
            result.error.clone().unwrap_or_default(),
            result.response_code.map(|c| c.to_string()).unwrap_or_default(),
            result.timestamp.clone(),
            url,
        ])?;
    }
    writer.flush()?;
    Ok(path)
}
