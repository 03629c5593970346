//! Assessment report rows and their JSONL/CSV serialization

use crate::candidate::lenient;
use crate::scoring::{DecisionCategory, Scores};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Columns of the companion CSV report, in order.
pub const CSV_COLUMNS: [&str; 31] = [
    "id",
    "title",
    "tool_name",
    "homepage",
    "homepage_status",
    "homepage_error",
    "publication_ids",
    "include",
    "in_biotools_name",
    "in_biotools",
    "bio_score",
    "bio_A1",
    "bio_A2",
    "bio_A3",
    "bio_A4",
    "bio_A5",
    "documentation_score",
    "confidence_score",
    "doc_B1",
    "doc_B2",
    "doc_B3",
    "doc_B4",
    "doc_B5",
    "concise_description",
    "rationale",
    "model",
    "origin_types",
    "biotools_api_status",
    "api_name",
    "api_status",
    "api_description",
];

/// One line of the assessment report.
///
/// Registry flags serialize as `null` when unknown. Fields written by other
/// versions of the pipeline are preserved in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionRow {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub id: Option<String>,

    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub homepage: Option<String>,

    #[serde(default)]
    pub homepage_status: Option<Value>,

    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub homepage_error: Option<String>,

    #[serde(default, deserialize_with = "lenient::string_list")]
    pub publication_ids: Vec<String>,

    #[serde(default)]
    pub scores: Scores,

    #[serde(default)]
    pub include: Option<DecisionCategory>,

    #[serde(default)]
    pub decision: Option<DecisionCategory>,

    #[serde(default, deserialize_with = "lenient::opt_bool")]
    pub in_biotools: Option<bool>,

    #[serde(default, deserialize_with = "lenient::opt_bool")]
    pub in_biotools_name: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub biotools_api_status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_description: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DecisionRow {
    /// Identity value stored under `key`, checking `id` then the extra fields.
    pub fn identity(&self, key: &str) -> Option<&str> {
        let value = match key {
            "id" => self.id.as_deref(),
            other => self.extra.get(other).and_then(Value::as_str),
        };
        value.map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn set_decision(&mut self, decision: DecisionCategory) {
        self.include = Some(decision);
        self.decision = Some(decision);
    }

    pub fn category(&self) -> Option<DecisionCategory> {
        self.include.or(self.decision)
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
    }
    Ok(())
}

pub fn write_jsonl<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    ensure_parent(path)?;
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    for row in rows {
        serde_json::to_writer(&mut writer, row)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    ensure_parent(path)?;
    let text = serde_json::to_string_pretty(value)?;
    fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))
}

pub fn write_report_csv(path: &Path, rows: &[DecisionRow]) -> Result<()> {
    ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    writer.write_record(CSV_COLUMNS)?;
    for row in rows {
        writer.write_record(csv_record(row))?;
    }
    writer.flush()?;
    Ok(())
}

fn csv_record(row: &DecisionRow) -> Vec<String> {
    let scores = &row.scores;
    let bio = |key: &str| {
        scores
            .bio_subscores
            .as_ref()
            .and_then(|s| s.get(key))
            .map(|v| v.to_string())
            .unwrap_or_default()
    };
    let doc = |key: &str| {
        scores
            .documentation_subscores
            .as_ref()
            .and_then(|s| s.get(key))
            .map(|v| v.to_string())
            .unwrap_or_default()
    };
    let number = |value: Option<f64>| value.map(|v| v.to_string()).unwrap_or_default();
    let flag = |value: Option<bool>| value.map(|v| v.to_string()).unwrap_or_default();
    let text = |value: &Option<String>| value.clone().unwrap_or_default();
    let status = match &row.homepage_status {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };

    vec![
        text(&row.id),
        text(&row.title),
        scores.tool_name.clone(),
        text(&row.homepage),
        status,
        text(&row.homepage_error),
        join_non_empty(&row.publication_ids),
        row.category().map(|c| c.as_str().to_string()).unwrap_or_default(),
        flag(row.in_biotools_name),
        flag(row.in_biotools),
        number(scores.bio_score),
        bio("A1"),
        bio("A2"),
        bio("A3"),
        bio("A4"),
        bio("A5"),
        number(scores.documentation_score),
        scores.confidence_score.to_string(),
        doc("B1"),
        doc("B2"),
        doc("B3"),
        doc("B4"),
        doc("B5"),
        scores.concise_description.clone(),
        scores.rationale.clone(),
        scores.model.clone(),
        join_non_empty(&scores.origin_types),
        text(&row.biotools_api_status),
        text(&row.api_name),
        text(&row.api_status),
        text(&row.api_description),
    ]
}

fn join_non_empty(values: &[String]) -> String {
    values
        .iter()
        .filter(|v| !v.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::SubScores;
    use tempfile::TempDir;

    fn row() -> DecisionRow {
        let mut row = DecisionRow {
            id: Some("arctic-3d".to_string()),
            title: Some("ARCTIC-3D".to_string()),
            homepage: Some("https://github.com/haddocking/arctic3d".to_string()),
            homepage_status: Some(Value::from(200)),
            publication_ids: vec!["pmid:1".to_string(), "doi:10.1/x".to_string()],
            scores: Scores {
                tool_name: "ARCTIC-3D".to_string(),
                bio_score: Some(0.8),
                bio_subscores: Some(SubScores::from_pairs([("A1", 1.0)])),
                documentation_score: Some(0.5),
                origin_types: vec!["title".to_string(), "homepage".to_string()],
                ..Default::default()
            },
            in_biotools: Some(false),
            ..Default::default()
        };
        row.set_decision(DecisionCategory::Review);
        row
    }

    #[test]
    fn test_csv_record_layout() {
        let record = csv_record(&row());
        assert_eq!(record.len(), CSV_COLUMNS.len());
        assert_eq!(record[4], "200");
        assert_eq!(record[6], "pmid:1, doi:10.1/x");
        assert_eq!(record[7], "review");
        assert_eq!(record[8], "");
        assert_eq!(record[9], "false");
        assert_eq!(record[11], "1");
        assert_eq!(record[12], "");
        assert_eq!(record[26], "title, homepage");
    }

    #[test]
    fn test_jsonl_keeps_unknown_registry_flags_as_null() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("reports/assessment.jsonl");
        write_jsonl(&path, &[row()]).unwrap();

        let line = fs::read_to_string(&path).unwrap();
        let value: Value = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(value["in_biotools_name"], Value::Null);
        assert_eq!(value["include"], "review");
        assert!(value.get("api_name").is_none());
    }

    #[test]
    fn test_row_identity_reads_extra_fields() {
        let row: DecisionRow = serde_json::from_value(serde_json::json!({
            "id": " ",
            "tool_id": "t-1",
            "include": true
        }))
        .unwrap();
        assert_eq!(row.identity("id"), None);
        assert_eq!(row.identity("tool_id"), Some("t-1"));
        assert_eq!(row.category(), Some(DecisionCategory::Add));
    }

    #[test]
    fn test_write_report_csv() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("assessment.csv");
        write_report_csv(&path, &[row()]).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.len(), 31);
        let first = reader.records().next().unwrap().unwrap();
        assert_eq!(&first[0], "arctic-3d");
        assert_eq!(&first[7], "review");
    }
}
