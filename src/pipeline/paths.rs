//! Per-run artifact layout
//!
//! Every run writes below `<output_root>/<label>/`. Explicit paths that point
//! inside the output root are moved into the label folder; paths outside it
//! are used as given.

use super::config::PipelineConfig;
use crate::output::review_payload_path;
use crate::util::{parse_since, SinceError};
use chrono::{DateTime, NaiveDate, Utc};
use std::path::{Path, PathBuf};

pub const CUSTOM_LABEL: &str = "custom_tool_set";
pub const VALIDATION_ERRORS_FILE: &str = "schema_validation_errors.jsonl";
pub const CONFIG_SNAPSHOT_FILE: &str = "config.generated.yaml";

const RUN_FOLDERS: [&str; 7] = [
    "exports",
    "reports",
    "cache",
    "logs",
    "logs/ollama",
    "pub2tools",
    "ollama",
];

/// `custom_tool_set` for explicit input, else `range_<from>_to_<to>`.
pub fn time_period_label(has_explicit_input: bool, from: NaiveDate, to: Option<NaiveDate>, today: NaiveDate) -> String {
    if has_explicit_input {
        return CUSTOM_LABEL.to_string();
    }
    format!("range_{}_to_{}", from, to.unwrap_or(today))
}

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

/// Moves `raw` under `root` when it lives in `base` but not already in `root`.
pub fn rebase(raw: &Path, base: &Path, root: &Path) -> PathBuf {
    let abs = absolutize(raw);
    let root_abs = absolutize(root);
    let base_abs = absolutize(base);

    if abs.starts_with(&root_abs) {
        return abs;
    }
    match abs.strip_prefix(&base_abs) {
        Ok(relative) => root.join(relative),
        Err(_) => {
            if raw.is_absolute() {
                abs
            } else {
                raw.to_path_buf()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunPaths {
    pub label: String,
    pub from: DateTime<Utc>,
    pub to: Option<DateTime<Utc>>,
    pub base: PathBuf,
    pub root: PathBuf,
    pub payload: PathBuf,
    pub review_payload: PathBuf,
    pub report: PathBuf,
    pub report_csv: PathBuf,
    pub enriched_cache: PathBuf,
    pub validation_errors: PathBuf,
    pub pub2tools_dir: PathBuf,
    pub llm_log: PathBuf,
    pub llm_trace: PathBuf,
}

impl RunPaths {
    pub fn resolve(config: &PipelineConfig) -> Result<Self, SinceError> {
        let from = parse_since(&config.from_date)?;
        let to = config.to_date.as_deref().map(parse_since).transpose()?;
        let label = time_period_label(
            config.input.is_some(),
            from.date_naive(),
            to.map(|t| t.date_naive()),
            Utc::now().date_naive(),
        );
        Ok(Self::with_label(config, label, from, to))
    }

    pub fn with_label(config: &PipelineConfig, label: String, from: DateTime<Utc>, to: Option<DateTime<Utc>>) -> Self {
        let base = config.output_root.clone();
        let root = base.join(&label);
        let place = |explicit: &Option<PathBuf>, default: &str| {
            let raw = explicit.clone().unwrap_or_else(|| base.join(default));
            rebase(&raw, &base, &root)
        };

        let payload = place(&config.payload_path, "exports/biotools_payload.json");
        let report = place(&config.report_path, "reports/assessment.jsonl");
        let enriched_cache = place(&config.enriched_cache, "cache/enriched_candidates.json.gz");
        let llm_log = place(&config.llm_log, "logs/ollama/ollama.log");
        let llm_trace = place(&config.llm_trace, "ollama/trace.jsonl");

        let validation_errors = payload
            .parent()
            .map(|p| p.join(VALIDATION_ERRORS_FILE))
            .unwrap_or_else(|| PathBuf::from(VALIDATION_ERRORS_FILE));

        Self {
            review_payload: review_payload_path(&payload),
            report_csv: report.with_extension("csv"),
            pub2tools_dir: root.join("pub2tools"),
            label,
            from,
            to,
            base,
            root,
            payload,
            report,
            enriched_cache,
            validation_errors,
            llm_log,
            llm_trace,
        }
    }

    /// Creates the label folder and its standard subfolders.
    pub fn prepare(&self) -> std::io::Result<()> {
        for folder in RUN_FOLDERS {
            std::fs::create_dir_all(self.root.join(folder))?;
        }
        for file in [&self.llm_log, &self.llm_trace, &self.payload, &self.report] {
            if let Some(parent) = file.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
        }
        Ok(())
    }

    /// Where an extraction export for this run may already exist.
    pub fn export_search_bases(&self) -> Vec<PathBuf> {
        vec![
            self.root.join("pub2tools"),
            self.base.join("pub2tools"),
            self.root.join("pipeline").join("pub2tools"),
            self.base.join("pipeline").join("pub2tools"),
            self.root.clone(),
        ]
    }

    pub fn config_snapshot(&self) -> PathBuf {
        self.root.join(CONFIG_SNAPSHOT_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_time_period_label() {
        let today = date(2025, 3, 10);
        assert_eq!(time_period_label(true, date(2025, 1, 1), None, today), "custom_tool_set");
        assert_eq!(
            time_period_label(false, date(2025, 1, 1), None, today),
            "range_2025-01-01_to_2025-03-10"
        );
        assert_eq!(
            time_period_label(false, date(2025, 1, 1), Some(date(2025, 1, 31)), today),
            "range_2025-01-01_to_2025-01-31"
        );
    }

    #[test]
    fn test_rebase() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("out");
        let root = base.join("custom_tool_set");

        assert_eq!(
            rebase(&base.join("reports/a.jsonl"), &base, &root),
            root.join("reports/a.jsonl")
        );
        assert_eq!(rebase(&root.join("x.json"), &base, &root), root.join("x.json"));

        let outside = dir.path().join("elsewhere/report.jsonl");
        assert_eq!(rebase(&outside, &base, &root), outside);
    }

    #[test]
    fn test_default_layout() {
        let dir = TempDir::new().unwrap();
        let config = PipelineConfig::new()
            .with_output_root(dir.path())
            .with_input(Some(PathBuf::from("in.json")));
        let from = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let paths = RunPaths::with_label(&config, CUSTOM_LABEL.to_string(), from, None);

        let root = dir.path().join(CUSTOM_LABEL);
        assert_eq!(paths.root, root);
        assert_eq!(paths.payload, root.join("exports/biotools_payload.json"));
        assert_eq!(paths.review_payload, root.join("exports/biotools_review_payload.json"));
        assert_eq!(paths.report, root.join("reports/assessment.jsonl"));
        assert_eq!(paths.report_csv, root.join("reports/assessment.csv"));
        assert_eq!(paths.enriched_cache, root.join("cache/enriched_candidates.json.gz"));
        assert_eq!(paths.validation_errors, root.join("exports/schema_validation_errors.jsonl"));
        assert_eq!(paths.llm_log, root.join("logs/ollama/ollama.log"));
        assert_eq!(paths.llm_trace, root.join("ollama/trace.jsonl"));

        paths.prepare().unwrap();
        assert!(root.join("pub2tools").is_dir());
        assert!(root.join("logs/ollama").is_dir());
    }
}
