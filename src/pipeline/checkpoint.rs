//! Checkpoints between stages
//!
//! Two artifacts let a run pick up where an earlier one stopped: the gzipped
//! enriched-candidate cache written after dedup/enrich, and the assessment
//! report written after scoring. [`ResumeManager`] decides which of them a
//! run can reuse.

use super::paths::RunPaths;
use crate::candidate::{Candidate, IDENTITY_KEYS};
use crate::output::DecisionRow;
use crate::sources::pub2tools::EXPORT_FILE;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::Value;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Checkpoint not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("Failed to access checkpoint {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Checkpoint {} is not valid: {message}", path.display())]
    Decode { path: PathBuf, message: String },

    #[error("Invalid assessment row at {}:{line}: {message}", path.display())]
    InvalidRow {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Checkpoint {} contains no records", .0.display())]
    Empty(PathBuf),
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> CheckpointError + '_ {
    move |source| CheckpointError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn write_enriched(candidates: &[Candidate], path: &Path) -> Result<(), CheckpointError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
    }
    let file = File::create(path).map_err(io_error(path))?;
    let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    serde_json::to_writer(&mut encoder, candidates).map_err(|e| CheckpointError::Decode {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let mut inner = encoder.finish().map_err(io_error(path))?;
    inner.flush().map_err(io_error(path))?;
    Ok(())
}

/// Writes the enriched cache. Failures are logged, never raised.
pub fn save_enriched(candidates: &[Candidate], path: &Path) {
    match write_enriched(candidates, path) {
        Ok(()) => info!("CACHE saved enriched candidates -> {}", path.display()),
        Err(e) => warn!(error = %e, "Failed to write enriched cache"),
    }
}

pub fn load_enriched(path: &Path) -> Result<Vec<Candidate>, CheckpointError> {
    if !path.exists() {
        return Err(CheckpointError::Missing(path.to_path_buf()));
    }
    let file = File::open(path).map_err(io_error(path))?;
    let data: Value = serde_json::from_reader(GzDecoder::new(BufReader::new(file))).map_err(|e| {
        CheckpointError::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    })?;

    let Value::Array(items) = data else {
        return Err(CheckpointError::Decode {
            path: path.to_path_buf(),
            message: "enriched cache is not a list of candidates".to_string(),
        });
    };

    Ok(items
        .into_iter()
        .filter(Value::is_object)
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

/// True when a path component equals `label` or starts with `<label>_`.
pub fn export_matches_time_period(path: &Path, label: &str) -> bool {
    let prefix = format!("{}_", label);
    path.components().any(|part| {
        let part = part.as_os_str().to_string_lossy();
        part == label || part.starts_with(&prefix)
    })
}

fn modified(path: &Path) -> Option<SystemTime> {
    path.metadata().and_then(|m| m.modified()).ok()
}

/// Newest extraction export under `bases` whose path carries `label`.
///
/// Each base may be the export file itself, a folder holding it, or a folder
/// whose direct children hold it. Exports for other time periods are ignored.
pub fn find_latest_export(bases: &[PathBuf], label: &str) -> Option<PathBuf> {
    let mut found: Vec<(SystemTime, PathBuf)> = Vec::new();
    let mut push = |path: PathBuf| {
        if let Some(time) = modified(&path) {
            found.push((time, path));
        }
    };

    for base in bases {
        if base.is_file() {
            if base.file_name().and_then(|n| n.to_str()) == Some(EXPORT_FILE) {
                push(base.clone());
            }
            continue;
        }
        if !base.is_dir() {
            continue;
        }
        let direct = base.join(EXPORT_FILE);
        if direct.is_file() {
            push(direct);
        }
        let Ok(entries) = std::fs::read_dir(base) else {
            continue;
        };
        let mut children: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
        children.sort();
        for child in children.into_iter().filter(|c| c.is_dir()) {
            let export = child.join(EXPORT_FILE);
            if export.is_file() {
                push(export);
            }
        }
    }

    let total = found.len();
    let latest = found
        .into_iter()
        .filter(|(_, path)| export_matches_time_period(path, label))
        .max_by_key(|(time, _)| *time)
        .map(|(_, path)| path);
    if latest.is_none() && total > 0 {
        debug!(label = %label, exports = total, "No export matches the time period");
    }
    latest
}

/// Reads an assessment report.
///
/// Blank lines and non-object lines are skipped; a `scores` value that is
/// not an object is replaced by an empty one.
pub fn load_report(path: &Path) -> Result<Vec<DecisionRow>, CheckpointError> {
    if !path.exists() {
        return Err(CheckpointError::Missing(path.to_path_buf()));
    }
    let file = File::open(path).map_err(io_error(path))?;
    let mut rows = Vec::new();

    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(io_error(path))?;
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        let invalid = |message: String| CheckpointError::InvalidRow {
            path: path.to_path_buf(),
            line: idx + 1,
            message,
        };

        let mut value: Value = serde_json::from_str(text).map_err(|e| invalid(e.to_string()))?;
        let Some(object) = value.as_object_mut() else {
            continue;
        };
        if !matches!(object.get("scores"), Some(Value::Object(_))) {
            object.insert("scores".to_string(), Value::Object(Default::default()));
        }
        let row: DecisionRow = serde_json::from_value(value).map_err(|e| invalid(e.to_string()))?;
        rows.push(row);
    }
    Ok(rows)
}

/// Lookup from report rows back to candidates by identifier or title.
///
/// A candidate is handed out at most once.
#[derive(Debug, Default)]
pub struct CandidateIndex {
    by_id: HashMap<String, usize>,
    by_title: HashMap<String, usize>,
    keys: HashMap<usize, (Vec<String>, Option<String>)>,
}

impl CandidateIndex {
    pub fn build(candidates: &[Candidate]) -> Self {
        let mut index = Self::default();
        for (position, candidate) in candidates.iter().enumerate() {
            let ids: Vec<String> = IDENTITY_KEYS
                .iter()
                .filter_map(|key| candidate.identity(key))
                .map(|v| v.trim().to_string())
                .collect();
            for id in &ids {
                index.by_id.entry(id.clone()).or_insert(position);
            }
            let title = candidate.display_title().map(|t| t.trim().to_string());
            if let Some(title) = &title {
                index.by_title.entry(title.clone()).or_insert(position);
            }
            index.keys.insert(position, (ids, title));
        }
        index
    }

    /// Position of the candidate matching `row`, removing it from the index.
    pub fn take_match(&mut self, row: &DecisionRow) -> Option<usize> {
        let by_id = IDENTITY_KEYS
            .iter()
            .filter_map(|key| row.identity(key))
            .find_map(|id| self.by_id.get(id).copied());
        let position = by_id.or_else(|| {
            row.title
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .and_then(|t| self.by_title.get(t).copied())
        })?;
        self.forget(position);
        Some(position)
    }

    fn forget(&mut self, position: usize) {
        if let Some((ids, title)) = self.keys.remove(&position) {
            for id in ids {
                if self.by_id.get(&id) == Some(&position) {
                    self.by_id.remove(&id);
                }
            }
            if let Some(title) = title {
                if self.by_title.get(&title) == Some(&position) {
                    self.by_title.remove(&title);
                }
            }
        }
    }
}

/// What an upcoming run can reuse.
#[derive(Debug, Default)]
pub struct ResumePlan {
    pub cached_rows: Option<Vec<DecisionRow>>,
    pub resume_from_enriched: bool,
}

pub struct ResumeManager {
    report: PathBuf,
    enriched_cache: PathBuf,
}

impl ResumeManager {
    pub fn new(report: impl Into<PathBuf>, enriched_cache: impl Into<PathBuf>) -> Self {
        Self {
            report: report.into(),
            enriched_cache: enriched_cache.into(),
        }
    }

    pub fn from_paths(paths: &RunPaths) -> Self {
        Self::new(&paths.report, &paths.enriched_cache)
    }

    /// Resolves the resume flags against the files on disk.
    ///
    /// Reusing scoring needs the enriched cache too; when the report is
    /// missing or unusable the run falls back to re-scoring the cached
    /// candidates, or to a full run when there is no cache either.
    pub fn plan(&self, resume_scoring: bool, resume_enriched: bool) -> ResumePlan {
        let mut plan = ResumePlan {
            cached_rows: None,
            resume_from_enriched: resume_enriched,
        };
        if !resume_scoring {
            return plan;
        }

        let cache_exists = self.enriched_cache.exists();
        match load_report(&self.report) {
            Ok(rows) if !rows.is_empty() => {
                info!(
                    rows = rows.len(),
                    "RESUME loaded assessment report {}",
                    self.report.display()
                );
                plan.cached_rows = Some(rows);
            }
            Ok(_) => warn!(
                "--resume-from-scoring requested but {} has no rows; rerunning scoring",
                self.report.display()
            ),
            Err(CheckpointError::Missing(path)) => warn!(
                "--resume-from-scoring requested but {} is missing; rerunning scoring",
                path.display()
            ),
            Err(e) => warn!(error = %e, "--resume-from-scoring could not read the report; rerunning scoring"),
        }

        if cache_exists {
            plan.resume_from_enriched = true;
        } else if plan.cached_rows.is_some() {
            warn!(
                "--resume-from-scoring requested but enriched cache {} is missing",
                self.enriched_cache.display()
            );
        }
        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::write_jsonl;
    use serde_json::json;
    use tempfile::TempDir;

    fn candidate(value: Value) -> Candidate {
        serde_json::from_value(value).unwrap()
    }

    fn row(value: Value) -> DecisionRow {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_enriched_cache_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache/enriched.json.gz");
        let candidates = vec![candidate(json!({"title": "ToolX", "homepage": "https://toolx.org"}))];

        save_enriched(&candidates, &path);
        let loaded = load_enriched(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].title.as_deref(), Some("ToolX"));
    }

    #[test]
    fn test_load_enriched_errors() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            load_enriched(&dir.path().join("none.gz")),
            Err(CheckpointError::Missing(_))
        ));

        let plain = dir.path().join("plain.gz");
        std::fs::write(&plain, "not gzip").unwrap();
        assert!(matches!(load_enriched(&plain), Err(CheckpointError::Decode { .. })));
    }

    #[test]
    fn test_export_matches_time_period() {
        let label = "range_2025-01-01_to_2025-01-31";
        assert!(export_matches_time_period(
            Path::new("/out/range_2025-01-01_to_2025-01-31/pub2tools/to_biotools.json"),
            label
        ));
        assert!(export_matches_time_period(
            Path::new("/p/range_2025-01-01_to_2025-01-31_rerun/to_biotools.json"),
            label
        ));
        assert!(!export_matches_time_period(
            Path::new("/out/range_2024-01-01_to_2024-01-31/to_biotools.json"),
            label
        ));
    }

    #[test]
    fn test_find_latest_export_ignores_other_periods() {
        let dir = TempDir::new().unwrap();
        let label = "range_2025-01-01_to_2025-01-31";
        let other = dir.path().join("range_2024-06-01_to_2024-06-30");
        let matching = dir.path().join(label);
        std::fs::create_dir_all(&other).unwrap();
        std::fs::create_dir_all(&matching).unwrap();
        std::fs::write(other.join(EXPORT_FILE), "[]").unwrap();
        std::fs::write(matching.join(EXPORT_FILE), "[]").unwrap();

        let found = find_latest_export(&[dir.path().to_path_buf()], label).unwrap();
        assert_eq!(found, matching.join(EXPORT_FILE));

        assert!(find_latest_export(&[other.clone()], label).is_none());
        assert!(find_latest_export(&[dir.path().join("missing")], label).is_none());
    }

    #[test]
    fn test_load_report() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("assessment.jsonl");
        std::fs::write(
            &path,
            "{\"id\": \"toolx\", \"scores\": {\"bio_score\": 0.9}}\n\n[1, 2]\n{\"title\": \"Y\", \"scores\": \"oops\"}\n",
        )
        .unwrap();

        let rows = load_report(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].scores.bio_score, Some(0.9));
        assert_eq!(rows[1].scores.bio_score, None);
    }

    #[test]
    fn test_load_report_invalid_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("assessment.jsonl");
        std::fs::write(&path, "{\"id\": \"a\"}\n{broken\n").unwrap();

        match load_report(&path) {
            Err(CheckpointError::InvalidRow { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected result: {:?}", other.map(|r| r.len())),
        }
    }

    #[test]
    fn test_candidate_index_matches_once() {
        let candidates = vec![
            candidate(json!({"id": "toolx", "title": "ToolX"})),
            candidate(json!({"name": "ToolY"})),
        ];
        let mut index = CandidateIndex::build(&candidates);

        assert_eq!(index.take_match(&row(json!({"id": "toolx"}))), Some(0));
        assert_eq!(index.take_match(&row(json!({"title": "ToolX"}))), None);
        assert_eq!(index.take_match(&row(json!({"id": "nope", "title": " ToolY "}))), Some(1));
        assert_eq!(index.take_match(&row(json!({"title": "ToolY"}))), None);
    }

    #[test]
    fn test_resume_plan() {
        let dir = TempDir::new().unwrap();
        let report = dir.path().join("assessment.jsonl");
        let cache = dir.path().join("enriched.json.gz");
        let manager = ResumeManager::new(&report, &cache);

        let plan = manager.plan(false, false);
        assert!(plan.cached_rows.is_none() && !plan.resume_from_enriched);

        let plan = manager.plan(true, false);
        assert!(plan.cached_rows.is_none() && !plan.resume_from_enriched);

        save_enriched(&[candidate(json!({"title": "ToolX"}))], &cache);
        let plan = manager.plan(true, false);
        assert!(plan.cached_rows.is_none());
        assert!(plan.resume_from_enriched);

        write_jsonl(&report, &[row(json!({"id": "toolx", "title": "ToolX"}))]).unwrap();
        let plan = manager.plan(true, false);
        assert_eq!(plan.cached_rows.map(|r| r.len()), Some(1));
        assert!(plan.resume_from_enriched);
    }
}
