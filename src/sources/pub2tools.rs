//! Pub2Tools extraction tool invocation
//!
//! The external tool writes `to_biotools.json` into its output directory;
//! candidates are read back from there with the regular loader.

use crate::candidate::{load_candidates, Candidate};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

pub const EXPORT_FILE: &str = "to_biotools.json";

/// Date window for one extraction run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FetchWindow {
    pub from: DateTime<Utc>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

#[async_trait]
pub trait CandidateFetcher: Send + Sync {
    async fn fetch(&self, window: &FetchWindow, output_dir: &Path) -> Result<Vec<Candidate>>;

    fn name(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pub2ToolsConfig {
    /// Executable, or a wrapper script around the Pub2Tools jar.
    pub cli_path: String,
    pub edam_owl: String,
    pub idf: String,
    pub idf_stemmed: String,
}

impl Default for Pub2ToolsConfig {
    fn default() -> Self {
        Self {
            cli_path: "pub2tools".to_string(),
            edam_owl: "http://edamontology.org/EDAM.owl".to_string(),
            idf: "https://github.com/edamontology/edammap/raw/master/doc/biotools.idf".to_string(),
            idf_stemmed: "https://github.com/edamontology/edammap/raw/master/doc/biotools.stemmed.idf"
                .to_string(),
        }
    }
}

pub struct Pub2ToolsCli {
    config: Pub2ToolsConfig,
}

impl Pub2ToolsCli {
    pub fn new(config: Pub2ToolsConfig) -> Self {
        Self { config }
    }

    /// Arguments passed after the executable.
    pub fn build_args(&self, window: &FetchWindow, output_dir: &Path) -> Vec<String> {
        let mut args = vec![
            "-all".to_string(),
            output_dir.display().to_string(),
            "--edam".to_string(),
            self.config.edam_owl.clone(),
            "--idf".to_string(),
            self.config.idf.clone(),
            "--idf-stemmed".to_string(),
            self.config.idf_stemmed.clone(),
            "--from".to_string(),
            window.from.date_naive().to_string(),
        ];
        let to = window.to.unwrap_or_else(Utc::now);
        args.push("--to".to_string());
        args.push(to.date_naive().to_string());
        args
    }
}

#[async_trait]
impl CandidateFetcher for Pub2ToolsCli {
    async fn fetch(&self, window: &FetchWindow, output_dir: &Path) -> Result<Vec<Candidate>> {
        tokio::fs::create_dir_all(output_dir)
            .await
            .with_context(|| format!("Failed to create {}", output_dir.display()))?;

        let args = self.build_args(window, output_dir);
        info!(cli = %self.config.cli_path, output = %output_dir.display(), "Running Pub2Tools");
        debug!(args = ?args, "Pub2Tools arguments");

        let output = Command::new(&self.config.cli_path)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("Failed to spawn {}", self.config.cli_path))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "Pub2Tools exited with {}: {}",
                output.status,
                stderr.trim().chars().take(500).collect::<String>()
            );
        }

        let mut candidates = load_candidates(&output_dir.join(EXPORT_FILE));
        if let Some(limit) = window.limit {
            candidates.truncate(limit);
        }
        Ok(candidates)
    }

    fn name(&self) -> &str {
        "pub2tools"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_build_args() {
        let cli = Pub2ToolsCli::new(Pub2ToolsConfig::default());
        let window = FetchWindow {
            from: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            to: Some(Utc.with_ymd_and_hms(2025, 1, 31, 0, 0, 0).unwrap()),
            limit: None,
        };
        let args = cli.build_args(&window, Path::new("out/pub2tools"));
        assert_eq!(args[0], "-all");
        assert_eq!(args[1], "out/pub2tools");
        let from = args.iter().position(|a| a == "--from").unwrap();
        assert_eq!(args[from + 1], "2025-01-01");
        let to = args.iter().position(|a| a == "--to").unwrap();
        assert_eq!(args[to + 1], "2025-01-31");
    }

    #[tokio::test]
    async fn test_missing_executable_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let cli = Pub2ToolsCli::new(Pub2ToolsConfig {
            cli_path: "/nonexistent/pub2tools-binary".to_string(),
            ..Default::default()
        });
        let window = FetchWindow {
            from: Utc::now(),
            to: None,
            limit: None,
        };
        assert!(cli.fetch(&window, dir.path()).await.is_err());
    }
}
