//! Configuration management for biotools-annotate
//!
//! Settings come from a YAML file with one section per concern
//! (`pipeline`, `ollama`, `enrichment`, `logging`, `biotools`, `pub2tools`).
//! Every field has a default, so an empty or missing file is valid.
//!
//! # File lookup
//!
//! 1. The explicit `--config` path
//! 2. `./config.yaml`
//! 3. `<user config dir>/biotools-annotate/config.yaml`
//! 4. Built-in defaults
//!
//! # Environment Variables
//!
//! - `OLLAMA_HOST` - Ollama server URL
//! - `BIOTOOLS_ANNOTATE_MODEL` - Model used for scoring
//! - `BIOTOOLS_ANNOTATE_INPUT` / `BIOTOOLS_ANNOTATE_JSON` - Explicit candidate file
//! - `BIOTOOLS_ANNOTATE_CONCURRENCY` - Parallel scoring and scraping workers
//! - `BIOTOOLS_PROGRESS` - Progress display mode (read by [`crate::progress`])
//!
//! Command-line flags are applied on top of the merged result.

use crate::biotools::api::{DEFAULT_API_BASE, DEFAULT_TOKEN_FILE, DEFAULT_VALIDATE_URL};
use crate::llm::{OllamaConfig, DEFAULT_HOST, DEFAULT_MODEL};
use crate::pipeline::{PipelineConfig, RunPaths};
use crate::scoring::Thresholds;
use crate::sources::{EuropePmcConfig, HomepageConfig, Pub2ToolsConfig};
use crate::util::{parse_since, LoggingConfig, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const CONFIG_FILE: &str = "config.yaml";
pub const APP_DIR: &str = "biotools-annotate";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("Failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid YAML for this schema
    #[error("Failed to parse config file {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    /// A date window value is neither a date nor a relative offset
    #[error("Invalid date window value '{value}': {message}")]
    InvalidSince { value: String, message: String },
}

/// `(review, add)` cut-offs as written in the file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdSection {
    pub review: f64,
    pub add: f64,
}

impl Default for ThresholdSection {
    fn default() -> Self {
        let defaults = Thresholds::bio_default();
        Self {
            review: defaults.review,
            add: defaults.add,
        }
    }
}

impl From<ThresholdSection> for Thresholds {
    fn from(section: ThresholdSection) -> Self {
        Thresholds::new(section.review, section.add)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    /// Start of the extraction window (`7d`, `2025-01-01`, ...)
    pub from_date: String,
    pub to_date: Option<String>,
    pub bio_thresholds: ThresholdSection,
    pub doc_thresholds: ThresholdSection,
    pub limit: Option<usize>,
    pub concurrency: usize,
    pub output_root: PathBuf,
    pub input: Option<PathBuf>,
    pub registry_path: Option<PathBuf>,
    pub payload_path: Option<PathBuf>,
    pub report_path: Option<PathBuf>,
    pub enriched_cache: Option<PathBuf>,
    pub resume_from_enriched: bool,
    pub resume_from_pub2tools: bool,
    pub resume_from_scoring: bool,
    pub offline: bool,
    pub dry_run: bool,
    pub validate_biotools_api: bool,
}

impl Default for PipelineSection {
    fn default() -> Self {
        let defaults = PipelineConfig::default();
        Self {
            from_date: defaults.from_date,
            to_date: defaults.to_date,
            bio_thresholds: ThresholdSection::default(),
            doc_thresholds: ThresholdSection::default(),
            limit: defaults.limit,
            concurrency: defaults.concurrency,
            output_root: defaults.output_root,
            input: None,
            registry_path: None,
            payload_path: None,
            report_path: None,
            enriched_cache: None,
            resume_from_enriched: false,
            resume_from_pub2tools: false,
            resume_from_scoring: false,
            offline: false,
            dry_run: false,
            validate_biotools_api: false,
        }
    }
}

/// Ollama settings with durations in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaSection {
    pub host: String,
    pub model: String,
    pub temperature: f64,
    pub top_p: f64,
    pub seed: Option<i64>,
    pub max_retries: u32,
    pub retry_backoff_secs: u64,
    pub timeout_secs: u64,
    pub num_ctx: Option<u32>,
    pub force_json_format: bool,
    /// Attempts per candidate, counting schema repairs
    pub max_attempts: u32,
}

impl Default for OllamaSection {
    fn default() -> Self {
        let defaults = OllamaConfig::default();
        Self {
            host: DEFAULT_HOST.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: defaults.temperature,
            top_p: defaults.top_p,
            seed: None,
            max_retries: defaults.max_retries,
            retry_backoff_secs: defaults.retry_backoff.as_secs(),
            timeout_secs: defaults.timeout.as_secs(),
            num_ctx: defaults.num_ctx,
            force_json_format: defaults.force_json_format,
            max_attempts: 2,
        }
    }
}

impl OllamaSection {
    /// Client settings with log and trace files placed in the run folder.
    pub fn to_client_config(&self, paths: &RunPaths) -> OllamaConfig {
        OllamaConfig {
            host: self.host.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
            top_p: self.top_p,
            max_retries: self.max_retries,
            retry_backoff: Duration::from_secs(self.retry_backoff_secs),
            timeout: Duration::from_secs(self.timeout_secs),
            num_ctx: self.num_ctx,
            force_json_format: self.force_json_format,
            llm_log: paths.llm_log.clone(),
            llm_trace: paths.llm_trace.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentSection {
    pub homepage: HomepageConfig,
    pub europe_pmc: EuropePmcConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl LoggingSection {
    pub fn to_logging_config(&self) -> LoggingConfig {
        LoggingConfig {
            level: crate::util::logging::parse_level(&self.level),
            use_json: self.json,
            ..LoggingConfig::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BioToolsSection {
    pub api_base: String,
    pub validate_url: String,
    pub token_file: PathBuf,
    pub max_retries: u32,
    pub retry_delay_secs: u64,
}

impl Default for BioToolsSection {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            validate_url: DEFAULT_VALIDATE_URL.to_string(),
            token_file: PathBuf::from(DEFAULT_TOKEN_FILE),
            max_retries: 3,
            retry_delay_secs: 5,
        }
    }
}

impl BioToolsSection {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_secs(self.retry_delay_secs))
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotateConfig {
    pub pipeline: PipelineSection,
    pub ollama: OllamaSection,
    pub enrichment: EnrichmentSection,
    pub logging: LoggingSection,
    pub biotools: BioToolsSection,
    pub pub2tools: Pub2ToolsConfig,
}

impl AnnotateConfig {
    /// Parses a YAML document. An empty document yields the defaults.
    pub fn from_yaml(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(|e| ConfigError::Parse {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text, path)
    }

    /// Candidate config files in lookup order.
    pub fn search_paths(explicit: Option<&Path>) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Some(path) = explicit {
            paths.push(path.to_path_buf());
        }
        paths.push(PathBuf::from(CONFIG_FILE));
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join(APP_DIR).join(CONFIG_FILE));
        }
        paths
    }

    /// Loads the first config file found, then applies environment overrides.
    ///
    /// An explicit path that does not exist is an error; the fallback
    /// locations are optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "config file not found"),
                });
            }
        }

        let mut config = match Self::search_paths(explicit).into_iter().find(|p| p.is_file()) {
            Some(path) => {
                debug!("Loading configuration from {}", path.display());
                Self::from_file(&path)?
            }
            None => {
                debug!("No configuration file found; using defaults");
                Self::default()
            }
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(host) = non_empty_env("OLLAMA_HOST") {
            self.ollama.host = host;
        }
        if let Some(model) = non_empty_env("BIOTOOLS_ANNOTATE_MODEL") {
            self.ollama.model = model;
        }
        if let Some(input) = non_empty_env("BIOTOOLS_ANNOTATE_INPUT").or_else(|| non_empty_env("BIOTOOLS_ANNOTATE_JSON")) {
            self.pipeline.input = Some(PathBuf::from(input));
        }
        if let Some(raw) = non_empty_env("BIOTOOLS_ANNOTATE_CONCURRENCY") {
            match raw.parse::<usize>() {
                Ok(value) => self.pipeline.concurrency = value,
                Err(_) => warn!("Ignoring invalid BIOTOOLS_ANNOTATE_CONCURRENCY value '{}'", raw),
            }
        }
    }

    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for zero concurrency, zero timeouts, unknown log
    /// levels or unparseable date window values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.concurrency == 0 {
            return Err(ConfigError::ValidationFailed(
                "Concurrency must be at least 1".to_string(),
            ));
        }
        if self.ollama.timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "Ollama timeout must be at least 1 second".to_string(),
            ));
        }
        if self.enrichment.homepage.timeout == 0 || self.enrichment.europe_pmc.timeout == 0 {
            return Err(ConfigError::ValidationFailed(
                "Enrichment timeouts must be at least 1 second".to_string(),
            ));
        }
        if self.ollama.max_attempts == 0 {
            return Err(ConfigError::ValidationFailed(
                "Scoring needs at least one attempt".to_string(),
            ));
        }

        let level = self.logging.level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::ValidationFailed(format!(
                "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                self.logging.level
            )));
        }

        let dates = std::iter::once(&self.pipeline.from_date).chain(self.pipeline.to_date.as_ref());
        for value in dates {
            parse_since(value).map_err(|e| ConfigError::InvalidSince {
                value: value.clone(),
                message: e.to_string(),
            })?;
        }
        Ok(())
    }

    /// Flattens the file sections into run settings.
    pub fn to_pipeline_config(&self) -> PipelineConfig {
        let p = &self.pipeline;
        let mut config = PipelineConfig::new()
            .with_dates(p.from_date.clone(), p.to_date.clone())
            .with_thresholds(p.bio_thresholds.into(), p.doc_thresholds.into())
            .with_limit(p.limit)
            .with_concurrency(p.concurrency)
            .with_offline(p.offline)
            .with_dry_run(p.dry_run)
            .with_resume(p.resume_from_enriched, p.resume_from_pub2tools, p.resume_from_scoring)
            .with_input(p.input.clone())
            .with_registry_path(p.registry_path.clone())
            .with_output_root(p.output_root.clone())
            .with_model(self.ollama.model.clone())
            .with_enrichment(self.enrichment.homepage.enabled, self.enrichment.europe_pmc.enabled)
            .with_validate_biotools_api(p.validate_biotools_api);
        config.payload_path = p.payload_path.clone();
        config.report_path = p.report_path.clone();
        config.enriched_cache = p.enriched_cache.clone();
        config
    }

    /// Writes the effective configuration next to the run's artifacts.
    /// Failures are logged and ignored.
    pub fn write_snapshot(&self, path: &Path) {
        let result = serde_yaml::to_string(self)
            .map_err(|e| e.to_string())
            .and_then(|text| {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
                }
                std::fs::write(path, text).map_err(|e| e.to_string())
            });
        match result {
            Ok(()) => info!("Configuration snapshot written to {}", path.display()),
            Err(e) => warn!("Failed to write configuration snapshot {}: {}", path.display(), e),
        }
    }
}

impl fmt::Display for AnnotateConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "biotools-annotate configuration:")?;
        writeln!(f, "  Ollama: {} ({})", self.ollama.host, self.ollama.model)?;
        writeln!(f, "  Window: {} .. {}", self.pipeline.from_date, self.pipeline.to_date.as_deref().unwrap_or("today"))?;
        writeln!(f, "  Output root: {}", self.pipeline.output_root.display())?;
        writeln!(f, "  Concurrency: {}", self.pipeline.concurrency)?;
        writeln!(f, "  Log level: {}", self.logging.level)?;
        Ok(())
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
