//! biotools-annotate - LLM-assisted curation of bio.tools candidates
//!
//! Candidate tools mined from recent publications (by Pub2Tools or from a
//! JSON file) flow through five stages:
//!
//! 1. **Gather** the candidates, resuming from a cache when asked
//! 2. **Dedup** them and flag registry membership
//! 3. **Enrich** them with homepage status and Europe PMC abstracts
//! 4. **Score** bio relevance and documentation quality with a local Ollama
//!    model, falling back to heuristics when the model is unavailable
//! 5. **Output** an assessment report plus validated bio.tools payloads
//!
//! # Example Usage
//!
//! ```no_run
//! use biotools_annotate::pipeline::{
//!     PipelineConfig, PipelineContext, PipelineOrchestrator, PipelineServices, RunPaths,
//! };
//! use biotools_annotate::progress::PipelineStatus;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = PipelineConfig::new()
//!     .with_input(Some("candidates.json".into()))
//!     .with_offline(true);
//! let paths = RunPaths::resolve(&config)?;
//! let mut context = PipelineContext::new(
//!     config,
//!     paths,
//!     Arc::new(PipelineStatus::default()),
//!     PipelineServices::new(),
//! );
//! let summary = PipelineOrchestrator::new().execute(&mut context).await?;
//! println!("{} add, {} review", summary.add, summary.review);
//! # Ok(())
//! # }
//! ```
//!
//! # Project Structure
//!
//! - [`pipeline`]: orchestrator, phases, run paths and checkpoints
//! - [`scoring`]: LLM scorer, heuristics and the decision policy
//! - [`llm`]: Ollama client, response recovery and tracing
//! - [`sources`]: Pub2Tools, homepage scraping, Europe PMC, registry index
//! - [`output`]: report rows and payload entries
//! - [`biotools`]: bio.tools API and uploads

pub mod biotools;
pub mod candidate;
pub mod cli;
pub mod config;
pub mod llm;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod scoring;
pub mod sources;
pub mod util;
pub mod validation;

pub use candidate::{load_candidates, Candidate};
pub use config::{AnnotateConfig, ConfigError};
pub use pipeline::{PipelineConfig, PipelineOrchestrator, RunSummary};
pub use scoring::{DecisionCategory, Scorer, Scores, Thresholds};
pub use util::{init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
