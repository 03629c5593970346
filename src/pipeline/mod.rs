//! The five-stage annotation pipeline
//!
//! [`PipelineOrchestrator`] drives GATHER → DEDUP → ENRICH → SCORE → OUTPUT
//! over a [`PipelineContext`]. Checkpoints in [`checkpoint`] let a run reuse
//! the enriched candidates or a previous assessment report.

pub mod checkpoint;
pub mod config;
pub mod context;
pub mod orchestrator;
pub mod paths;
pub mod phase_trait;
pub mod phases;

pub use checkpoint::{CandidateIndex, CheckpointError, ResumeManager, ResumePlan};
pub use config::PipelineConfig;
pub use context::{PipelineContext, PipelineServices, ScoreFallbacks};
pub use orchestrator::{PipelineOrchestrator, RunSummary};
pub use paths::{time_period_label, RunPaths};
pub use phase_trait::WorkflowPhase;
