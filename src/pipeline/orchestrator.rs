use super::checkpoint::ResumeManager;
use super::context::PipelineContext;
use super::phase_trait::WorkflowPhase;
use super::phases::{DedupPhase, EnrichPhase, GatherPhase, OutputPhase, ScorePhase};
use crate::progress::ProgressEvent;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// What a finished run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub label: String,
    pub total: usize,
    pub add: usize,
    pub review: usize,
    pub do_not_add: usize,
    pub llm_fallbacks: usize,
    pub health_fallbacks: usize,
    pub scoring_resumed: bool,
    pub report: PathBuf,
    pub payload: PathBuf,
    pub review_payload: PathBuf,
    pub duration: Duration,
}

#[derive(Default)]
pub struct PipelineOrchestrator;

impl PipelineOrchestrator {
    pub fn new() -> Self {
        Self
    }

    fn workflow_phases() -> Vec<(Box<dyn WorkflowPhase>, &'static str)> {
        vec![
            (Box::new(GatherPhase), "GatherPhase"),
            (Box::new(DedupPhase), "DedupPhase"),
            (Box::new(EnrichPhase), "EnrichPhase"),
            (Box::new(ScorePhase), "ScorePhase"),
            (Box::new(OutputPhase), "OutputPhase"),
        ]
    }

    /// Resolves checkpoints, then runs the five stages in order.
    pub async fn execute(&self, context: &mut PipelineContext) -> Result<RunSummary> {
        let start = Instant::now();
        info!(
            "Starting pipeline run for {} ({})",
            context.paths.label,
            context.paths.root.display()
        );

        context
            .paths
            .prepare()
            .with_context(|| format!("Failed to create output folders under {}", context.paths.root.display()))?;

        let plan = ResumeManager::from_paths(&context.paths)
            .plan(context.config.resume_from_scoring, context.resume_from_enriched);
        context.cached_rows = plan.cached_rows;
        context.resume_from_enriched = plan.resume_from_enriched;

        context.status.notify(&ProgressEvent::RunStarted {
            label: context.paths.label.clone(),
        });

        for (phase, phase_name) in Self::workflow_phases() {
            info!("Phase: {}", phase_name);
            let result = phase
                .execute(context)
                .await
                .with_context(|| format!("Phase {} failed", phase_name));
            if let Err(e) = result {
                context.status.notify(&ProgressEvent::Failed {
                    error: format!("{:#}", e),
                });
                return Err(e);
            }
            debug!("Phase {} complete", phase_name);
        }

        let (add, review, do_not_add) = context.decision_counts();
        let duration = start.elapsed();
        info!(
            "Pipeline complete: {} rows ({} add, {} review, {} do-not-add) in {:.1}s",
            context.rows.len(),
            add,
            review,
            do_not_add,
            duration.as_secs_f64()
        );
        context.status.notify(&ProgressEvent::RunCompleted {
            add,
            review,
            do_not_add,
            total_time: duration,
        });

        Ok(RunSummary {
            label: context.paths.label.clone(),
            total: context.rows.len(),
            add,
            review,
            do_not_add,
            llm_fallbacks: context.fallbacks.llm,
            health_fallbacks: context.fallbacks.health,
            scoring_resumed: context.scoring_resumed,
            report: context.paths.report.clone(),
            payload: context.paths.payload.clone(),
            review_payload: context.paths.review_payload.clone(),
            duration,
        })
    }
}
