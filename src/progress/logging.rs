//! Logging-based progress handler

use super::{ProgressEvent, ProgressHandler};
use tracing::{debug, error, info};

/// Handler that logs progress events using tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl ProgressHandler for LoggingHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::RunStarted { label } => {
                info!(label = %label, "Starting annotation run");
            }
            ProgressEvent::StageUpdated {
                stage,
                message,
                progress: None,
            } => {
                info!(stage = %stage, "{}", message);
            }
            ProgressEvent::StageUpdated {
                stage,
                progress: Some((current, total)),
                ..
            } => {
                debug!(
                    stage = %stage,
                    progress = format!("{}/{}", current, total),
                    "Stage progress"
                );
            }
            ProgressEvent::RunCompleted {
                add,
                review,
                do_not_add,
                total_time,
            } => {
                info!(
                    add,
                    review,
                    do_not_add,
                    total_time_ms = total_time.as_millis() as u64,
                    "Annotation run complete"
                );
            }
            ProgressEvent::Failed { error } => {
                error!(error = %error, "Annotation run failed");
            }
        }
    }
}
