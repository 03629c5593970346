//! Progress handler trait and events

use std::fmt;
use std::time::Duration;

/// The five pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Gather,
    Dedup,
    Enrich,
    Score,
    Output,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Gather,
        Stage::Dedup,
        Stage::Enrich,
        Stage::Score,
        Stage::Output,
    ];

    pub fn index(self) -> usize {
        match self {
            Stage::Gather => 0,
            Stage::Dedup => 1,
            Stage::Enrich => 2,
            Stage::Score => 3,
            Stage::Output => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Stage::Gather => "GATHER",
            Stage::Dedup => "DEDUP",
            Stage::Enrich => "ENRICH",
            Stage::Score => "SCORE",
            Stage::Output => "OUTPUT",
        }
    }

    /// Status line shown before the stage has reported anything.
    pub fn initial_status(self) -> String {
        match self {
            Stage::Gather => "GATHER – initializing…".to_string(),
            other => format!("{} – waiting…", other.label()),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Events emitted while a pipeline run progresses
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Run started for a time-period label
    RunStarted { label: String },

    /// A stage's status line or progress pair changed
    StageUpdated {
        stage: Stage,
        message: String,
        progress: Option<(usize, usize)>,
    },

    /// Run finished and artifacts were written
    RunCompleted {
        add: usize,
        review: usize,
        do_not_add: usize,
        total_time: Duration,
    },

    /// Run aborted
    Failed { error: String },
}

/// Trait for handling progress events during a run
pub trait ProgressHandler: Send + Sync {
    /// Called when a progress event occurs
    fn on_progress(&self, event: &ProgressEvent);
}

/// No-op handler that ignores all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpHandler;

impl ProgressHandler for NoOpHandler {
    fn on_progress(&self, _event: &ProgressEvent) {
        // Intentionally empty
    }
}

/// Forwards every event to each inner handler in order.
pub struct FanoutHandler {
    handlers: Vec<Box<dyn ProgressHandler>>,
}

impl FanoutHandler {
    pub fn new(handlers: Vec<Box<dyn ProgressHandler>>) -> Self {
        Self { handlers }
    }
}

impl ProgressHandler for FanoutHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        for handler in &self.handlers {
            handler.on_progress(event);
        }
    }
}
