//! Shared per-stage status board
//!
//! Stage code reports through [`PipelineStatus`]; rendering is left to the
//! attached [`ProgressHandler`]. The lock only guards display state.

use super::{ProgressEvent, ProgressHandler, Stage};
use std::sync::{Arc, Mutex, MutexGuard};

pub const PROGRESS_BAR_WIDTH: usize = 24;

/// `[#####-----] c/t ( p%)`, empty when `total` is zero.
pub fn format_progress(current: usize, total: usize) -> String {
    format_progress_with_width(current, total, PROGRESS_BAR_WIDTH)
}

pub fn format_progress_with_width(current: usize, total: usize, width: usize) -> String {
    if total == 0 {
        return String::new();
    }
    let current = current.min(total);
    let filled = width * current / total;
    let bar = format!("{}{}", "#".repeat(filled), "-".repeat(width - filled));
    let percent = current as f64 / total as f64 * 100.0;
    format!("[{}] {}/{} ({:5.1}%)", bar, current, total, percent)
}

/// Status line followed by its progress bar, if any.
pub fn compose_line(message: &str, progress: Option<(usize, usize)>) -> String {
    match progress {
        Some((current, total)) => {
            let bar = format_progress(current, total);
            if bar.is_empty() {
                message.to_string()
            } else {
                format!("{} {}", message, bar)
            }
        }
        None => message.to_string(),
    }
}

struct StatusBoard {
    lines: [String; 5],
    progress: [Option<(usize, usize)>; 5],
}

pub struct PipelineStatus {
    board: Mutex<StatusBoard>,
    handler: Arc<dyn ProgressHandler>,
}

impl PipelineStatus {
    pub fn new(handler: Arc<dyn ProgressHandler>) -> Self {
        Self {
            board: Mutex::new(StatusBoard {
                lines: Stage::ALL.map(Stage::initial_status),
                progress: [None; 5],
            }),
            handler,
        }
    }

    fn board(&self) -> MutexGuard<'_, StatusBoard> {
        self.board.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_status(&self, stage: Stage, message: impl Into<String>, clear_progress: bool) {
        let mut board = self.board();
        let idx = stage.index();
        board.lines[idx] = message.into();
        if clear_progress {
            board.progress[idx] = None;
        }
        self.emit(&board, stage);
    }

    /// Records `(current, total)`; a zero total removes the bar.
    pub fn update_progress(&self, stage: Stage, current: usize, total: usize) {
        let mut board = self.board();
        let idx = stage.index();
        board.progress[idx] = if total == 0 {
            None
        } else {
            Some((current.min(total), total))
        };
        self.emit(&board, stage);
    }

    pub fn message(&self, stage: Stage) -> String {
        self.board().lines[stage.index()].clone()
    }

    pub fn progress(&self, stage: Stage) -> Option<(usize, usize)> {
        self.board().progress[stage.index()]
    }

    /// Rendered line for `stage`.
    pub fn line(&self, stage: Stage) -> String {
        let board = self.board();
        let idx = stage.index();
        compose_line(&board.lines[idx], board.progress[idx])
    }

    pub fn notify(&self, event: &ProgressEvent) {
        let _board = self.board();
        self.handler.on_progress(event);
    }

    fn emit(&self, board: &StatusBoard, stage: Stage) {
        let idx = stage.index();
        self.handler.on_progress(&ProgressEvent::StageUpdated {
            stage,
            message: board.lines[idx].clone(),
            progress: board.progress[idx],
        });
    }
}

impl Default for PipelineStatus {
    fn default() -> Self {
        Self::new(Arc::new(super::NoOpHandler))
    }
}
