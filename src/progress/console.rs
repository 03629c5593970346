//! Terminal renderers for the stage board

use super::status::compose_line;
use super::{ProgressEvent, ProgressHandler, Stage};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::Mutex;

/// Prints a stage line to stderr whenever its rendered text changes.
pub struct PlainStatusHandler {
    last: Mutex<[String; 5]>,
}

impl PlainStatusHandler {
    pub fn new() -> Self {
        Self {
            last: Mutex::new(Stage::ALL.map(Stage::initial_status)),
        }
    }

    /// Rendered line when it differs from the last one printed for `stage`.
    fn changed_line(&self, stage: Stage, message: &str, progress: Option<(usize, usize)>) -> Option<String> {
        let rendered = compose_line(message, progress);
        let mut last = self.last.lock().unwrap_or_else(|p| p.into_inner());
        let slot = &mut last[stage.index()];
        if *slot == rendered {
            return None;
        }
        *slot = rendered.clone();
        Some(format!("S{} {}", stage.index() + 1, rendered))
    }
}

impl Default for PlainStatusHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressHandler for PlainStatusHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        if let ProgressEvent::StageUpdated {
            stage,
            message,
            progress,
        } = event
        {
            if let Some(line) = self.changed_line(*stage, message, *progress) {
                eprintln!("{}", line);
            }
        }
    }
}

/// Redraws a five-line board in place. Only meaningful on a terminal.
pub struct LiveStatusHandler {
    _multi: MultiProgress,
    bars: Vec<ProgressBar>,
}

impl LiveStatusHandler {
    pub fn new() -> Self {
        let multi = MultiProgress::with_draw_target(ProgressDrawTarget::stderr_with_hz(6));
        let style = ProgressStyle::with_template("{prefix:.bold.cyan} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        let bars = Stage::ALL
            .iter()
            .map(|stage| {
                let bar = multi.add(ProgressBar::new_spinner());
                bar.set_style(style.clone());
                bar.set_prefix(format!("S{}", stage.index() + 1));
                bar.set_message(stage.initial_status());
                bar
            })
            .collect();
        Self { _multi: multi, bars }
    }

    fn finish(&self) {
        for bar in &self.bars {
            bar.finish_and_clear();
        }
    }
}

impl Default for LiveStatusHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressHandler for LiveStatusHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::StageUpdated {
                stage,
                message,
                progress,
            } => {
                self.bars[stage.index()].set_message(compose_line(message, *progress));
            }
            ProgressEvent::RunCompleted { .. } | ProgressEvent::Failed { .. } => self.finish(),
            ProgressEvent::RunStarted { .. } => {}
        }
    }
}

impl Drop for LiveStatusHandler {
    fn drop(&mut self) {
        self.finish();
    }
}
