//! Progress display selection from `BIOTOOLS_PROGRESS` and the terminal

use super::{
    FanoutHandler, LiveStatusHandler, LoggingHandler, NoOpHandler, PlainStatusHandler, ProgressHandler,
};
use tracing::{info, warn};

pub const PROGRESS_ENV: &str = "BIOTOOLS_PROGRESS";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMode {
    Off,
    Plain,
    Live,
    ForceLive,
    Auto,
}

impl ProgressMode {
    /// Unknown values behave like `auto`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "off" | "0" | "false" | "none" | "disable" | "disabled" => ProgressMode::Off,
            "plain" | "simple" | "text" => ProgressMode::Plain,
            "live" | "rich" | "fancy" => ProgressMode::Live,
            "force" | "force-live" | "live!" => ProgressMode::ForceLive,
            _ => ProgressMode::Auto,
        }
    }

    pub fn from_env() -> Self {
        std::env::var(PROGRESS_ENV)
            .map(|v| Self::parse(&v))
            .unwrap_or(ProgressMode::Auto)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusDisplay {
    Hidden,
    Plain,
    Live,
}

/// Picks a renderer. Live output needs a terminal unless forced.
pub fn resolve_display(mode: ProgressMode, show_progress: bool, is_tty: bool) -> StatusDisplay {
    if !show_progress {
        return StatusDisplay::Hidden;
    }
    match mode {
        ProgressMode::Off => StatusDisplay::Hidden,
        ProgressMode::Plain => StatusDisplay::Plain,
        ProgressMode::ForceLive => StatusDisplay::Live,
        ProgressMode::Live | ProgressMode::Auto if is_tty => StatusDisplay::Live,
        ProgressMode::Live | ProgressMode::Auto => StatusDisplay::Plain,
    }
}

/// Builds the handler for a run: tracing output plus the chosen renderer.
pub fn build_handler(mode: ProgressMode, show_progress: bool) -> Box<dyn ProgressHandler> {
    let is_tty = atty::is(atty::Stream::Stderr);
    let display = resolve_display(mode, show_progress, is_tty);

    if display == StatusDisplay::Plain && matches!(mode, ProgressMode::Live | ProgressMode::Auto) {
        info!(
            "Progress status: live mode disabled (no interactive terminal detected); showing plain updates. Set {}=force to override.",
            PROGRESS_ENV
        );
    } else if mode == ProgressMode::ForceLive && show_progress && !is_tty {
        warn!("Progress status: forcing live display without TTY support; output may contain redraw artifacts.");
    }

    let renderer: Box<dyn ProgressHandler> = match display {
        StatusDisplay::Hidden => Box::new(NoOpHandler),
        StatusDisplay::Plain => Box::new(PlainStatusHandler::new()),
        StatusDisplay::Live => Box::new(LiveStatusHandler::new()),
    };
    Box::new(FanoutHandler::new(vec![Box::new(LoggingHandler), renderer]))
}
