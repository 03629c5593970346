//! Progress reporting for pipeline runs

mod console;
mod handler;
mod logging;
mod mode;
mod status;

pub use console::{LiveStatusHandler, PlainStatusHandler};
pub use handler::{FanoutHandler, NoOpHandler, ProgressEvent, ProgressHandler, Stage};
pub use logging::LoggingHandler;
pub use mode::{build_handler, resolve_display, ProgressMode, StatusDisplay, PROGRESS_ENV};
pub use status::{compose_line, format_progress, PipelineStatus, PROGRESS_BAR_WIDTH};
