pub mod commands;
pub mod handlers;

pub use commands::{CliArgs, Commands, HealthArgs, RunArgs, UploadArgs};
pub use handlers::{handle_health, handle_run, handle_upload};
