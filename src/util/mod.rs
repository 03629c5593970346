//! Utility modules for biotools-annotate
//!
//! This module provides various utility functions and helpers including:
//! - Structured logging setup and configuration
//! - Fixed-delay retry policy shared by the HTTP clients
//! - Date window parsing

pub mod dates;
pub mod logging;
pub mod retry;

// Re-export commonly used items
pub use dates::{parse_since, SinceError};
pub use logging::{init_logging, parse_level, LoggingConfig};
pub use retry::RetryPolicy;
