//! Logging setup for the annotation pipeline
//!
//! The effective [`LoggingConfig`] is layered: the `logging` section of the
//! YAML config, then the `BIOTOOLS_ANNOTATE_LOG_*` environment variables,
//! then the command-line flags. [`init_logging`] installs the subscriber once
//! per process.
//!
//! ```no_run
//! use biotools_annotate::util::{init_logging, LoggingConfig};
//!
//! let config = LoggingConfig::default()
//!     .with_env_overrides()
//!     .with_cli_overrides(Some("debug"), false, false);
//! init_logging(config);
//! tracing::info!(candidates = 12, "GATHER – loaded candidates");
//! ```

use std::env;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_LEVEL_ENV: &str = "BIOTOOLS_ANNOTATE_LOG_LEVEL";
pub const LOG_JSON_ENV: &str = "BIOTOOLS_ANNOTATE_LOG_JSON";

static INIT: Once = Once::new();

/// Subscriber settings for one process.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    pub level: Level,

    /// JSON lines instead of the human-readable console format
    pub use_json: bool,

    /// Include the module target (e.g. `biotools_annotate::pipeline`)
    pub include_target: bool,

    pub include_location: bool,
    pub include_thread_ids: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            use_json: false,
            include_target: true,
            include_location: false,
            include_thread_ids: false,
        }
    }
}

impl LoggingConfig {
    /// Applies `BIOTOOLS_ANNOTATE_LOG_LEVEL` and `BIOTOOLS_ANNOTATE_LOG_JSON`
    /// on top of `self`. Unset or unparsable JSON flags keep the current value.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(level) = env::var(LOG_LEVEL_ENV) {
            self.level = parse_level(&level);
        }
        if let Some(use_json) = env::var(LOG_JSON_ENV)
            .ok()
            .and_then(|v| v.trim().parse::<bool>().ok())
        {
            self.use_json = use_json;
        }
        self
    }

    /// Applies the global CLI flags. `--log-level` wins over `-v`, which wins
    /// over `-q`.
    pub fn with_cli_overrides(mut self, log_level: Option<&str>, verbose: bool, quiet: bool) -> Self {
        if let Some(level) = log_level {
            self.level = parse_level(level);
        } else if verbose {
            self.level = Level::DEBUG;
        } else if quiet {
            self.level = Level::ERROR;
        }
        self
    }
}

/// Case-insensitive level name. Unknown names fall back to INFO with a
/// warning on stderr, since the subscriber is not up yet.
pub fn parse_level(level_str: &str) -> Level {
    match level_str.trim().to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => {
            eprintln!(
                "Invalid log level '{}', defaulting to INFO. Valid levels: trace, debug, info, warn, error",
                level_str
            );
            Level::INFO
        }
    }
}

/// Installs the global subscriber. Later calls are no-ops.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let filter = build_filter(config.level);

        if config.use_json {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_target(config.include_target)
                        .with_file(config.include_location)
                        .with_line_number(config.include_location)
                        .with_thread_ids(config.include_thread_ids)
                        .with_thread_names(config.include_thread_ids),
                )
                .init();
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(config.include_target)
                        .with_file(config.include_location)
                        .with_line_number(config.include_location)
                        .with_thread_ids(config.include_thread_ids)
                        .with_thread_names(config.include_thread_ids),
                )
                .init();
        }
    });
}

/// Builds the env filter for our crate at `level`.
///
/// Unless `RUST_LOG` is set, chatty HTTP crates are capped at `warn`.
pub fn build_filter(level: Level) -> EnvFilter {
    let mut directives = vec![format!("biotools_annotate={}", level)];
    if env::var("RUST_LOG").is_err() {
        directives.extend(["h2=warn", "hyper=warn", "reqwest=warn"].map(String::from));
    }

    directives
        .iter()
        .filter_map(|d| d.parse().ok())
        .fold(EnvFilter::from_default_env(), |filter, directive| {
            filter.add_directive(directive)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    struct EnvGuard {
        key: &'static str,
        old_value: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &'static str, value: &str) -> Self {
            let old_value = env::var(key).ok();
            env::set_var(key, value);
            Self { key, old_value }
        }

        fn unset(key: &'static str) -> Self {
            let old_value = env::var(key).ok();
            env::remove_var(key);
            Self { key, old_value }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.old_value {
                Some(v) => env::set_var(self.key, v),
                None => env::remove_var(self.key),
            }
        }
    }

    fn from_file(level: Level, use_json: bool) -> LoggingConfig {
        LoggingConfig {
            level,
            use_json,
            ..LoggingConfig::default()
        }
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("trace"), Level::TRACE);
        assert_eq!(parse_level("Debug"), Level::DEBUG);
        assert_eq!(parse_level(" INFO "), Level::INFO);
        assert_eq!(parse_level("WARN"), Level::WARN);
        assert_eq!(parse_level("error"), Level::ERROR);
        assert_eq!(parse_level("loud"), Level::INFO);
    }

    #[test]
    fn test_cli_flag_precedence() {
        let base = from_file(Level::WARN, false);
        assert_eq!(base.clone().with_cli_overrides(None, false, false).level, Level::WARN);
        assert_eq!(base.clone().with_cli_overrides(None, false, true).level, Level::ERROR);
        assert_eq!(base.clone().with_cli_overrides(None, true, true).level, Level::DEBUG);
        assert_eq!(
            base.with_cli_overrides(Some("trace"), true, false).level,
            Level::TRACE
        );
    }

    #[test]
    #[serial]
    fn test_env_overrides_file_settings() {
        let _level = EnvGuard::set(LOG_LEVEL_ENV, "debug");
        let _json = EnvGuard::set(LOG_JSON_ENV, "true");

        let config = from_file(Level::WARN, false).with_env_overrides();
        assert_eq!(config.level, Level::DEBUG);
        assert!(config.use_json);
    }

    #[test]
    #[serial]
    fn test_env_absent_keeps_file_settings() {
        let _level = EnvGuard::unset(LOG_LEVEL_ENV);
        let _json = EnvGuard::set(LOG_JSON_ENV, "maybe");

        let config = from_file(Level::WARN, true).with_env_overrides();
        assert_eq!(config, from_file(Level::WARN, true));
    }

    #[test]
    #[serial]
    fn test_cli_beats_env() {
        let _level = EnvGuard::set(LOG_LEVEL_ENV, "trace");

        let config = LoggingConfig::default()
            .with_env_overrides()
            .with_cli_overrides(None, false, true);
        assert_eq!(config.level, Level::ERROR);
    }

    #[test]
    fn test_build_filter_mentions_crate() {
        let filter = build_filter(Level::DEBUG);
        assert!(format!("{}", filter).contains("biotools_annotate=debug"));
    }
}
