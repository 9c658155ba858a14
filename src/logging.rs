//! Logging system.
//!
//! Structured logging via the `tracing` crate with configurable level, format
//! and destination. Event emission for the observability sink is separate
//! (see [`crate::events`]); logging here covers the crate's own diagnostics.

use crate::error::LibraryError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Whether logging is enabled (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log level: trace, debug, info, warn, error, off
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: json, text (default: text)
    #[serde(default = "default_format")]
    pub format: String,

    /// Output destination: stdout, stderr, file
    #[serde(default = "default_output")]
    pub output: String,

    /// Log file path when output is `file`; None means use runtime default
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "warn".to_string()
}
fn default_format() -> String {
    "text".to_string()
}
fn default_output() -> String {
    "stderr".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            enabled: default_true(),
            level: default_log_level(),
            format: default_format(),
            output: default_output(),
            file: None,
        }
    }
}

/// Resolve the log file path with precedence: config value, `LIBRIS_LOG_FILE`
/// env, platform state directory default.
pub fn resolve_log_file_path(config_file: Option<PathBuf>) -> Result<PathBuf, LibraryError> {
    if let Some(path) = config_file {
        if !path.as_os_str().is_empty() {
            return Ok(path);
        }
    }
    if let Ok(env_path) = std::env::var("LIBRIS_LOG_FILE") {
        if !env_path.is_empty() {
            return Ok(PathBuf::from(env_path));
        }
    }
    let project_dirs = directories::ProjectDirs::from("", "libris", "libris").ok_or_else(|| {
        LibraryError::Config("could not determine platform state directory for log file".to_string())
    })?;
    let state_dir = project_dirs
        .state_dir()
        .unwrap_or_else(|| project_dirs.data_local_dir())
        .to_path_buf();
    Ok(state_dir.join("libris.log"))
}

/// Initialize the global tracing subscriber from configuration.
///
/// Returns an error when the level filter does not parse or the log file
/// cannot be opened. Calling twice is an error from the subscriber registry.
pub fn init_logging(config: &LoggingConfig) -> Result<(), LibraryError> {
    if !config.enabled || config.level == "off" {
        return Ok(());
    }

    let filter = EnvFilter::try_new(format!("libris={}", config.level))
        .map_err(|e| LibraryError::Config(format!("invalid log level '{}': {e}", config.level)))?;

    let layer = match config.output.as_str() {
        "stdout" => fmt_layer(config, std::io::stdout)?,
        "stderr" => fmt_layer(config, std::io::stderr)?,
        "file" => {
            let path = resolve_log_file_path(config.file.clone())?;
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    LibraryError::Config(format!("could not create log directory: {e}"))
                })?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| {
                    LibraryError::Config(format!("could not open log file {}: {e}", path.display()))
                })?;
            fmt_layer(config, Arc::new(file))?
        }
        other => {
            return Err(LibraryError::Config(format!(
                "unknown log output '{other}' (expected stdout, stderr or file)"
            )))
        }
    };

    Registry::default()
        .with(filter)
        .with(layer)
        .try_init()
        .map_err(|e| LibraryError::Config(format!("logging already initialized: {e}")))
}

fn fmt_layer<S, W>(
    config: &LoggingConfig,
    writer: W,
) -> Result<Box<dyn Layer<S> + Send + Sync>, LibraryError>
where
    S: tracing::Subscriber + for<'span> tracing_subscriber::registry::LookupSpan<'span>,
    W: for<'a> fmt::MakeWriter<'a> + Send + Sync + 'static,
{
    let base = fmt::layer()
        .with_timer(ChronoUtc::rfc_3339())
        .with_target(true)
        .with_writer(writer);
    match config.format.as_str() {
        "text" => Ok(base.boxed()),
        "json" => Ok(base.json().boxed()),
        other => Err(LibraryError::Config(format!(
            "unknown log format '{other}' (expected text or json)"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_conservative() {
        let config = LoggingConfig::default();
        assert!(config.enabled);
        assert_eq!(config.level, "warn");
        assert_eq!(config.format, "text");
        assert_eq!(config.output, "stderr");
    }

    #[test]
    fn explicit_path_wins_over_default() {
        let explicit = PathBuf::from("/tmp/libris-test.log");
        let resolved = resolve_log_file_path(Some(explicit.clone())).unwrap();
        assert_eq!(resolved, explicit);
    }

    #[test]
    fn unknown_output_is_rejected() {
        let config = LoggingConfig {
            output: "syslog".to_string(),
            ..LoggingConfig::default()
        };
        assert!(matches!(init_logging(&config), Err(LibraryError::Config(_))));
    }
}
