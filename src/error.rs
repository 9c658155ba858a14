//! Error types for the library coordination core.

use thiserror::Error;

/// Errors surfaced by the coordination core and its harness.
///
/// Business outcomes (`OutOfStock`) are not errors; they travel as
/// [`crate::types::BorrowOutcome`] values. This enum covers lifecycle and
/// capacity refusals plus construction-time failures.
#[derive(Error, Debug)]
pub enum LibraryError {
    /// The caller was unblocked by shutdown instead of the outcome it was
    /// waiting for.
    #[error("operation cancelled by shutdown")]
    Cancelled,

    /// Non-blocking submission was refused because the request queue is at
    /// capacity.
    #[error("request queue is full")]
    QueueFull,

    /// Configuration loading or validation failed.
    #[error("configuration error: {0}")]
    Config(String),

    /// An OS thread for a simulation unit could not be started.
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl From<config::ConfigError> for LibraryError {
    fn from(err: config::ConfigError) -> Self {
        LibraryError::Config(err.to_string())
    }
}
