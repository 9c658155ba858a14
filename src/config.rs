//! Simulation configuration.
//!
//! All parameters are immutable after construction. Loading is layered:
//! built-in defaults, then an optional TOML file, then `LIBRIS_*` environment
//! variables. CLI overrides are applied by the binary on top of the loaded
//! result.

use crate::error::LibraryError;
use crate::logging::LoggingConfig;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// A uniform latency range in milliseconds, sampled per pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl LatencyRange {
    pub const fn from_millis(min_ms: u64, max_ms: u64) -> Self {
        LatencyRange { min_ms, max_ms }
    }

    /// No pause at all; used by tests for deterministic scheduling.
    pub const fn zero() -> Self {
        LatencyRange::from_millis(0, 0)
    }

    pub fn sample(&self) -> Duration {
        if self.max_ms <= self.min_ms {
            return Duration::from_millis(self.min_ms);
        }
        let ms = rand::rng().random_range(self.min_ms..=self.max_ms);
        Duration::from_millis(ms)
    }

    fn validate(&self, field: &str) -> Result<(), LibraryError> {
        if self.min_ms > self.max_ms {
            return Err(LibraryError::Config(format!(
                "{field}: min_ms ({}) exceeds max_ms ({})",
                self.min_ms, self.max_ms
            )));
        }
        Ok(())
    }
}

/// Complete simulation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Number of concurrent reader units
    #[serde(default = "default_readers")]
    pub readers: u32,

    /// Number of borrower units submitting requests
    #[serde(default = "default_borrowers")]
    pub borrowers: u32,

    /// Books on the shelf at startup
    #[serde(default = "default_initial_books")]
    pub initial_books: u32,

    /// Fixed capacity of the borrow-request queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Simulation duration in seconds
    #[serde(default = "default_run_secs")]
    pub run_secs: u64,

    /// Initial stagger before each unit's first action
    #[serde(default = "default_startup_jitter")]
    pub startup_jitter: LatencyRange,

    /// Time a reader spends browsing inside the read section
    #[serde(default = "default_read_time")]
    pub read_time: LatencyRange,

    /// Reader pause between visits
    #[serde(default = "default_read_pause")]
    pub read_pause: LatencyRange,

    /// Librarian service time per request
    #[serde(default = "default_service_time")]
    pub service_time: LatencyRange,

    /// Borrower pause between requests
    #[serde(default = "default_borrow_pause")]
    pub borrow_pause: LatencyRange,

    /// Submit without blocking: a full queue refuses the request immediately
    /// instead of parking the borrower
    #[serde(default)]
    pub nonblocking_submit: bool,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_readers() -> u32 {
    4
}
fn default_borrowers() -> u32 {
    3
}
fn default_initial_books() -> u32 {
    10
}
fn default_queue_capacity() -> usize {
    5
}
fn default_run_secs() -> u64 {
    20
}
fn default_startup_jitter() -> LatencyRange {
    LatencyRange::from_millis(0, 1500)
}
fn default_read_time() -> LatencyRange {
    LatencyRange::from_millis(500, 1500)
}
fn default_read_pause() -> LatencyRange {
    LatencyRange::from_millis(2000, 4000)
}
fn default_service_time() -> LatencyRange {
    LatencyRange::from_millis(1000, 2000)
}
fn default_borrow_pause() -> LatencyRange {
    LatencyRange::from_millis(3000, 6000)
}

impl Default for LibraryConfig {
    fn default() -> Self {
        LibraryConfig {
            readers: default_readers(),
            borrowers: default_borrowers(),
            initial_books: default_initial_books(),
            queue_capacity: default_queue_capacity(),
            run_secs: default_run_secs(),
            startup_jitter: default_startup_jitter(),
            read_time: default_read_time(),
            read_pause: default_read_pause(),
            service_time: default_service_time(),
            borrow_pause: default_borrow_pause(),
            nonblocking_submit: false,
            logging: LoggingConfig::default(),
        }
    }
}

impl LibraryConfig {
    pub fn validate(&self) -> Result<(), LibraryError> {
        if self.queue_capacity == 0 {
            return Err(LibraryError::Config(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        self.startup_jitter.validate("startup_jitter")?;
        self.read_time.validate("read_time")?;
        self.read_pause.validate("read_pause")?;
        self.service_time.validate("service_time")?;
        self.borrow_pause.validate("borrow_pause")?;
        Ok(())
    }
}

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from defaults, an optional file, and environment.
    ///
    /// With no explicit path, a `libris.toml` in the working directory is
    /// picked up when present. Environment variables use the `LIBRIS_` prefix
    /// with `__` as the nesting separator (`LIBRIS_LOGGING__LEVEL=debug`).
    pub fn load(file: Option<&Path>) -> Result<LibraryConfig, LibraryError> {
        let defaults = config::Config::try_from(&LibraryConfig::default())?;
        let mut builder = config::Config::builder().add_source(defaults);
        builder = match file {
            Some(path) => builder.add_source(config::File::from(path.to_path_buf())),
            None => builder.add_source(config::File::with_name("libris").required(false)),
        };
        let loaded: LibraryConfig = builder
            .add_source(config::Environment::with_prefix("LIBRIS").separator("__"))
            .build()?
            .try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = LibraryConfig::default();
        config.validate().unwrap();
        assert_eq!(config.queue_capacity, 5);
        assert!(!config.nonblocking_submit);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let config = LibraryConfig {
            queue_capacity: 0,
            ..LibraryConfig::default()
        };
        assert!(matches!(config.validate(), Err(LibraryError::Config(_))));
    }

    #[test]
    fn inverted_latency_range_is_rejected() {
        let config = LibraryConfig {
            service_time: LatencyRange::from_millis(500, 100),
            ..LibraryConfig::default()
        };
        assert!(matches!(config.validate(), Err(LibraryError::Config(_))));
    }

    #[test]
    fn sample_stays_within_bounds() {
        let range = LatencyRange::from_millis(10, 20);
        for _ in 0..100 {
            let d = range.sample();
            assert!(d >= Duration::from_millis(10) && d <= Duration::from_millis(20));
        }
        assert_eq!(LatencyRange::zero().sample(), Duration::ZERO);
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            "readers = 9\ninitial_books = 2\n\n[service_time]\nmin_ms = 0\nmax_ms = 0"
        )
        .unwrap();

        let config = ConfigLoader::load(Some(file.path())).unwrap();
        assert_eq!(config.readers, 9);
        assert_eq!(config.initial_books, 2);
        assert_eq!(config.service_time, LatencyRange::zero());
        // Untouched keys keep their defaults.
        assert_eq!(config.borrowers, 3);
    }
}
