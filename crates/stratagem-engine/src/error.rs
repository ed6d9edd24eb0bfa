//! Error types for the engine binary.

use std::path::PathBuf;

/// Top-level error for the engine binary.
///
/// Each variant wraps one startup or run failure so `main` can propagate
/// everything with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: stratagem_core::config::ConfigError,
    },

    /// The simulation clock could not be built.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: stratagem_core::clock::ClockError,
    },

    /// The tick loop failed.
    #[error("runner error: {source}")]
    Runner {
        /// The underlying runner error.
        #[from]
        source: stratagem_core::runner::RunnerError,
    },

    /// The `scenario` section of the config file is invalid.
    #[error("scenario config error: {message}")]
    Scenario {
        /// Description of the failure.
        message: String,
    },

    /// A plans file could not be read or parsed.
    #[error("plans file {}: {message}", path.display())]
    Plans {
        /// The offending file.
        path: PathBuf,
        /// Description of the failure.
        message: String,
    },

    /// The tracing subscriber could not be installed.
    #[error("logging setup failed: {message}")]
    Logging {
        /// Description of the failure.
        message: String,
    },
}
