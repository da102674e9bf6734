//! Error types for the engine binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during startup, the two sessions, and result export.

use cadence_core::config::ConfigError;
use cadence_core::export::ExportError;
use cadence_core::{ControllerError, RunnerError};

/// Top-level error for the engine binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },

    /// The controller could not be built from the configuration.
    #[error("controller error: {source}")]
    Controller {
        /// The underlying controller error.
        #[from]
        source: ControllerError,
    },

    /// A session stopped on a simulator or controller failure.
    #[error("runner error: {source}")]
    Runner {
        /// The underlying runner error.
        #[from]
        source: RunnerError,
    },

    /// Writing the route file or the results failed.
    #[error("export error: {source}")]
    Export {
        /// The underlying export error.
        #[from]
        source: ExportError,
    },

    /// A session thread panicked or was cancelled.
    #[error("session task failed: {source}")]
    Join {
        /// The underlying join error.
        #[from]
        source: tokio::task::JoinError,
    },
}
