//! Error types for the CLI

use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Harness error that aborted the run
    #[error("{0}")]
    Probe(#[from] conduit_probe::ProbeError),

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Output could not be serialized
    #[error("Serialization failed: {message}")]
    Serialize {
        /// Error message
        message: String,
    },

    /// The smoke run completed with failures
    #[error("{failed} of {total} smoke scenario(s) failed")]
    SmokeFailed {
        /// Failed scenarios
        failed: usize,
        /// Scenarios run
        total: usize,
    },
}

impl CliError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a serialization error
    #[must_use]
    pub fn serialize(message: impl Into<String>) -> Self {
        Self::Serialize {
            message: message.into(),
        }
    }

    /// Whether the run itself completed and only its verdict is negative
    #[must_use]
    pub const fn is_test_failure(&self) -> bool {
        matches!(self, Self::SmokeFailed { .. })
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialize(err.to_string())
    }
}

impl From<serde_yaml_ng::Error> for CliError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        Self::serialize(err.to_string())
    }
}
