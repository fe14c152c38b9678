//! Result and error types for conduit-probe.
//!
//! Non-2xx HTTP responses are values ([`crate::ApiResponse`]), never errors.
//! Only failures that prevent an observation from being made at all end up
//! here.

use crate::browser::DriverError;
use thiserror::Error;

/// Result type for harness operations
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Errors that can occur while driving the application under test
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Configuration could not be resolved; aborts the whole run
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Login or token issuance was rejected
    #[error("Authentication failed with status {status}: {body}")]
    Auth {
        /// HTTP status returned by the login endpoint
        status: u16,
        /// Raw response body
        body: String,
    },

    /// Connection-level HTTP failure (DNS, refused, timeout, TLS)
    #[error("API request failed: {0}")]
    Api(#[from] reqwest::Error),

    /// A wait condition did not become true in time
    #[error("Timed out after {timeout_ms}ms waiting for {waited_for} (last observed: {last_observed})")]
    Timeout {
        /// Description of the awaited condition
        waited_for: String,
        /// Timeout that elapsed
        timeout_ms: u64,
        /// Last state seen by the predicate
        last_observed: String,
    },

    /// An element interaction failed after its transparent retry
    #[error("UI interaction '{action}' on '{selector}' failed: {message}")]
    UiInteraction {
        /// Action attempted (click, fill, query...)
        action: String,
        /// CSS selector targeted
        selector: String,
        /// Driver error message
        message: String,
    },

    /// Raw driver failure outside of an element interaction
    #[error("Browser driver error: {0}")]
    Driver(#[from] DriverError),

    /// Browser could not be launched
    #[error("Failed to launch browser: {message}")]
    BrowserLaunch {
        /// Error message
        message: String,
    },

    /// A test assertion failed
    #[error("Assertion failed: {message}")]
    AssertionFailed {
        /// Error message
        message: String,
    },

    /// A precondition could not be established; the test is skipped
    #[error("Skipped: {reason}")]
    Skipped {
        /// Why the test could not run
        reason: String,
    },

    /// Browser and API tokens identify different subjects
    #[error("Token mismatch: API token subject {api_subject:?} differs from browser token subject {browser_subject:?}")]
    TokenMismatch {
        /// Subject of the ApiClient token
        api_subject: Option<String>,
        /// Subject of the local-storage token
        browser_subject: Option<String>,
    },

    /// A token could not be decoded
    #[error("Invalid token: {message}")]
    InvalidToken {
        /// Error message
        message: String,
    },

    /// Invalid state error (operation called in wrong state)
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl ProbeError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an assertion failure
    #[must_use]
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::AssertionFailed {
            message: message.into(),
        }
    }

    /// Create a skip outcome
    #[must_use]
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }

    /// Create an invalid state error
    #[must_use]
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create an element interaction error
    #[must_use]
    pub fn ui_interaction(
        action: impl Into<String>,
        selector: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::UiInteraction {
            action: action.into(),
            selector: selector.into(),
            message: message.into(),
        }
    }

    /// Whether this error aborts the whole run rather than a single test
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Config { .. })
    }

    /// Whether this error came from an expired wait
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
