//! Result and error types for Flowprobe.

use thiserror::Error;

/// Result type for Flowprobe operations
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Errors that can occur while driving a verification scenario
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunch {
        /// Error message
        message: String,
    },

    /// Page error (creation, closing, protocol failures)
    #[error("Page error: {message}")]
    Page {
        /// Error message
        message: String,
    },

    /// Target origin unreachable; aborts the scenario
    #[error("Navigation to {url} failed: {message}")]
    NavigationFailure {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Locator resolved to zero elements after all fallbacks
    #[error("No element matches {locator}")]
    ElementNotFound {
        /// Description of the locator chain
        locator: String,
    },

    /// Locator resolved to more than one element
    #[error("{count} elements match {locator}; narrow the locator")]
    AmbiguousElement {
        /// Description of the locator
        locator: String,
        /// Number of matches
        count: usize,
    },

    /// Operation timed out
    #[error("Timed out after {ms}ms waiting for {waited_for}")]
    Timeout {
        /// What was waited for
        waited_for: String,
        /// Timeout in milliseconds
        ms: u64,
    },

    /// Script evaluation error
    #[error("Script evaluation failed: {message}")]
    Script {
        /// Error message
        message: String,
    },

    /// Input simulation error
    #[error("Input simulation failed: {message}")]
    Input {
        /// Error message
        message: String,
    },

    /// Screenshot error
    #[error("Screenshot failed: {message}")]
    Screenshot {
        /// Error message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
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

    /// Create a script evaluation error
    #[must_use]
    pub fn script(message: impl Into<String>) -> Self {
        Self::Script {
            message: message.into(),
        }
    }

    /// Whether this error must abort the whole scenario immediately
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::NavigationFailure { .. } | Self::BrowserLaunch { .. })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_navigation_failure_is_fatal() {
        let err = ProbeError::NavigationFailure {
            url: "http://localhost:3000".to_string(),
            message: "net::ERR_CONNECTION_REFUSED".to_string(),
        };
        assert!(err.is_fatal());
        assert!(err.to_string().contains("localhost:3000"));
    }

    #[test]
    fn test_element_not_found_is_not_fatal() {
        let err = ProbeError::ElementNotFound {
            locator: "role=button[name=\"Add Task\"]".to_string(),
        };
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("Add Task"));
    }

    #[test]
    fn test_ambiguous_message_has_count() {
        let err = ProbeError::AmbiguousElement {
            locator: "role=button[name=\"Add Task\"]".to_string(),
            count: 2,
        };
        assert!(!err.is_fatal());
        assert!(err.to_string().starts_with("2 elements match"));
    }

    #[test]
    fn test_io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: ProbeError = io_err.into();
        assert!(err.to_string().contains("I/O"));
    }
}
