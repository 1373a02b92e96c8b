//! Page driver abstraction.
//!
//! Scenarios talk to a page only through [`PageDriver`]. The CDP
//! implementation lives in [`crate::browser`] behind the `browser` feature;
//! [`crate::mock::MockDriver`] implements the same trait over an in-memory
//! DOM for unit tests.
//!
//! Every element operation takes a [`Locator`] and re-resolves it on each
//! call, so no element handle ever outlives a single protocol round trip.

use crate::locator::{DomOp, Locator, QueryResponse};
use crate::result::{ProbeError, ProbeResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Console message severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleSeverity {
    /// console.log, console.debug
    Log,
    /// console.info
    Info,
    /// console.warn
    Warn,
    /// console.error, uncaught exceptions
    Error,
}

impl fmt::Display for ConsoleSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Log => write!(f, "log"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl ConsoleSeverity {
    /// Map a protocol console type (`warning`, `error`, `debug`, ...)
    #[must_use]
    pub fn from_protocol(kind: &str) -> Self {
        match kind.to_lowercase().as_str() {
            "error" | "assert" => Self::Error,
            "warn" | "warning" => Self::Warn,
            "info" => Self::Info,
            _ => Self::Log,
        }
    }
}

/// A console message emitted by the page under test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleMessage {
    /// Severity level
    pub severity: ConsoleSeverity,
    /// Message text
    pub text: String,
}

impl ConsoleMessage {
    /// Create a new console message
    #[must_use]
    pub fn new(severity: ConsoleSeverity, text: impl Into<String>) -> Self {
        Self {
            severity,
            text: text.into(),
        }
    }
}

impl fmt::Display for ConsoleMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.text)
    }
}

/// Abstract page automation.
///
/// Element methods are strict: any op other than counting fails with
/// [`ProbeError::ElementNotFound`] or [`ProbeError::AmbiguousElement`]
/// unless the locator matches exactly one element.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate to URL and wait for the load event
    async fn navigate(&mut self, url: &str) -> ProbeResult<()>;

    /// Reload the current page
    async fn reload(&mut self) -> ProbeResult<()>;

    /// Register a script that runs before any page script on every load
    async fn add_init_script(&mut self, script: &str) -> ProbeResult<()>;

    /// Evaluate an expression in the page and return its JSON value
    async fn evaluate(&self, script: &str) -> ProbeResult<serde_json::Value>;

    /// Capture a PNG of the viewport
    async fn screenshot(&self) -> ProbeResult<Vec<u8>>;

    /// Console messages observed so far
    async fn console_messages(&self) -> ProbeResult<Vec<ConsoleMessage>>;

    /// Current URL
    async fn current_url(&self) -> ProbeResult<String>;

    /// Release the page and browser
    async fn close(&mut self) -> ProbeResult<()>;

    /// Run one DOM operation against a locator.
    ///
    /// The default implementation ships a query script through
    /// [`PageDriver::evaluate`]; in-memory drivers override it.
    async fn query(&self, locator: &Locator, op: &DomOp) -> ProbeResult<QueryResponse> {
        let raw = self.evaluate(&locator.to_query_script(op)).await?;
        let response: QueryResponse = serde_json::from_value(raw)
            .map_err(|e| ProbeError::script(format!("malformed query response: {e}")))?;
        if op.requires_single() {
            response.ensure_single(locator)?;
        }
        Ok(response)
    }

    /// Number of elements matching the locator
    async fn count(&self, locator: &Locator) -> ProbeResult<usize> {
        Ok(self.query(locator, &DomOp::Count).await?.count)
    }

    /// Whether the single match is visible
    async fn is_visible(&self, locator: &Locator) -> ProbeResult<bool> {
        let response = self.query(locator, &DomOp::IsVisible).await?;
        Ok(response.value.as_bool().unwrap_or(false))
    }

    /// Click the single match
    async fn click(&self, locator: &Locator) -> ProbeResult<()> {
        self.query(locator, &DomOp::Click).await.map(|_| ())
    }

    /// Replace the value of the single match
    async fn fill(&self, locator: &Locator, text: &str) -> ProbeResult<()> {
        let op = DomOp::Fill {
            text: text.to_string(),
        };
        self.query(locator, &op).await.map(|_| ())
    }

    /// Check the single checkbox match
    async fn check(&self, locator: &Locator) -> ProbeResult<()> {
        let response = self.query(locator, &DomOp::Check).await?;
        if response.value.as_bool() == Some(false) {
            return Err(ProbeError::Input {
                message: format!("{locator} did not become checked"),
            });
        }
        Ok(())
    }

    /// Attribute value of the single match; `None` when absent
    async fn attribute(&self, locator: &Locator, name: &str) -> ProbeResult<Option<String>> {
        let op = DomOp::Attribute {
            name: name.to_string(),
        };
        Ok(self.query(locator, &op).await?.string_value())
    }

    /// Text content of the single match
    async fn text(&self, locator: &Locator) -> ProbeResult<String> {
        Ok(self
            .query(locator, &DomOp::Text)
            .await?
            .string_value()
            .unwrap_or_default())
    }

    /// Form value of the single match
    async fn value(&self, locator: &Locator) -> ProbeResult<String> {
        Ok(self
            .query(locator, &DomOp::Value)
            .await?
            .string_value()
            .unwrap_or_default())
    }
}
