//! Harness configuration.
//!
//! Target origin, artifact directory, timeouts, the seeded identity and the
//! application's accessible names can all be set per environment from a
//! YAML file, with CLI flags layered on top.

use crate::identity::{SeedStrategy, SessionIdentity};
use crate::result::{ProbeError, ProbeResult};
use crate::scenarios::AppProfile;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default application origin
pub const DEFAULT_ORIGIN: &str = "http://localhost:3000";

/// Default directory for diagnostic artifacts
pub const DEFAULT_ARTIFACT_DIR: &str = "target/flowprobe/artifacts";

/// Browser launch settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Run in headless mode
    pub headless: bool,
    /// Path to chromium binary (None = auto-detect)
    pub chromium_path: Option<PathBuf>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            chromium_path: None,
            sandbox: true,
            viewport_width: 1280,
            viewport_height: 800,
        }
    }
}

impl BrowserSettings {
    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set chromium path
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Disable sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }

    /// Set viewport dimensions
    #[must_use]
    pub const fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }
}

/// Bounded waits used by the built-in scenarios, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Root form container becoming visible after load
    pub ready_ms: u64,
    /// Resolving the target of an action
    pub action_ms: u64,
    /// A control revealed by a previous step
    pub appear_ms: u64,
    /// A submitted entry showing up in the list
    pub list_ms: u64,
    /// Validation alert after an invalid submission
    pub alert_ms: u64,
    /// Polling interval for every bounded wait
    pub poll_interval_ms: u64,
    /// Fixed grace period for debounced client-side parsing
    pub settle_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            ready_ms: 15_000,
            action_ms: 5_000,
            appear_ms: 5_000,
            list_ms: 30_000,
            alert_ms: 1_000,
            poll_interval_ms: 50,
            settle_ms: 1_000,
        }
    }
}

impl Timeouts {
    /// Polling interval as a Duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Complete harness configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Origin of the application under test
    pub origin: String,
    /// Directory receiving diagnostic artifacts
    pub artifact_dir: PathBuf,
    /// Browser launch settings
    pub browser: BrowserSettings,
    /// Bounded waits
    pub timeouts: Timeouts,
    /// Identity injected before the application boots
    pub identity: SessionIdentity,
    /// How the identity reaches persistent storage
    pub seed_strategy: SeedStrategy,
    /// Capture screenshots at success checkpoints too
    pub checkpoint_screenshots: bool,
    /// Accessible names and selectors of the application
    pub app: AppProfile,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            artifact_dir: PathBuf::from(DEFAULT_ARTIFACT_DIR),
            browser: BrowserSettings::default(),
            timeouts: Timeouts::default(),
            identity: SessionIdentity::default(),
            seed_strategy: SeedStrategy::default(),
            checkpoint_screenshots: false,
            app: AppProfile::default(),
        }
    }
}

impl HarnessConfig {
    /// Create new default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse configuration from YAML; missing keys take defaults
    pub fn from_yaml_str(yaml: &str) -> ProbeResult<Self> {
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> ProbeResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ProbeError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&text)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> ProbeResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Set the application origin
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// Set the artifact directory
    #[must_use]
    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = dir.into();
        self
    }

    /// Set browser settings
    #[must_use]
    pub fn with_browser(mut self, browser: BrowserSettings) -> Self {
        self.browser = browser;
        self
    }

    /// Set timeouts
    #[must_use]
    pub const fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Set the seeded identity
    #[must_use]
    pub fn with_identity(mut self, identity: SessionIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// Set the seeding strategy
    #[must_use]
    pub const fn with_seed_strategy(mut self, strategy: SeedStrategy) -> Self {
        self.seed_strategy = strategy;
        self
    }

    /// Enable or disable success-path screenshots
    #[must_use]
    pub const fn with_checkpoint_screenshots(mut self, enabled: bool) -> Self {
        self.checkpoint_screenshots = enabled;
        self
    }

    /// Set the application profile
    #[must_use]
    pub fn with_app(mut self, app: AppProfile) -> Self {
        self.app = app;
        self
    }

    /// Reject settings the harness cannot run with
    pub fn validate(&self) -> ProbeResult<()> {
        if !(self.origin.starts_with("http://") || self.origin.starts_with("https://")) {
            return Err(ProbeError::config(format!(
                "origin must start with http:// or https://, got {:?}",
                self.origin
            )));
        }
        if self.timeouts.poll_interval_ms == 0 {
            return Err(ProbeError::config("poll interval must be greater than zero"));
        }
        if self.timeouts.settle_ms > self.timeouts.action_ms {
            return Err(ProbeError::config(format!(
                "settle delay ({}ms) exceeds the action timeout ({}ms)",
                self.timeouts.settle_ms, self.timeouts.action_ms
            )));
        }
        Ok(())
    }

    /// Join the origin and an application path
    #[must_use]
    pub fn url_for(&self, path: &str) -> String {
        let origin = self.origin.trim_end_matches('/');
        if path.is_empty() || path == "/" {
            return origin.to_string();
        }
        format!("{origin}/{}", path.trim_start_matches('/'))
    }
}
