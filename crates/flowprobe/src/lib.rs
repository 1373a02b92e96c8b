//! Flowprobe: scripted end-to-end verification for the TaskFlow web client.
//!
//! A scenario drives a running application through a real browser and
//! checks interactive flows: task creation, natural-language input,
//! accessibility attributes and error surfacing.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐    ┌──────────────────┐    ┌──────────────────────┐
//! │ Bootstrapper │───►│ Interaction      │───►│ Assertion &          │
//! │ (identity)   │    │ Driver (locators,│    │ Reporting (outcomes, │
//! │              │    │ waits, actions)  │    │ trace, artifacts)    │
//! └──────────────┘    └──────────────────┘    └──────────────────────┘
//!                              │
//!                     ┌────────┴────────┐
//!                     │ PageDriver      │
//!                     │  CdpPage (CDP)  │
//!                     │  MockDriver     │
//!                     └─────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use flowprobe::{scenarios, HarnessConfig, MockDriver, ScenarioRunner};
//!
//! # async fn demo() {
//! let config = HarnessConfig::default();
//! let scenario = scenarios::builtin("accessibility", &config).unwrap();
//! let report = ScenarioRunner::new(config).run(MockDriver::new(), &scenario).await;
//! println!("{}", report.render_text());
//! # }
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

mod artifact;
mod assertion;
#[cfg(feature = "browser")]
pub mod browser;
mod config;
mod driver;
mod engine;
mod identity;
mod locator;
pub mod mock;
mod report;
mod result;
pub mod scenarios;
mod step;
pub mod wait;

pub use artifact::ArtifactStore;
#[cfg(feature = "browser")]
pub use browser::{launch_page, CdpPage};
pub use assertion::{
    evaluate_expectation, expect, hold, hold_expectation, judge, FailureReason, Observation, Outcome,
    Verdict,
};
pub use config::{BrowserSettings, HarnessConfig, Timeouts, DEFAULT_ARTIFACT_DIR, DEFAULT_ORIGIN};
pub use driver::{ConsoleMessage, ConsoleSeverity, PageDriver};
pub use engine::ScenarioRunner;
pub use identity::{Bootstrapper, SeedStrategy, SessionIdentity, TOKEN_KEY, USER_ID_KEY, USER_KEY};
pub use locator::{DomOp, Locator, LocatorChain, QueryResponse, Resolved};
pub use mock::{MockDom, MockDriver, MockElement, MockEvent};
pub use report::{RunSummary, ScenarioReport, TraceLine};
pub use result::{ProbeError, ProbeResult};
pub use scenarios::AppProfile;
pub use step::{Action, Expectation, Phase, Scenario, Step, ValueCheck};
pub use wait::{WaitOptions, WaitResult};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
