//! Scenario model: steps grouped into phases.
//!
//! A scenario is a strictly linear list of phases and each phase a linear
//! list of steps. The only branching is inside a step's [`LocatorChain`].
//! A phase groups steps that depend on each other: once a hard step fails,
//! the rest of its phase is skipped, while later phases still run unless
//! the failed phase is marked required.

use crate::locator::LocatorChain;
use std::fmt;

/// Judges a derived value; `Err` carries a human-readable reason
pub type ValueCheck = fn(&str) -> Result<(), String>;

/// What a step does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Navigate to an application path
    Navigate(String),
    /// Click the target
    Click,
    /// Replace the target's value
    Fill(String),
    /// Set a boolean control to true
    Check,
    /// Read an attribute of the target
    ReadAttribute(String),
    /// Read the target's text content
    ReadText,
    /// Read the target's form value
    ReadValue,
    /// Count matches of the target
    Count,
    /// Wait for the target to resolve and be visible
    WaitVisible,
    /// Wait for at least one match of the target
    WaitAttached,
    /// Fixed grace period in milliseconds
    Settle(u64),
    /// Capture a checkpoint screenshot with the given label
    Screenshot(String),
}

impl Action {
    /// Whether the action reads a value that an expectation can judge
    #[must_use]
    pub const fn is_read(&self) -> bool {
        matches!(
            self,
            Self::ReadAttribute(_) | Self::ReadText | Self::ReadValue | Self::Count
        )
    }

    /// Whether the action needs a target locator
    #[must_use]
    pub const fn needs_target(&self) -> bool {
        !matches!(self, Self::Navigate(_) | Self::Settle(_) | Self::Screenshot(_))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Navigate(path) => write!(f, "navigate {path}"),
            Self::Click => write!(f, "click"),
            Self::Fill(text) => write!(f, "fill {text:?}"),
            Self::Check => write!(f, "check"),
            Self::ReadAttribute(name) => write!(f, "read {name}"),
            Self::ReadText => write!(f, "read text"),
            Self::ReadValue => write!(f, "read value"),
            Self::Count => write!(f, "count"),
            Self::WaitVisible => write!(f, "wait visible"),
            Self::WaitAttached => write!(f, "wait attached"),
            Self::Settle(ms) => write!(f, "settle {ms}ms"),
            Self::Screenshot(label) => write!(f, "screenshot {label}"),
        }
    }
}

/// Post-condition judged against the value a read action observed
#[derive(Debug, Clone)]
pub enum Expectation {
    /// The action succeeding is enough
    None,
    /// Attribute present with exactly this value
    AttributeEquals(String),
    /// Attribute present with any value
    AttributePresent,
    /// Attribute, when present, names ids that exist in the document
    ReferenceResolves,
    /// Value equals exactly
    ValueEquals(String),
    /// Value is not blank
    ValueNonEmpty,
    /// Value passes a custom check
    ValueSatisfies {
        /// What the check verifies
        description: String,
        /// The check
        check: ValueCheck,
    },
    /// Text is not blank
    TextNonEmpty,
    /// Observation equals what an earlier step remembered under the key
    EqualsRemembered(String),
    /// Count is zero
    Absent,
}

impl Expectation {
    /// Short description for trace output
    #[must_use]
    pub fn describe(&self, action: &Action) -> String {
        let subject = match action {
            Action::ReadAttribute(name) => name.clone(),
            Action::ReadText => "text".to_string(),
            Action::Count => "count".to_string(),
            _ => "value".to_string(),
        };
        match self {
            Self::None => format!("{action} succeeds"),
            Self::AttributeEquals(v) => format!("{subject} == {v:?}"),
            Self::AttributePresent => format!("{subject} present"),
            Self::ReferenceResolves => format!("{subject} references existing ids"),
            Self::ValueEquals(v) => format!("{subject} == {v:?}"),
            Self::ValueNonEmpty | Self::TextNonEmpty => format!("{subject} non-empty"),
            Self::ValueSatisfies { description, .. } => format!("{subject} {description}"),
            Self::EqualsRemembered(key) => format!("{subject} unchanged since {key}"),
            Self::Absent => format!("{subject} == 0"),
        }
    }
}

/// One unit of a scenario
#[derive(Debug, Clone)]
pub struct Step {
    /// Step name shown in the trace
    pub name: String,
    /// Element the action targets
    pub target: Option<LocatorChain>,
    /// What to do
    pub action: Action,
    /// Post-condition for read actions
    pub expect: Expectation,
    /// Bound for the step's waits (None = configured action timeout)
    pub timeout_ms: Option<u64>,
    /// Failure does not stop later steps of the phase
    pub soft: bool,
    /// Failure does not fail the scenario; implies `soft`
    pub optional: bool,
    /// Remember the observed value under this key
    pub remember: Option<String>,
    /// Read steps only: the expectation must keep holding for this long
    /// instead of merely becoming true
    pub hold_ms: Option<u64>,
}

impl Step {
    /// Create a step
    #[must_use]
    pub fn new(name: impl Into<String>, action: Action) -> Self {
        Self {
            name: name.into(),
            target: None,
            action,
            expect: Expectation::None,
            timeout_ms: None,
            soft: false,
            optional: false,
            remember: None,
            hold_ms: None,
        }
    }

    /// Navigate to an application path
    #[must_use]
    pub fn navigate(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(name, Action::Navigate(path.into()))
    }

    /// Click a target
    #[must_use]
    pub fn click(name: impl Into<String>, target: impl Into<LocatorChain>) -> Self {
        Self::new(name, Action::Click).on(target)
    }

    /// Fill a target
    #[must_use]
    pub fn fill(
        name: impl Into<String>,
        target: impl Into<LocatorChain>,
        text: impl Into<String>,
    ) -> Self {
        Self::new(name, Action::Fill(text.into())).on(target)
    }

    /// Check a boolean control
    #[must_use]
    pub fn check(name: impl Into<String>, target: impl Into<LocatorChain>) -> Self {
        Self::new(name, Action::Check).on(target)
    }

    /// Read an attribute
    #[must_use]
    pub fn read_attribute(
        name: impl Into<String>,
        target: impl Into<LocatorChain>,
        attribute: impl Into<String>,
    ) -> Self {
        Self::new(name, Action::ReadAttribute(attribute.into())).on(target)
    }

    /// Read text content
    #[must_use]
    pub fn read_text(name: impl Into<String>, target: impl Into<LocatorChain>) -> Self {
        Self::new(name, Action::ReadText).on(target)
    }

    /// Read a form value
    #[must_use]
    pub fn read_value(name: impl Into<String>, target: impl Into<LocatorChain>) -> Self {
        Self::new(name, Action::ReadValue).on(target)
    }

    /// Count matches
    #[must_use]
    pub fn count(name: impl Into<String>, target: impl Into<LocatorChain>) -> Self {
        Self::new(name, Action::Count).on(target)
    }

    /// Wait for a visible single match
    #[must_use]
    pub fn wait_visible(name: impl Into<String>, target: impl Into<LocatorChain>) -> Self {
        Self::new(name, Action::WaitVisible).on(target)
    }

    /// Wait for at least one match
    #[must_use]
    pub fn wait_attached(name: impl Into<String>, target: impl Into<LocatorChain>) -> Self {
        Self::new(name, Action::WaitAttached).on(target)
    }

    /// Fixed grace period
    #[must_use]
    pub fn settle(name: impl Into<String>, delay_ms: u64) -> Self {
        Self::new(name, Action::Settle(delay_ms))
    }

    /// Success-path screenshot; never fails the scenario
    #[must_use]
    pub fn screenshot(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(name, Action::Screenshot(label.into())).optional()
    }

    /// Set the target
    #[must_use]
    pub fn on(mut self, target: impl Into<LocatorChain>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Set the expectation
    #[must_use]
    pub fn expect(mut self, expect: Expectation) -> Self {
        self.expect = expect;
        self
    }

    /// Set the wait bound
    #[must_use]
    pub const fn timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Continue the phase when this step fails
    #[must_use]
    pub const fn soft(mut self) -> Self {
        self.soft = true;
        self
    }

    /// Record failures without failing the scenario
    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.soft = true;
        self.optional = true;
        self
    }

    /// Remember the observed value for a later [`Expectation::EqualsRemembered`]
    #[must_use]
    pub fn remember(mut self, key: impl Into<String>) -> Self {
        self.remember = Some(key.into());
        self
    }

    /// Require the expectation to stay true for `window_ms`, failing on
    /// the first observation that breaks it
    #[must_use]
    pub const fn hold(mut self, window_ms: u64) -> Self {
        self.hold_ms = Some(window_ms);
        self
    }

    /// Trace description of the expectation
    #[must_use]
    pub fn describe_expectation(&self) -> String {
        let described = self.expect.describe(&self.action);
        match self.hold_ms {
            Some(ms) => format!("{described} for {ms}ms"),
            None => described,
        }
    }
}

/// Steps that depend on each other
#[derive(Debug, Clone)]
pub struct Phase {
    /// Phase name
    pub name: String,
    /// Steps in order
    pub steps: Vec<Step>,
    /// A hard failure here stops the whole scenario
    pub required: bool,
}

impl Phase {
    /// Create an empty, non-required phase
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            required: false,
        }
    }

    /// Mark as required
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Append a step
    #[must_use]
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }
}

/// One complete verification flow
#[derive(Debug, Clone)]
pub struct Scenario {
    /// Scenario name, also used in artifact file names
    pub name: String,
    /// One-line description
    pub description: String,
    /// Seed the session identity before the first load
    pub seed: bool,
    /// Path opened first
    pub entry_path: String,
    /// Phases in order
    pub phases: Vec<Phase>,
}

impl Scenario {
    /// Create a seeded scenario entering at `/`
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            seed: true,
            entry_path: "/".to_string(),
            phases: Vec::new(),
        }
    }

    /// Open the application without seeding an identity
    #[must_use]
    pub const fn without_seed(mut self) -> Self {
        self.seed = false;
        self
    }

    /// Set the entry path
    #[must_use]
    pub fn entry(mut self, path: impl Into<String>) -> Self {
        self.entry_path = path.into();
        self
    }

    /// Append a phase
    #[must_use]
    pub fn phase(mut self, phase: Phase) -> Self {
        self.phases.push(phase);
        self
    }

    /// Total number of steps
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.phases.iter().map(|p| p.steps.len()).sum()
    }
}
