//! Built-in TaskFlow verification scenarios.
//!
//! The application contract (selectors, accessible names, labels) lives in
//! [`AppProfile`] so a relabelled build can be verified by configuration
//! instead of code changes.

use crate::config::{HarnessConfig, Timeouts};
use crate::locator::{Locator, LocatorChain};
use crate::step::{Expectation, Phase, Scenario, Step};
use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

/// Phrase fed to the natural-language input
pub const SMART_PHRASE: &str = "Buy groceries next Friday at 5pm";

/// Title used by the plain task creation flow
pub const TASK_TITLE: &str = "Test Task with Due Date";

/// Due timestamp used by the plain task creation flow
pub const TASK_DUE: &str = "2024-12-31T10:00";

/// Accessible names and selectors of the application under test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppProfile {
    /// Root form container
    pub form_selector: String,
    /// Task list container
    pub list_selector: String,
    /// Title element of one list entry
    pub item_title_selector: String,
    /// Toggle name while in simple mode
    pub toggle_to_smart_name: String,
    /// Toggle name while in smart mode
    pub toggle_to_simple_name: String,
    /// Visible toggle text, used as fallback name
    pub toggle_text: String,
    /// Label of the natural-language input
    pub smart_input_label: String,
    /// Placeholder fragment of the natural-language input
    pub smart_input_placeholder: String,
    /// Placeholder of the title input
    pub title_placeholder: String,
    /// Selector of the due date/time input
    pub due_selector: String,
    /// Selector of the reminder checkbox
    pub reminder_selector: String,
    /// Name of the submit button
    pub submit_name: String,
}

impl Default for AppProfile {
    fn default() -> Self {
        Self {
            form_selector: ".task-form".to_string(),
            list_selector: "div.task-list".to_string(),
            item_title_selector: "div.task-title".to_string(),
            toggle_to_smart_name: "Switch to smart input mode".to_string(),
            toggle_to_simple_name: "Switch to simple input mode".to_string(),
            toggle_text: "Smart Add".to_string(),
            smart_input_label: "Smart Input".to_string(),
            smart_input_placeholder: "Call Mom tomorrow".to_string(),
            title_placeholder: "What needs to be done? *".to_string(),
            due_selector: "input[type='datetime-local']".to_string(),
            reminder_selector: "input[type='checkbox']".to_string(),
            submit_name: "Add Task".to_string(),
        }
    }
}

/// Quote a value for a CSS attribute selector
fn css_quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

impl AppProfile {
    /// Toggle in its initial (simple input) state
    #[must_use]
    pub fn toggle_to_smart(&self) -> LocatorChain {
        LocatorChain::new(Locator::role("button", &self.toggle_to_smart_name))
            .or(Locator::role("button", &self.toggle_text))
    }

    /// Toggle after one activation
    #[must_use]
    pub fn toggle_to_simple(&self) -> LocatorChain {
        LocatorChain::new(Locator::role("button", &self.toggle_to_simple_name))
            .or(Locator::role("button", &self.toggle_text))
    }

    /// Toggle after one activation, by programmatic name only
    #[must_use]
    pub fn toggle_to_simple_strict(&self) -> LocatorChain {
        LocatorChain::new(Locator::role("button", &self.toggle_to_simple_name))
    }

    /// Natural-language input
    #[must_use]
    pub fn smart_input(&self) -> LocatorChain {
        LocatorChain::new(Locator::label(&self.smart_input_label)).or(Locator::css(format!(
            "input[placeholder*={}]",
            css_quote(&self.smart_input_placeholder)
        )))
    }

    /// Title input
    #[must_use]
    pub fn title_input(&self) -> LocatorChain {
        LocatorChain::new(Locator::css(format!(
            "input[placeholder={}]",
            css_quote(&self.title_placeholder)
        )))
        .or(Locator::role("textbox", &self.title_placeholder))
    }

    /// Due date/time input
    #[must_use]
    pub fn due_input(&self) -> LocatorChain {
        LocatorChain::new(Locator::css(&self.due_selector))
    }

    /// Reminder checkbox, preferring the one inside the form
    #[must_use]
    pub fn reminder(&self) -> LocatorChain {
        LocatorChain::new(Locator::css(format!(
            "{} {}",
            self.form_selector, self.reminder_selector
        )))
        .or(Locator::css(&self.reminder_selector))
    }

    /// Submit button
    #[must_use]
    pub fn submit(&self) -> LocatorChain {
        LocatorChain::new(Locator::role("button", &self.submit_name))
            .or(Locator::css_with_text("button", &self.submit_name))
    }

    /// Root form
    #[must_use]
    pub fn form(&self) -> LocatorChain {
        LocatorChain::new(Locator::css(&self.form_selector))
    }

    /// Task list container
    #[must_use]
    pub fn list(&self) -> LocatorChain {
        LocatorChain::new(Locator::css(&self.list_selector))
    }

    /// Every entry title
    #[must_use]
    pub fn entries(&self) -> LocatorChain {
        LocatorChain::new(Locator::css(&self.item_title_selector))
    }

    /// Entry title containing `title`
    #[must_use]
    pub fn entry(&self, title: &str) -> LocatorChain {
        LocatorChain::new(Locator::css_with_text(&self.item_title_selector, title))
    }
}

/// Validation alert
fn alert() -> LocatorChain {
    LocatorChain::new(Locator::any_role("alert"))
}

/// Parse a `datetime-local` value (`YYYY-MM-DDTHH:MM`, seconds optional)
fn parse_local(value: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .map_err(|e| format!("{value:?} is not a local date-time: {e}"))
}

/// Due value derived from the smart phrase: a Friday at 17:00
fn is_friday_five_pm(value: &str) -> Result<(), String> {
    let due = parse_local(value.trim())?;
    if due.weekday() != Weekday::Fri {
        return Err(format!("{value} falls on {}", due.weekday()));
    }
    if (due.hour(), due.minute()) != (17, 0) {
        return Err(format!("{value} is at {:02}:{:02}", due.hour(), due.minute()));
    }
    Ok(())
}

fn ready_phase(profile: &AppProfile, timeouts: &Timeouts, wait_for_form: bool) -> Phase {
    let step = if wait_for_form {
        Step::wait_visible("form visible", profile.form())
    } else {
        Step::wait_attached("task list rendered", profile.list())
    };
    Phase::new("ready")
        .required()
        .step(step.timeout(timeouts.ready_ms))
}

/// Toggle state attributes, name switching, input association and alert
/// surfacing
#[must_use]
pub fn accessibility(profile: &AppProfile, timeouts: &Timeouts) -> Scenario {
    let equals = |v: &str| Expectation::AttributeEquals(v.to_string());
    Scenario::new(
        "accessibility",
        "toggle ARIA state, input description and error alert role",
    )
    .phase(ready_phase(profile, timeouts, true))
    .phase(
        Phase::new("smart toggle")
            .step(
                Step::read_attribute("initial aria-expanded", profile.toggle_to_smart(), "aria-expanded")
                    .expect(equals("false"))
                    .soft(),
            )
            .step(
                Step::read_attribute("initial aria-pressed", profile.toggle_to_smart(), "aria-pressed")
                    .expect(equals("false"))
                    .soft(),
            )
            .step(Step::click("activate toggle", profile.toggle_to_smart()))
            .step(
                Step::read_attribute(
                    "toggled aria-expanded",
                    profile.toggle_to_simple_strict(),
                    "aria-expanded",
                )
                .expect(equals("true"))
                .timeout(timeouts.appear_ms)
                .soft(),
            )
            .step(
                Step::read_attribute("toggled aria-label", profile.toggle_to_simple_strict(), "aria-label")
                    .expect(Expectation::AttributePresent)
                    .optional(),
            )
            .step(
                Step::wait_visible("smart input visible", profile.smart_input())
                    .timeout(timeouts.appear_ms),
            )
            .step(
                Step::read_attribute("smart input described", profile.smart_input(), "aria-describedby")
                    .expect(Expectation::AttributePresent)
                    .soft(),
            )
            .step(
                Step::read_attribute("description resolves", profile.smart_input(), "aria-describedby")
                    .expect(Expectation::ReferenceResolves),
            ),
    )
    .phase(
        Phase::new("error alert")
            .step(Step::count("entries before submit", profile.entries()).remember("entries_before"))
            .step(Step::click("submit empty form", profile.submit()))
            .step(Step::wait_visible("alert shown", alert()).timeout(timeouts.alert_ms))
            .step(
                Step::read_text("alert text", alert())
                    .expect(Expectation::TextNonEmpty)
                    .timeout(timeouts.alert_ms),
            )
            .step(
                Step::count("no entry added", profile.entries())
                    .expect(Expectation::EqualsRemembered("entries_before".to_string()))
                    .hold(timeouts.alert_ms),
            ),
    )
}

/// Two activations return the toggle to its initial state
#[must_use]
pub fn toggle_roundtrip(profile: &AppProfile, timeouts: &Timeouts) -> Scenario {
    let equals = |v: &str| Expectation::AttributeEquals(v.to_string());
    Scenario::new("toggle_roundtrip", "double activation restores aria-expanded")
        .phase(ready_phase(profile, timeouts, true))
        .phase(
            Phase::new("roundtrip")
                .step(
                    Step::read_attribute("initial", profile.toggle_to_smart(), "aria-expanded")
                        .expect(equals("false")),
                )
                .step(Step::click("first activation", profile.toggle_to_smart()))
                .step(
                    Step::read_attribute("after one", profile.toggle_to_simple(), "aria-expanded")
                        .expect(equals("true"))
                        .timeout(timeouts.appear_ms),
                )
                .step(Step::click("second activation", profile.toggle_to_simple()))
                .step(
                    Step::read_attribute("after two", profile.toggle_to_smart(), "aria-expanded")
                        .expect(equals("false"))
                        .timeout(timeouts.appear_ms),
                ),
        )
}

/// Natural-language input derives title and due date, then submits
#[must_use]
pub fn smart_add(profile: &AppProfile, timeouts: &Timeouts) -> Scenario {
    Scenario::new("smart_add", "natural-language input fills title and due date")
        .phase(ready_phase(profile, timeouts, false))
        .phase(
            Phase::new("derive")
                .required()
                .step(Step::click("open smart input", profile.toggle_to_smart()))
                .step(
                    Step::wait_visible("smart input visible", profile.smart_input())
                        .timeout(timeouts.appear_ms),
                )
                .step(Step::fill("type phrase", profile.smart_input(), SMART_PHRASE))
                .step(Step::settle("debounced parsing", timeouts.settle_ms))
                .step(
                    Step::read_value("title derived", profile.title_input())
                        .expect(Expectation::ValueEquals(SMART_PHRASE.to_string())),
                )
                .step(
                    Step::read_value("due derived", profile.due_input())
                        .expect(Expectation::ValueNonEmpty)
                        .soft(),
                )
                .step(
                    Step::read_value("due is friday 17:00", profile.due_input()).expect(
                        Expectation::ValueSatisfies {
                            description: "is a Friday at 17:00".to_string(),
                            check: is_friday_five_pm,
                        },
                    ),
                )
                .step(Step::screenshot("checkpoint", "smart_add")),
        )
        .phase(
            Phase::new("submit")
                .step(Step::click("add task", profile.submit()))
                .step(
                    Step::wait_attached("entry listed", profile.entry(SMART_PHRASE))
                        .timeout(timeouts.list_ms),
                ),
        )
}

/// Plain form submission with a due date and reminder
#[must_use]
pub fn task_creation(profile: &AppProfile, timeouts: &Timeouts) -> Scenario {
    Scenario::new("task_creation", "create a task with due date and reminder")
        .phase(ready_phase(profile, timeouts, false))
        .phase(
            Phase::new("fill form")
                .required()
                .step(Step::screenshot("checkpoint", "task_form"))
                .step(Step::fill("title", profile.title_input(), TASK_TITLE))
                .step(Step::fill("due date", profile.due_input(), TASK_DUE))
                .step(
                    Step::read_value("due accepted", profile.due_input())
                        .expect(Expectation::ValueEquals(TASK_DUE.to_string()))
                        .soft(),
                )
                .step(Step::check("reminder", profile.reminder())),
        )
        .phase(
            Phase::new("submit")
                .step(Step::click("add task", profile.submit()))
                .step(
                    Step::wait_attached("entry listed", profile.entry(TASK_TITLE))
                        .timeout(timeouts.list_ms),
                )
                .step(Step::screenshot("checkpoint", "task_list")),
        )
}

/// Names and descriptions of the built-in scenarios, in run order
#[must_use]
pub fn catalog() -> &'static [(&'static str, &'static str)] {
    &[
        (
            "accessibility",
            "toggle ARIA state, input description and error alert role",
        ),
        ("toggle_roundtrip", "double activation restores aria-expanded"),
        ("smart_add", "natural-language input fills title and due date"),
        ("task_creation", "create a task with due date and reminder"),
    ]
}

/// Build a built-in scenario by name
#[must_use]
pub fn builtin(name: &str, config: &HarnessConfig) -> Option<Scenario> {
    let (profile, timeouts) = (&config.app, &config.timeouts);
    match name {
        "accessibility" => Some(accessibility(profile, timeouts)),
        "toggle_roundtrip" => Some(toggle_roundtrip(profile, timeouts)),
        "smart_add" => Some(smart_add(profile, timeouts)),
        "task_creation" => Some(task_creation(profile, timeouts)),
        _ => None,
    }
}

/// Every built-in scenario
#[must_use]
pub fn all(config: &HarnessConfig) -> Vec<Scenario> {
    catalog()
        .iter()
        .filter_map(|(name, _)| builtin(name, config))
        .collect()
}
