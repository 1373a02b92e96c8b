//! Assertion layer.
//!
//! Expectations are evaluated by polling: each attempt re-resolves the
//! target, reads the observed value and judges it. Nothing here returns an
//! error; driver failures are folded into an [`Outcome`] so the engine can
//! record them and move on to its failure path.

use crate::driver::PageDriver;
use crate::locator::{Locator, LocatorChain};
use crate::result::{ProbeError, ProbeResult};
use crate::step::{Action, Expectation};
use crate::wait::{poll_until, WaitOptions};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::time::Instant;
use tracing::debug;

/// Why an assertion failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FailureReason {
    /// Locator matched more than one element
    Ambiguous {
        /// Locator description
        locator: String,
        /// Number of matches
        count: usize,
    },
    /// Attribute present with another value
    AttributeMismatch {
        /// Attribute name
        attribute: String,
        /// Expected value
        expected: String,
        /// Observed value
        observed: String,
    },
    /// Attribute absent
    AttributeMissing {
        /// Attribute name
        attribute: String,
    },
    /// Id reference with no target element
    DanglingReference {
        /// Attribute holding the reference
        attribute: String,
        /// Unresolved id
        id: String,
    },
    /// Value differs
    ValueMismatch {
        /// Expected value
        expected: String,
        /// Observed value
        observed: String,
    },
    /// Value or text blank
    Empty,
    /// Custom check rejected the value
    Predicate {
        /// What was checked
        description: String,
        /// Why it failed
        message: String,
    },
    /// Observation differs from a remembered one
    Changed {
        /// Memo key
        key: String,
        /// Remembered value
        before: String,
        /// Current value
        after: String,
    },
    /// Elements present that should be absent
    StillPresent {
        /// Match count
        count: usize,
    },
    /// Condition never held within the bound
    Timeout {
        /// What was waited for
        waited_for: String,
        /// Bound in milliseconds
        ms: u64,
    },
    /// Application unreachable
    Navigation {
        /// URL
        url: String,
        /// Error message
        message: String,
    },
    /// Any other driver failure
    Driver {
        /// Error message
        message: String,
    },
}

impl FailureReason {
    /// Stable slug used in artifact names
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Ambiguous { .. } => "ambiguous",
            Self::AttributeMismatch { .. } => "attribute_mismatch",
            Self::AttributeMissing { .. } => "attribute_missing",
            Self::DanglingReference { .. } => "dangling_reference",
            Self::ValueMismatch { .. } => "value_mismatch",
            Self::Empty => "empty",
            Self::Predicate { .. } => "predicate",
            Self::Changed { .. } => "changed",
            Self::StillPresent { .. } => "still_present",
            Self::Timeout { .. } => "timeout",
            Self::Navigation { .. } => "navigation_failure",
            Self::Driver { .. } => "driver",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ambiguous { locator, count } => write!(f, "{count} elements match {locator}"),
            Self::AttributeMismatch {
                attribute,
                expected,
                observed,
            } => write!(f, "{attribute} is {observed:?}, expected {expected:?}"),
            Self::AttributeMissing { attribute } => write!(f, "{attribute} is missing"),
            Self::DanglingReference { attribute, id } => {
                write!(f, "{attribute} references missing #{id}")
            }
            Self::ValueMismatch { expected, observed } => {
                write!(f, "value is {observed:?}, expected {expected:?}")
            }
            Self::Empty => write!(f, "value is empty"),
            Self::Predicate {
                description,
                message,
            } => write!(f, "{description}: {message}"),
            Self::Changed { key, before, after } => {
                write!(f, "{key} changed from {before} to {after}")
            }
            Self::StillPresent { count } => write!(f, "{count} unexpected matches"),
            Self::Timeout { waited_for, ms } => write!(f, "timed out after {ms}ms waiting for {waited_for}"),
            Self::Navigation { url, message } => write!(f, "navigation to {url} failed: {message}"),
            Self::Driver { message } => write!(f, "{message}"),
        }
    }
}

/// Result of one assertion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// Expectation held
    Pass,
    /// Expectation failed
    Fail(FailureReason),
    /// Target never resolved
    NotFound {
        /// Locator description
        locator: String,
    },
}

impl Outcome {
    /// Whether the assertion passed
    #[must_use]
    pub const fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }

    /// Fold a driver error into an outcome
    #[must_use]
    pub fn from_error(err: &ProbeError) -> Self {
        match err {
            ProbeError::ElementNotFound { locator } => Self::NotFound {
                locator: locator.clone(),
            },
            ProbeError::AmbiguousElement { locator, count } => Self::Fail(FailureReason::Ambiguous {
                locator: locator.clone(),
                count: *count,
            }),
            ProbeError::Timeout { waited_for, ms } => Self::Fail(FailureReason::Timeout {
                waited_for: waited_for.clone(),
                ms: *ms,
            }),
            ProbeError::NavigationFailure { url, message } => {
                Self::Fail(FailureReason::Navigation {
                    url: url.clone(),
                    message: message.clone(),
                })
            }
            other => Self::Fail(FailureReason::Driver {
                message: other.to_string(),
            }),
        }
    }

    /// Slug for artifact names
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail(reason) => reason.kind(),
            Self::NotFound { .. } => "not_found",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "pass"),
            Self::Fail(reason) => write!(f, "fail: {reason}"),
            Self::NotFound { locator } => write!(f, "not found: {locator}"),
        }
    }
}

/// A single read: what was seen and how it was judged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    /// Observed value, if anything was read
    pub observed: Option<String>,
    /// Judgement
    pub outcome: Outcome,
}

impl Observation {
    /// Passing observation
    #[must_use]
    pub const fn pass(observed: Option<String>) -> Self {
        Self {
            observed,
            outcome: Outcome::Pass,
        }
    }

    /// Observation with a judgement
    #[must_use]
    pub const fn judged(observed: Option<String>, outcome: Outcome) -> Self {
        Self { observed, outcome }
    }
}

/// Final verdict of a polled expectation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// Last observed value
    pub observed: Option<String>,
    /// Outcome of the last read
    pub outcome: Outcome,
    /// Time spent polling
    pub elapsed_ms: u64,
}

/// Poll `read` until its observation passes or the bound elapses.
///
/// On expiry the last observation is reported, so a mismatch keeps both
/// the expected and the observed value.
pub async fn expect<P, Fut>(description: &str, options: &WaitOptions, read: P) -> Verdict
where
    P: FnMut() -> Fut,
    Fut: Future<Output = ProbeResult<Observation>>,
{
    let start = Instant::now();
    match poll_until(description, options, read, |o: &Observation| o.outcome.is_pass()).await {
        Ok(result) => {
            let elapsed_ms = result.elapsed_ms();
            Verdict {
                observed: result.value.observed,
                outcome: result.value.outcome,
                elapsed_ms,
            }
        }
        Err(err) => Verdict {
            observed: None,
            outcome: Outcome::from_error(&err),
            elapsed_ms: start.elapsed().as_millis() as u64,
        },
    }
}

/// Read for the whole bound and fail on the first observation that does
/// not pass.
///
/// The counterpart of [`expect`] for negative checks such as "nothing was
/// added": a condition that breaks a few polls late is still caught.
pub async fn hold<P, Fut>(description: &str, options: &WaitOptions, read: P) -> Verdict
where
    P: FnMut() -> Fut,
    Fut: Future<Output = ProbeResult<Observation>>,
{
    let start = Instant::now();
    let broken = |o: &Observation| !o.outcome.is_pass();
    match poll_until(format!("{description} to break"), options, read, broken).await {
        Ok(result) => {
            let elapsed_ms = result.elapsed_ms();
            if result.satisfied {
                debug!(%description, elapsed_ms, "held condition broke");
            }
            Verdict {
                observed: result.value.observed,
                outcome: result.value.outcome,
                elapsed_ms,
            }
        }
        Err(err) => Verdict {
            observed: None,
            outcome: Outcome::from_error(&err),
            elapsed_ms: start.elapsed().as_millis() as u64,
        },
    }
}

/// Judge an observed value against an expectation that needs no DOM access
#[must_use]
pub fn judge(
    expectation: &Expectation,
    action: &Action,
    observed: Option<&str>,
    memo: &BTreeMap<String, String>,
) -> Outcome {
    let attribute = match action {
        Action::ReadAttribute(name) => name.clone(),
        _ => "value".to_string(),
    };
    let fail = Outcome::Fail;
    match expectation {
        Expectation::None | Expectation::ReferenceResolves => Outcome::Pass,
        Expectation::AttributeEquals(expected) => match observed {
            None => fail(FailureReason::AttributeMissing { attribute }),
            Some(v) if v == expected => Outcome::Pass,
            Some(v) => fail(FailureReason::AttributeMismatch {
                attribute,
                expected: expected.clone(),
                observed: v.to_string(),
            }),
        },
        Expectation::AttributePresent => match observed {
            None => fail(FailureReason::AttributeMissing { attribute }),
            Some(_) => Outcome::Pass,
        },
        Expectation::ValueEquals(expected) => {
            let v = observed.unwrap_or_default();
            if v == expected {
                Outcome::Pass
            } else {
                fail(FailureReason::ValueMismatch {
                    expected: expected.clone(),
                    observed: v.to_string(),
                })
            }
        }
        Expectation::ValueNonEmpty | Expectation::TextNonEmpty => {
            if observed.map_or(true, |v| v.trim().is_empty()) {
                fail(FailureReason::Empty)
            } else {
                Outcome::Pass
            }
        }
        Expectation::ValueSatisfies { description, check } => {
            let v = observed.unwrap_or_default();
            match check(v) {
                Ok(()) => Outcome::Pass,
                Err(message) => fail(FailureReason::Predicate {
                    description: description.clone(),
                    message,
                }),
            }
        }
        Expectation::EqualsRemembered(key) => {
            let after = observed.unwrap_or_default();
            match memo.get(key) {
                Some(before) if before == after => Outcome::Pass,
                Some(before) => fail(FailureReason::Changed {
                    key: key.clone(),
                    before: before.clone(),
                    after: after.to_string(),
                }),
                None => fail(FailureReason::Predicate {
                    description: format!("unchanged since {key}"),
                    message: "no value was remembered".to_string(),
                }),
            }
        }
        Expectation::Absent => match observed.and_then(|v| v.parse::<usize>().ok()) {
            Some(0) => Outcome::Pass,
            Some(count) => fail(FailureReason::StillPresent { count }),
            None => fail(FailureReason::Driver {
                message: "absence check needs a count".to_string(),
            }),
        },
    }
}

/// Read what `action` observes on the chain's single match (or the match
/// count for [`Action::Count`])
async fn observe<D: PageDriver + ?Sized>(
    driver: &D,
    chain: &LocatorChain,
    action: &Action,
) -> ProbeResult<Option<String>> {
    if matches!(action, Action::Count) {
        return Ok(Some(chain.count(driver).await?.to_string()));
    }
    let resolved = chain.resolve(driver).await?;
    match action {
        Action::ReadAttribute(name) => driver.attribute(&resolved.locator, name).await,
        Action::ReadText => driver.text(&resolved.locator).await.map(Some),
        _ => driver.value(&resolved.locator).await.map(Some),
    }
}

/// Check every whitespace-separated id in `ids` exists; returns the helper
/// text of the referenced elements
async fn resolve_references<D: PageDriver + ?Sized>(
    driver: &D,
    attribute: &str,
    ids: &str,
) -> ProbeResult<Result<String, FailureReason>> {
    let mut texts = Vec::new();
    for id in ids.split_whitespace() {
        let target = Locator::id(id);
        if driver.count(&target).await? == 0 {
            return Ok(Err(FailureReason::DanglingReference {
                attribute: attribute.to_string(),
                id: id.to_string(),
            }));
        }
        texts.push(driver.text(&target).await?.trim().to_string());
    }
    Ok(Ok(texts.join(" ")))
}

/// One attempt at a read step
async fn read_once<D: PageDriver + ?Sized>(
    driver: &D,
    chain: &LocatorChain,
    action: &Action,
    expectation: &Expectation,
    memo: &BTreeMap<String, String>,
) -> ProbeResult<Observation> {
    let observed = match observe(driver, chain, action).await {
        Ok(v) => v,
        Err(err @ ProbeError::ElementNotFound { .. }) => {
            return Ok(Observation::judged(None, Outcome::from_error(&err)));
        }
        Err(err) => return Err(err),
    };
    if let (Expectation::ReferenceResolves, Action::ReadAttribute(attribute)) = (expectation, action) {
        // Absent is fine; present must resolve
        let Some(ids) = observed else {
            return Ok(Observation::pass(None));
        };
        return Ok(match resolve_references(driver, attribute, &ids).await? {
            Ok(helper) => Observation::pass(Some(format!("{ids} -> {helper:?}"))),
            Err(reason) => Observation::judged(Some(ids), Outcome::Fail(reason)),
        });
    }
    let outcome = judge(expectation, action, observed.as_deref(), memo);
    Ok(Observation::judged(observed, outcome))
}

/// Evaluate a read step's expectation, polling until it holds or the bound
/// elapses
pub async fn evaluate_expectation<D: PageDriver + ?Sized>(
    driver: &D,
    chain: &LocatorChain,
    action: &Action,
    expectation: &Expectation,
    memo: &BTreeMap<String, String>,
    options: &WaitOptions,
) -> Verdict {
    let description = format!("{chain}: {}", expectation.describe(action));
    expect(&description, options, move || {
        read_once(driver, chain, action, expectation, memo)
    })
    .await
}

/// Evaluate a read step's expectation as an invariant over the whole bound
pub async fn hold_expectation<D: PageDriver + ?Sized>(
    driver: &D,
    chain: &LocatorChain,
    action: &Action,
    expectation: &Expectation,
    memo: &BTreeMap<String, String>,
    options: &WaitOptions,
) -> Verdict {
    let description = format!("{chain}: {}", expectation.describe(action));
    hold(&description, options, move || {
        read_once(driver, chain, action, expectation, memo)
    })
    .await
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mock::{MockDriver, MockElement};

    fn fast(timeout_ms: u64) -> WaitOptions {
        WaitOptions::new()
            .with_timeout(timeout_ms)
            .with_poll_interval(5)
    }

    fn memo() -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    mod judge_tests {
        use super::*;

        #[test]
        fn test_attribute_missing_differs_from_mismatch() {
            let action = Action::ReadAttribute("aria-expanded".to_string());
            let expect = Expectation::AttributeEquals("true".to_string());
            let missing = judge(&expect, &action, None, &memo());
            let wrong = judge(&expect, &action, Some("false"), &memo());
            assert_eq!(missing.kind(), "attribute_missing");
            assert_eq!(
                wrong,
                Outcome::Fail(FailureReason::AttributeMismatch {
                    attribute: "aria-expanded".to_string(),
                    expected: "true".to_string(),
                    observed: "false".to_string(),
                })
            );
        }

        #[test]
        fn test_value_checks() {
            let action = Action::ReadValue;
            assert!(judge(&Expectation::ValueNonEmpty, &action, Some("x"), &memo()).is_pass());
            assert_eq!(
                judge(&Expectation::ValueNonEmpty, &action, Some("  "), &memo()),
                Outcome::Fail(FailureReason::Empty)
            );
            let friday = Expectation::ValueSatisfies {
                description: "is friday".to_string(),
                check: |v| {
                    if v == "fri" {
                        Ok(())
                    } else {
                        Err(format!("{v} is not fri"))
                    }
                },
            };
            assert!(judge(&friday, &action, Some("fri"), &memo()).is_pass());
            assert_eq!(judge(&friday, &action, Some("mon"), &memo()).kind(), "predicate");
        }

        #[test]
        fn test_remembered_count() {
            let mut memo = memo();
            memo.insert("entries_before".to_string(), "2".to_string());
            let expect = Expectation::EqualsRemembered("entries_before".to_string());
            assert!(judge(&expect, &Action::Count, Some("2"), &memo).is_pass());
            assert_eq!(
                judge(&expect, &Action::Count, Some("3"), &memo),
                Outcome::Fail(FailureReason::Changed {
                    key: "entries_before".to_string(),
                    before: "2".to_string(),
                    after: "3".to_string(),
                })
            );
        }

        #[test]
        fn test_absent() {
            assert!(judge(&Expectation::Absent, &Action::Count, Some("0"), &memo()).is_pass());
            assert_eq!(
                judge(&Expectation::Absent, &Action::Count, Some("1"), &memo()),
                Outcome::Fail(FailureReason::StillPresent { count: 1 })
            );
        }
    }

    mod outcome_tests {
        use super::*;

        #[test]
        fn test_from_error_classification() {
            let not_found = Outcome::from_error(&ProbeError::ElementNotFound {
                locator: "#x".to_string(),
            });
            assert_eq!(not_found.kind(), "not_found");
            let timeout = Outcome::from_error(&ProbeError::Timeout {
                waited_for: "alert".to_string(),
                ms: 1_000,
            });
            assert_eq!(timeout.kind(), "timeout");
            let other = Outcome::from_error(&ProbeError::script("boom"));
            assert_eq!(other.kind(), "driver");
        }

        #[test]
        fn test_outcome_serializes_with_tags() {
            let json = serde_json::to_value(Outcome::Fail(FailureReason::AttributeMissing {
                attribute: "aria-pressed".to_string(),
            }))
            .unwrap();
            assert_eq!(json["outcome"], "fail");
            assert_eq!(json["reason"], "attribute_missing");
            assert_eq!(json["attribute"], "aria-pressed");
        }
    }

    mod evaluate_tests {
        use super::*;

        #[tokio::test]
        async fn test_timeout_reports_last_mismatch() {
            let driver = MockDriver::new().with_element(
                MockElement::new("toggle")
                    .role("button")
                    .name("Smart Add")
                    .attr("aria-expanded", "false"),
            );
            let chain = LocatorChain::new(Locator::role("button", "Smart Add"));
            let verdict = evaluate_expectation(
                &driver,
                &chain,
                &Action::ReadAttribute("aria-expanded".to_string()),
                &Expectation::AttributeEquals("true".to_string()),
                &memo(),
                &fast(20),
            )
            .await;
            assert_eq!(verdict.observed.as_deref(), Some("false"));
            assert_eq!(verdict.outcome.kind(), "attribute_mismatch");
        }

        #[tokio::test]
        async fn test_missing_target_is_not_found() {
            let driver = MockDriver::new();
            let chain = LocatorChain::new(Locator::label("Smart Input"));
            let verdict = evaluate_expectation(
                &driver,
                &chain,
                &Action::ReadValue,
                &Expectation::ValueNonEmpty,
                &memo(),
                &fast(20),
            )
            .await;
            assert!(matches!(verdict.outcome, Outcome::NotFound { .. }));
        }

        #[tokio::test]
        async fn test_reference_resolves_reads_helper_text() {
            let driver = MockDriver::new()
                .with_element(
                    MockElement::new("smart")
                        .label("Smart Input")
                        .attr("aria-describedby", "smart-help"),
                )
                .with_element(MockElement::new("help").id("smart-help").text(" Try: tomorrow 5pm "));
            let chain = LocatorChain::new(Locator::label("Smart Input"));
            let verdict = evaluate_expectation(
                &driver,
                &chain,
                &Action::ReadAttribute("aria-describedby".to_string()),
                &Expectation::ReferenceResolves,
                &memo(),
                &fast(20),
            )
            .await;
            assert!(verdict.outcome.is_pass());
            assert_eq!(
                verdict.observed.as_deref(),
                Some("smart-help -> \"Try: tomorrow 5pm\"")
            );
        }

        #[tokio::test]
        async fn test_dangling_reference() {
            let driver = MockDriver::new().with_element(
                MockElement::new("smart")
                    .label("Smart Input")
                    .attr("aria-describedby", "gone"),
            );
            let chain = LocatorChain::new(Locator::label("Smart Input"));
            let verdict = evaluate_expectation(
                &driver,
                &chain,
                &Action::ReadAttribute("aria-describedby".to_string()),
                &Expectation::ReferenceResolves,
                &memo(),
                &fast(20),
            )
            .await;
            assert_eq!(
                verdict.outcome,
                Outcome::Fail(FailureReason::DanglingReference {
                    attribute: "aria-describedby".to_string(),
                    id: "gone".to_string(),
                })
            );
        }

        #[tokio::test]
        async fn test_absent_reference_passes() {
            let driver = MockDriver::new().with_element(MockElement::new("smart").label("Smart Input"));
            let chain = LocatorChain::new(Locator::label("Smart Input"));
            let verdict = evaluate_expectation(
                &driver,
                &chain,
                &Action::ReadAttribute("aria-describedby".to_string()),
                &Expectation::ReferenceResolves,
                &memo(),
                &fast(20),
            )
            .await;
            assert!(verdict.outcome.is_pass());
        }

        #[tokio::test]
        async fn test_ambiguous_target_stops_polling() {
            let driver = MockDriver::new()
                .with_element(MockElement::new("a").role("alert").text("x"))
                .with_element(MockElement::new("b").role("alert").text("y"));
            let chain = LocatorChain::new(Locator::any_role("alert"));
            let verdict = evaluate_expectation(
                &driver,
                &chain,
                &Action::ReadText,
                &Expectation::TextNonEmpty,
                &memo(),
                &fast(5_000),
            )
            .await;
            assert_eq!(verdict.outcome.kind(), "ambiguous");
            assert!(verdict.elapsed_ms < 5_000);
        }
    }

    mod polling_tests {
        use super::*;

        fn empty() -> Observation {
            Observation::judged(Some(String::new()), Outcome::Fail(FailureReason::Empty))
        }

        #[tokio::test]
        async fn test_error_after_retries_reports_time_spent() {
            let mut attempts = 0;
            let verdict = expect("title filled", &fast(1_000), || {
                attempts += 1;
                let attempt = attempts;
                async move {
                    if attempt < 4 {
                        Ok(empty())
                    } else {
                        Err(ProbeError::Page {
                            message: "target closed".to_string(),
                        })
                    }
                }
            })
            .await;
            assert!(verdict.observed.is_none());
            assert!(!verdict.outcome.is_pass());
            assert!(verdict.elapsed_ms >= 15, "{}", verdict.elapsed_ms);
        }

        #[tokio::test]
        async fn test_hold_reports_first_breaking_observation() {
            let mut attempts = 0;
            let verdict = hold("title filled", &fast(1_000), || {
                attempts += 1;
                let attempt = attempts;
                async move {
                    if attempt < 3 {
                        Ok(Observation::pass(Some("Buy milk".to_string())))
                    } else {
                        Ok(empty())
                    }
                }
            })
            .await;
            assert_eq!(verdict.outcome.kind(), "empty");
            assert_eq!(verdict.observed.as_deref(), Some(""));
            assert!(verdict.elapsed_ms < 1_000);
        }

        #[tokio::test]
        async fn test_hold_error_reports_time_spent() {
            let mut attempts = 0;
            let verdict = hold("no entry added", &fast(1_000), || {
                attempts += 1;
                let attempt = attempts;
                async move {
                    if attempt < 4 {
                        Ok(Observation::pass(Some("0".to_string())))
                    } else {
                        Err(ProbeError::Page {
                            message: "target closed".to_string(),
                        })
                    }
                }
            })
            .await;
            assert!(!verdict.outcome.is_pass());
            assert!(verdict.elapsed_ms >= 15, "{}", verdict.elapsed_ms);
        }
    }
}
