//! Bounded waits.
//!
//! Every wait polls with `tokio::time::sleep`, so the calling task yields
//! between attempts and the browser connection keeps processing events. A
//! timeout is a hard cutoff; nothing here retries a failed step.

use crate::driver::PageDriver;
use crate::locator::{LocatorChain, Resolved};
use crate::result::{ProbeError, ProbeResult};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, info};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Default timeout for wait operations (5 seconds)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 5_000;

/// Default polling interval (50ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

// =============================================================================
// OPTIONS AND RESULTS
// =============================================================================

/// Options for a bounded wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Timeout in milliseconds
    pub timeout_ms: u64,
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl WaitOptions {
    /// Create new wait options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Timeout as Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Polling interval as Duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Result of a bounded poll: the last value read and whether it satisfied
/// the condition before the cutoff
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitResult<T> {
    /// Last value read
    pub value: T,
    /// Whether the condition held
    pub satisfied: bool,
    /// Time spent waiting
    pub elapsed: Duration,
    /// Description of what was waited for
    pub waited_for: String,
}

impl<T> WaitResult<T> {
    /// Elapsed time in milliseconds
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed.as_millis() as u64
    }

    /// Convert an unsatisfied result into [`ProbeError::Timeout`]
    pub fn into_result(self, options: &WaitOptions) -> ProbeResult<T> {
        if self.satisfied {
            Ok(self.value)
        } else {
            Err(ProbeError::Timeout {
                waited_for: self.waited_for,
                ms: options.timeout_ms,
            })
        }
    }
}

// =============================================================================
// POLLING
// =============================================================================

/// Read until `satisfied` holds or the timeout elapses.
///
/// The read always runs at least once. Read errors abort the wait.
pub async fn poll_until<T, P, Fut, S>(
    waited_for: impl Into<String>,
    options: &WaitOptions,
    mut read: P,
    satisfied: S,
) -> ProbeResult<WaitResult<T>>
where
    P: FnMut() -> Fut,
    Fut: Future<Output = ProbeResult<T>>,
    S: Fn(&T) -> bool,
{
    let waited_for = waited_for.into();
    let start = Instant::now();
    let deadline = options.timeout();
    loop {
        let value = read().await?;
        let elapsed = start.elapsed();
        if satisfied(&value) {
            debug!(%waited_for, elapsed_ms = elapsed.as_millis() as u64, "wait satisfied");
            return Ok(WaitResult {
                value,
                satisfied: true,
                elapsed,
                waited_for,
            });
        }
        if elapsed >= deadline {
            debug!(%waited_for, timeout_ms = options.timeout_ms, "wait timed out");
            return Ok(WaitResult {
                value,
                satisfied: false,
                elapsed,
                waited_for,
            });
        }
        let remaining = deadline.saturating_sub(elapsed);
        tokio::time::sleep(options.poll_interval().min(remaining)).await;
    }
}

/// Read until the condition holds; [`ProbeError::Timeout`] otherwise
pub async fn wait_until<T, P, Fut, S>(
    waited_for: impl Into<String>,
    options: &WaitOptions,
    read: P,
    satisfied: S,
) -> ProbeResult<T>
where
    P: FnMut() -> Fut,
    Fut: Future<Output = ProbeResult<T>>,
    S: Fn(&T) -> bool,
{
    poll_until(waited_for, options, read, satisfied)
        .await?
        .into_result(options)
}

// =============================================================================
// ELEMENT WAITS
// =============================================================================

/// Resolve a chain to exactly one element, polling while nothing matches.
///
/// Ambiguity aborts immediately; never matching is
/// [`ProbeError::ElementNotFound`].
pub async fn wait_for_resolution<D: PageDriver + ?Sized>(
    driver: &D,
    chain: &LocatorChain,
    options: &WaitOptions,
) -> ProbeResult<Resolved> {
    let result = poll_until(
        format!("{chain} to resolve"),
        options,
        move || async move {
            match chain.resolve(driver).await {
                Ok(resolved) => Ok(Some(resolved)),
                Err(ProbeError::ElementNotFound { .. }) => Ok(None),
                Err(e) => Err(e),
            }
        },
        Option::is_some,
    )
    .await?;
    result.value.ok_or_else(|| ProbeError::ElementNotFound {
        locator: chain.to_string(),
    })
}

/// Wait for a chain to resolve to one visible element
pub async fn wait_for_visible<D: PageDriver + ?Sized>(
    driver: &D,
    chain: &LocatorChain,
    options: &WaitOptions,
) -> ProbeResult<Resolved> {
    let result = poll_until(
        format!("{chain} to become visible"),
        options,
        move || async move {
            match chain.resolve(driver).await {
                Ok(resolved) => {
                    let visible = driver.is_visible(&resolved.locator).await?;
                    Ok(Some((resolved, visible)))
                }
                Err(ProbeError::ElementNotFound { .. }) => Ok(None),
                Err(e) => Err(e),
            }
        },
        |seen| matches!(seen, Some((_, true))),
    )
    .await?;
    let waited_for = match result.value {
        Some((resolved, true)) if result.satisfied => return Ok(resolved),
        Some(_) => format!("{chain} to become visible (attached but hidden)"),
        None => format!("{chain} to appear"),
    };
    Err(ProbeError::Timeout {
        waited_for,
        ms: options.timeout_ms,
    })
}

/// Wait until at least one element matches; returns the match count
pub async fn wait_for_attached<D: PageDriver + ?Sized>(
    driver: &D,
    chain: &LocatorChain,
    options: &WaitOptions,
) -> ProbeResult<usize> {
    wait_for_count(driver, chain, "to be at least 1", |count| count > 0, options).await
}

/// Wait until the match count satisfies `predicate`
pub async fn wait_for_count<D, F>(
    driver: &D,
    chain: &LocatorChain,
    description: &str,
    predicate: F,
    options: &WaitOptions,
) -> ProbeResult<usize>
where
    D: PageDriver + ?Sized,
    F: Fn(usize) -> bool,
{
    wait_until(
        format!("count of {chain} {description}"),
        options,
        move || chain.count(driver),
        |count| predicate(*count),
    )
    .await
}

/// Fixed grace period for debounced client-side derivation.
///
/// This is the one place the harness sleeps without a condition; use a
/// bounded wait for anything observable.
pub async fn settle(delay_ms: u64) {
    info!(delay_ms, "settling for debounced client-side derivation");
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::locator::Locator;
    use crate::mock::{MockDriver, MockElement};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(timeout_ms: u64) -> WaitOptions {
        WaitOptions::new()
            .with_timeout(timeout_ms)
            .with_poll_interval(5)
    }

    mod poll_tests {
        use super::*;

        #[tokio::test]
        async fn test_read_runs_at_least_once_with_zero_timeout() {
            let calls = AtomicU32::new(0);
            let counter = &calls;
            let result = poll_until(
                "anything",
                &fast(0),
                move || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(1)
                },
                |v| *v == 2,
            )
            .await
            .unwrap();
            assert_eq!(calls.load(Ordering::SeqCst), 1);
            assert!(!result.satisfied);
            assert_eq!(result.value, 1);
        }

        #[tokio::test]
        async fn test_wait_until_succeeds_after_several_polls() {
            let calls = AtomicU32::new(0);
            let counter = &calls;
            let value = wait_until(
                "counter reaches 3",
                &fast(1_000),
                move || async move { Ok(counter.fetch_add(1, Ordering::SeqCst) + 1) },
                |v| *v >= 3,
            )
            .await
            .unwrap();
            assert_eq!(value, 3);
        }

        #[tokio::test]
        async fn test_wait_until_times_out() {
            let err = wait_until("never", &fast(20), || async { Ok(false) }, |v| *v)
                .await
                .unwrap_err();
            match err {
                ProbeError::Timeout { waited_for, ms } => {
                    assert_eq!(waited_for, "never");
                    assert_eq!(ms, 20);
                }
                other => panic!("unexpected {other:?}"),
            }
        }

        #[tokio::test]
        async fn test_read_error_aborts() {
            let err = wait_until(
                "broken",
                &fast(1_000),
                || async { Err::<bool, _>(ProbeError::script("boom")) },
                |v| *v,
            )
            .await
            .unwrap_err();
            assert!(matches!(err, ProbeError::Script { .. }));
        }
    }

    mod element_wait_tests {
        use super::*;

        #[tokio::test]
        async fn test_visible_after_delayed_attach() {
            let driver = MockDriver::new()
                .with_element(MockElement::new("form").selector(".task-form").attach_after(3));
            let chain = LocatorChain::new(Locator::css(".task-form"));
            let resolved = wait_for_visible(&driver, &chain, &fast(1_000)).await.unwrap();
            assert_eq!(resolved.locator, Locator::css(".task-form"));
        }

        #[tokio::test]
        async fn test_hidden_element_times_out_with_reason() {
            let driver =
                MockDriver::new().with_element(MockElement::new("form").selector(".task-form").hidden());
            let chain = LocatorChain::new(Locator::css(".task-form"));
            let err = wait_for_visible(&driver, &chain, &fast(20)).await.unwrap_err();
            match err {
                ProbeError::Timeout { waited_for, .. } => assert!(waited_for.contains("hidden")),
                other => panic!("unexpected {other:?}"),
            }
        }

        #[tokio::test]
        async fn test_missing_element_times_out_as_never_appeared() {
            let driver = MockDriver::new();
            let chain = LocatorChain::new(Locator::css(".task-form"));
            let err = wait_for_visible(&driver, &chain, &fast(20)).await.unwrap_err();
            match err {
                ProbeError::Timeout { waited_for, .. } => assert!(waited_for.contains("appear")),
                other => panic!("unexpected {other:?}"),
            }
        }

        #[tokio::test]
        async fn test_resolution_not_found() {
            let driver = MockDriver::new();
            let chain = LocatorChain::new(Locator::role("button", "Add Task"));
            let err = wait_for_resolution(&driver, &chain, &fast(20)).await.unwrap_err();
            assert!(matches!(err, ProbeError::ElementNotFound { .. }));
        }

        #[tokio::test]
        async fn test_resolution_ambiguity_is_immediate() {
            let driver = MockDriver::new()
                .with_element(MockElement::new("a").role("alert"))
                .with_element(MockElement::new("b").role("alert"));
            let chain = LocatorChain::new(Locator::any_role("alert"));
            let err = wait_for_resolution(&driver, &chain, &fast(5_000)).await.unwrap_err();
            assert!(matches!(err, ProbeError::AmbiguousElement { count: 2, .. }));
        }

        #[tokio::test]
        async fn test_attached_allows_many() {
            let driver = MockDriver::new()
                .with_element(MockElement::new("1").selector("div.task-title").text("x"))
                .with_element(MockElement::new("2").selector("div.task-title").text("x"));
            let chain = LocatorChain::new(Locator::css_with_text("div.task-title", "x"));
            assert_eq!(wait_for_attached(&driver, &chain, &fast(100)).await.unwrap(), 2);
        }

        #[tokio::test]
        async fn test_count_predicate() {
            let driver = MockDriver::new();
            let chain = LocatorChain::new(Locator::css("div.task-title"));
            let count = wait_for_count(&driver, &chain, "== 0", |n| n == 0, &fast(100))
                .await
                .unwrap();
            assert_eq!(count, 0);
        }

        #[tokio::test]
        async fn test_attached_times_out_when_nothing_matches() {
            let driver = MockDriver::new();
            let chain = LocatorChain::new(Locator::css("div.task-title"));
            let err = wait_for_attached(&driver, &chain, &fast(20)).await.unwrap_err();
            assert!(err.to_string().contains("to be at least 1"));
        }
    }

    #[tokio::test]
    async fn test_settle_sleeps_at_least_delay() {
        let start = Instant::now();
        settle(15).await;
        assert!(start.elapsed() >= Duration::from_millis(15));
    }
}
