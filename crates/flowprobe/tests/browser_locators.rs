//! Locator resolution against a real Chromium page.
//!
//! Each test loads a small DOM into `about:blank` and runs the page-side
//! resolver on it. They need a local Chromium, so they are ignored by
//! default:
//!
//! ```bash
//! cargo test -p flowprobe --features browser --test browser_locators -- --ignored
//! ```

#![cfg(feature = "browser")]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use flowprobe::{launch_page, BrowserSettings, CdpPage, Locator, LocatorChain, PageDriver};

async fn page_with(body: &str) -> CdpPage {
    let settings = BrowserSettings::default().with_no_sandbox();
    let mut page = launch_page(&settings).await.expect("chromium should launch");
    page.navigate("about:blank").await.unwrap();
    let html = serde_json::to_string(body).unwrap();
    page.evaluate(&format!("document.body.innerHTML = {html}; true"))
        .await
        .unwrap();
    page
}

// ============================================================================
// Labels
// ============================================================================

#[tokio::test]
#[ignore = "needs a local Chromium"]
async fn test_wrapping_label_resolves_to_the_control_only() {
    let mut page = page_with(
        r#"<label><span>Smart Input</span><input placeholder="e.g. Call Mom tomorrow"></label>"#,
    )
    .await;
    let label = Locator::label("Smart Input");

    assert_eq!(page.count(&label).await.unwrap(), 1);
    page.fill(&label, "Buy groceries next Friday at 5pm").await.unwrap();
    assert_eq!(
        page.value(&label).await.unwrap(),
        "Buy groceries next Friday at 5pm"
    );
    page.close().await.unwrap();
}

#[tokio::test]
#[ignore = "needs a local Chromium"]
async fn test_for_label_and_aria_label_both_match() {
    let mut page = page_with(
        r#"<label for="due">Due</label><input id="due" type="datetime-local">
           <textarea aria-label="Notes"></textarea>"#,
    )
    .await;
    assert_eq!(page.count(&Locator::label("Due")).await.unwrap(), 1);
    assert_eq!(page.count(&Locator::label("Notes")).await.unwrap(), 1);
    page.close().await.unwrap();
}

#[tokio::test]
#[ignore = "needs a local Chromium"]
async fn test_label_chain_does_not_need_placeholder_fallback() {
    let mut page = page_with(
        r#"<label><span>Smart Input</span><input placeholder="e.g. Call Mom tomorrow"></label>"#,
    )
    .await;
    let chain = LocatorChain::new(Locator::label("Smart Input"))
        .or(Locator::css("input[placeholder*='Call Mom tomorrow']"));
    let resolved = chain.resolve(&page).await.unwrap();
    assert!(!resolved.used_fallback());
    page.close().await.unwrap();
}

// ============================================================================
// Roles
// ============================================================================

#[tokio::test]
#[ignore = "needs a local Chromium"]
async fn test_hidden_duplicates_do_not_make_role_ambiguous() {
    let mut page = page_with(
        r#"<button hidden>Add Task</button>
           <div aria-hidden="true"><button>Add Task</button></div>
           <div style="display:none"><button>Add Task</button></div>
           <button>Add Task</button>"#,
    )
    .await;
    let submit = Locator::role("button", "Add Task");
    assert_eq!(page.count(&submit).await.unwrap(), 1);
    page.click(&submit).await.unwrap();
    page.close().await.unwrap();
}
