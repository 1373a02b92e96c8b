//! Locator abstraction for element selection.
//!
//! # Design Philosophy
//!
//! - **Lazy**: a locator is a description, resolved against the live DOM
//!   every time it is used. Handles are never cached across steps.
//! - **Strict**: actions require exactly one match; zero is
//!   [`ProbeError::ElementNotFound`], several is
//!   [`ProbeError::AmbiguousElement`].
//! - **Accessible first**: role + accessible name is the primary lookup,
//!   with ordered fallbacks in a [`LocatorChain`].

use crate::driver::PageDriver;
use crate::result::{ProbeError, ProbeResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// How to find an element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Locator {
    /// ARIA role (explicit or implicit) with an optional exact accessible name
    Role {
        /// Role, e.g. `button`
        role: String,
        /// Accessible name; `None` matches any name
        name: Option<String>,
    },
    /// Element whose label (aria-label, aria-labelledby or `<label>`) equals the text
    Label {
        /// Label text
        name: String,
    },
    /// CSS selector
    Css {
        /// Selector, e.g. `div.task-list`
        selector: String,
    },
    /// CSS selector filtered by contained text
    CssWithText {
        /// Base CSS selector
        css: String,
        /// Text content to match
        text: String,
    },
    /// Innermost elements whose text contains the substring
    Text {
        /// Substring
        text: String,
    },
    /// Element id
    Id {
        /// The id, without `#`
        id: String,
    },
}

impl Locator {
    /// Role with an exact accessible name
    #[must_use]
    pub fn role(role: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Role {
            role: role.into(),
            name: Some(name.into()),
        }
    }

    /// Role with any name
    #[must_use]
    pub fn any_role(role: impl Into<String>) -> Self {
        Self::Role {
            role: role.into(),
            name: None,
        }
    }

    /// Label lookup
    #[must_use]
    pub fn label(name: impl Into<String>) -> Self {
        Self::Label { name: name.into() }
    }

    /// CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css {
            selector: selector.into(),
        }
    }

    /// CSS selector filtered by text
    #[must_use]
    pub fn css_with_text(css: impl Into<String>, text: impl Into<String>) -> Self {
        Self::CssWithText {
            css: css.into(),
            text: text.into(),
        }
    }

    /// Text-contains lookup
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Id lookup
    #[must_use]
    pub fn id(id: impl Into<String>) -> Self {
        Self::Id { id: id.into() }
    }

    /// Build a self-contained page script that resolves this locator and
    /// performs `op`. The script returns `{count, value}`; mutating ops only
    /// run when exactly one element matches.
    #[must_use]
    pub fn to_query_script(&self, op: &DomOp) -> String {
        // Serializing plain enums of strings cannot fail
        let target = serde_json::to_string(self).unwrap_or_else(|_| "null".to_string());
        let op = serde_json::to_string(op).unwrap_or_else(|_| "null".to_string());
        QUERY_SCRIPT
            .replace("__FLOWPROBE_TARGET__", &target)
            .replace("__FLOWPROBE_OP__", &op)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Role { role, name: Some(n) } => write!(f, "role={role}[name={n:?}]"),
            Self::Role { role, name: None } => write!(f, "role={role}"),
            Self::Label { name } => write!(f, "label={name:?}"),
            Self::Css { selector } => write!(f, "css={selector}"),
            Self::CssWithText { css, text } => write!(f, "css={css}:has-text({text:?})"),
            Self::Text { text } => write!(f, "text={text:?}"),
            Self::Id { id } => write!(f, "#{id}"),
        }
    }
}

/// One DOM operation performed by a query script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DomOp {
    /// Count matches
    Count,
    /// Whether the single match is rendered and visible
    IsVisible,
    /// Click the single match
    Click,
    /// Replace the value of the single match, firing input/change
    Fill {
        /// New value
        text: String,
    },
    /// Set a checkbox to checked
    Check,
    /// Read an attribute
    Attribute {
        /// Attribute name
        name: String,
    },
    /// Read text content
    Text,
    /// Read the form control value
    Value,
}

impl DomOp {
    /// Whether the op requires exactly one match
    #[must_use]
    pub const fn requires_single(&self) -> bool {
        !matches!(self, Self::Count)
    }
}

/// Response of a query script
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Number of matches
    pub count: usize,
    /// Op-specific value
    #[serde(default)]
    pub value: serde_json::Value,
}

impl QueryResponse {
    /// Fail unless exactly one element matched
    pub fn ensure_single(&self, locator: &Locator) -> ProbeResult<()> {
        match self.count {
            1 => Ok(()),
            0 => Err(ProbeError::ElementNotFound {
                locator: locator.to_string(),
            }),
            n => Err(ProbeError::AmbiguousElement {
                locator: locator.to_string(),
                count: n,
            }),
        }
    }

    /// Value as an optional string
    #[must_use]
    pub fn string_value(&self) -> Option<String> {
        match &self.value {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// Ordered candidate locators; the first one that matches wins.
///
/// Exists because UI copy and ARIA labelling drift apart: the primary
/// candidate is the programmatic name, later ones are visible-text variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatorChain {
    candidates: Vec<Locator>,
}

/// A chain resolved to one concrete locator at a moment in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// The matching candidate
    pub locator: Locator,
    /// Index of the candidate in the chain (0 = primary)
    pub candidate: usize,
}

impl Resolved {
    /// Whether a fallback candidate was needed
    #[must_use]
    pub const fn used_fallback(&self) -> bool {
        self.candidate > 0
    }
}

impl LocatorChain {
    /// Chain with a single candidate
    #[must_use]
    pub fn new(primary: Locator) -> Self {
        Self {
            candidates: vec![primary],
        }
    }

    /// Append a fallback candidate
    #[must_use]
    pub fn or(mut self, fallback: Locator) -> Self {
        self.candidates.push(fallback);
        self
    }

    /// Candidates in evaluation order
    #[must_use]
    pub fn candidates(&self) -> &[Locator] {
        &self.candidates
    }

    /// The primary candidate
    #[must_use]
    pub fn primary(&self) -> &Locator {
        &self.candidates[0]
    }

    /// Resolve once against the current DOM.
    ///
    /// Zero matches moves on to the next candidate; exactly one resolves;
    /// more than one is reported as ambiguous rather than falling through.
    pub async fn resolve<D: PageDriver + ?Sized>(&self, driver: &D) -> ProbeResult<Resolved> {
        for (index, locator) in self.candidates.iter().enumerate() {
            match driver.count(locator).await? {
                0 => {
                    debug!(%locator, "no match, trying next candidate");
                }
                1 => {
                    if index > 0 {
                        debug!(%locator, candidate = index, "resolved via fallback");
                    }
                    return Ok(Resolved {
                        locator: locator.clone(),
                        candidate: index,
                    });
                }
                count => {
                    return Err(ProbeError::AmbiguousElement {
                        locator: locator.to_string(),
                        count,
                    })
                }
            }
        }
        Err(ProbeError::ElementNotFound {
            locator: self.to_string(),
        })
    }

    /// Match count of the first candidate that matches anything
    pub async fn count<D: PageDriver + ?Sized>(&self, driver: &D) -> ProbeResult<usize> {
        for locator in &self.candidates {
            let n = driver.count(locator).await?;
            if n > 0 {
                return Ok(n);
            }
        }
        Ok(0)
    }
}

impl From<Locator> for LocatorChain {
    fn from(locator: Locator) -> Self {
        Self::new(locator)
    }
}

impl fmt::Display for LocatorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.candidates.iter().map(ToString::to_string).collect();
        write!(f, "{}", parts.join(" || "))
    }
}

/// Page-side resolver. Mirrors the accessible name computation closely
/// enough for form controls: aria-labelledby, aria-label, `<label>`, text
/// content for name-from-content roles, title, placeholder.
///
/// A `<label>` only names labelable controls, so the text inside a wrapping
/// label never matches its own label. Role lookup skips elements outside
/// the accessibility tree (`hidden`, `aria-hidden="true"`, not rendered).
const QUERY_SCRIPT: &str = r#"(() => {
  const target = __FLOWPROBE_TARGET__;
  const op = __FLOWPROBE_OP__;
  const norm = (s) => (s || '').replace(/\s+/g, ' ').trim();
  const implicitRole = (el) => {
    const tag = el.tagName.toLowerCase();
    const type = (el.getAttribute('type') || 'text').toLowerCase();
    switch (tag) {
      case 'button': return 'button';
      case 'a': return el.hasAttribute('href') ? 'link' : '';
      case 'textarea': return 'textbox';
      case 'select': return 'combobox';
      case 'ul': case 'ol': return 'list';
      case 'li': return 'listitem';
      case 'form': return 'form';
      case 'h1': case 'h2': case 'h3': case 'h4': case 'h5': case 'h6': return 'heading';
      case 'input':
        if (['button', 'submit', 'reset', 'image'].includes(type)) return 'button';
        if (type === 'checkbox') return 'checkbox';
        if (type === 'radio') return 'radio';
        if (type === 'hidden') return '';
        return 'textbox';
      default: return '';
    }
  };
  const roleOf = (el) => {
    const explicit = norm(el.getAttribute('role'));
    return explicit ? explicit.split(' ')[0] : implicitRole(el);
  };
  const labelledBy = (el) => {
    const ids = norm(el.getAttribute('aria-labelledby'));
    if (!ids) return '';
    return norm(ids.split(' ').map((id) => document.getElementById(id))
      .filter(Boolean).map((n) => n.textContent).join(' '));
  };
  const labelableTags = ['input', 'textarea', 'select', 'button', 'meter', 'output', 'progress'];
  const labelable = (el) => labelableTags.includes(el.tagName.toLowerCase())
    && !(el.tagName.toLowerCase() === 'input' && (el.getAttribute('type') || '').toLowerCase() === 'hidden');
  const labelElementText = (el) => {
    if (!labelable(el)) return '';
    if (el.id) {
      const byFor = Array.from(document.querySelectorAll('label')).find((l) => l.htmlFor === el.id);
      if (byFor) return norm(byFor.textContent);
    }
    const wrap = el.closest('label');
    return wrap ? norm(wrap.textContent) : '';
  };
  const fromContent = ['button', 'link', 'heading', 'listitem', 'checkbox', 'radio', 'tab', 'menuitem', 'option', 'alert', 'switch'];
  const nameOf = (el) => {
    const byIds = labelledBy(el);
    if (byIds) return byIds;
    const aria = norm(el.getAttribute('aria-label'));
    if (aria) return aria;
    const label = labelElementText(el);
    if (label) return label;
    if (fromContent.includes(roleOf(el))) {
      const text = norm(el.textContent);
      if (text) return text;
    }
    const title = norm(el.getAttribute('title'));
    if (title) return title;
    return norm(el.getAttribute('placeholder'));
  };
  const labelOf = (el) => labelledBy(el) || norm(el.getAttribute('aria-label')) || labelElementText(el);
  const all = () => Array.from(document.querySelectorAll('*'));
  const hiddenFromTree = (el) => {
    if (el.closest('[hidden], [aria-hidden="true"]')) return true;
    const style = window.getComputedStyle(el);
    if (style.visibility === 'hidden' || style.display === 'none') return true;
    return style.display !== 'contents' && el.getClientRects().length === 0;
  };
  const find = () => {
    switch (target.kind) {
      case 'role':
        return all().filter((el) => roleOf(el) === target.role
          && !hiddenFromTree(el)
          && (target.name === null || nameOf(el) === norm(target.name)));
      case 'label':
        return all().filter((el) => labelOf(el) === norm(target.name) && el.tagName.toLowerCase() !== 'label');
      case 'css':
        return Array.from(document.querySelectorAll(target.selector));
      case 'css_with_text':
        return Array.from(document.querySelectorAll(target.css))
          .filter((el) => (el.textContent || '').includes(target.text));
      case 'text':
        return all().filter((el) => (el.textContent || '').includes(target.text)
          && !Array.from(el.children).some((c) => (c.textContent || '').includes(target.text)));
      case 'id': {
        const el = document.getElementById(target.id);
        return el ? [el] : [];
      }
      default:
        return [];
    }
  };
  const visible = (el) => {
    const style = window.getComputedStyle(el);
    return style.visibility !== 'hidden' && style.display !== 'none' && el.getClientRects().length > 0;
  };
  const els = find();
  if (op.op === 'count') return { count: els.length, value: null };
  if (els.length !== 1) return { count: els.length, value: null };
  const el = els[0];
  switch (op.op) {
    case 'is_visible':
      return { count: 1, value: visible(el) };
    case 'click':
      el.scrollIntoView({ block: 'center' });
      el.click();
      return { count: 1, value: null };
    case 'fill': {
      el.focus();
      const proto = el instanceof HTMLTextAreaElement ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype;
      const setter = Object.getOwnPropertyDescriptor(proto, 'value').set;
      setter.call(el, op.text);
      el.dispatchEvent(new Event('input', { bubbles: true }));
      el.dispatchEvent(new Event('change', { bubbles: true }));
      return { count: 1, value: el.value };
    }
    case 'check':
      if (!el.checked) el.click();
      return { count: 1, value: !!el.checked };
    case 'attribute':
      return { count: 1, value: el.getAttribute(op.name) };
    case 'text':
      return { count: 1, value: el.textContent };
    case 'value':
      return { count: 1, value: el.value === undefined ? null : el.value };
    default:
      return { count: els.length, value: null };
  }
})()"#;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mock::{MockDriver, MockElement};
    use proptest::prelude::*;

    mod locator_tests {
        use super::*;

        #[test]
        fn test_role_display() {
            let loc = Locator::role("button", "Add Task");
            assert_eq!(loc.to_string(), "role=button[name=\"Add Task\"]");
            assert_eq!(Locator::any_role("alert").to_string(), "role=alert");
        }

        #[test]
        fn test_css_with_text_display() {
            let loc = Locator::css_with_text("div.task-title", "Buy milk");
            assert_eq!(loc.to_string(), "css=div.task-title:has-text(\"Buy milk\")");
        }

        #[test]
        fn test_serde_tag() {
            let json = serde_json::to_value(Locator::label("Smart Input")).unwrap();
            assert_eq!(json["kind"], "label");
            assert_eq!(json["name"], "Smart Input");
        }
    }

    mod script_tests {
        use super::*;

        #[test]
        fn test_script_embeds_target_and_op() {
            let script = Locator::role("button", "Smart Add").to_query_script(&DomOp::Click);
            assert!(script.contains(r#""kind":"role""#));
            assert!(script.contains(r#""name":"Smart Add""#));
            assert!(script.contains(r#""op":"click""#));
            assert!(!script.contains("__FLOWPROBE_TARGET__"));
            assert!(!script.contains("__FLOWPROBE_OP__"));
        }

        #[test]
        fn test_fill_op_serializes_text() {
            let op = DomOp::Fill {
                text: "Buy groceries next Friday at 5pm".to_string(),
            };
            let script = Locator::css("input").to_query_script(&op);
            assert!(script.contains("Buy groceries next Friday at 5pm"));
        }

        #[test]
        fn test_label_association_limited_to_labelable_controls() {
            let script = Locator::label("Smart Input").to_query_script(&DomOp::Count);
            assert!(script.contains("if (!labelable(el)) return '';"));
            for tag in ["'input'", "'textarea'", "'select'", "'button'"] {
                assert!(script.contains(tag), "{tag} missing from labelable tags");
            }
        }

        #[test]
        fn test_role_lookup_skips_hidden_elements() {
            let script = Locator::role("button", "Add Task").to_query_script(&DomOp::Count);
            assert!(script.contains("&& !hiddenFromTree(el)"));
            assert!(script.contains(r#"[aria-hidden="true"]"#));
        }

        #[test]
        fn test_count_does_not_require_single() {
            assert!(!DomOp::Count.requires_single());
            assert!(DomOp::Click.requires_single());
            assert!(DomOp::Value.requires_single());
        }

        proptest! {
            #[test]
            fn prop_script_embeds_text_as_json(text in "\\PC{0,40}") {
                let script = Locator::text(text.clone()).to_query_script(&DomOp::Count);
                let encoded = serde_json::to_string(&text).unwrap();
                prop_assert!(script.contains(&encoded));
            }
        }
    }

    mod response_tests {
        use super::*;

        #[test]
        fn test_ensure_single() {
            let loc = Locator::css(".x");
            let none = QueryResponse::default();
            assert!(matches!(
                none.ensure_single(&loc),
                Err(ProbeError::ElementNotFound { .. })
            ));
            let one = QueryResponse {
                count: 1,
                value: serde_json::Value::Null,
            };
            assert!(one.ensure_single(&loc).is_ok());
            let many = QueryResponse {
                count: 3,
                value: serde_json::Value::Null,
            };
            assert!(matches!(
                many.ensure_single(&loc),
                Err(ProbeError::AmbiguousElement { count: 3, .. })
            ));
        }

        #[test]
        fn test_string_value() {
            let resp: QueryResponse =
                serde_json::from_str(r#"{"count":1,"value":"true"}"#).unwrap();
            assert_eq!(resp.string_value().as_deref(), Some("true"));
            let resp: QueryResponse = serde_json::from_str(r#"{"count":1,"value":null}"#).unwrap();
            assert_eq!(resp.string_value(), None);
            let resp: QueryResponse = serde_json::from_str(r#"{"count":1,"value":true}"#).unwrap();
            assert_eq!(resp.string_value().as_deref(), Some("true"));
        }
    }

    mod chain_tests {
        use super::*;

        fn toggle_chain() -> LocatorChain {
            LocatorChain::new(Locator::role("button", "Switch to smart input mode"))
                .or(Locator::role("button", "Smart Add"))
        }

        #[tokio::test]
        async fn test_primary_wins() {
            let driver = MockDriver::new().with_element(
                MockElement::new("toggle")
                    .role("button")
                    .name("Switch to smart input mode"),
            );
            let resolved = toggle_chain().resolve(&driver).await.unwrap();
            assert_eq!(resolved.candidate, 0);
            assert!(!resolved.used_fallback());
        }

        #[tokio::test]
        async fn test_fallback_on_zero() {
            let driver = MockDriver::new()
                .with_element(MockElement::new("toggle").role("button").name("Smart Add"));
            let resolved = toggle_chain().resolve(&driver).await.unwrap();
            assert_eq!(resolved.candidate, 1);
            assert_eq!(resolved.locator, Locator::role("button", "Smart Add"));
        }

        #[tokio::test]
        async fn test_all_zero_is_not_found() {
            let driver = MockDriver::new();
            let err = toggle_chain().resolve(&driver).await.unwrap_err();
            match err {
                ProbeError::ElementNotFound { locator } => {
                    assert!(locator.contains("Switch to smart input mode"));
                    assert!(locator.contains("Smart Add"));
                }
                other => panic!("unexpected error {other:?}"),
            }
        }

        #[tokio::test]
        async fn test_ambiguous_does_not_fall_through() {
            let driver = MockDriver::new()
                .with_element(MockElement::new("a").role("button").name("Switch to smart input mode"))
                .with_element(MockElement::new("b").role("button").name("Switch to smart input mode"))
                .with_element(MockElement::new("c").role("button").name("Smart Add"));
            let err = toggle_chain().resolve(&driver).await.unwrap_err();
            assert!(matches!(err, ProbeError::AmbiguousElement { count: 2, .. }));
        }

        #[tokio::test]
        async fn test_chain_count_uses_first_nonzero() {
            let driver = MockDriver::new()
                .with_element(MockElement::new("t1").selector("div.task-title").text("a"))
                .with_element(MockElement::new("t2").selector("div.task-title").text("b"));
            let chain = LocatorChain::new(Locator::css("li.task")).or(Locator::css("div.task-title"));
            assert_eq!(chain.count(&driver).await.unwrap(), 2);
        }

        #[test]
        fn test_chain_display() {
            assert_eq!(
                toggle_chain().to_string(),
                "role=button[name=\"Switch to smart input mode\"] || role=button[name=\"Smart Add\"]"
            );
        }
    }
}
