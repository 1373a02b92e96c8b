//! In-memory page driver for unit and scenario tests.
//!
//! [`MockDriver`] keeps a flat list of [`MockElement`]s and a storage map.
//! Behaviour is scripted with reactions: closures that observe a
//! [`MockEvent`] (navigation, click, fill, check) and mutate the
//! [`MockDom`], which is how tests model an application's client logic.
//!
//! Role lookups skip hidden elements, as the page-side resolver does.
//! Clones share state, so a test can keep a handle for inspection after
//! handing the driver to the runner.

use crate::driver::{ConsoleMessage, PageDriver};
use crate::identity::TOKEN_KEY;
use crate::locator::{DomOp, Locator, QueryResponse};
use crate::result::{ProbeError, ProbeResult};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Minimal PNG signature returned as screenshot data
pub const MOCK_PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// A fake DOM element
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockElement {
    /// Stable key used by reactions
    pub key: String,
    /// ARIA role
    pub role: Option<String>,
    /// Accessible name
    pub name: Option<String>,
    /// Associated label text
    pub label: Option<String>,
    /// Element id
    pub id: Option<String>,
    /// CSS selectors this element satisfies
    pub selectors: Vec<String>,
    /// Attributes
    pub attributes: BTreeMap<String, String>,
    /// Text content
    pub text: String,
    /// Form value
    pub value: String,
    /// Rendered and visible
    pub visible: bool,
    /// Checkbox state
    pub checked: bool,
    /// Remaining queries before the element attaches
    pub attach_after: u32,
}

impl MockElement {
    /// Visible element with the given key
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            visible: true,
            ..Self::default()
        }
    }

    /// Set role
    #[must_use]
    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Set accessible name
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set label
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set id
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Add a CSS selector this element matches
    #[must_use]
    pub fn selector(mut self, selector: impl Into<String>) -> Self {
        self.selectors.push(selector.into());
        self
    }

    /// Set an attribute
    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Set text content
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Set form value
    #[must_use]
    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    /// Render hidden
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Attach only after `queries` further DOM queries
    #[must_use]
    pub const fn attach_after(mut self, queries: u32) -> Self {
        self.attach_after = queries;
        self
    }

    fn attached(&self) -> bool {
        self.attach_after == 0
    }

    fn matches(&self, locator: &Locator) -> bool {
        if !self.attached() {
            return false;
        }
        match locator {
            Locator::Role { role, name } => {
                self.visible
                    && self.role.as_deref() == Some(role.as_str())
                    && name
                        .as_deref()
                        .map_or(true, |n| self.name.as_deref() == Some(n))
            }
            Locator::Label { name } => self.label.as_deref() == Some(name.as_str()),
            Locator::Css { selector } => self.selectors.iter().any(|s| s == selector),
            Locator::CssWithText { css, text } => {
                self.selectors.iter().any(|s| s == css) && self.text.contains(text.as_str())
            }
            Locator::Text { text } => self.text.contains(text.as_str()),
            Locator::Id { id } => self.id.as_deref() == Some(id.as_str()),
        }
    }
}

/// Mutable page model seen by reactions
#[derive(Debug, Clone, Default)]
pub struct MockDom {
    /// Elements in document order
    pub elements: Vec<MockElement>,
    /// `localStorage` contents
    pub storage: BTreeMap<String, String>,
    /// Console output
    pub console: Vec<ConsoleMessage>,
}

impl MockDom {
    /// Element by key
    #[must_use]
    pub fn element(&self, key: &str) -> Option<&MockElement> {
        self.elements.iter().find(|e| e.key == key)
    }

    /// Mutable element by key
    pub fn element_mut(&mut self, key: &str) -> Option<&mut MockElement> {
        self.elements.iter_mut().find(|e| e.key == key)
    }

    /// Append an element
    pub fn insert(&mut self, element: MockElement) {
        self.elements.push(element);
    }

    /// Remove an element by key
    pub fn remove(&mut self, key: &str) {
        self.elements.retain(|e| e.key != key);
    }

    /// Remove every element
    pub fn clear(&mut self) {
        self.elements.clear();
    }

    /// Set an attribute on an element, if present
    pub fn set_attribute(&mut self, key: &str, name: &str, value: impl Into<String>) {
        if let Some(el) = self.element_mut(key) {
            el.attributes.insert(name.to_string(), value.into());
        }
    }

    /// Whether storage holds a session token
    #[must_use]
    pub fn has_session(&self) -> bool {
        self.storage.get(TOKEN_KEY).is_some_and(|t| !t.is_empty())
    }

    fn tick(&mut self) {
        for el in &mut self.elements {
            el.attach_after = el.attach_after.saturating_sub(1);
        }
    }

    fn matching(&self, locator: &Locator) -> Vec<usize> {
        self.elements
            .iter()
            .enumerate()
            .filter(|(_, e)| e.matches(locator))
            .map(|(i, _)| i)
            .collect()
    }
}

/// Something the page did that reactions may respond to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    /// A navigation finished
    Navigated {
        /// Target URL
        url: String,
    },
    /// The page reloaded
    Reloaded,
    /// An element was clicked
    Clicked {
        /// Element key
        key: String,
    },
    /// An element's value was replaced
    Filled {
        /// Element key
        key: String,
        /// New value
        text: String,
    },
    /// A checkbox was checked
    Checked {
        /// Element key
        key: String,
    },
}

type Reaction = Box<dyn FnMut(&MockEvent, &mut MockDom) + Send>;

#[derive(Default)]
struct MockState {
    dom: MockDom,
    reactions: Vec<Reaction>,
    init_scripts: Vec<String>,
    url: String,
    unreachable: bool,
    unreachable_paths: Vec<String>,
    screenshot_fails: bool,
    history: Vec<String>,
    close_count: usize,
}

impl MockState {
    fn emit(&mut self, event: &MockEvent) {
        let Self { dom, reactions, .. } = self;
        for reaction in reactions.iter_mut() {
            reaction(event, dom);
        }
    }

    fn run_init_scripts(&mut self) {
        let scripts = self.init_scripts.clone();
        for script in &scripts {
            apply_storage_script(script, &mut self.dom.storage);
        }
    }
}

/// Mock driver for unit testing
#[derive(Clone, Default)]
pub struct MockDriver {
    state: Arc<Mutex<MockState>>,
}

impl fmt::Debug for MockDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("MockDriver")
            .field("url", &state.url)
            .field("elements", &state.dom.elements.len())
            .field("history", &state.history.len())
            .finish_non_exhaustive()
    }
}

impl MockDriver {
    /// Create new mock driver
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add an element
    #[must_use]
    pub fn with_element(self, element: MockElement) -> Self {
        self.lock().dom.insert(element);
        self
    }

    /// Add a console message
    #[must_use]
    pub fn with_console(self, message: ConsoleMessage) -> Self {
        self.lock().dom.console.push(message);
        self
    }

    /// Register a reaction to page events
    #[must_use]
    pub fn on_event<F>(self, reaction: F) -> Self
    where
        F: FnMut(&MockEvent, &mut MockDom) + Send + 'static,
    {
        self.lock().reactions.push(Box::new(reaction));
        self
    }

    /// Make every navigation fail as if the origin were down
    #[must_use]
    pub fn unreachable(self) -> Self {
        self.lock().unreachable = true;
        self
    }

    /// Make navigation fail only for URLs ending in `path`
    #[must_use]
    pub fn unreachable_path(self, path: impl Into<String>) -> Self {
        self.lock().unreachable_paths.push(path.into());
        self
    }

    /// Make screenshots fail
    #[must_use]
    pub fn failing_screenshots(self) -> Self {
        self.lock().screenshot_fails = true;
        self
    }

    /// Call history for verification
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.lock().history.clone()
    }

    /// Whether any recorded call starts with `prefix`
    #[must_use]
    pub fn was_called(&self, prefix: &str) -> bool {
        self.lock().history.iter().any(|c| c.starts_with(prefix))
    }

    /// How many times `close` ran
    #[must_use]
    pub fn close_count(&self) -> usize {
        self.lock().close_count
    }

    /// Snapshot of the page model
    #[must_use]
    pub fn dom(&self) -> MockDom {
        self.lock().dom.clone()
    }

    /// Mutate the page model directly
    pub fn with_dom<R>(&self, f: impl FnOnce(&mut MockDom) -> R) -> R {
        f(&mut self.lock().dom)
    }
}

/// Apply a storage seed script of the form produced by
/// [`SessionIdentity::seed_script`](crate::identity::SessionIdentity::seed_script)
fn apply_storage_script(script: &str, storage: &mut BTreeMap<String, String>) -> bool {
    const MARKER: &str = "const entries = ";
    let Some(start) = script.find(MARKER) else {
        return false;
    };
    let rest = &script[start + MARKER.len()..];
    let mut stream = serde_json::Deserializer::from_str(rest).into_iter::<serde_json::Value>();
    let Some(Ok(serde_json::Value::Object(entries))) = stream.next() else {
        return false;
    };
    for (key, value) in entries {
        if let serde_json::Value::String(v) = value {
            storage.insert(key, v);
        }
    }
    true
}

fn op_name(op: &DomOp) -> &'static str {
    match op {
        DomOp::Count => "count",
        DomOp::IsVisible => "is_visible",
        DomOp::Click => "click",
        DomOp::Fill { .. } => "fill",
        DomOp::Check => "check",
        DomOp::Attribute { .. } => "attribute",
        DomOp::Text => "text",
        DomOp::Value => "value",
    }
}

#[async_trait]
impl PageDriver for MockDriver {
    async fn navigate(&mut self, url: &str) -> ProbeResult<()> {
        let mut state = self.lock();
        state.history.push(format!("navigate:{url}"));
        let refused = state.unreachable
            || state.unreachable_paths.iter().any(|p| url.ends_with(p.as_str()));
        if refused {
            return Err(ProbeError::NavigationFailure {
                url: url.to_string(),
                message: "net::ERR_CONNECTION_REFUSED".to_string(),
            });
        }
        state.url = url.to_string();
        state.run_init_scripts();
        state.emit(&MockEvent::Navigated {
            url: url.to_string(),
        });
        Ok(())
    }

    async fn reload(&mut self) -> ProbeResult<()> {
        let mut state = self.lock();
        state.history.push("reload".to_string());
        state.run_init_scripts();
        state.emit(&MockEvent::Reloaded);
        Ok(())
    }

    async fn add_init_script(&mut self, script: &str) -> ProbeResult<()> {
        let mut state = self.lock();
        state.history.push("add_init_script".to_string());
        state.init_scripts.push(script.to_string());
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> ProbeResult<serde_json::Value> {
        let mut state = self.lock();
        state.history.push("evaluate".to_string());
        let applied = apply_storage_script(script, &mut state.dom.storage);
        Ok(serde_json::Value::Bool(applied))
    }

    async fn screenshot(&self) -> ProbeResult<Vec<u8>> {
        let mut state = self.lock();
        state.history.push("screenshot".to_string());
        if state.screenshot_fails {
            return Err(ProbeError::Screenshot {
                message: "target closed".to_string(),
            });
        }
        Ok(MOCK_PNG.to_vec())
    }

    async fn console_messages(&self) -> ProbeResult<Vec<ConsoleMessage>> {
        Ok(self.lock().dom.console.clone())
    }

    async fn current_url(&self) -> ProbeResult<String> {
        Ok(self.lock().url.clone())
    }

    async fn close(&mut self) -> ProbeResult<()> {
        let mut state = self.lock();
        state.history.push("close".to_string());
        state.close_count += 1;
        Ok(())
    }

    async fn query(&self, locator: &Locator, op: &DomOp) -> ProbeResult<QueryResponse> {
        let mut state = self.lock();
        state.history.push(format!("query:{}:{locator}", op_name(op)));
        state.dom.tick();
        let matches = state.dom.matching(locator);
        let mut response = QueryResponse {
            count: matches.len(),
            value: serde_json::Value::Null,
        };
        if matches!(op, DomOp::Count) {
            return Ok(response);
        }
        response.ensure_single(locator)?;
        let index = matches[0];
        let key = state.dom.elements[index].key.clone();
        let event = match op {
            DomOp::Count => None,
            DomOp::IsVisible => {
                response.value = serde_json::Value::Bool(state.dom.elements[index].visible);
                None
            }
            DomOp::Click => Some(MockEvent::Clicked { key }),
            DomOp::Fill { text } => {
                state.dom.elements[index].value.clone_from(text);
                response.value = serde_json::Value::String(text.clone());
                Some(MockEvent::Filled {
                    key,
                    text: text.clone(),
                })
            }
            DomOp::Check => {
                state.dom.elements[index].checked = true;
                response.value = serde_json::Value::Bool(true);
                Some(MockEvent::Checked { key })
            }
            DomOp::Attribute { name } => {
                response.value = state.dom.elements[index]
                    .attributes
                    .get(name)
                    .map_or(serde_json::Value::Null, |v| serde_json::Value::String(v.clone()));
                None
            }
            DomOp::Text => {
                response.value = serde_json::Value::String(state.dom.elements[index].text.clone());
                None
            }
            DomOp::Value => {
                response.value = serde_json::Value::String(state.dom.elements[index].value.clone());
                None
            }
        };
        if let Some(event) = event {
            state.emit(&event);
        }
        Ok(response)
    }
}
