//! Scripted in-memory browser.
//!
//! [`MockDriver`] models a page as selector-keyed element lists. Routes
//! populate the page on navigation, click and Enter handlers mutate it, and
//! [`MockDom::after`] schedules mutations that land later. That delay is what
//! lets tests exercise the harness's waits against a UI that updates
//! asynchronously. Faults can be queued per selector to simulate stale
//! elements.

use super::driver::{escape_html, BrowserDriver, DriverError, DriverResult, ElementState};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Mutation run on click or Enter: `(dom, index of the element)`
pub type ActionHandler = Arc<dyn Fn(&mut MockDom, usize) + Send + Sync>;

/// Page setup run when a route is navigated to
pub type RouteHandler = Arc<dyn Fn(&mut MockDom) + Send + Sync>;

type Effect = Box<dyn FnOnce(&mut MockDom) + Send>;

/// Minimal 1x1 PNG
const PLACEHOLDER_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

/// The simulated document plus origin-scoped local storage
#[derive(Default)]
pub struct MockDom {
    url: String,
    elements: BTreeMap<String, Vec<ElementState>>,
    local_storage: BTreeMap<String, String>,
    pending: Vec<(Instant, Effect)>,
}

impl std::fmt::Debug for MockDom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockDom")
            .field("url", &self.url)
            .field("selectors", &self.elements.keys().collect::<Vec<_>>())
            .field("local_storage", &self.local_storage)
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl MockDom {
    /// Current URL
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Change the URL without running routes (client-side routing)
    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }

    /// Replace all matches for `selector`
    pub fn set(&mut self, selector: &str, elements: Vec<ElementState>) {
        self.elements.insert(selector.to_string(), elements);
    }

    /// Append a match for `selector`
    pub fn push(&mut self, selector: &str, element: ElementState) {
        self.elements
            .entry(selector.to_string())
            .or_default()
            .push(element);
    }

    /// Remove every match for `selector`
    pub fn remove(&mut self, selector: &str) {
        self.elements.remove(selector);
    }

    /// Remove one match
    pub fn remove_at(&mut self, selector: &str, index: usize) -> Option<ElementState> {
        let list = self.elements.get_mut(selector)?;
        (index < list.len()).then(|| list.remove(index))
    }

    /// Matches for `selector`
    #[must_use]
    pub fn get(&self, selector: &str) -> &[ElementState] {
        self.elements.get(selector).map_or(&[], Vec::as_slice)
    }

    /// Mutable access to one match
    pub fn get_mut(&mut self, selector: &str, index: usize) -> Option<&mut ElementState> {
        self.elements.get_mut(selector)?.get_mut(index)
    }

    /// Form value of the first match
    #[must_use]
    pub fn value_of(&self, selector: &str) -> Option<String> {
        self.get(selector).first().and_then(|e| e.value.clone())
    }

    /// Read local storage
    #[must_use]
    pub fn storage_get(&self, key: &str) -> Option<&str> {
        self.local_storage.get(key).map(String::as_str)
    }

    /// Write local storage
    pub fn storage_set(&mut self, key: &str, value: impl Into<String>) {
        self.local_storage.insert(key.to_string(), value.into());
    }

    /// Remove a local storage entry
    pub fn storage_remove(&mut self, key: &str) {
        self.local_storage.remove(key);
    }

    /// Run `effect` once `delay` has passed, on the next driver read
    pub fn after(&mut self, delay: Duration, effect: impl FnOnce(&mut MockDom) + Send + 'static) {
        self.pending.push((Instant::now() + delay, Box::new(effect)));
    }

    fn apply_due(&mut self) {
        let now = Instant::now();
        loop {
            let Some(pos) = self.pending.iter().position(|(due, _)| *due <= now) else {
                break;
            };
            let (_, effect) = self.pending.remove(pos);
            effect(self);
        }
    }

    fn render(&self) -> String {
        let mut html = String::from("<html><body>");
        for (selector, list) in &self.elements {
            for el in list {
                html.push_str(&format!(
                    "<{tag} data-selector=\"{sel}\" class=\"{classes}\">{inner}</{tag}>",
                    tag = el.tag,
                    sel = escape_html(selector),
                    classes = el.classes.join(" "),
                    inner = el.inner_html,
                ));
            }
        }
        html.push_str("</body></html>");
        html
    }
}

#[derive(Default)]
struct MockState {
    dom: MockDom,
    routes: Vec<(String, RouteHandler)>,
    click_handlers: HashMap<String, ActionHandler>,
    enter_handlers: HashMap<String, ActionHandler>,
    faults: HashMap<String, VecDeque<DriverError>>,
    calls: Vec<String>,
    history: Vec<String>,
    closed: bool,
}

impl MockState {
    fn guard(&mut self, call: String) -> DriverResult<()> {
        self.calls.push(call);
        if self.closed {
            return Err(DriverError::Closed);
        }
        self.dom.apply_due();
        Ok(())
    }

    fn take_fault(&mut self, selector: &str) -> DriverResult<()> {
        match self.faults.get_mut(selector).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn load(&mut self, url: &str) {
        self.dom.url = url.to_string();
        self.dom.elements.clear();
        self.dom.pending.clear();
        let route = self
            .routes
            .iter()
            .filter(|(pattern, _)| route_matches(pattern, url))
            .max_by_key(|(pattern, _)| pattern.len())
            .map(|(_, handler)| Arc::clone(handler));
        if let Some(handler) = route {
            handler(&mut self.dom);
        }
    }

    fn element(&self, selector: &str, index: usize) -> DriverResult<&ElementState> {
        self.dom
            .get(selector)
            .get(index)
            .ok_or_else(|| DriverError::NotFound {
                selector: selector.to_string(),
                index,
            })
    }
}

/// `*` suffix means prefix match; anything else must match exactly
fn route_matches(pattern: &str, url: &str) -> bool {
    pattern
        .strip_suffix('*')
        .map_or(pattern == url, |prefix| url.starts_with(prefix))
}

/// In-memory [`BrowserDriver`]
#[derive(Default)]
pub struct MockDriver {
    state: Mutex<MockState>,
}

impl std::fmt::Debug for MockDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MockDriver")
            .field("dom", &state.dom)
            .field("routes", &state.routes.len())
            .field("calls", &state.calls.len())
            .field("closed", &state.closed)
            .finish()
    }
}

impl MockDriver {
    /// Empty browser at `about:blank`
    #[must_use]
    pub fn new() -> Self {
        let driver = Self::default();
        driver.state.lock().dom.url = "about:blank".to_string();
        driver
    }

    /// Populate the page when a URL matching `pattern` is loaded.
    ///
    /// A trailing `*` makes the pattern a prefix; the longest match wins.
    pub fn route(&self, pattern: &str, setup: impl Fn(&mut MockDom) + Send + Sync + 'static) {
        self.state
            .lock()
            .routes
            .push((pattern.to_string(), Arc::new(setup)));
    }

    /// Run `handler` when an element matching `selector` is clicked
    pub fn on_click(
        &self,
        selector: &str,
        handler: impl Fn(&mut MockDom, usize) + Send + Sync + 'static,
    ) {
        self.state
            .lock()
            .click_handlers
            .insert(selector.to_string(), Arc::new(handler));
    }

    /// Run `handler` when Enter is pressed on an element matching `selector`
    pub fn on_enter(
        &self,
        selector: &str,
        handler: impl Fn(&mut MockDom, usize) + Send + Sync + 'static,
    ) {
        self.state
            .lock()
            .enter_handlers
            .insert(selector.to_string(), Arc::new(handler));
    }

    /// Make the next operation on `selector` fail with `error`.
    ///
    /// Navigation faults are keyed by URL; `"reload"` and `"back"` address
    /// the history operations.
    pub fn fail_next(&self, selector: &str, error: DriverError) {
        self.state
            .lock()
            .faults
            .entry(selector.to_string())
            .or_default()
            .push_back(error);
    }

    /// Make the next `times` operations on `selector` report a stale element
    pub fn stale_next(&self, selector: &str, times: usize) {
        for _ in 0..times {
            self.fail_next(
                selector,
                DriverError::StaleElement {
                    selector: selector.to_string(),
                },
            );
        }
    }

    /// Inspect or mutate the page directly
    pub fn with_dom<R>(&self, f: impl FnOnce(&mut MockDom) -> R) -> R {
        let mut state = self.state.lock();
        state.dom.apply_due();
        f(&mut state.dom)
    }

    /// Every call made so far, e.g. `click:.btn#0`
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    /// Number of calls starting with `prefix`
    #[must_use]
    pub fn count_calls(&self, prefix: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    /// Whether `close` was called
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

#[async_trait]
impl BrowserDriver for MockDriver {
    async fn navigate(&self, url: &str) -> DriverResult<()> {
        let mut state = self.state.lock();
        state.guard(format!("navigate:{url}"))?;
        state.take_fault(url)?;
        state.history.push(url.to_string());
        state.load(url);
        Ok(())
    }

    async fn current_url(&self) -> DriverResult<String> {
        let mut state = self.state.lock();
        state.guard("current_url".to_string())?;
        Ok(state.dom.url.clone())
    }

    async fn page_source(&self) -> DriverResult<String> {
        let mut state = self.state.lock();
        state.guard("page_source".to_string())?;
        Ok(state.dom.render())
    }

    async fn query_all(&self, selector: &str) -> DriverResult<Vec<ElementState>> {
        let mut state = self.state.lock();
        state.guard(format!("query:{selector}"))?;
        state.take_fault(selector)?;
        Ok(state.dom.get(selector).to_vec())
    }

    async fn click(&self, selector: &str, index: usize) -> DriverResult<()> {
        let mut state = self.state.lock();
        state.guard(format!("click:{selector}#{index}"))?;
        state.take_fault(selector)?;
        let el = state.element(selector, index)?;
        if !el.enabled || !el.visible {
            return Ok(());
        }
        if let Some(handler) = state.click_handlers.get(selector).cloned() {
            handler(&mut state.dom, index);
        }
        Ok(())
    }

    async fn fill(&self, selector: &str, index: usize, text: &str) -> DriverResult<()> {
        let mut state = self.state.lock();
        state.guard(format!("fill:{selector}#{index}"))?;
        state.take_fault(selector)?;
        state.element(selector, index)?;
        if let Some(el) = state.dom.get_mut(selector, index) {
            el.value = Some(text.to_string());
        }
        Ok(())
    }

    async fn press_enter(&self, selector: &str, index: usize) -> DriverResult<()> {
        let mut state = self.state.lock();
        state.guard(format!("enter:{selector}#{index}"))?;
        state.take_fault(selector)?;
        state.element(selector, index)?;
        if let Some(handler) = state.enter_handlers.get(selector).cloned() {
            handler(&mut state.dom, index);
        }
        Ok(())
    }

    async fn local_storage_get(&self, key: &str) -> DriverResult<Option<String>> {
        let mut state = self.state.lock();
        state.guard(format!("storage_get:{key}"))?;
        Ok(state.dom.storage_get(key).map(str::to_owned))
    }

    async fn local_storage_set(&self, key: &str, value: &str) -> DriverResult<()> {
        let mut state = self.state.lock();
        state.guard(format!("storage_set:{key}"))?;
        state.dom.storage_set(key, value);
        Ok(())
    }

    async fn local_storage_clear(&self) -> DriverResult<()> {
        let mut state = self.state.lock();
        state.guard("storage_clear".to_string())?;
        state.dom.local_storage.clear();
        Ok(())
    }

    async fn clear_cookies(&self) -> DriverResult<()> {
        let mut state = self.state.lock();
        state.guard("clear_cookies".to_string())
    }

    async fn reload(&self) -> DriverResult<()> {
        let mut state = self.state.lock();
        state.guard("reload".to_string())?;
        state.take_fault("reload")?;
        let url = state.dom.url.clone();
        state.load(&url);
        Ok(())
    }

    async fn back(&self) -> DriverResult<()> {
        let mut state = self.state.lock();
        state.guard("back".to_string())?;
        state.take_fault("back")?;
        state.history.pop();
        let previous = state
            .history
            .last()
            .cloned()
            .unwrap_or_else(|| "about:blank".to_string());
        state.load(&previous);
        Ok(())
    }

    async fn screenshot(&self) -> DriverResult<Vec<u8>> {
        let mut state = self.state.lock();
        state.guard("screenshot".to_string())?;
        Ok(PLACEHOLDER_PNG.to_vec())
    }

    async fn close(&self) -> DriverResult<()> {
        let mut state = self.state.lock();
        state.calls.push("close".to_string());
        state.closed = true;
        Ok(())
    }
}
