//! Mock WebDriver session for testing.
//!
//! Page scripts are recognised by comparing them against the constants in
//! [`crate::automation::scripts`]; everything else evaluates to `null`.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::automation::scripts;
use crate::driver::{BrowserDriver, DriverError, DriverFactory, ElementRef, Locator};
use crate::session::SessionHandle;

/// Labels used for elements returned by finder scripts.
pub const SELECT_ALL_LABEL: &str = "select_all";
pub const ACTION_MENU_LABEL: &str = "action_menu";
pub const PUBLIC_OPTION_LABEL: &str = "public_option";

/// What the simulated page looks like.
#[derive(Debug, Clone)]
pub struct MockPage {
    /// Selection count shown before any scroll.
    pub initial_count: Option<u32>,
    /// Count shown after the n-th scroll (the last entry repeats).
    pub counts: Vec<Option<u32>>,
    /// Page height after the n-th scroll (the last entry repeats).
    pub extents: Vec<u64>,
    pub link: Option<String>,
    /// Locator values or finder labels that never match anything.
    pub missing: HashSet<String>,
    /// Native clicks fail as not interactable.
    pub native_clicks_fail: bool,
    /// Scripts whose execution never completes.
    pub stalled_scripts: HashSet<String>,
}

impl Default for MockPage {
    fn default() -> Self {
        Self {
            initial_count: Some(150),
            counts: vec![Some(150)],
            extents: vec![1000],
            link: Some("https://www.youtube.com/playlist?list=PLmock".to_string()),
            missing: HashSet::new(),
            native_clicks_fail: false,
            stalled_scripts: HashSet::new(),
        }
    }
}

impl MockPage {
    pub fn with_counts(mut self, initial: Option<u32>, after_scrolls: Vec<Option<u32>>) -> Self {
        self.initial_count = initial;
        self.counts = after_scrolls;
        self
    }

    pub fn with_extents(mut self, extents: Vec<u64>) -> Self {
        self.extents = extents;
        self
    }

    pub fn with_link(mut self, link: Option<&str>) -> Self {
        self.link = link.map(str::to_string);
        self
    }

    /// `what` is a locator value (CSS, XPath or name) or one of the finder
    /// labels [`SELECT_ALL_LABEL`], [`ACTION_MENU_LABEL`], [`PUBLIC_OPTION_LABEL`].
    pub fn missing(mut self, what: &str) -> Self {
        self.missing.insert(what.to_string());
        self
    }

    pub fn failing_native_clicks(mut self) -> Self {
        self.native_clicks_fail = true;
        self
    }

    /// Executing `script` hangs, like a driver endpoint that stopped answering.
    pub fn stalling(mut self, script: &str) -> Self {
        self.stalled_scripts.insert(script.to_string());
        self
    }

    fn count_after(&self, scrolls: usize) -> Option<u32> {
        if scrolls == 0 {
            return self.initial_count;
        }
        self.counts
            .get(scrolls - 1)
            .or_else(|| self.counts.last())
            .copied()
            .flatten()
    }

    fn extent_after(&self, scrolls: usize) -> u64 {
        if scrolls == 0 {
            return 0;
        }
        self.extents
            .get(scrolls - 1)
            .or_else(|| self.extents.last())
            .copied()
            .unwrap_or(0)
    }
}

/// Everything one attached browser saw.
#[derive(Debug, Clone, Default)]
pub struct BrowserRecord {
    pub resource_key: String,
    /// Labels of natively clicked elements.
    pub clicks: Vec<String>,
    /// Labels of elements clicked through a script.
    pub script_clicks: Vec<String>,
    /// (element label, text) pairs sent as keystrokes.
    pub typed: Vec<(String, String)>,
    /// Values assigned through the set-value script.
    pub values: Vec<String>,
    pub scrolls: usize,
    pub opened_urls: Vec<String>,
    pub current_window: Option<String>,
    pub quit: bool,
    elements: HashMap<String, String>,
}

impl BrowserRecord {
    fn element(&mut self, label: &str) -> ElementRef {
        let id = format!("el-{}", self.elements.len() + 1);
        self.elements.insert(id.clone(), label.to_string());
        ElementRef(id)
    }

    fn label_of(&self, element: &ElementRef) -> String {
        self.elements
            .get(element.id())
            .cloned()
            .unwrap_or_else(|| element.id().to_string())
    }

    fn label_of_arg(&self, args: &[Value]) -> String {
        args.first()
            .and_then(ElementRef::from_json)
            .map(|e| self.label_of(&e))
            .unwrap_or_default()
    }
}

/// Mock implementation of the BrowserDriver trait.
pub struct MockBrowser {
    page: MockPage,
    record: Arc<RwLock<BrowserRecord>>,
}

impl MockBrowser {
    pub fn new(resource_key: &str, page: MockPage) -> Self {
        Self {
            page,
            record: Arc::new(RwLock::new(BrowserRecord {
                resource_key: resource_key.to_string(),
                ..BrowserRecord::default()
            })),
        }
    }

    pub async fn record(&self) -> BrowserRecord {
        self.record.read().await.clone()
    }

    fn finder(&self, record: &mut BrowserRecord, label: &str) -> Value {
        if self.page.missing.contains(label) {
            Value::Null
        } else {
            record.element(label).to_json()
        }
    }
}

#[async_trait]
impl BrowserDriver for MockBrowser {
    async fn find(&self, locator: &Locator) -> Result<ElementRef, DriverError> {
        let value = locator_value(locator);
        if self.page.missing.contains(value) {
            return Err(DriverError::NoSuchElement(locator.to_string()));
        }
        Ok(self.record.write().await.element(value))
    }

    async fn find_within(&self, _parent: &ElementRef, locator: &Locator) -> Result<ElementRef, DriverError> {
        self.find(locator).await
    }

    async fn is_clickable(&self, _element: &ElementRef) -> Result<bool, DriverError> {
        Ok(true)
    }

    async fn click(&self, element: &ElementRef) -> Result<(), DriverError> {
        if self.page.native_clicks_fail {
            return Err(DriverError::NotInteractable("element click intercepted".to_string()));
        }
        let mut record = self.record.write().await;
        let label = record.label_of(element);
        record.clicks.push(label);
        Ok(())
    }

    async fn send_keys(&self, element: &ElementRef, text: &str) -> Result<(), DriverError> {
        let mut record = self.record.write().await;
        let label = record.label_of(element);
        record.typed.push((label, text.to_string()));
        Ok(())
    }

    async fn clear(&self, _element: &ElementRef) -> Result<(), DriverError> {
        Ok(())
    }

    async fn text(&self, _element: &ElementRef) -> Result<String, DriverError> {
        Ok(String::new())
    }

    async fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value, DriverError> {
        if self.page.stalled_scripts.contains(script) {
            return std::future::pending().await;
        }
        let mut record = self.record.write().await;
        let value = match script {
            s if s == scripts::OPEN_TAB => {
                if let Some(url) = args.first().and_then(Value::as_str) {
                    record.opened_urls.push(url.to_string());
                }
                Value::Null
            }
            s if s == scripts::SELECTION_TEXT => match self.page.count_after(record.scrolls) {
                Some(count) => Value::from(format!("0 / {}", count)),
                None => Value::Null,
            },
            s if s == scripts::SCROLL_TO_BOTTOM => {
                record.scrolls += 1;
                Value::Null
            }
            s if s == scripts::SCROLL_HEIGHT => Value::from(self.page.extent_after(record.scrolls)),
            s if s == scripts::SELECT_ALL_BUTTON => self.finder(&mut record, SELECT_ALL_LABEL),
            s if s == scripts::ACTION_MENU_BUTTON => self.finder(&mut record, ACTION_MENU_LABEL),
            s if s == scripts::PUBLIC_OPTION => self.finder(&mut record, PUBLIC_OPTION_LABEL),
            s if s == scripts::LAST_COLLECTION_LINK => {
                self.page.link.clone().map(Value::from).unwrap_or(Value::Null)
            }
            s if s == scripts::CLICK => {
                let label = record.label_of_arg(&args);
                record.script_clicks.push(label);
                Value::Null
            }
            s if s == scripts::SET_VALUE => {
                if let Some(text) = args.get(1).and_then(Value::as_str) {
                    record.values.push(text.to_string());
                }
                Value::Null
            }
            _ => Value::Null,
        };
        Ok(value)
    }

    async fn window_handles(&self) -> Result<Vec<String>, DriverError> {
        let record = self.record.read().await;
        let mut handles = vec!["main".to_string()];
        handles.extend((1..=record.opened_urls.len()).map(|n| format!("tab-{}", n)));
        Ok(handles)
    }

    async fn switch_to_window(&self, handle: &str) -> Result<(), DriverError> {
        self.record.write().await.current_window = Some(handle.to_string());
        Ok(())
    }

    async fn quit(&self) -> Result<(), DriverError> {
        self.record.write().await.quit = true;
        Ok(())
    }
}

fn locator_value(locator: &Locator) -> &str {
    match locator {
        Locator::Css(v) | Locator::XPath(v) | Locator::Name(v) => v,
    }
}

/// Mock implementation of the DriverFactory trait.
///
/// Every attach builds a fresh [`MockBrowser`] over the configured page and
/// keeps a handle to its record for later inspection.
#[derive(Default)]
pub struct MockDriverFactory {
    page: MockPage,
    failing_attaches: Arc<RwLock<HashSet<String>>>,
    panicking_attaches: Arc<RwLock<HashSet<String>>>,
    records: Arc<RwLock<Vec<Arc<RwLock<BrowserRecord>>>>>,
}

impl MockDriverFactory {
    pub fn new(page: MockPage) -> Self {
        Self {
            page,
            ..Self::default()
        }
    }

    /// Attaching to a session of `resource_key` fails.
    pub async fn fail_attach(&self, resource_key: &str) {
        self.failing_attaches
            .write()
            .await
            .insert(resource_key.to_string());
    }

    /// Attaching to a session of `resource_key` panics.
    pub async fn panic_on_attach(&self, resource_key: &str) {
        self.panicking_attaches
            .write()
            .await
            .insert(resource_key.to_string());
    }

    /// Records of every browser attached so far, in attach order.
    pub async fn browsers(&self) -> Vec<BrowserRecord> {
        let records = self.records.read().await;
        let mut out = Vec::with_capacity(records.len());
        for record in records.iter() {
            out.push(record.read().await.clone());
        }
        out
    }
}

#[async_trait]
impl DriverFactory for MockDriverFactory {
    async fn attach(&self, session: &SessionHandle) -> Result<Box<dyn BrowserDriver>, DriverError> {
        if self.panicking_attaches.read().await.contains(&session.resource_key) {
            panic!("mock driver panicked attaching to {}", session.resource_key);
        }
        if self.failing_attaches.read().await.contains(&session.resource_key) {
            return Err(DriverError::Attach(format!(
                "cannot reach {}",
                session.address
            )));
        }
        let browser = MockBrowser::new(&session.resource_key, self.page.clone());
        self.records.write().await.push(Arc::clone(&browser.record));
        Ok(Box::new(browser))
    }
}
