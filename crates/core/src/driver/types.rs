//! Types for UI automation drivers.

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;

use crate::session::SessionHandle;

/// W3C web element identifier key.
pub const ELEMENT_KEY: &str = "element-6066-11e4-a52f-4a2f7f1a3d19";

/// The Enter key as a WebDriver key code.
pub const ENTER_KEY: &str = "\u{E007}";

/// Errors from driver operations.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Could not attach driver: {0}")]
    Attach(String),

    #[error("No such element: {0}")]
    NoSuchElement(String),

    #[error("Element not interactable: {0}")]
    NotInteractable(String),

    #[error("Script error: {0}")]
    Script(String),

    #[error("WebDriver error ({error}): {message}")]
    Protocol { error: String, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("WebDriver command timed out: {0}")]
    Timeout(String),
}

impl From<reqwest::Error> for DriverError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            DriverError::Timeout(e.to_string())
        } else {
            DriverError::Transport(e.to_string())
        }
    }
}

/// Element lookup strategy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    Css(String),
    XPath(String),
    /// Matches the `name` attribute.
    Name(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn xpath(expr: impl Into<String>) -> Self {
        Locator::XPath(expr.into())
    }

    pub fn name(name: impl Into<String>) -> Self {
        Locator::Name(name.into())
    }

    /// W3C `using`/`value` pair. Name lookups become attribute selectors.
    pub fn to_w3c(&self) -> (&'static str, String) {
        match self {
            Locator::Css(s) => ("css selector", s.clone()),
            Locator::XPath(s) => ("xpath", s.clone()),
            Locator::Name(n) => ("css selector", format!("[name=\"{}\"]", n.replace('"', "\\\""))),
        }
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Locator::Css(s) => write!(f, "css `{}`", s),
            Locator::XPath(s) => write!(f, "xpath `{}`", s),
            Locator::Name(s) => write!(f, "name `{}`", s),
        }
    }
}

/// Opaque handle to an element in the page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementRef(pub String);

impl ElementRef {
    pub fn id(&self) -> &str {
        &self.0
    }

    /// Encodes the element for use as a script argument.
    pub fn to_json(&self) -> Value {
        json!({ ELEMENT_KEY: self.0 })
    }

    /// Decodes an element returned from a script or a find command.
    pub fn from_json(value: &Value) -> Option<Self> {
        value
            .get(ELEMENT_KEY)
            .and_then(Value::as_str)
            .map(|id| ElementRef(id.to_string()))
    }
}

/// Page interactions available to the automation steps.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Finds the first element matching `locator`.
    async fn find(&self, locator: &Locator) -> Result<ElementRef, DriverError>;

    /// Finds the first descendant of `parent` matching `locator`.
    async fn find_within(
        &self,
        parent: &ElementRef,
        locator: &Locator,
    ) -> Result<ElementRef, DriverError>;

    /// Displayed and enabled.
    async fn is_clickable(&self, element: &ElementRef) -> Result<bool, DriverError>;

    async fn click(&self, element: &ElementRef) -> Result<(), DriverError>;

    async fn send_keys(&self, element: &ElementRef, text: &str) -> Result<(), DriverError>;

    async fn clear(&self, element: &ElementRef) -> Result<(), DriverError>;

    async fn text(&self, element: &ElementRef) -> Result<String, DriverError>;

    /// Runs a synchronous script in the page. Elements are passed and
    /// returned in their JSON encoding (see [`ElementRef::to_json`]).
    async fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value, DriverError>;

    async fn window_handles(&self) -> Result<Vec<String>, DriverError>;

    async fn switch_to_window(&self, handle: &str) -> Result<(), DriverError>;

    /// Ends the driver session. Must be safe to call once per driver.
    async fn quit(&self) -> Result<(), DriverError>;
}

/// Attaches drivers to remote sessions.
#[async_trait]
pub trait DriverFactory: Send + Sync {
    async fn attach(&self, session: &SessionHandle) -> Result<Box<dyn BrowserDriver>, DriverError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_json() {
        let element = ElementRef("abc-123".to_string());
        let encoded = element.to_json();
        assert_eq!(encoded[ELEMENT_KEY], "abc-123");
        assert_eq!(ElementRef::from_json(&encoded), Some(element));
        assert_eq!(ElementRef::from_json(&json!("abc")), None);
        assert_eq!(ElementRef::from_json(&Value::Null), None);
    }

    #[test]
    fn test_locator_to_w3c() {
        assert_eq!(
            Locator::name("search_query").to_w3c(),
            ("css selector", "[name=\"search_query\"]".to_string())
        );
        assert_eq!(Locator::xpath("//button").to_w3c().0, "xpath");
    }
}
