//! UI automation driver abstraction.
//!
//! `BrowserDriver` is the narrow set of page interactions the automation
//! pipeline needs; `DriverFactory` attaches one to a started remote session.

mod types;
mod webdriver;

pub use types::*;
pub use webdriver::{WebDriver, WebDriverFactory};
