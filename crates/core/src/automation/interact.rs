//! Bounded waits and click helpers over a [`BrowserDriver`].

use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tracing::debug;

use crate::driver::{BrowserDriver, DriverError, ElementRef, Locator};

use super::scripts;
use super::types::StepFailure;

/// Polls the page until an element or value is ready, up to `timeout`.
#[derive(Clone, Copy)]
pub struct Interactor<'a> {
    driver: &'a dyn BrowserDriver,
    timeout: Duration,
    poll: Duration,
}

impl<'a> Interactor<'a> {
    pub fn new(driver: &'a dyn BrowserDriver, timeout: Duration, poll: Duration) -> Self {
        Self {
            driver,
            timeout,
            poll: poll.max(Duration::from_millis(1)),
        }
    }

    pub fn driver(&self) -> &'a dyn BrowserDriver {
        self.driver
    }

    /// Waits until `locator` matches a displayed, enabled element.
    pub async fn wait_for_clickable(&self, locator: &Locator) -> Result<ElementRef, StepFailure> {
        let deadline = Instant::now() + self.timeout;
        loop {
            match self.driver.find(locator).await {
                Ok(element) => match self.driver.is_clickable(&element).await {
                    Ok(true) => return Ok(element),
                    Ok(false) | Err(DriverError::NoSuchElement(_)) => {}
                    Err(e) => return Err(e.into()),
                },
                Err(DriverError::NoSuchElement(_)) => {}
                Err(e) => return Err(e.into()),
            }
            self.wait_or_timeout(deadline, || {
                format!("timed out waiting for clickable {}", locator)
            })
            .await?;
        }
    }

    /// Waits until `script` returns an element.
    pub async fn wait_for_script_element(&self, script: &str) -> Result<ElementRef, StepFailure> {
        let deadline = Instant::now() + self.timeout;
        loop {
            let value = self.driver.execute(script, Vec::new()).await?;
            if let Some(element) = ElementRef::from_json(&value) {
                return Ok(element);
            }
            self.wait_or_timeout(deadline, || "timed out waiting for element from script".to_string())
                .await?;
        }
    }

    /// Waits until `script` returns a non-empty string.
    pub async fn wait_for_script_text(&self, script: &str) -> Result<String, StepFailure> {
        let deadline = Instant::now() + self.timeout;
        loop {
            if let Value::String(text) = self.driver.execute(script, Vec::new()).await? {
                if !text.trim().is_empty() {
                    return Ok(text);
                }
            }
            self.wait_or_timeout(deadline, || "timed out waiting for text from script".to_string())
                .await?;
        }
    }

    /// Native click, falling back to a script click.
    pub async fn click(&self, element: &ElementRef) -> Result<(), StepFailure> {
        if let Err(e) = self.driver.click(element).await {
            debug!(error = %e, "native click failed, using script click");
            self.script_click(element).await?;
        }
        Ok(())
    }

    pub async fn script_click(&self, element: &ElementRef) -> Result<(), StepFailure> {
        self.driver
            .execute(scripts::CLICK, vec![element.to_json()])
            .await?;
        Ok(())
    }

    pub async fn find_and_click(&self, locator: &Locator) -> Result<ElementRef, StepFailure> {
        let element = self.wait_for_clickable(locator).await?;
        self.click(&element).await?;
        Ok(element)
    }

    async fn wait_or_timeout<F>(&self, deadline: Instant, message: F) -> Result<(), StepFailure>
    where
        F: FnOnce() -> String,
    {
        let now = Instant::now();
        if now >= deadline {
            return Err(StepFailure::timeout(message()));
        }
        tokio::time::sleep(self.poll.min(deadline - now)).await;
        Ok(())
    }
}
