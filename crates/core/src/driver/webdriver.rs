//! W3C WebDriver client attached to an already running browser.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{json, Value};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::WebDriverConfig;
use crate::session::SessionHandle;

use super::{BrowserDriver, DriverError, DriverFactory, ElementRef, Locator};

/// Creates [`WebDriver`] sessions.
///
/// With `webdriver.url` configured, sessions are opened on that endpoint.
/// Otherwise the driver binary reported by the controller is launched on a
/// free local port for every session.
pub struct WebDriverFactory {
    client: Client,
    config: WebDriverConfig,
}

impl WebDriverFactory {
    pub fn new(config: WebDriverConfig) -> Result<Self, DriverError> {
        let client = Client::builder()
            .timeout(config.command_timeout())
            .build()
            .map_err(|e| DriverError::Attach(e.to_string()))?;
        Ok(Self { client, config })
    }

    async fn launch(&self, driver_path: &str) -> Result<(String, Child), DriverError> {
        let port = free_port()?;
        let child = Command::new(driver_path)
            .arg(format!("--port={}", port))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DriverError::Attach(format!("failed to launch {}: {}", driver_path, e)))?;

        let base = format!("http://127.0.0.1:{}", port);
        self.wait_ready(&base).await?;
        debug!(driver_path, port, "driver process ready");
        Ok((base, child))
    }

    async fn wait_ready(&self, base: &str) -> Result<(), DriverError> {
        let deadline =
            tokio::time::Instant::now() + Duration::from_secs(self.config.startup_timeout_secs);
        let url = format!("{}/status", base);
        loop {
            if let Ok(response) = self.client.get(&url).send().await {
                if let Ok(body) = response.json::<Value>().await {
                    if body["value"]["ready"].as_bool().unwrap_or(false) {
                        return Ok(());
                    }
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(DriverError::Attach(format!(
                    "driver at {} not ready after {}s",
                    base, self.config.startup_timeout_secs
                )));
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

#[async_trait]
impl DriverFactory for WebDriverFactory {
    async fn attach(&self, session: &SessionHandle) -> Result<Box<dyn BrowserDriver>, DriverError> {
        let (base, process) = match &self.config.url {
            Some(url) => (url.trim_end_matches('/').to_string(), None),
            None => {
                let path = session.driver_path.as_deref().ok_or_else(|| {
                    DriverError::Attach("controller did not report a driver path".to_string())
                })?;
                let (base, child) = self.launch(path).await?;
                (base, Some(child))
            }
        };

        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": {
                    "goog:chromeOptions": { "debuggerAddress": session.address }
                }
            }
        });
        let response = self
            .client
            .post(format!("{}/session", base))
            .json(&capabilities)
            .send()
            .await?;
        let value = unwrap_value(response).await?;
        let session_id = value["sessionId"]
            .as_str()
            .ok_or_else(|| DriverError::Attach("new session response has no sessionId".to_string()))?
            .to_string();

        info!(
            resource_key = %session.resource_key,
            session_id = %session_id,
            "driver attached to remote session"
        );

        Ok(Box::new(WebDriver {
            client: self.client.clone(),
            base,
            session_id,
            process: Mutex::new(process),
        }))
    }
}

/// One W3C WebDriver session.
pub struct WebDriver {
    client: Client,
    base: String,
    session_id: String,
    /// Locally launched driver process, killed on quit or drop.
    process: Mutex<Option<Child>>,
}

impl WebDriver {
    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, DriverError> {
        let url = format!("{}/session/{}{}", self.base, self.session_id, path);
        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await?;
        unwrap_value(response).await
    }

    async fn element_command(
        &self,
        method: Method,
        element: &ElementRef,
        action: &str,
        body: Option<Value>,
    ) -> Result<Value, DriverError> {
        let path = format!("/element/{}/{}", element.id(), action);
        self.command(method, &path, body).await
    }

    fn parse_element(value: &Value, locator: &Locator) -> Result<ElementRef, DriverError> {
        ElementRef::from_json(value).ok_or_else(|| DriverError::NoSuchElement(locator.to_string()))
    }
}

#[async_trait]
impl BrowserDriver for WebDriver {
    async fn find(&self, locator: &Locator) -> Result<ElementRef, DriverError> {
        let (using, value) = locator.to_w3c();
        let found = self
            .command(Method::POST, "/element", Some(json!({ "using": using, "value": value })))
            .await?;
        Self::parse_element(&found, locator)
    }

    async fn find_within(
        &self,
        parent: &ElementRef,
        locator: &Locator,
    ) -> Result<ElementRef, DriverError> {
        let (using, value) = locator.to_w3c();
        let found = self
            .element_command(
                Method::POST,
                parent,
                "element",
                Some(json!({ "using": using, "value": value })),
            )
            .await?;
        Self::parse_element(&found, locator)
    }

    async fn is_clickable(&self, element: &ElementRef) -> Result<bool, DriverError> {
        let displayed = self
            .element_command(Method::GET, element, "displayed", None)
            .await?;
        if !displayed.as_bool().unwrap_or(false) {
            return Ok(false);
        }
        let enabled = self.element_command(Method::GET, element, "enabled", None).await?;
        Ok(enabled.as_bool().unwrap_or(false))
    }

    async fn click(&self, element: &ElementRef) -> Result<(), DriverError> {
        self.element_command(Method::POST, element, "click", Some(json!({})))
            .await
            .map(|_| ())
    }

    async fn send_keys(&self, element: &ElementRef, text: &str) -> Result<(), DriverError> {
        self.element_command(Method::POST, element, "value", Some(json!({ "text": text })))
            .await
            .map(|_| ())
    }

    async fn clear(&self, element: &ElementRef) -> Result<(), DriverError> {
        self.element_command(Method::POST, element, "clear", Some(json!({})))
            .await
            .map(|_| ())
    }

    async fn text(&self, element: &ElementRef) -> Result<String, DriverError> {
        let value = self.element_command(Method::GET, element, "text", None).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value, DriverError> {
        self.command(
            Method::POST,
            "/execute/sync",
            Some(json!({ "script": script, "args": args })),
        )
        .await
    }

    async fn window_handles(&self) -> Result<Vec<String>, DriverError> {
        let value = self.command(Method::GET, "/window/handles", None).await?;
        Ok(value
            .as_array()
            .map(|handles| {
                handles
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn switch_to_window(&self, handle: &str) -> Result<(), DriverError> {
        self.command(Method::POST, "/window", Some(json!({ "handle": handle })))
            .await
            .map(|_| ())
    }

    async fn quit(&self) -> Result<(), DriverError> {
        let url = format!("{}/session/{}", self.base, self.session_id);
        let result = match self.client.delete(&url).send().await {
            Ok(response) => unwrap_value(response).await.map(|_| ()),
            Err(e) => Err(e.into()),
        };

        if let Some(mut child) = self.process.lock().await.take() {
            if let Err(e) = child.kill().await {
                warn!(error = %e, "failed to kill driver process");
            }
        }
        result
    }
}

/// Extracts `value` from a WebDriver response, mapping W3C errors.
async fn unwrap_value(response: reqwest::Response) -> Result<Value, DriverError> {
    let status = response.status();
    let body: Value = response.json().await?;
    let value = body.get("value").cloned().unwrap_or(Value::Null);

    if status.is_success() {
        return Ok(value);
    }

    let error = value["error"].as_str().unwrap_or("unknown error").to_string();
    let message = value["message"]
        .as_str()
        .map(crate::job::first_line)
        .unwrap_or_else(|| format!("HTTP {}", status));
    Err(map_w3c_error(error, message))
}

fn map_w3c_error(error: String, message: String) -> DriverError {
    match error.as_str() {
        "no such element" | "stale element reference" => DriverError::NoSuchElement(message),
        "element not interactable" | "element click intercepted" => {
            DriverError::NotInteractable(message)
        }
        "javascript error" => DriverError::Script(message),
        "session not created" => DriverError::Attach(message),
        _ => DriverError::Protocol { error, message },
    }
}

fn free_port() -> Result<u16, DriverError> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")
        .map_err(|e| DriverError::Attach(format!("no free port: {}", e)))?;
    listener
        .local_addr()
        .map(|addr| addr.port())
        .map_err(|e| DriverError::Attach(e.to_string()))
}
