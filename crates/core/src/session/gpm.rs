//! HTTP client for a GPM-style browser profile manager.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::ControllerConfig;

use super::{ControllerProfile, RemoteControlError, SessionController, SessionHandle};

/// Controller reached over the profile manager's local HTTP API.
pub struct GpmController {
    client: Client,
    config: ControllerConfig,
}

impl GpmController {
    pub fn new(config: ControllerConfig) -> Result<Self, RemoteControlError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RemoteControlError::ConnectionFailed(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Get the base URL without trailing slash.
    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn profile_url(&self, action: &str, resource_key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url(),
            action,
            urlencoding::encode(resource_key)
        )
    }
}

#[async_trait]
impl SessionController for GpmController {
    async fn start(&self, resource_key: &str) -> Result<SessionHandle, RemoteControlError> {
        let url = self.profile_url("start", resource_key);
        debug!(resource_key, %url, "starting remote session");

        let body: Value = self.client.get(&url).send().await?.json().await?;
        let handle = parse_start_response(resource_key, &body)?;

        info!(
            resource_key,
            address = %handle.address,
            driver_path = handle.driver_path.as_deref().unwrap_or("-"),
            "remote session started"
        );
        Ok(handle)
    }

    async fn stop(&self, resource_key: &str) -> Result<(), RemoteControlError> {
        let url = self.profile_url("close", resource_key);
        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(self.config.stop_timeout_secs))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteControlError::Rejected(format!("HTTP {}", status)));
        }
        debug!(resource_key, "remote session stopped");
        Ok(())
    }

    async fn list_profiles(&self) -> Result<Vec<ControllerProfile>, RemoteControlError> {
        let response = self.client.get(self.base_url()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RemoteControlError::Rejected(format!("HTTP {}", status)));
        }
        let body: Value = response.json().await?;
        parse_profile_list(&body)
    }
}

/// Accepts `{"success": true, ...}` or `{"status": "OK", ...}` with
/// `data.remote_debugging_address`.
fn parse_start_response(resource_key: &str, body: &Value) -> Result<SessionHandle, RemoteControlError> {
    let ok = body.get("success").and_then(Value::as_bool).unwrap_or(false)
        || body.get("status").and_then(Value::as_str) == Some("OK");
    if !ok {
        let reason = body
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| body.to_string());
        return Err(RemoteControlError::Rejected(reason));
    }

    let data = body.get("data").unwrap_or(&Value::Null);
    let address = data
        .get("remote_debugging_address")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| {
            RemoteControlError::InvalidResponse("missing data.remote_debugging_address".to_string())
        })?;

    Ok(SessionHandle {
        resource_key: resource_key.to_string(),
        address: address.to_string(),
        driver_path: data
            .get("driver_path")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
    })
}

/// Parses `{"data": [ {id, name, ...}, ... ]}`, skipping entries without an id.
fn parse_profile_list(body: &Value) -> Result<Vec<ControllerProfile>, RemoteControlError> {
    let items = body
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| RemoteControlError::InvalidResponse("data is not a list".to_string()))?;

    Ok(items
        .iter()
        .filter_map(|item| {
            let id = field(item, "id")?;
            Some(ControllerProfile {
                id,
                name: field(item, "name").unwrap_or_default(),
                raw_proxy: field(item, "raw_proxy"),
                profile_path: field(item, "profile_path"),
                browser_type: field(item, "browser_type"),
                browser_version: field(item, "browser_version"),
                note: field(item, "note"),
            })
        })
        .collect())
}

fn field(item: &Value, name: &str) -> Option<String> {
    let raw = match item.get(name)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!raw.is_empty()).then_some(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_start_success_flag() {
        let body = json!({
            "success": true,
            "data": {
                "remote_debugging_address": "127.0.0.1:52011",
                "driver_path": "C:/gpm/chromedriver.exe"
            }
        });
        let handle = parse_start_response("p1", &body).unwrap();
        assert_eq!(handle.address, "127.0.0.1:52011");
        assert_eq!(handle.driver_path.as_deref(), Some("C:/gpm/chromedriver.exe"));
    }

    #[test]
    fn test_parse_start_status_ok() {
        let body = json!({
            "status": "OK",
            "data": { "remote_debugging_address": "127.0.0.1:9000" }
        });
        let handle = parse_start_response("p1", &body).unwrap();
        assert_eq!(handle.resource_key, "p1");
        assert!(handle.driver_path.is_none());
    }

    #[test]
    fn test_parse_start_rejected() {
        let body = json!({ "success": false, "message": "profile not found" });
        let err = parse_start_response("p1", &body).unwrap_err();
        assert!(matches!(err, RemoteControlError::Rejected(ref m) if m == "profile not found"));
    }

    #[test]
    fn test_parse_start_missing_address() {
        let body = json!({ "success": true, "data": {} });
        assert!(matches!(
            parse_start_response("p1", &body),
            Err(RemoteControlError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_parse_profile_list() {
        let body = json!({
            "data": [
                { "id": "abc", "name": " Account 1 ", "raw_proxy": "", "browser_type": "chromium" },
                { "id": 42, "name": "Account 2", "note": "vip" },
                { "id": "", "name": "no id" },
                { "name": "missing id" }
            ]
        });
        let profiles = parse_profile_list(&body).unwrap();
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[0].name, "Account 1");
        assert_eq!(profiles[0].raw_proxy, None);
        assert_eq!(profiles[0].browser_type.as_deref(), Some("chromium"));
        assert_eq!(profiles[1].id, "42");
        assert_eq!(profiles[1].note.as_deref(), Some("vip"));
    }

    #[test]
    fn test_parse_profile_list_invalid() {
        assert!(parse_profile_list(&json!({ "data": "x" })).is_err());
        assert!(parse_profile_list(&json!([])).is_err());
    }

    #[test]
    fn test_profile_url_encodes_key() {
        let controller = GpmController::new(ControllerConfig {
            base_url: "http://127.0.0.1:19995/api/v3/profiles/".to_string(),
            ..ControllerConfig::default()
        })
        .unwrap();
        assert_eq!(
            controller.profile_url("start", "a b"),
            "http://127.0.0.1:19995/api/v3/profiles/start/a%20b"
        );
    }
}
