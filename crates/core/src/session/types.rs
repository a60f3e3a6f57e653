//! Types for remote session control.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the remote session controller.
#[derive(Debug, Error)]
pub enum RemoteControlError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Controller rejected request: {0}")]
    Rejected(String),

    #[error("Invalid controller response: {0}")]
    InvalidResponse(String),

    #[error("Request timeout")]
    Timeout,
}

impl From<reqwest::Error> for RemoteControlError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RemoteControlError::Timeout
        } else if e.is_connect() {
            RemoteControlError::ConnectionFailed(e.to_string())
        } else if e.is_decode() {
            RemoteControlError::InvalidResponse(e.to_string())
        } else {
            RemoteControlError::Rejected(e.to_string())
        }
    }
}

/// A started remote session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHandle {
    pub resource_key: String,
    /// Remote debugging address, e.g. "127.0.0.1:52011".
    pub address: String,
    /// Path of the driver binary matching the session's browser build.
    pub driver_path: Option<String>,
}

/// A profile known to the controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerProfile {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_proxy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Starts and stops remote sessions by resource key.
#[async_trait]
pub trait SessionController: Send + Sync {
    /// Starts (or reuses) the session for `resource_key`.
    async fn start(&self, resource_key: &str) -> Result<SessionHandle, RemoteControlError>;

    /// Asks the controller to close the session.
    async fn stop(&self, resource_key: &str) -> Result<(), RemoteControlError>;

    /// Lists every profile the controller manages.
    async fn list_profiles(&self) -> Result<Vec<ControllerProfile>, RemoteControlError>;
}
