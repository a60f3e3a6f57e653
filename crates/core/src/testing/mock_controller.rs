//! Mock remote session controller for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::session::{ControllerProfile, RemoteControlError, SessionController, SessionHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEventKind {
    Started,
    Stopped,
}

/// A recorded start/stop call, in global call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEvent {
    pub resource_key: String,
    pub kind: SessionEventKind,
}

/// Mock implementation of the SessionController trait.
///
/// Provides controllable behavior for testing:
/// - Records every start/stop call in order
/// - Detects two sessions of the same key being open at once
/// - Simulates slow starts, start failures and panics
#[derive(Debug, Default)]
pub struct MockSessionController {
    events: Arc<RwLock<Vec<SessionEvent>>>,
    /// Sessions currently open, per key.
    open: Arc<RwLock<HashMap<String, usize>>>,
    /// Highest number of keys with an open session at the same time.
    peak_open_keys: Arc<RwLock<usize>>,
    /// Number of starts that found a session of the same key still open.
    overlaps: Arc<RwLock<usize>>,
    failing_starts: Arc<RwLock<HashSet<String>>>,
    panicking_starts: Arc<RwLock<HashSet<String>>>,
    failing_stops: Arc<RwLock<bool>>,
    start_delay: Arc<RwLock<Duration>>,
    profiles: Arc<RwLock<Vec<ControllerProfile>>>,
}

impl MockSessionController {
    /// Create a new mock controller.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every start of `resource_key` fails.
    pub async fn fail_start(&self, resource_key: &str) {
        self.failing_starts
            .write()
            .await
            .insert(resource_key.to_string());
    }

    /// Every start of `resource_key` panics.
    pub async fn panic_on_start(&self, resource_key: &str) {
        self.panicking_starts
            .write()
            .await
            .insert(resource_key.to_string());
    }

    /// Every stop call fails.
    pub async fn fail_stops(&self) {
        *self.failing_stops.write().await = true;
    }

    /// Sleep this long inside every successful start.
    pub async fn set_start_delay(&self, delay: Duration) {
        *self.start_delay.write().await = delay;
    }

    pub async fn set_profiles(&self, profiles: Vec<ControllerProfile>) {
        *self.profiles.write().await = profiles;
    }

    pub async fn events(&self) -> Vec<SessionEvent> {
        self.events.read().await.clone()
    }

    /// Keys in the order their sessions were started.
    pub async fn start_order(&self) -> Vec<String> {
        self.events
            .read()
            .await
            .iter()
            .filter(|e| e.kind == SessionEventKind::Started)
            .map(|e| e.resource_key.clone())
            .collect()
    }

    pub async fn overlaps(&self) -> usize {
        *self.overlaps.read().await
    }

    pub async fn peak_open_keys(&self) -> usize {
        *self.peak_open_keys.read().await
    }

    async fn record(&self, resource_key: &str, kind: SessionEventKind) {
        self.events.write().await.push(SessionEvent {
            resource_key: resource_key.to_string(),
            kind,
        });
    }
}

#[async_trait]
impl SessionController for MockSessionController {
    async fn start(&self, resource_key: &str) -> Result<SessionHandle, RemoteControlError> {
        if self.panicking_starts.read().await.contains(resource_key) {
            panic!("mock controller panicked starting {}", resource_key);
        }
        if self.failing_starts.read().await.contains(resource_key) {
            return Err(RemoteControlError::Rejected(format!(
                "profile {} could not be started",
                resource_key
            )));
        }

        {
            let mut open = self.open.write().await;
            let count = open.entry(resource_key.to_string()).or_insert(0);
            if *count > 0 {
                *self.overlaps.write().await += 1;
            }
            *count += 1;

            let open_keys = open.values().filter(|n| **n > 0).count();
            let mut peak = self.peak_open_keys.write().await;
            *peak = (*peak).max(open_keys);
        }
        self.record(resource_key, SessionEventKind::Started).await;

        let delay = *self.start_delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        Ok(SessionHandle {
            resource_key: resource_key.to_string(),
            address: "127.0.0.1:9222".to_string(),
            driver_path: Some("/mock/chromedriver".to_string()),
        })
    }

    async fn stop(&self, resource_key: &str) -> Result<(), RemoteControlError> {
        {
            let mut open = self.open.write().await;
            if let Some(count) = open.get_mut(resource_key) {
                *count = count.saturating_sub(1);
            }
        }
        self.record(resource_key, SessionEventKind::Stopped).await;

        if *self.failing_stops.read().await {
            return Err(RemoteControlError::Timeout);
        }
        Ok(())
    }

    async fn list_profiles(&self) -> Result<Vec<ControllerProfile>, RemoteControlError> {
        Ok(self.profiles.read().await.clone())
    }
}
