//! Common test utilities for E2E testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with mock dependencies injected, enabling comprehensive E2E testing
//! without a profile manager or a browser.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use playlister_core::{
    config::DispatcherConfig,
    testing::{MockDriverFactory, MockPage, MockRecorder, MockSessionController},
    Config, Dispatcher, MemoryStatusStore, ResultRecorder, SessionController, StatusStore,
};

/// Re-export fixtures for test convenience
pub use playlister_core::testing::fixtures;

/// Test fixture for E2E testing with mock dependencies.
///
/// Provides an in-process server with fully controllable mocks for:
/// - Session control (MockSessionController)
/// - Browser automation (MockDriverFactory)
/// - Result persistence (MockRecorder)
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_batch() {
///     let fixture = TestFixture::new();
///
///     let response = fixture.post("/api/v1/jobs/batch", json!({
///         "rows": [{ "profile_id": "p1", "keyword": "lofi" }]
///     })).await;
///
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock session controller - start failures, profile list
    pub controller: Arc<MockSessionController>,
    /// Mock browser factory - page contents
    pub drivers: Arc<MockDriverFactory>,
    /// Mock recorder - stored profiles and collections
    pub recorder: Arc<MockRecorder>,
    /// Dispatcher, to wait for queued jobs
    pub dispatcher: Arc<Dispatcher>,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a new test fixture with the default page.
    pub fn new() -> Self {
        Self::with_page(MockPage::default())
    }

    /// Create a test fixture whose browsers see `page`.
    pub fn with_page(page: MockPage) -> Self {
        let controller = Arc::new(MockSessionController::new());
        let drivers = Arc::new(MockDriverFactory::new(page));
        let recorder = Arc::new(MockRecorder::new());

        let mut config = Config::default();
        config.automation = fixtures::fast_automation_config();
        config.dispatcher = DispatcherConfig {
            default_concurrency: 4,
            max_concurrency: 10,
        };

        let pipeline = fixtures::pipeline(
            Arc::clone(&controller),
            Arc::clone(&drivers),
            Arc::clone(&recorder) as Arc<dyn ResultRecorder>,
            config.automation.clone(),
        );
        let status_store: Arc<dyn StatusStore> = Arc::new(MemoryStatusStore::new());
        let dispatcher = Arc::new(Dispatcher::spawn(
            Arc::new(pipeline),
            Arc::clone(&status_store),
            config.dispatcher.clone(),
            config.status.ttl(),
        ));

        let state = Arc::new(playlister_server::state::AppState::new(
            config,
            Arc::clone(&dispatcher),
            status_store,
            Arc::clone(&recorder) as Arc<dyn ResultRecorder>,
            Arc::clone(&controller) as Arc<dyn SessionController>,
        ));

        let router = playlister_server::api::create_router(state);

        Self {
            router,
            controller,
            drivers,
            recorder,
            dispatcher,
        }
    }

    /// Wait until every queued job has finished.
    pub async fn drain(&self) {
        self.dispatcher.drain().await;
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        self.send(request_builder.body(body).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body_bytes).into_owned()))
        };

        TestResponse { status, body }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
