//! Testing utilities and mock implementations for E2E tests.
//!
//! This module provides mock implementations of all external collaborator
//! traits, allowing the dispatcher and pipeline to be exercised without a
//! browser profile manager, a WebDriver or a database.
//!
//! # Example
//!
//! ```rust,ignore
//! use playlister_core::testing::{MockDriverFactory, MockPage, MockRecorder, MockSessionController};
//!
//! let controller = MockSessionController::new();
//! let drivers = MockDriverFactory::new(MockPage::default().with_counts(Some(10), vec![Some(40)]));
//! let recorder = MockRecorder::new();
//!
//! // Simulate a profile that cannot be started
//! controller.fail_start("profile-1").await;
//! ```

mod mock_browser;
mod mock_controller;
mod mock_recorder;

pub use mock_browser::{
    BrowserRecord, MockBrowser, MockDriverFactory, MockPage, ACTION_MENU_LABEL, PUBLIC_OPTION_LABEL,
    SELECT_ALL_LABEL,
};
pub use mock_controller::{MockSessionController, SessionEvent, SessionEventKind};
pub use mock_recorder::MockRecorder;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::sync::Arc;

    use crate::automation::AutomationPipeline;
    use crate::config::AutomationConfig;
    use crate::job::JobSpec;
    use crate::lock::LockRegistry;
    use crate::recorder::ResultRecorder;

    use super::{MockDriverFactory, MockSessionController};

    /// Automation timings with every wait set to zero except the step timeout.
    pub fn fast_automation_config() -> AutomationConfig {
        AutomationConfig {
            step_timeout_ms: 200,
            poll_interval_ms: 10,
            step_deadline_ms: 2_000,
            session_settle_ms: 0,
            surface_settle_ms: 0,
            load_settle_ms: 0,
            scroll_pause_ms: 0,
            link_settle_ms: 0,
            cooldown_ms: 0,
            ..AutomationConfig::default()
        }
    }

    /// A job spec with a fixed target.
    pub fn job(resource_key: &str, search_term: &str) -> JobSpec {
        JobSpec::new(resource_key, search_term).with_target_count(100)
    }

    /// A pipeline wired to the given mocks.
    pub fn pipeline(
        controller: Arc<MockSessionController>,
        drivers: Arc<MockDriverFactory>,
        recorder: Arc<dyn ResultRecorder>,
        config: AutomationConfig,
    ) -> AutomationPipeline {
        AutomationPipeline::new(
            controller,
            drivers,
            Arc::new(LockRegistry::new()),
            recorder,
            config,
        )
    }
}
