use std::sync::Arc;

use playlister_core::{
    job::IntakeDefaults, Config, Dispatcher, ResultRecorder, SessionController, StatusStore,
};

/// Shared application state
pub struct AppState {
    config: Config,
    dispatcher: Arc<Dispatcher>,
    status_store: Arc<dyn StatusStore>,
    recorder: Arc<dyn ResultRecorder>,
    controller: Arc<dyn SessionController>,
}

impl AppState {
    pub fn new(
        config: Config,
        dispatcher: Arc<Dispatcher>,
        status_store: Arc<dyn StatusStore>,
        recorder: Arc<dyn ResultRecorder>,
        controller: Arc<dyn SessionController>,
    ) -> Self {
        Self {
            config,
            dispatcher,
            status_store,
            recorder,
            controller,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn status_store(&self) -> &dyn StatusStore {
        self.status_store.as_ref()
    }

    pub fn recorder(&self) -> &dyn ResultRecorder {
        self.recorder.as_ref()
    }

    pub fn controller(&self) -> &dyn SessionController {
        self.controller.as_ref()
    }

    /// Fallbacks applied to batch payloads.
    pub fn intake_defaults(&self) -> IntakeDefaults {
        IntakeDefaults {
            target_count: self.config.automation.default_target_count,
            concurrency: self.config.dispatcher.default_concurrency,
            max_concurrency: self.config.dispatcher.max_concurrency,
        }
    }
}
