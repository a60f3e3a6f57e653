pub mod automation;
pub mod config;
pub mod dispatcher;
pub mod driver;
pub mod job;
pub mod lock;
pub mod metrics;
pub mod recorder;
pub mod session;
pub mod status;
pub mod testing;

pub use automation::{AutomationPipeline, FailureKind, LoadResult, LoadStop, RunOutcome, Step, StepFailure};
pub use config::{load_config, load_config_from_str, validate_config, Config, ConfigError};
pub use dispatcher::{BatchSubmission, DispatchError, Dispatcher, StatusHandle};
pub use driver::{BrowserDriver, DriverError, DriverFactory, WebDriverFactory};
pub use job::{BatchRecord, JobRecord, JobSpec, JobState, ProfileMetadata, ValidationError};
pub use lock::{LockRegistry, LockTicket, ResourceLock};
pub use recorder::{
    import_profiles, ImportError, ImportSummary, PersistenceError, ResultRecorder, SqliteRecorder,
};
pub use session::{ControllerProfile, GpmController, RemoteControlError, SessionController, SessionHandle};
pub use status::{query_status, MemoryStatusStore, StatusReport, StatusSelector, StatusStore};
