//! The automation pipeline.
//!
//! A run acquires the job's resource lock, drives the remote session through
//! a fixed sequence of [`Step`]s (one of which is the incremental
//! [`ContentLoader`]), hands the result to the recorder and always cleans up.

mod interact;
mod loader;
mod pipeline;
pub mod scripts;
mod steps;
mod types;

pub use interact::Interactor;
pub use loader::{
    parse_selection_count, ContentLoader, ContentSurface, CountUnavailable, DriverSurface,
    LoadResult, LoadStop,
};
pub use pipeline::AutomationPipeline;
pub use types::{FailureKind, RunOutcome, Step, StepFailure};

pub(crate) use types::panic_message;
