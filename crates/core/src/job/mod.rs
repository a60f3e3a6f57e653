//! Job specifications, lifecycle records and batch intake.

mod intake;
mod types;

pub use intake::{clamp_concurrency, normalize_target, parse_batch, parse_row, BatchRequest, IntakeDefaults};
pub use types::{
    first_line, BatchRecord, InvalidTransition, JobRecord, JobSpec, JobState, ProfileMetadata,
    ValidationError, DEFAULT_TARGET_COUNT, UNKNOWN_JOB_MESSAGE,
};
