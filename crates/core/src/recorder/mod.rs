//! Persistence of successful automation outcomes.
//!
//! Profiles are keyed by their natural key (the controller's profile id) and
//! collections by (profile, name); both upserts are idempotent.

mod import;
mod sqlite;
mod types;

pub use import::{import_profiles, ImportError, ImportSummary};
pub use sqlite::SqliteRecorder;
pub use types::*;
