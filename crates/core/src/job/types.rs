//! Job specifications and lifecycle records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Target item count used when none (or an invalid one) is supplied.
pub const DEFAULT_TARGET_COUNT: u32 = 100;

/// Message stored for job ids that are absent from the status store.
pub const UNKNOWN_JOB_MESSAGE: &str = "job does not exist or has expired";

/// Errors raised before a job is ever scheduled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("payload is not valid: {0}")]
    InvalidPayload(String),

    #[error("no rows to process")]
    EmptyBatch,

    #[error("no row has both a profile id and a keyword")]
    NoValidRows,

    #[error("missing resource key")]
    MissingResourceKey,

    #[error("missing search term")]
    MissingSearchTerm,
}

/// Returns the first line of an error message.
///
/// Every error that ends up in a job record or crosses the pipeline boundary
/// goes through this.
pub fn first_line(message: &str) -> String {
    message.lines().next().unwrap_or_default().trim_end().to_string()
}

/// Opaque attributes forwarded to the result recorder untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
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

/// Immutable description of one automation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Identity of the remote session target (profile id).
    pub resource_key: String,
    /// Term typed into the surface's search box.
    pub search_term: String,
    /// Desired collection title; defaults to "<search term> autoplay".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_name: Option<String>,
    /// Minimum number of items to load before selecting.
    pub target_count: u32,
    #[serde(default)]
    pub metadata: ProfileMetadata,
}

impl JobSpec {
    pub fn new(resource_key: impl Into<String>, search_term: impl Into<String>) -> Self {
        Self {
            resource_key: resource_key.into(),
            search_term: search_term.into(),
            collection_name: None,
            target_count: DEFAULT_TARGET_COUNT,
            metadata: ProfileMetadata::default(),
        }
    }

    pub fn with_collection_name(mut self, name: impl Into<String>) -> Self {
        self.collection_name = Some(name.into());
        self
    }

    /// Sets the target count; values below 1 fall back to the default.
    pub fn with_target_count(mut self, target: u32) -> Self {
        self.target_count = if target < 1 {
            DEFAULT_TARGET_COUNT
        } else {
            target
        };
        self
    }

    pub fn with_metadata(mut self, metadata: ProfileMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Both the resource key and the search term must be non-blank.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.resource_key.trim().is_empty() {
            return Err(ValidationError::MissingResourceKey);
        }
        if self.search_term.trim().is_empty() {
            return Err(ValidationError::MissingSearchTerm);
        }
        Ok(())
    }

    /// Title given to the created collection.
    pub fn effective_collection_name(&self) -> String {
        match self.collection_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("{} autoplay", self.search_term),
        }
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Success,
    Failed,
    /// Only ever produced when reading an id that is not in the store.
    Unknown,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Success => "success",
            JobState::Failed => "failed",
            JobState::Unknown => "unknown",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Success | JobState::Failed)
    }

    /// pending -> running -> {success, failed}. Nothing ever moves to unknown.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Pending, JobState::Running)
                | (JobState::Running, JobState::Success)
                | (JobState::Running, JobState::Failed)
        )
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid job transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: JobState,
    pub to: JobState,
}

/// Status record of a single job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: String,
    pub state: JobState,
    pub resource_key: Option<String>,
    pub search_term: Option<String>,
    /// Display name of the profile, when known.
    pub name: Option<String>,
    /// First line of the terminal error.
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// Initial record written at submission time.
    pub fn pending(job_id: impl Into<String>, spec: &JobSpec) -> Self {
        Self {
            job_id: job_id.into(),
            state: JobState::Pending,
            resource_key: Some(spec.resource_key.clone()),
            search_term: Some(spec.search_term.clone()),
            name: spec.metadata.name.clone(),
            error: None,
            updated_at: Utc::now(),
        }
    }

    /// Placeholder for ids missing from the store.
    pub fn unknown(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            state: JobState::Unknown,
            resource_key: None,
            search_term: None,
            name: None,
            error: Some(UNKNOWN_JOB_MESSAGE.to_string()),
            updated_at: Utc::now(),
        }
    }

    /// Moves the record forward, enforcing monotonic transitions.
    pub fn advance(
        &mut self,
        next: JobState,
        error: Option<&str>,
    ) -> Result<(), InvalidTransition> {
        if !self.state.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        self.error = error.map(first_line);
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Jobs submitted together under one session id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRecord {
    pub session_id: String,
    pub job_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl BatchRecord {
    pub fn new(session_id: impl Into<String>, job_ids: Vec<String>) -> Self {
        Self {
            session_id: session_id.into(),
            job_ids,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_line() {
        assert_eq!(first_line("boom\nstack trace\nmore"), "boom");
        assert_eq!(first_line("single"), "single");
        assert_eq!(first_line(""), "");
        assert_eq!(first_line("windows\r\nline"), "windows");
    }

    #[test]
    fn test_job_spec_validation() {
        assert!(JobSpec::new("p1", "lofi").validate().is_ok());
        assert_eq!(
            JobSpec::new("  ", "lofi").validate(),
            Err(ValidationError::MissingResourceKey)
        );
        assert_eq!(
            JobSpec::new("p1", "").validate(),
            Err(ValidationError::MissingSearchTerm)
        );
    }

    #[test]
    fn test_collection_name_default() {
        let spec = JobSpec::new("p1", "lofi beats");
        assert_eq!(spec.effective_collection_name(), "lofi beats autoplay");

        let spec = spec.with_collection_name("Study mix");
        assert_eq!(spec.effective_collection_name(), "Study mix");

        let spec = JobSpec::new("p1", "jazz").with_collection_name("   ");
        assert_eq!(spec.effective_collection_name(), "jazz autoplay");
    }

    #[test]
    fn test_target_count_normalized() {
        assert_eq!(JobSpec::new("p1", "k").with_target_count(0).target_count, 100);
        assert_eq!(JobSpec::new("p1", "k").with_target_count(40).target_count, 40);
    }

    #[test]
    fn test_state_transitions_are_monotonic() {
        let spec = JobSpec::new("p1", "lofi");
        let mut record = JobRecord::pending("job-1", &spec);
        assert_eq!(record.state, JobState::Pending);

        assert!(record.advance(JobState::Success, None).is_err());
        record.advance(JobState::Running, None).unwrap();
        record
            .advance(JobState::Failed, Some("element missing\nat line 3"))
            .unwrap();
        assert_eq!(record.state, JobState::Failed);
        assert_eq!(record.error.as_deref(), Some("element missing"));

        let err = record.advance(JobState::Running, None).unwrap_err();
        assert_eq!(err.from, JobState::Failed);
        assert_eq!(err.to, JobState::Running);
    }

    #[test]
    fn test_unknown_record() {
        let record = JobRecord::unknown("nope");
        assert_eq!(record.state, JobState::Unknown);
        assert!(record.error.is_some());
        assert!(record.resource_key.is_none());
        assert!(!JobState::Pending.can_transition_to(JobState::Unknown));
    }

    #[test]
    fn test_job_state_serialization() {
        let json = serde_json::to_string(&JobState::Running).unwrap();
        assert_eq!(json, "\"running\"");
        assert!(JobState::Failed.is_terminal());
        assert!(!JobState::Running.is_terminal());
    }
}
