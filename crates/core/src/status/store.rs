//! Status store trait and key/value types.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::job::{BatchRecord, JobRecord};

#[derive(Debug, Error)]
pub enum StatusStoreError {
    #[error("status backend error: {0}")]
    Backend(String),

    #[error("unexpected value stored under {0}")]
    WrongKind(String),
}

/// Keys of the two record families held by the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StatusKey {
    Job(String),
    Session(String),
}

impl fmt::Display for StatusKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusKey::Job(id) => write!(f, "job_{}", id),
            StatusKey::Session(id) => write!(f, "session_{}", id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusValue {
    Job(JobRecord),
    Session(BatchRecord),
}

/// Key-value store with per-entry expiry.
///
/// Writers are partitioned by key: only the owner of a job id writes that
/// job's record, and session records are written once.
pub trait StatusStore: Send + Sync {
    fn set(&self, key: StatusKey, value: StatusValue, ttl: Duration) -> Result<(), StatusStoreError>;

    /// Returns `None` for keys that were never written or have expired.
    fn get(&self, key: &StatusKey) -> Result<Option<StatusValue>, StatusStoreError>;

    /// Drops expired entries. Returns how many were removed.
    fn purge_expired(&self) -> usize {
        0
    }
}

/// Typed accessors over [`StatusStore`].
pub trait StatusStoreExt: StatusStore {
    fn put_job(&self, record: JobRecord, ttl: Duration) -> Result<(), StatusStoreError> {
        self.set(StatusKey::Job(record.job_id.clone()), StatusValue::Job(record), ttl)
    }

    fn job(&self, job_id: &str) -> Result<Option<JobRecord>, StatusStoreError> {
        let key = StatusKey::Job(job_id.to_string());
        match self.get(&key)? {
            Some(StatusValue::Job(record)) => Ok(Some(record)),
            Some(StatusValue::Session(_)) => Err(StatusStoreError::WrongKind(key.to_string())),
            None => Ok(None),
        }
    }

    fn put_session(&self, record: BatchRecord, ttl: Duration) -> Result<(), StatusStoreError> {
        self.set(
            StatusKey::Session(record.session_id.clone()),
            StatusValue::Session(record),
            ttl,
        )
    }

    fn session(&self, session_id: &str) -> Result<Option<BatchRecord>, StatusStoreError> {
        let key = StatusKey::Session(session_id.to_string());
        match self.get(&key)? {
            Some(StatusValue::Session(record)) => Ok(Some(record)),
            Some(StatusValue::Job(_)) => Err(StatusStoreError::WrongKind(key.to_string())),
            None => Ok(None),
        }
    }
}

impl<T: StatusStore + ?Sized> StatusStoreExt for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_display() {
        assert_eq!(StatusKey::Job("abc".into()).to_string(), "job_abc");
        assert_eq!(StatusKey::Session("s1".into()).to_string(), "session_s1");
    }
}
