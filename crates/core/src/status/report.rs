//! Aggregate status queries.

use serde::Serialize;

use super::store::{StatusStore, StatusStoreError, StatusStoreExt};
use crate::job::{JobRecord, JobState};

/// What to report on.
#[derive(Debug, Clone)]
pub enum StatusSelector {
    /// Every job of a submitted batch.
    Session(String),
    /// An explicit list of job ids.
    Jobs(Vec<String>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusStats {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub success: usize,
    pub failed: usize,
    pub unknown: usize,
    /// Jobs that reached success or failed.
    pub finished: usize,
}

impl StatusStats {
    fn count(&mut self, state: JobState) {
        self.total += 1;
        if state.is_terminal() {
            self.finished += 1;
        }
        match state {
            JobState::Pending => self.pending += 1,
            JobState::Running => self.running += 1,
            JobState::Success => self.success += 1,
            JobState::Failed => self.failed += 1,
            JobState::Unknown => self.unknown += 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub jobs: Vec<JobRecord>,
    pub stats: StatusStats,
}

/// Reads the current record of every selected job.
///
/// Ids absent from the store are reported as [`JobState::Unknown`]. An
/// expired or unknown session yields an empty report.
pub fn query_status<S>(store: &S, selector: &StatusSelector) -> Result<StatusReport, StatusStoreError>
where
    S: StatusStore + ?Sized,
{
    let job_ids = match selector {
        StatusSelector::Session(session_id) => store
            .session(session_id)?
            .map(|batch| batch.job_ids)
            .unwrap_or_default(),
        StatusSelector::Jobs(ids) => ids.clone(),
    };

    let mut stats = StatusStats::default();
    let mut jobs = Vec::with_capacity(job_ids.len());
    for job_id in job_ids {
        let record = store
            .job(&job_id)?
            .unwrap_or_else(|| JobRecord::unknown(job_id));
        stats.count(record.state);
        jobs.push(record);
    }

    Ok(StatusReport { jobs, stats })
}
