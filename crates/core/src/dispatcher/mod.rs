//! Batch dispatch onto a bounded worker pool.
//!
//! Submission seeds the status store and returns immediately; a supervisor
//! task per submission hands jobs to workers as pool slots free up. Workers
//! report progress through the [`StatusHandle`] only.

mod writer;

pub use writer::{create_status_writer, StatusHandle, StatusWriter};

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::automation::{panic_message, AutomationPipeline};
use crate::config::DispatcherConfig;
use crate::job::{BatchRecord, JobRecord, JobSpec, JobState, ValidationError};
use crate::lock::LockTicket;
use crate::metrics;
use crate::status::{StatusStore, StatusStoreError, StatusStoreExt};

const STATUS_BUFFER: usize = 1024;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("could not seed job status: {0}")]
    Status(#[from] StatusStoreError),
}

/// Result of a batch submission.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSubmission {
    pub session_id: String,
    pub job_ids: Vec<String>,
    /// Number of jobs scheduled.
    pub accepted: usize,
    /// Specs dropped for a missing resource key or search term.
    pub rejected: usize,
    /// Worker pool size actually used.
    pub concurrency: usize,
}

struct QueuedJob {
    record: JobRecord,
    spec: JobSpec,
}

pub struct Dispatcher {
    pipeline: Arc<AutomationPipeline>,
    store: Arc<dyn StatusStore>,
    status: StatusHandle,
    config: DispatcherConfig,
    ttl: Duration,
    supervisors: Mutex<Vec<JoinHandle<()>>>,
}

impl Dispatcher {
    pub fn new(
        pipeline: Arc<AutomationPipeline>,
        store: Arc<dyn StatusStore>,
        status: StatusHandle,
        config: DispatcherConfig,
        ttl: Duration,
    ) -> Self {
        Self {
            pipeline,
            store,
            status,
            config,
            ttl,
            supervisors: Mutex::new(Vec::new()),
        }
    }

    /// Builds a dispatcher together with its status writer task.
    pub fn spawn(
        pipeline: Arc<AutomationPipeline>,
        store: Arc<dyn StatusStore>,
        config: DispatcherConfig,
        ttl: Duration,
    ) -> Self {
        let (status, writer) = create_status_writer(Arc::clone(&store), ttl, STATUS_BUFFER);
        tokio::spawn(writer.run());
        Self::new(pipeline, store, status, config, ttl)
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Seeds pending records for every valid spec and schedules them.
    ///
    /// `concurrency` is clamped to `[1, max_concurrency]` and to the number
    /// of accepted jobs. Fails without creating anything when no spec is valid.
    pub async fn submit_batch(
        &self,
        specs: Vec<JobSpec>,
        concurrency: usize,
    ) -> Result<BatchSubmission, DispatchError> {
        if specs.is_empty() {
            return Err(ValidationError::EmptyBatch.into());
        }

        let total = specs.len();
        let valid: Vec<JobSpec> = specs.into_iter().filter(|s| s.validate().is_ok()).collect();
        let rejected = total - valid.len();
        if valid.is_empty() {
            return Err(ValidationError::NoValidRows.into());
        }

        let concurrency = concurrency
            .clamp(1, self.config.max_concurrency.max(1))
            .min(valid.len());

        let jobs = self.seed(valid)?;
        let job_ids: Vec<String> = jobs.iter().map(|j| j.record.job_id.clone()).collect();
        let session_id = uuid::Uuid::new_v4().to_string();
        self.store
            .put_session(BatchRecord::new(session_id.clone(), job_ids.clone()), self.ttl)?;

        info!(
            session_id = %session_id,
            jobs = job_ids.len(),
            rejected,
            concurrency,
            "batch accepted"
        );
        self.schedule(jobs, concurrency).await;

        Ok(BatchSubmission {
            session_id,
            accepted: job_ids.len(),
            job_ids,
            rejected,
            concurrency,
        })
    }

    /// Seeds and schedules exactly one job.
    pub async fn run_single(&self, spec: JobSpec) -> Result<String, DispatchError> {
        spec.validate()?;
        let jobs = self.seed(vec![spec])?;
        let job_id = jobs[0].record.job_id.clone();
        info!(job_id = %job_id, "single job accepted");
        self.schedule(jobs, 1).await;
        Ok(job_id)
    }

    /// Waits for every scheduled job to finish and its final status to be written.
    pub async fn drain(&self) {
        loop {
            let pending: Vec<JoinHandle<()>> = std::mem::take(&mut *self.supervisors.lock().await);
            if pending.is_empty() {
                break;
            }
            for handle in pending {
                if let Err(e) = handle.await {
                    error!("batch supervisor failed: {}", e);
                }
            }
        }
        self.status.flush().await;
    }

    fn seed(&self, specs: Vec<JobSpec>) -> Result<Vec<QueuedJob>, DispatchError> {
        let mut jobs = Vec::with_capacity(specs.len());
        for spec in specs {
            let record = JobRecord::pending(uuid::Uuid::new_v4().to_string(), &spec);
            self.store.put_job(record.clone(), self.ttl)?;
            jobs.push(QueuedJob { record, spec });
        }
        metrics::JOBS_SUBMITTED.inc_by(jobs.len() as u64);
        Ok(jobs)
    }

    async fn schedule(&self, jobs: Vec<QueuedJob>, concurrency: usize) {
        let supervisor = tokio::spawn(supervise(
            Arc::clone(&self.pipeline),
            self.status.clone(),
            jobs,
            concurrency,
        ));
        let mut supervisors = self.supervisors.lock().await;
        supervisors.retain(|handle| !handle.is_finished());
        supervisors.push(supervisor);
    }
}

/// Feeds jobs to at most `concurrency` workers, in submission order.
///
/// A job's lock ticket is reserved when it gets its worker slot, so jobs
/// sharing a resource key run in the order they were submitted.
async fn supervise(
    pipeline: Arc<AutomationPipeline>,
    status: StatusHandle,
    jobs: Vec<QueuedJob>,
    concurrency: usize,
) {
    let slots = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut workers = JoinSet::new();

    for job in jobs {
        let permit = match Arc::clone(&slots).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };
        let ticket = pipeline.locks().reserve(&job.spec.resource_key);
        let span = info_span!(
            "job",
            job_id = %job.record.job_id,
            resource_key = %job.spec.resource_key
        );
        workers.spawn(
            run_job(Arc::clone(&pipeline), status.clone(), job, ticket, permit).instrument(span),
        );
    }

    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            error!("worker task failed: {}", e);
        }
    }
    debug!("batch finished");
}

async fn run_job(
    pipeline: Arc<AutomationPipeline>,
    status: StatusHandle,
    job: QueuedJob,
    ticket: LockTicket,
    _permit: OwnedSemaphorePermit,
) {
    let QueuedJob { mut record, spec } = job;

    if let Err(e) = record.advance(JobState::Running, None) {
        warn!(error = %e, "unexpected job state");
    }
    status.publish(record.clone()).await;
    metrics::JOBS_RUNNING.inc();

    let outcome = AssertUnwindSafe(pipeline.run_with_ticket(&spec, ticket))
        .catch_unwind()
        .await;
    metrics::JOBS_RUNNING.dec();

    let (state, error) = match outcome {
        Ok(Ok(_)) => (JobState::Success, None),
        Ok(Err(failure)) => (JobState::Failed, Some(failure.to_string())),
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!(panic = %message, "job panicked");
            (JobState::Failed, Some(format!("job panicked: {}", message)))
        }
    };

    if let Err(e) = record.advance(state, error.as_deref()) {
        warn!(error = %e, "unexpected job state");
    }
    metrics::JOBS_FINISHED
        .with_label_values(&[state.as_str()])
        .inc();
    info!(state = %state, "job finished");
    status.publish(record).await;
}
