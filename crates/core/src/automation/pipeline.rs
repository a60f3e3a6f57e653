//! The automation state machine: one run per job, guarded by the job's
//! resource lock.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::AutomationConfig;
use crate::driver::{BrowserDriver, DriverFactory};
use crate::job::JobSpec;
use crate::lock::{LockRegistry, LockTicket, ResourceLock};
use crate::metrics;
use crate::recorder::{record_run, ResultRecorder};
use crate::session::{SessionController, SessionHandle};

use super::interact::Interactor;
use super::loader::LoadResult;
use super::steps;
use super::types::{FailureKind, RunOutcome, Step, StepFailure};

/// Drives jobs through [`Step::ALL`].
pub struct AutomationPipeline {
    controller: Arc<dyn SessionController>,
    drivers: Arc<dyn DriverFactory>,
    locks: Arc<LockRegistry>,
    recorder: Arc<dyn ResultRecorder>,
    config: AutomationConfig,
}

/// Values produced by earlier steps and consumed by later ones.
#[derive(Default)]
struct RunState {
    session: Option<SessionHandle>,
    driver: Option<Box<dyn BrowserDriver>>,
    load: Option<LoadResult>,
    link: Option<String>,
}

impl AutomationPipeline {
    pub fn new(
        controller: Arc<dyn SessionController>,
        drivers: Arc<dyn DriverFactory>,
        locks: Arc<LockRegistry>,
        recorder: Arc<dyn ResultRecorder>,
        config: AutomationConfig,
    ) -> Self {
        Self {
            controller,
            drivers,
            locks,
            recorder,
            config,
        }
    }

    pub fn locks(&self) -> &Arc<LockRegistry> {
        &self.locks
    }

    pub fn config(&self) -> &AutomationConfig {
        &self.config
    }

    /// Queues for the job's resource lock and runs it.
    pub async fn run(&self, job: &JobSpec) -> Result<RunOutcome, StepFailure> {
        let ticket = self.locks.reserve(&job.resource_key);
        self.run_with_ticket(job, ticket).await
    }

    /// Runs a job whose place in the resource queue is already reserved.
    ///
    /// Cleanup (driver quit, session stop, cooldown, lock release) runs on
    /// every outcome, a panicking step included. Recorder failures are logged
    /// and do not fail the run.
    pub async fn run_with_ticket(
        &self,
        job: &JobSpec,
        ticket: LockTicket,
    ) -> Result<RunOutcome, StepFailure> {
        let waiting = Instant::now();
        let lock = ticket.acquire().await;
        metrics::LOCK_WAIT_SECONDS.observe(waiting.elapsed().as_secs_f64());
        metrics::LOCK_KEYS.set(self.locks.key_count() as i64);
        info!(resource_key = %job.resource_key, "resource lock held, starting run");

        let mut state = RunState::default();
        let result = self.drive(job, &mut state).await;

        match &result {
            Ok(outcome) => {
                info!(
                    link = %outcome.collection_link,
                    count = ?outcome.load.count,
                    "collection created"
                );
                self.record(job, outcome);
            }
            Err(failure) => {
                let step = failure.step.map(|s| s.as_str()).unwrap_or("unknown");
                metrics::STEP_FAILURES.with_label_values(&[step]).inc();
                warn!(error = %failure, "run failed");
            }
        }

        self.cleanup(job, state, lock).await;
        result
    }

    /// Runs every step in order. A step that panics or outlives the step
    /// deadline fails the run like any other step failure.
    async fn drive(&self, job: &JobSpec, state: &mut RunState) -> Result<RunOutcome, StepFailure> {
        let deadline = self.config.step_deadline();
        for step in Step::ALL {
            debug!(step = %step, number = step.number(), "step started");
            let current = AssertUnwindSafe(self.run_step(step, job, state)).catch_unwind();
            match tokio::time::timeout(deadline, current).await {
                Ok(Ok(outcome)) => outcome.map_err(|failure| failure.at(step))?,
                Ok(Err(panic)) => {
                    let failure = StepFailure::panicked(panic.as_ref()).at(step);
                    error!(error = %failure, "step panicked");
                    return Err(failure);
                }
                Err(_) => {
                    return Err(StepFailure::timeout(format!(
                        "step did not finish within {:?}",
                        deadline
                    ))
                    .at(step))
                }
            }
        }

        let collection_link = state
            .link
            .take()
            .ok_or_else(|| StepFailure::unparseable("no collection link").at(Step::ExtractLink))?;
        let load = state
            .load
            .take()
            .ok_or_else(|| StepFailure::unparseable("content was never loaded").at(Step::LoadContent))?;

        Ok(RunOutcome {
            collection_name: job.effective_collection_name(),
            collection_link,
            load,
        })
    }

    async fn run_step(&self, step: Step, job: &JobSpec, state: &mut RunState) -> Result<(), StepFailure> {
        let config = &self.config;
        match step {
            Step::AcquireSession => {
                let session = self.controller.start(&job.resource_key).await?;
                tokio::time::sleep(config.session_settle()).await;
                state.session = Some(session);
            }
            Step::AttachDriver => {
                let session = state
                    .session
                    .as_ref()
                    .ok_or_else(|| StepFailure::new(FailureKind::RemoteControl, "no session"))?;
                state.driver = Some(self.drivers.attach(session).await?);
            }
            Step::OpenSurface => {
                let ui = self.interactor(state.driver.as_deref())?;
                steps::open_surface(&ui, &config.surface_url, config).await?;
            }
            Step::ActivateExtension => {
                steps::activate_extension(&self.interactor(state.driver.as_deref())?).await?;
            }
            Step::Search => {
                steps::search(&self.interactor(state.driver.as_deref())?, &job.search_term).await?;
            }
            Step::LoadContent => {
                let ui = self.interactor(state.driver.as_deref())?;
                state.load = Some(steps::load_content(&ui, job.target_count, config).await?);
            }
            Step::SelectAll => {
                steps::select_all(&self.interactor(state.driver.as_deref())?).await?;
            }
            Step::OpenActionMenu => {
                steps::open_action_menu(&self.interactor(state.driver.as_deref())?).await?;
            }
            Step::AddToCollection => {
                steps::add_to_collection(&self.interactor(state.driver.as_deref())?).await?;
            }
            Step::NewCollection => {
                steps::new_collection(&self.interactor(state.driver.as_deref())?).await?;
            }
            Step::FillTitle => {
                let ui = self.interactor(state.driver.as_deref())?;
                steps::fill_title(&ui, &job.effective_collection_name()).await?;
            }
            Step::SetVisibility => {
                steps::set_visibility_public(&self.interactor(state.driver.as_deref())?).await?;
            }
            Step::ConfirmCreate => {
                steps::confirm_create(&self.interactor(state.driver.as_deref())?).await?;
            }
            Step::ExtractLink => {
                let ui = self.interactor(state.driver.as_deref())?;
                state.link = Some(steps::extract_link(&ui, config).await?);
            }
        }
        Ok(())
    }

    fn interactor<'a>(&self, driver: Option<&'a dyn BrowserDriver>) -> Result<Interactor<'a>, StepFailure> {
        let driver = driver.ok_or_else(|| StepFailure::new(FailureKind::Attach, "no driver attached"))?;
        Ok(Interactor::new(
            driver,
            self.config.step_timeout(),
            self.config.poll_interval(),
        ))
    }

    fn record(&self, job: &JobSpec, outcome: &RunOutcome) {
        if let Err(e) = record_run(
            self.recorder.as_ref(),
            job,
            &outcome.collection_name,
            &outcome.collection_link,
            outcome.load.count,
        ) {
            metrics::PERSISTENCE_FAILURES.inc();
            error!(error = %e, "failed to record result");
        }
    }

    async fn cleanup(&self, job: &JobSpec, state: RunState, lock: ResourceLock) {
        if let Some(driver) = state.driver {
            match tokio::time::timeout(self.config.step_deadline(), driver.quit()).await {
                Ok(Ok(())) => debug!("driver closed"),
                Ok(Err(e)) => warn!(error = %e, "failed to close driver"),
                Err(_) => warn!("timed out closing driver"),
            }
        }

        match self.controller.stop(&job.resource_key).await {
            Ok(()) => debug!("remote session stop requested"),
            Err(e) => warn!(error = %e, "failed to stop remote session"),
        }

        lock.release_after(self.config.cooldown()).await;
        debug!(resource_key = %job.resource_key, "resource lock released");
    }
}
