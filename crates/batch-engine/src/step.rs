//! Step execution engine
//!
//! Wraps a unit of work (usually a chunk-oriented step) with lifecycle
//! management: creating the `StepExecution` record, restoring checkpoint
//! state from the last attempt, driving the status state machine
//! `STARTING -> STARTED -> (COMPLETED | FAILED | STOPPED)`, and persisting
//! the final outcome.

use crate::error::Result;
use crate::stop::StopHandle;
use async_trait::async_trait;
use batch_core::{BatchStatus, ExitStatus, JobExecution, StepExecution};
use batch_store::JobRepository;
use chrono::Utc;
use tracing::{info, warn};

/// Outcome of a step body. A failed step is a recorded outcome, not an
/// engine error: only infrastructure failures surface as `Err`.
pub enum StepResult {
    Complete,
    Stopped,
    Failed(anyhow::Error),
}

/// One stage of a job.
#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> &str;

    /// Whether a COMPLETED prior attempt should be re-run on restart.
    fn allow_start_if_complete(&self) -> bool {
        false
    }

    /// Maximum attempts across restarts; `None` means unlimited.
    fn start_limit(&self) -> Option<u64> {
        None
    }

    /// Run the step body, updating counts and checkpointing through the
    /// repository as it goes.
    async fn execute(
        &self,
        step_execution: &mut StepExecution,
        repository: &dyn JobRepository,
        stop: &StopHandle,
    ) -> Result<StepResult>;
}

/// An opaque unit of work executed once per step attempt.
#[async_trait]
pub trait Tasklet: Send + Sync {
    async fn execute(&self, step_execution: &mut StepExecution) -> anyhow::Result<()>;
}

/// Step adapter for a [`Tasklet`].
pub struct TaskletStep<T> {
    name: String,
    tasklet: T,
    allow_start_if_complete: bool,
    start_limit: Option<u64>,
}

impl<T: Tasklet> TaskletStep<T> {
    pub fn new(name: &str, tasklet: T) -> Self {
        Self {
            name: name.to_string(),
            tasklet,
            allow_start_if_complete: false,
            start_limit: None,
        }
    }

    pub fn with_allow_start_if_complete(mut self, allow: bool) -> Self {
        self.allow_start_if_complete = allow;
        self
    }

    pub fn with_start_limit(mut self, limit: u64) -> Self {
        self.start_limit = Some(limit);
        self
    }
}

#[async_trait]
impl<T: Tasklet> Step for TaskletStep<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn allow_start_if_complete(&self) -> bool {
        self.allow_start_if_complete
    }

    fn start_limit(&self) -> Option<u64> {
        self.start_limit
    }

    async fn execute(
        &self,
        step_execution: &mut StepExecution,
        _repository: &dyn JobRepository,
        stop: &StopHandle,
    ) -> Result<StepResult> {
        if stop.is_stop_requested() {
            return Ok(StepResult::Stopped);
        }
        match self.tasklet.execute(step_execution).await {
            Ok(()) => Ok(StepResult::Complete),
            Err(e) => Ok(StepResult::Failed(e)),
        }
    }
}

/// Drives one step attempt through its lifecycle.
pub struct StepRunner<'a> {
    repository: &'a dyn JobRepository,
    stop: &'a StopHandle,
}

impl<'a> StepRunner<'a> {
    pub fn new(repository: &'a dyn JobRepository, stop: &'a StopHandle) -> Self {
        Self { repository, stop }
    }

    /// Run one attempt of `step` within `job_execution`.
    ///
    /// `prior` is the most recent attempt of the same step within the same
    /// job instance, if any; a FAILED or STOPPED prior attempt seeds this
    /// attempt's execution context so work resumes from the last committed
    /// checkpoint.
    pub async fn run(
        &self,
        step: &dyn Step,
        job_execution: &JobExecution,
        prior: Option<&StepExecution>,
    ) -> Result<StepExecution> {
        let mut step_execution = StepExecution::new(step.name(), job_execution.id);

        if let Some(prior) = prior {
            if prior.status.is_unsuccessful() {
                info!(
                    step_name = %step.name(),
                    prior_status = %prior.status,
                    "Resuming step from last committed checkpoint"
                );
                step_execution.execution_context = prior.execution_context.clone();
            }
        }

        self.repository.save_step_execution(&mut step_execution).await?;

        step_execution.status = BatchStatus::Started;
        self.repository.update_step_execution(&mut step_execution).await?;
        info!(
            step_name = %step.name(),
            step_execution_id = %step_execution.id,
            "Step started"
        );

        let result = step
            .execute(&mut step_execution, self.repository, self.stop)
            .await?;

        match result {
            StepResult::Complete => {
                step_execution.status = BatchStatus::Completed;
                step_execution.exit_status = ExitStatus::completed();
            }
            StepResult::Stopped => {
                step_execution.status = BatchStatus::Stopped;
                step_execution.exit_status = ExitStatus::stopped();
                info!(step_name = %step.name(), "Step stopped at chunk boundary");
            }
            StepResult::Failed(cause) => {
                let rendered = format!("{:#}", cause);
                warn!(step_name = %step.name(), error = %rendered, "Step failed");
                step_execution.status = BatchStatus::Failed;
                step_execution.exit_status = ExitStatus::failed().add_description(&rendered);
                step_execution.add_failure_exception(rendered);
            }
        }

        step_execution.end_time = Some(Utc::now());
        self.repository.update_step_execution(&mut step_execution).await?;
        info!(
            step_name = %step.name(),
            status = %step_execution.status,
            read_count = step_execution.read_count,
            write_count = step_execution.write_count,
            skip_count = step_execution.skip_count,
            "Step finished"
        );

        Ok(step_execution)
    }
}
