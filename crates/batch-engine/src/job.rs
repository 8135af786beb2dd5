//! Job execution
//!
//! Drives one `JobExecution` through the flow: runs each step (or skips
//! it when a prior COMPLETED attempt makes re-running unnecessary),
//! routes on the step's exit code through the transition table, and
//! persists the job's final status and exit status.

use crate::error::Result;
use crate::flow::{end_state, JobDefinition, StepNode, TransitionTarget};
use crate::step::StepRunner;
use crate::stop::StopHandle;
use batch_core::{BatchStatus, ExitStatus, JobExecution, StepExecution};
use batch_store::JobRepository;
use chrono::Utc;
use tracing::{info, warn};

enum FlowOutcome<'a> {
    Continue(&'a StepNode),
    /// `explicit` marks an End/Fail/Stop edge: the flow author decided
    /// the terminal state, as opposed to the default no-matching-edge end.
    End {
        status: BatchStatus,
        exit: ExitStatus,
        explicit: bool,
    },
}

/// Runs job executions against a repository.
pub struct JobExecutor<'a> {
    repository: &'a dyn JobRepository,
}

impl<'a> JobExecutor<'a> {
    pub fn new(repository: &'a dyn JobRepository) -> Self {
        Self { repository }
    }

    /// Run `execution` to completion, mutating it in place and persisting
    /// every state change. The returned status is also recorded on the
    /// execution; a FAILED job is a normal return, not an `Err`.
    pub async fn run(
        &self,
        job: &JobDefinition,
        execution: &mut JobExecution,
        stop: &StopHandle,
    ) -> Result<()> {
        execution.status = BatchStatus::Started;
        execution.start_time = Some(Utc::now());
        self.repository.update_job_execution(execution).await?;
        info!(
            job_name = %job.name(),
            job_execution_id = %execution.id,
            "Job started"
        );

        let runner = StepRunner::new(self.repository, stop);
        let mut current = Some(job.first_step());
        let mut final_state = (BatchStatus::Completed, ExitStatus::completed());
        let mut explicit_end = false;

        while let Some(node) = current.take() {
            if stop.is_stop_requested() {
                execution.status = BatchStatus::Stopping;
                self.repository.update_job_execution(execution).await?;
                final_state = (BatchStatus::Stopped, ExitStatus::stopped());
                break;
            }

            let step = node.step.as_ref();
            let prior = self
                .repository
                .last_step_execution(&execution.job_instance, step.name())
                .await?;

            // A COMPLETED prior attempt is not re-run on restart; its exit
            // code still drives routing
            if let Some(prior) = &prior {
                if prior.status == BatchStatus::Completed && !step.allow_start_if_complete() {
                    info!(
                        job_name = %job.name(),
                        step_name = %step.name(),
                        "Step already completed; skipping"
                    );
                    match self.route(job, node, prior)? {
                        FlowOutcome::Continue(next) => current = Some(next),
                        FlowOutcome::End {
                            status,
                            exit,
                            explicit,
                        } => {
                            final_state = (status, exit);
                            explicit_end = explicit;
                        }
                    }
                    continue;
                }
            }

            if let Some(limit) = step.start_limit() {
                let attempts = self
                    .repository
                    .step_execution_count(&execution.job_instance, step.name())
                    .await?;
                if attempts >= limit {
                    let message = format!(
                        "step '{}' exceeded its start limit of {}",
                        step.name(),
                        limit
                    );
                    warn!(job_name = %job.name(), "{}", message);
                    execution.add_failure_exception(message.clone());
                    final_state = (
                        BatchStatus::Failed,
                        ExitStatus::failed().add_description(&message),
                    );
                    break;
                }
            }

            let step_execution = runner.run(step, execution, prior.as_ref()).await?;
            match self.route(job, node, &step_execution)? {
                FlowOutcome::Continue(next) => {
                    // Step severity sticks to the job even when an edge
                    // routes past the failure
                    execution.upgrade_status(step_execution.status);
                    current = Some(next);
                }
                FlowOutcome::End {
                    status,
                    exit,
                    explicit,
                } => {
                    if status == BatchStatus::Failed {
                        for failure in &step_execution.failure_exceptions {
                            execution.add_failure_exception(failure.clone());
                        }
                    }
                    if !explicit {
                        execution.upgrade_status(step_execution.status);
                    }
                    final_state = (status, exit);
                    explicit_end = explicit;
                }
            }
            execution.step_executions.push(step_execution);
        }

        let (status, exit) = final_state;
        if explicit_end {
            // An End/Fail/Stop edge is the flow author's terminal decision
            // and overrides accumulated step severity
            execution.status = status;
        } else {
            execution.upgrade_status(status);
        }
        execution.exit_status = exit;
        execution.end_time = Some(Utc::now());
        self.repository.update_job_execution(execution).await?;
        info!(
            job_name = %job.name(),
            job_execution_id = %execution.id,
            status = %execution.status,
            exit_code = %execution.exit_status.exit_code,
            "Job finished"
        );
        Ok(())
    }

    /// Route past a finished (or skipped) step. A step with no matching
    /// transition ends the job: FAILED and STOPPED outcomes propagate,
    /// anything else ends as COMPLETED.
    fn route<'j>(
        &self,
        job: &'j JobDefinition,
        node: &StepNode,
        step_execution: &StepExecution,
    ) -> Result<FlowOutcome<'j>> {
        let exit_code = step_execution.exit_status.exit_code.clone();
        match node.next_for(&exit_code) {
            Some(TransitionTarget::Step(name)) => {
                // Validated at build time
                match job.node(name) {
                    Some(next) => Ok(FlowOutcome::Continue(next)),
                    None => Ok(FlowOutcome::End {
                        status: BatchStatus::Failed,
                        exit: ExitStatus::failed()
                            .add_description(&format!("unknown step '{}'", name)),
                        explicit: true,
                    }),
                }
            }
            Some(target) => {
                // End, Fail or Stop
                let (status, exit) = end_state(target).unwrap_or((
                    BatchStatus::Completed,
                    ExitStatus::completed(),
                ));
                Ok(FlowOutcome::End {
                    status,
                    exit,
                    explicit: true,
                })
            }
            None => {
                let (status, exit) = match step_execution.status {
                    BatchStatus::Failed => (BatchStatus::Failed, ExitStatus::failed()),
                    BatchStatus::Stopped => (BatchStatus::Stopped, ExitStatus::stopped()),
                    _ => (
                        BatchStatus::Completed,
                        step_execution.exit_status.clone(),
                    ),
                };
                Ok(FlowOutcome::End {
                    status,
                    exit,
                    explicit: false,
                })
            }
        }
    }
}
