//! Execution records
//!
//! `JobInstance` is the durable identity of one logical run, keyed by job
//! name plus identifying parameters. Each attempt at that run is a
//! `JobExecution`; each attempt at a step within it is a `StepExecution`.
//! These records are append-only in the repository: finished executions
//! are never deleted, they form the audit trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::ExecutionContext;
use crate::parameters::JobParameters;
use crate::status::{BatchStatus, ExitStatus};

/// Identity of one logical run of a job.
///
/// Immutable once created; uniqueness of `(job_name, instance_key)` is a
/// repository invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobInstance {
    pub id: Uuid,
    pub job_name: String,
    /// Digest of the identifying parameters, see
    /// [`JobParameters::identity_key`].
    pub instance_key: String,
}

impl JobInstance {
    pub fn new(job_name: &str, parameters: &JobParameters) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_name: job_name.to_string(),
            instance_key: parameters.identity_key(),
        }
    }
}

/// One attempt to run a `JobInstance`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobExecution {
    pub id: Uuid,
    pub job_instance: JobInstance,
    pub parameters: JobParameters,
    pub status: BatchStatus,
    pub exit_status: ExitStatus,
    pub create_time: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub execution_context: ExecutionContext,
    /// Rendered causes of failure, retained with the record.
    pub failure_exceptions: Vec<String>,
    /// Step executions belonging to this attempt, in run order. Populated
    /// by the engine as steps run; not loaded by shallow repository reads.
    pub step_executions: Vec<StepExecution>,
    /// Optimistic-concurrency stamp, bumped by the repository on update.
    pub version: i64,
}

impl JobExecution {
    pub fn new(job_instance: JobInstance, parameters: JobParameters) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_instance,
            parameters,
            status: BatchStatus::Starting,
            exit_status: ExitStatus::unknown(),
            create_time: Utc::now(),
            start_time: None,
            end_time: None,
            execution_context: ExecutionContext::new(),
            failure_exceptions: Vec::new(),
            step_executions: Vec::new(),
            version: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status.is_running()
    }

    /// Upgrade the status to the more severe of current and `status`.
    pub fn upgrade_status(&mut self, status: BatchStatus) {
        self.status = self.status.upgrade_to(status);
    }

    pub fn add_failure_exception(&mut self, cause: impl Into<String>) {
        self.failure_exceptions.push(cause.into());
    }
}

/// One attempt to run one step within a `JobExecution`.
///
/// Counts are monotonically non-decreasing within an attempt; they are
/// advanced at each chunk commit together with the execution context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepExecution {
    pub id: Uuid,
    pub step_name: String,
    /// Back-reference to the owning execution (non-owning).
    pub job_execution_id: Uuid,
    pub status: BatchStatus,
    pub exit_status: ExitStatus,
    /// Items successfully read from the source.
    pub read_count: u64,
    /// Items successfully written to the sink.
    pub write_count: u64,
    /// Items dropped by the processor (not errors).
    pub filter_count: u64,
    /// Items excluded by the skip policy after an error.
    pub skip_count: u64,
    /// Chunk transactions committed.
    pub commit_count: u64,
    /// Chunk transactions rolled back.
    pub rollback_count: u64,
    pub execution_context: ExecutionContext,
    pub failure_exceptions: Vec<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub version: i64,
}

impl StepExecution {
    pub fn new(step_name: &str, job_execution_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            step_name: step_name.to_string(),
            job_execution_id,
            status: BatchStatus::Starting,
            exit_status: ExitStatus::executing(),
            read_count: 0,
            write_count: 0,
            filter_count: 0,
            skip_count: 0,
            commit_count: 0,
            rollback_count: 0,
            execution_context: ExecutionContext::new(),
            failure_exceptions: Vec::new(),
            start_time: Utc::now(),
            end_time: None,
            version: 0,
        }
    }

    pub fn add_failure_exception(&mut self, cause: impl Into<String>) {
        self.failure_exceptions.push(cause.into());
    }
}
