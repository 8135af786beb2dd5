//! Job repository contract
//!
//! The repository is the single source of truth for execution metadata.
//! Implementations must make every mutating call one durable transaction
//! (no partial writes observable), serialize job-execution creation per
//! instance, and detect concurrent writers via version stamps.

use crate::error::Result;
use async_trait::async_trait;
use batch_core::{JobExecution, JobInstance, JobParameters, StepExecution};

#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Create a new job instance. Fails with
    /// [`StoreError::DuplicateJobInstance`](crate::StoreError::DuplicateJobInstance)
    /// if one already exists for the same `(job_name, identifying
    /// parameters)` pair.
    async fn create_job_instance(
        &self,
        job_name: &str,
        parameters: &JobParameters,
    ) -> Result<JobInstance>;

    /// Look up an instance by name and identifying parameters.
    async fn find_job_instance(
        &self,
        job_name: &str,
        parameters: &JobParameters,
    ) -> Result<Option<JobInstance>>;

    /// Create a new execution for an instance. Fails with
    /// [`StoreError::JobExecutionAlreadyRunning`](crate::StoreError::JobExecutionAlreadyRunning)
    /// if any execution of the same instance is in a non-terminal status.
    /// The exclusion is enforced at creation time inside the store, not by
    /// a read-then-write in the caller.
    async fn create_job_execution(
        &self,
        instance: &JobInstance,
        parameters: &JobParameters,
    ) -> Result<JobExecution>;

    /// Persist status, timestamps, failure causes, and execution context
    /// atomically. Fails with
    /// [`StoreError::StaleState`](crate::StoreError::StaleState) if the
    /// stored version has advanced past the caller's view; on success the
    /// caller's version stamp is advanced.
    async fn update_job_execution(&self, execution: &mut JobExecution) -> Result<()>;

    /// The most recently created execution of an instance, without its
    /// step executions.
    async fn last_job_execution(&self, instance: &JobInstance) -> Result<Option<JobExecution>>;

    /// Insert a freshly created step execution.
    async fn save_step_execution(&self, step_execution: &mut StepExecution) -> Result<()>;

    /// Persist counts, status, and execution context atomically, with the
    /// same version check as [`update_job_execution`](Self::update_job_execution).
    /// This is the chunk checkpoint commit.
    async fn update_step_execution(&self, step_execution: &mut StepExecution) -> Result<()>;

    /// The most recent execution of `step_name` across all executions of
    /// the instance. Used to seed restart state.
    async fn last_step_execution(
        &self,
        instance: &JobInstance,
        step_name: &str,
    ) -> Result<Option<StepExecution>>;

    /// How many times `step_name` has been attempted across all executions
    /// of the instance. Used to enforce step start limits.
    async fn step_execution_count(&self, instance: &JobInstance, step_name: &str) -> Result<u64>;
}
