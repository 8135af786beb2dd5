//! Job launcher
//!
//! Front door of the engine: resolves the job instance for a set of
//! identifying parameters, enforces restart rules, creates the execution
//! record and runs it, either inline or on a spawned task with a stop
//! handle.

use crate::error::{EngineError, Result};
use crate::flow::JobDefinition;
use crate::job::JobExecutor;
use crate::stop::StopHandle;
use batch_core::{BatchStatus, JobExecution, JobInstance, JobParameters};
use batch_store::{JobRepository, StoreError};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// A job execution running on its own task.
#[derive(Debug)]
pub struct LaunchedJob {
    /// Snapshot of the execution record as created; the running task owns
    /// the live copy.
    pub execution: JobExecution,
    /// Requests a cooperative stop at the next chunk boundary.
    pub stop: StopHandle,
    /// Resolves with the final execution record.
    pub handle: JoinHandle<Result<JobExecution>>,
}

/// Creates and runs job executions.
pub struct JobLauncher {
    repository: Arc<dyn JobRepository>,
    force_restart: bool,
}

impl JobLauncher {
    pub fn new(repository: Arc<dyn JobRepository>) -> Self {
        Self {
            repository,
            force_restart: false,
        }
    }

    /// Permit launching an instance whose last execution COMPLETED. The
    /// usual same-parameters rerun protection is bypassed; step-level
    /// restart rules still apply.
    pub fn with_force_restart(mut self, force: bool) -> Self {
        self.force_restart = force;
        self
    }

    /// Run the job inline and return its final execution record. A FAILED
    /// or STOPPED job is a normal return; `Err` means the execution could
    /// not be created or the repository failed mid-run.
    pub async fn run(
        &self,
        job: &JobDefinition,
        parameters: JobParameters,
    ) -> Result<JobExecution> {
        let mut execution = self.create_execution(job, &parameters).await?;
        let stop = StopHandle::new();
        let executor = JobExecutor::new(self.repository.as_ref());
        executor.run(job, &mut execution, &stop).await?;
        Ok(execution)
    }

    /// Run the job on a spawned task, returning immediately with a stop
    /// handle and a join handle for the final record.
    pub async fn launch(
        &self,
        job: Arc<JobDefinition>,
        parameters: JobParameters,
    ) -> Result<LaunchedJob> {
        let execution = self.create_execution(&job, &parameters).await?;
        let snapshot = execution.clone();
        let stop = StopHandle::new();
        let task_stop = stop.clone();
        let repository = Arc::clone(&self.repository);

        let handle = tokio::spawn(async move {
            let mut execution = execution;
            let executor = JobExecutor::new(repository.as_ref());
            executor.run(&job, &mut execution, &task_stop).await?;
            Ok(execution)
        });

        Ok(LaunchedJob {
            execution: snapshot,
            stop,
            handle,
        })
    }

    /// Resolve or create the job instance and create a new execution for
    /// it, enforcing the single-running-execution and restart rules.
    async fn create_execution(
        &self,
        job: &JobDefinition,
        parameters: &JobParameters,
    ) -> Result<JobExecution> {
        let instance = self.resolve_instance(job, parameters).await?;
        let execution = self
            .repository
            .create_job_execution(&instance, parameters)
            .await?;
        info!(
            job_name = %job.name(),
            job_execution_id = %execution.id,
            instance_key = %instance.instance_key,
            "Job execution created"
        );
        Ok(execution)
    }

    async fn resolve_instance(
        &self,
        job: &JobDefinition,
        parameters: &JobParameters,
    ) -> Result<JobInstance> {
        loop {
            if let Some(instance) = self
                .repository
                .find_job_instance(job.name(), parameters)
                .await?
            {
                if let Some(last) = self.repository.last_job_execution(&instance).await? {
                    if last.status == BatchStatus::Completed && !self.force_restart {
                        return Err(EngineError::JobInstanceAlreadyComplete(
                            job.name().to_string(),
                        ));
                    }
                    if !job.is_restartable() {
                        return Err(EngineError::JobNotRestartable(job.name().to_string()));
                    }
                }
                return Ok(instance);
            }
            match self
                .repository
                .create_job_instance(job.name(), parameters)
                .await
            {
                Ok(instance) => return Ok(instance),
                // Lost a creation race; loop to pick up the winner's row
                Err(StoreError::DuplicateJobInstance { .. }) => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkStep;
    use crate::item::ItemWriter;
    use crate::step::{Tasklet, TaskletStep};
    use crate::support::VecReader;
    use async_trait::async_trait;
    use batch_core::StepExecution;
    use batch_store::SqliteRepository;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::Mutex as StdMutex;
    use tokio::sync::mpsc;

    struct CountingTasklet {
        runs: Arc<AtomicU64>,
    }

    #[async_trait]
    impl Tasklet for CountingTasklet {
        async fn execute(&self, _step_execution: &mut StepExecution) -> anyhow::Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailWhileArmed {
        armed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Tasklet for FailWhileArmed {
        async fn execute(&self, _step_execution: &mut StepExecution) -> anyhow::Result<()> {
            anyhow::ensure!(!self.armed.load(Ordering::SeqCst), "still armed");
            Ok(())
        }
    }

    async fn launcher() -> (Arc<SqliteRepository>, JobLauncher) {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
        let repository = Arc::new(SqliteRepository::in_memory().await.unwrap());
        let launcher = JobLauncher::new(Arc::clone(&repository) as Arc<dyn JobRepository>);
        (repository, launcher)
    }

    fn day(day: i64) -> JobParameters {
        JobParameters::builder().long("day", day).build()
    }

    #[tokio::test]
    async fn test_run_completes_and_persists() {
        let (repository, launcher) = launcher().await;
        let runs = Arc::new(AtomicU64::new(0));
        let job = JobDefinition::builder("import")
            .step(TaskletStep::new("load", CountingTasklet { runs: Arc::clone(&runs) }))
            .build()
            .unwrap();

        let execution = launcher.run(&job, day(1)).await.unwrap();
        assert_eq!(execution.status, BatchStatus::Completed);
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        let stored = repository
            .last_job_execution(&execution.job_instance)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.id, execution.id);
        assert_eq!(stored.status, BatchStatus::Completed);
    }

    #[tokio::test]
    async fn test_completed_instance_rejects_relaunch() {
        let (_repository, launcher) = launcher().await;
        let runs = Arc::new(AtomicU64::new(0));
        let job = JobDefinition::builder("import")
            .step(TaskletStep::new("load", CountingTasklet { runs: Arc::clone(&runs) }))
            .build()
            .unwrap();

        launcher.run(&job, day(1)).await.unwrap();
        let err = launcher.run(&job, day(1)).await.unwrap_err();
        assert!(matches!(err, EngineError::JobInstanceAlreadyComplete(_)));

        // Different identifying parameters are a different instance
        let execution = launcher.run(&job, day(2)).await.unwrap();
        assert_eq!(execution.status, BatchStatus::Completed);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_restartable_job_rejects_second_attempt() {
        let (_repository, launcher) = launcher().await;
        let armed = Arc::new(AtomicBool::new(true));
        let job = JobDefinition::builder("oneshot")
            .step(TaskletStep::new("load", FailWhileArmed { armed: Arc::clone(&armed) }))
            .restartable(false)
            .build()
            .unwrap();

        let execution = launcher.run(&job, day(1)).await.unwrap();
        assert_eq!(execution.status, BatchStatus::Failed);

        armed.store(false, Ordering::SeqCst);
        let err = launcher.run(&job, day(1)).await.unwrap_err();
        assert!(matches!(err, EngineError::JobNotRestartable(_)));
    }

    #[tokio::test]
    async fn test_force_restart_reruns_completed_instance() {
        let (_repository, launcher) = launcher().await;
        let runs = Arc::new(AtomicU64::new(0));
        let job = JobDefinition::builder("import")
            .step(
                TaskletStep::new("load", CountingTasklet { runs: Arc::clone(&runs) })
                    .with_allow_start_if_complete(true),
            )
            .build()
            .unwrap();

        launcher.run(&job, day(1)).await.unwrap();
        let launcher = launcher.with_force_restart(true);
        let execution = launcher.run(&job, day(1)).await.unwrap();

        assert_eq!(execution.status, BatchStatus::Completed);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_run_resumes_from_checkpoint() {
        let (repository, launcher) = launcher().await;
        let armed = Arc::new(AtomicBool::new(true));
        let written = Arc::new(StdMutex::new(Vec::new()));

        struct ArmedSink {
            armed: Arc<AtomicBool>,
            written: Arc<StdMutex<Vec<i32>>>,
        }

        #[async_trait]
        impl ItemWriter<i32> for ArmedSink {
            async fn write(&mut self, items: &[i32]) -> anyhow::Result<()> {
                if self.armed.load(Ordering::SeqCst) && items.contains(&5) {
                    anyhow::bail!("sink rejected batch");
                }
                self.written.lock().unwrap().extend_from_slice(items);
                Ok(())
            }
        }

        let job = JobDefinition::builder("copy")
            .step(
                ChunkStep::new(
                    "copy",
                    VecReader::new("src", (0..10).collect()),
                    ArmedSink {
                        armed: Arc::clone(&armed),
                        written: Arc::clone(&written),
                    },
                )
                .with_chunk_size(2),
            )
            .build()
            .unwrap();

        let first = launcher.run(&job, day(1)).await.unwrap();
        assert_eq!(first.status, BatchStatus::Failed);

        armed.store(false, Ordering::SeqCst);
        let second = launcher.run(&job, day(1)).await.unwrap();
        assert_eq!(second.status, BatchStatus::Completed);

        // No item was written twice and none was lost
        assert_eq!(*written.lock().unwrap(), (0..10).collect::<Vec<_>>());
        assert_eq!(
            repository
                .step_execution_count(&first.job_instance, "copy")
                .await
                .unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn test_degraded_write_commits_and_restart_is_a_noop() {
        use crate::policy::{LimitCheckingRetryPolicy, LimitCheckingSkipPolicy};

        let (repository, launcher) = launcher().await;
        let written = Arc::new(StdMutex::new(Vec::new()));

        struct PoisonSink {
            poison: i32,
            written: Arc<StdMutex<Vec<i32>>>,
        }

        #[async_trait]
        impl ItemWriter<i32> for PoisonSink {
            async fn write(&mut self, items: &[i32]) -> anyhow::Result<()> {
                if items.contains(&self.poison) {
                    anyhow::bail!("sink rejected batch");
                }
                self.written.lock().unwrap().extend_from_slice(items);
                Ok(())
            }
        }

        let job = JobDefinition::builder("tolerant")
            .step(
                ChunkStep::new(
                    "copy",
                    VecReader::new("src", vec![1, 2, 3, 4, 5]),
                    PoisonSink {
                        poison: 3,
                        written: Arc::clone(&written),
                    },
                )
                .with_chunk_size(2)
                .with_retry_policy(LimitCheckingRetryPolicy::new(1))
                .with_skip_policy(LimitCheckingSkipPolicy::new(1)),
            )
            .build()
            .unwrap();

        // The [3,4] batch fails, is retried once, then degrades: 3 is
        // skipped, 4 written, and the chunk commits
        let first = launcher.run(&job, day(1)).await.unwrap();
        assert_eq!(first.status, BatchStatus::Completed);
        assert_eq!(*written.lock().unwrap(), vec![1, 2, 4, 5]);

        let step = repository
            .last_step_execution(&first.job_instance, "copy")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(step.read_count, 5);
        assert_eq!(step.write_count, 4);
        assert_eq!(step.skip_count, 1);
        assert_eq!(step.rollback_count, 2);

        // Forcing a new execution re-runs nothing: the completed step is
        // skipped and the sink sees no further writes
        let launcher = launcher.with_force_restart(true);
        let second = launcher.run(&job, day(1)).await.unwrap();
        assert_eq!(second.status, BatchStatus::Completed);
        assert_eq!(*written.lock().unwrap(), vec![1, 2, 4, 5]);
        assert_eq!(
            repository
                .step_execution_count(&first.job_instance, "copy")
                .await
                .unwrap(),
            1
        );
    }

    struct GatedWriter {
        wrote: mpsc::Sender<usize>,
        resume: mpsc::Receiver<()>,
        written: Arc<StdMutex<Vec<i32>>>,
    }

    #[async_trait]
    impl ItemWriter<i32> for GatedWriter {
        async fn write(&mut self, items: &[i32]) -> anyhow::Result<()> {
            self.written.lock().unwrap().extend_from_slice(items);
            self.wrote.send(items.len()).await.ok();
            self.resume.recv().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_launched_job_stops_at_chunk_boundary() {
        let (_repository, launcher) = launcher().await;
        let (wrote_tx, mut wrote_rx) = mpsc::channel(1);
        let (resume_tx, resume_rx) = mpsc::channel(1);
        let written = Arc::new(StdMutex::new(Vec::new()));

        let job = Arc::new(
            JobDefinition::builder("endless")
                .step(
                    ChunkStep::new(
                        "drain",
                        VecReader::new("src", (0..100).collect()),
                        GatedWriter {
                            wrote: wrote_tx,
                            resume: resume_rx,
                            written: Arc::clone(&written),
                        },
                    )
                    .with_chunk_size(2),
                )
                .build()
                .unwrap(),
        );

        let launched = launcher.launch(job, day(1)).await.unwrap();
        assert!(launched.execution.is_running());

        // First chunk is mid-write: request the stop, then let it finish
        wrote_rx.recv().await.unwrap();
        launched.stop.stop();
        resume_tx.send(()).await.unwrap();

        let final_execution = launched.handle.await.unwrap().unwrap();
        assert_eq!(final_execution.status, BatchStatus::Stopped);
        // The in-flight chunk committed before the stop took effect
        assert_eq!(*written.lock().unwrap(), vec![0, 1]);
        assert_eq!(final_execution.step_executions[0].commit_count, 1);
    }

    #[tokio::test]
    async fn test_concurrent_launch_of_same_instance_rejected() {
        let (_repository, launcher) = launcher().await;
        let (wrote_tx, mut wrote_rx) = mpsc::channel(1);
        let (resume_tx, resume_rx) = mpsc::channel(1);

        let job = Arc::new(
            JobDefinition::builder("exclusive")
                .step(
                    ChunkStep::new(
                        "drain",
                        VecReader::new("src", (0..10).collect()),
                        GatedWriter {
                            wrote: wrote_tx,
                            resume: resume_rx,
                            written: Arc::new(StdMutex::new(Vec::new())),
                        },
                    )
                    .with_chunk_size(2),
                )
                .build()
                .unwrap(),
        );

        let launched = launcher.launch(Arc::clone(&job), day(1)).await.unwrap();
        wrote_rx.recv().await.unwrap();

        // The first execution is still running; a second must be refused
        let err = launcher.launch(Arc::clone(&job), day(1)).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Store(StoreError::JobExecutionAlreadyRunning(_))
        ));

        launched.stop.stop();
        resume_tx.send(()).await.unwrap();
        let final_execution = launched.handle.await.unwrap().unwrap();
        assert_eq!(final_execution.status, BatchStatus::Stopped);
    }
}
