//! SQLite-backed job repository
//!
//! Durable storage for job instances, executions, step executions, and
//! their execution contexts. Uses SQLx for async database operations.
//!
//! Concurrency invariants are pushed into the schema rather than enforced
//! by read-then-write in application code:
//! - instance identity: unique index over `(job_name, instance_key)`
//! - one running execution per instance: partial unique index over
//!   `job_instance_id` for rows in a non-terminal status
//! - concurrent writers: a `version` column compared-and-swapped on every
//!   update

use crate::error::{Result, StoreError};
use crate::repository::JobRepository;
use async_trait::async_trait;
use batch_core::{
    BatchStatus, ExecutionContext, ExitStatus, JobExecution, JobInstance, JobParameters,
    StepExecution,
};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::{debug, info};
use uuid::Uuid;

/// SQLite-backed implementation of [`JobRepository`].
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Create a new repository with the given database URL.
    ///
    /// URL format: `sqlite:///path/to/db.sqlite` or `sqlite::memory:`
    pub async fn new(url: &str) -> Result<Self> {
        info!("Initializing SQLite job repository: {}", url);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await?;

        let repository = Self { pool };
        repository.initialize_schema().await?;

        info!("SQLite job repository initialized");
        Ok(repository)
    }

    /// Create an in-memory repository for testing.
    ///
    /// A single connection only: each SQLite `:memory:` connection is its
    /// own database, so a larger pool would shard the data.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let repository = Self { pool };
        repository.initialize_schema().await?;
        Ok(repository)
    }

    async fn initialize_schema(&self) -> Result<()> {
        debug!("Initializing job repository schema");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS job_instance (
                id TEXT PRIMARY KEY,
                job_name TEXT NOT NULL,
                instance_key TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_instance_identity
             ON job_instance(job_name, instance_key)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS job_execution (
                id TEXT PRIMARY KEY,
                job_instance_id TEXT NOT NULL REFERENCES job_instance(id),
                parameters TEXT NOT NULL,
                status TEXT NOT NULL,
                exit_code TEXT NOT NULL,
                exit_description TEXT NOT NULL,
                create_time TEXT NOT NULL,
                start_time TEXT,
                end_time TEXT,
                context TEXT NOT NULL,
                failures TEXT NOT NULL,
                version INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // At most one non-terminal execution per instance. Inserting a
        // second concurrent attempt violates this index atomically, which
        // is what makes create_job_execution race-free.
        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_execution_running
             ON job_execution(job_instance_id)
             WHERE status IN ('STARTING', 'STARTED', 'STOPPING')",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_execution_instance
             ON job_execution(job_instance_id)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS step_execution (
                id TEXT PRIMARY KEY,
                job_execution_id TEXT NOT NULL REFERENCES job_execution(id),
                step_name TEXT NOT NULL,
                status TEXT NOT NULL,
                exit_code TEXT NOT NULL,
                exit_description TEXT NOT NULL,
                read_count INTEGER NOT NULL,
                write_count INTEGER NOT NULL,
                filter_count INTEGER NOT NULL,
                skip_count INTEGER NOT NULL,
                commit_count INTEGER NOT NULL,
                rollback_count INTEGER NOT NULL,
                context TEXT NOT NULL,
                failures TEXT NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT,
                version INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_step_execution_job
             ON step_execution(job_execution_id, step_name)",
        )
        .execute(&self.pool)
        .await?;

        debug!("Job repository schema initialized");
        Ok(())
    }
}

#[async_trait]
impl JobRepository for SqliteRepository {
    async fn create_job_instance(
        &self,
        job_name: &str,
        parameters: &JobParameters,
    ) -> Result<JobInstance> {
        let instance = JobInstance::new(job_name, parameters);

        let result = sqlx::query(
            "INSERT INTO job_instance (id, job_name, instance_key) VALUES (?, ?, ?)",
        )
        .bind(instance.id.to_string())
        .bind(&instance.job_name)
        .bind(&instance.instance_key)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                debug!(
                    job_name = %instance.job_name,
                    instance_id = %instance.id,
                    "Created job instance"
                );
                Ok(instance)
            }
            Err(e) if is_unique_violation(&e) => Err(StoreError::DuplicateJobInstance {
                job_name: instance.job_name,
                instance_key: instance.instance_key,
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_job_instance(
        &self,
        job_name: &str,
        parameters: &JobParameters,
    ) -> Result<Option<JobInstance>> {
        let instance_key = parameters.identity_key();
        let row = sqlx::query(
            "SELECT id FROM job_instance WHERE job_name = ? AND instance_key = ?",
        )
        .bind(job_name)
        .bind(&instance_key)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(JobInstance {
                id: parse_uuid(&row.get::<String, _>("id"))?,
                job_name: job_name.to_string(),
                instance_key,
            })),
            None => Ok(None),
        }
    }

    async fn create_job_execution(
        &self,
        instance: &JobInstance,
        parameters: &JobParameters,
    ) -> Result<JobExecution> {
        let execution = JobExecution::new(instance.clone(), parameters.clone());

        let result = sqlx::query(
            r#"
            INSERT INTO job_execution
                (id, job_instance_id, parameters, status, exit_code, exit_description,
                 create_time, start_time, end_time, context, failures, version)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(execution.id.to_string())
        .bind(instance.id.to_string())
        .bind(serde_json::to_string(&execution.parameters)?)
        .bind(execution.status.as_str())
        .bind(&execution.exit_status.exit_code)
        .bind(&execution.exit_status.exit_description)
        .bind(execution.create_time.to_rfc3339())
        .bind(execution.start_time.map(|t| t.to_rfc3339()))
        .bind(execution.end_time.map(|t| t.to_rfc3339()))
        .bind(serde_json::to_string(&execution.execution_context)?)
        .bind(serde_json::to_string(&execution.failure_exceptions)?)
        .bind(execution.version)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                info!(
                    job_name = %instance.job_name,
                    execution_id = %execution.id,
                    "Created job execution"
                );
                Ok(execution)
            }
            Err(e) if is_unique_violation(&e) => {
                Err(StoreError::JobExecutionAlreadyRunning(instance.id))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update_job_execution(&self, execution: &mut JobExecution) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE job_execution
            SET status = ?, exit_code = ?, exit_description = ?,
                start_time = ?, end_time = ?, context = ?, failures = ?,
                version = version + 1
            WHERE id = ? AND version = ?
            "#,
        )
        .bind(execution.status.as_str())
        .bind(&execution.exit_status.exit_code)
        .bind(&execution.exit_status.exit_description)
        .bind(execution.start_time.map(|t| t.to_rfc3339()))
        .bind(execution.end_time.map(|t| t.to_rfc3339()))
        .bind(serde_json::to_string(&execution.execution_context)?)
        .bind(serde_json::to_string(&execution.failure_exceptions)?)
        .bind(execution.id.to_string())
        .bind(execution.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self
                .stale_or_missing("job execution", "job_execution", execution.id, execution.version)
                .await);
        }

        execution.version += 1;
        debug!(
            execution_id = %execution.id,
            status = %execution.status,
            version = execution.version,
            "Updated job execution"
        );
        Ok(())
    }

    async fn last_job_execution(&self, instance: &JobInstance) -> Result<Option<JobExecution>> {
        let row = sqlx::query(
            "SELECT * FROM job_execution WHERE job_instance_id = ?
             ORDER BY create_time DESC, rowid DESC LIMIT 1",
        )
        .bind(instance.id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(row_to_job_execution(instance, &row)?)),
            None => Ok(None),
        }
    }

    async fn save_step_execution(&self, step_execution: &mut StepExecution) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO step_execution
                (id, job_execution_id, step_name, status, exit_code, exit_description,
                 read_count, write_count, filter_count, skip_count, commit_count,
                 rollback_count, context, failures, start_time, end_time, version)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(step_execution.id.to_string())
        .bind(step_execution.job_execution_id.to_string())
        .bind(&step_execution.step_name)
        .bind(step_execution.status.as_str())
        .bind(&step_execution.exit_status.exit_code)
        .bind(&step_execution.exit_status.exit_description)
        .bind(step_execution.read_count as i64)
        .bind(step_execution.write_count as i64)
        .bind(step_execution.filter_count as i64)
        .bind(step_execution.skip_count as i64)
        .bind(step_execution.commit_count as i64)
        .bind(step_execution.rollback_count as i64)
        .bind(serde_json::to_string(&step_execution.execution_context)?)
        .bind(serde_json::to_string(&step_execution.failure_exceptions)?)
        .bind(step_execution.start_time.to_rfc3339())
        .bind(step_execution.end_time.map(|t| t.to_rfc3339()))
        .bind(step_execution.version)
        .execute(&self.pool)
        .await?;

        debug!(
            step_name = %step_execution.step_name,
            step_execution_id = %step_execution.id,
            "Saved step execution"
        );
        Ok(())
    }

    async fn update_step_execution(&self, step_execution: &mut StepExecution) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE step_execution
            SET status = ?, exit_code = ?, exit_description = ?,
                read_count = ?, write_count = ?, filter_count = ?, skip_count = ?,
                commit_count = ?, rollback_count = ?, context = ?, failures = ?,
                end_time = ?, version = version + 1
            WHERE id = ? AND version = ?
            "#,
        )
        .bind(step_execution.status.as_str())
        .bind(&step_execution.exit_status.exit_code)
        .bind(&step_execution.exit_status.exit_description)
        .bind(step_execution.read_count as i64)
        .bind(step_execution.write_count as i64)
        .bind(step_execution.filter_count as i64)
        .bind(step_execution.skip_count as i64)
        .bind(step_execution.commit_count as i64)
        .bind(step_execution.rollback_count as i64)
        .bind(serde_json::to_string(&step_execution.execution_context)?)
        .bind(serde_json::to_string(&step_execution.failure_exceptions)?)
        .bind(step_execution.end_time.map(|t| t.to_rfc3339()))
        .bind(step_execution.id.to_string())
        .bind(step_execution.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self
                .stale_or_missing(
                    "step execution",
                    "step_execution",
                    step_execution.id,
                    step_execution.version,
                )
                .await);
        }

        step_execution.version += 1;
        debug!(
            step_name = %step_execution.step_name,
            read_count = step_execution.read_count,
            write_count = step_execution.write_count,
            commit_count = step_execution.commit_count,
            "Updated step execution"
        );
        Ok(())
    }

    async fn last_step_execution(
        &self,
        instance: &JobInstance,
        step_name: &str,
    ) -> Result<Option<StepExecution>> {
        let row = sqlx::query(
            r#"
            SELECT s.* FROM step_execution s
            JOIN job_execution e ON s.job_execution_id = e.id
            WHERE e.job_instance_id = ? AND s.step_name = ?
            ORDER BY s.start_time DESC, s.rowid DESC LIMIT 1
            "#,
        )
        .bind(instance.id.to_string())
        .bind(step_name)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(row_to_step_execution(&row)?)),
            None => Ok(None),
        }
    }

    async fn step_execution_count(&self, instance: &JobInstance, step_name: &str) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM step_execution s
            JOIN job_execution e ON s.job_execution_id = e.id
            WHERE e.job_instance_id = ? AND s.step_name = ?
            "#,
        )
        .bind(instance.id.to_string())
        .bind(step_name)
        .fetch_one(&self.pool)
        .await?;

        Ok(count as u64)
    }
}

impl SqliteRepository {
    /// Distinguish a version conflict from a missing row after a CAS
    /// update matched nothing.
    async fn stale_or_missing(
        &self,
        entity: &'static str,
        table: &str,
        id: Uuid,
        expected: i64,
    ) -> StoreError {
        let query = format!("SELECT version FROM {} WHERE id = ?", table);
        let found: std::result::Result<Option<i64>, sqlx::Error> = sqlx::query_scalar(&query)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await;

        match found {
            Ok(Some(found)) => StoreError::StaleState {
                entity,
                id,
                expected,
                found,
            },
            Ok(None) => StoreError::NotFound(format!("{} {}", entity, id)),
            Err(e) => e.into(),
        }
    }
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Database(e) if e.kind() == sqlx::error::ErrorKind::UniqueViolation
    )
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|_| StoreError::NotFound(format!("invalid id {}", s)))
}

fn parse_status(s: &str) -> Result<BatchStatus> {
    BatchStatus::parse(s).ok_or_else(|| StoreError::InvalidStatus(s.to_string()))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| StoreError::InvalidTimestamp(s.to_string()))
}

fn parse_optional_timestamp(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
    s.map(|s| parse_timestamp(&s)).transpose()
}

fn row_to_job_execution(instance: &JobInstance, row: &SqliteRow) -> Result<JobExecution> {
    let parameters: JobParameters = serde_json::from_str(&row.get::<String, _>("parameters"))?;
    let context: ExecutionContext = serde_json::from_str(&row.get::<String, _>("context"))?;
    let failures: Vec<String> = serde_json::from_str(&row.get::<String, _>("failures"))?;

    Ok(JobExecution {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        job_instance: instance.clone(),
        parameters,
        status: parse_status(&row.get::<String, _>("status"))?,
        exit_status: ExitStatus::new(row.get::<String, _>("exit_code"))
            .add_description(row.get::<String, _>("exit_description")),
        create_time: parse_timestamp(&row.get::<String, _>("create_time"))?,
        start_time: parse_optional_timestamp(row.get("start_time"))?,
        end_time: parse_optional_timestamp(row.get("end_time"))?,
        execution_context: context,
        failure_exceptions: failures,
        step_executions: Vec::new(),
        version: row.get("version"),
    })
}

fn row_to_step_execution(row: &SqliteRow) -> Result<StepExecution> {
    let context: ExecutionContext = serde_json::from_str(&row.get::<String, _>("context"))?;
    let failures: Vec<String> = serde_json::from_str(&row.get::<String, _>("failures"))?;

    Ok(StepExecution {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        step_name: row.get("step_name"),
        job_execution_id: parse_uuid(&row.get::<String, _>("job_execution_id"))?,
        status: parse_status(&row.get::<String, _>("status"))?,
        exit_status: ExitStatus::new(row.get::<String, _>("exit_code"))
            .add_description(row.get::<String, _>("exit_description")),
        read_count: row.get::<i64, _>("read_count") as u64,
        write_count: row.get::<i64, _>("write_count") as u64,
        filter_count: row.get::<i64, _>("filter_count") as u64,
        skip_count: row.get::<i64, _>("skip_count") as u64,
        commit_count: row.get::<i64, _>("commit_count") as u64,
        rollback_count: row.get::<i64, _>("rollback_count") as u64,
        execution_context: context,
        failure_exceptions: failures,
        start_time: parse_timestamp(&row.get::<String, _>("start_time"))?,
        end_time: parse_optional_timestamp(row.get("end_time"))?,
        version: row.get("version"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn params(day: i64) -> JobParameters {
        JobParameters::builder().long("day", day).build()
    }

    #[tokio::test]
    async fn test_duplicate_instance_rejected() {
        let repository = SqliteRepository::in_memory().await.unwrap();

        repository
            .create_job_instance("import", &params(1))
            .await
            .unwrap();
        let err = repository
            .create_job_instance("import", &params(1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateJobInstance { .. }));

        // Different identifying parameters are a different instance
        repository
            .create_job_instance("import", &params(2))
            .await
            .unwrap();
        // Same parameters under a different job name are fine too
        repository
            .create_job_instance("export", &params(1))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_find_instance() {
        let repository = SqliteRepository::in_memory().await.unwrap();

        assert!(repository
            .find_job_instance("import", &params(1))
            .await
            .unwrap()
            .is_none());

        let created = repository
            .create_job_instance("import", &params(1))
            .await
            .unwrap();
        let found = repository
            .find_job_instance("import", &params(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, created.id);
    }

    #[tokio::test]
    async fn test_second_running_execution_rejected() {
        let repository = SqliteRepository::in_memory().await.unwrap();
        let instance = repository
            .create_job_instance("import", &params(1))
            .await
            .unwrap();

        let mut first = repository
            .create_job_execution(&instance, &params(1))
            .await
            .unwrap();
        let err = repository
            .create_job_execution(&instance, &params(1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::JobExecutionAlreadyRunning(_)));

        // Once the first attempt reaches a terminal status a new one is allowed
        first.status = BatchStatus::Failed;
        first.end_time = Some(Utc::now());
        repository.update_job_execution(&mut first).await.unwrap();
        repository
            .create_job_execution(&instance, &params(1))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_execution_creation_excludes_one() {
        let repository = Arc::new(SqliteRepository::in_memory().await.unwrap());
        let instance = repository
            .create_job_instance("import", &params(1))
            .await
            .unwrap();

        let first_params = params(1);
        let second_params = params(1);
        let (a, b) = tokio::join!(
            repository.create_job_execution(&instance, &first_params),
            repository.create_job_execution(&instance, &second_params),
        );

        let succeeded = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(succeeded, 1);
        for result in [a, b] {
            if let Err(e) = result {
                assert!(matches!(e, StoreError::JobExecutionAlreadyRunning(_)));
            }
        }
    }

    #[tokio::test]
    async fn test_stale_job_execution_update_detected() {
        let repository = SqliteRepository::in_memory().await.unwrap();
        let instance = repository
            .create_job_instance("import", &params(1))
            .await
            .unwrap();
        let execution = repository
            .create_job_execution(&instance, &params(1))
            .await
            .unwrap();

        let mut winner = execution.clone();
        let mut loser = execution;

        winner.status = BatchStatus::Started;
        repository.update_job_execution(&mut winner).await.unwrap();
        assert_eq!(winner.version, 1);

        loser.status = BatchStatus::Failed;
        let err = repository.update_job_execution(&mut loser).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::StaleState {
                expected: 0,
                found: 1,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_checkpoint_round_trip() {
        let repository = SqliteRepository::in_memory().await.unwrap();
        let instance = repository
            .create_job_instance("import", &params(1))
            .await
            .unwrap();
        let execution = repository
            .create_job_execution(&instance, &params(1))
            .await
            .unwrap();

        let mut step = StepExecution::new("load", execution.id);
        repository.save_step_execution(&mut step).await.unwrap();

        step.status = BatchStatus::Started;
        step.read_count = 10;
        step.write_count = 10;
        step.commit_count = 2;
        step.execution_context.put_i64("reader.offset", 10);
        repository.update_step_execution(&mut step).await.unwrap();

        let restored = repository
            .last_step_execution(&instance, "load")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(restored.id, step.id);
        assert_eq!(restored.read_count, 10);
        assert_eq!(restored.commit_count, 2);
        assert_eq!(restored.execution_context.get_i64("reader.offset"), Some(10));
        assert_eq!(restored.version, 1);
    }

    #[tokio::test]
    async fn test_stale_step_execution_update_detected() {
        let repository = SqliteRepository::in_memory().await.unwrap();
        let instance = repository
            .create_job_instance("import", &params(1))
            .await
            .unwrap();
        let execution = repository
            .create_job_execution(&instance, &params(1))
            .await
            .unwrap();

        let mut step = StepExecution::new("load", execution.id);
        repository.save_step_execution(&mut step).await.unwrap();

        let mut stale = step.clone();
        step.read_count = 5;
        repository.update_step_execution(&mut step).await.unwrap();

        stale.read_count = 3;
        let err = repository.update_step_execution(&mut stale).await.unwrap_err();
        assert!(matches!(err, StoreError::StaleState { .. }));
    }

    #[tokio::test]
    async fn test_last_and_count_span_executions() {
        let repository = SqliteRepository::in_memory().await.unwrap();
        let instance = repository
            .create_job_instance("import", &params(1))
            .await
            .unwrap();

        // First attempt fails
        let mut first = repository
            .create_job_execution(&instance, &params(1))
            .await
            .unwrap();
        let mut step = StepExecution::new("load", first.id);
        step.status = BatchStatus::Failed;
        step.read_count = 4;
        repository.save_step_execution(&mut step).await.unwrap();
        first.status = BatchStatus::Failed;
        repository.update_job_execution(&mut first).await.unwrap();

        // Second attempt succeeds
        let second = repository
            .create_job_execution(&instance, &params(1))
            .await
            .unwrap();
        let mut retry = StepExecution::new("load", second.id);
        retry.status = BatchStatus::Completed;
        retry.read_count = 6;
        repository.save_step_execution(&mut retry).await.unwrap();

        let last = repository
            .last_step_execution(&instance, "load")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(last.id, retry.id);
        assert_eq!(last.read_count, 6);

        let count = repository
            .step_execution_count(&instance, "load")
            .await
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(
            repository
                .step_execution_count(&instance, "other")
                .await
                .unwrap(),
            0
        );

        let last_execution = repository
            .last_job_execution(&instance)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(last_execution.id, second.id);
    }
}
