use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Job instance already exists: {job_name} [{instance_key}]")]
    DuplicateJobInstance {
        job_name: String,
        instance_key: String,
    },
    #[error("A job execution for instance {0} is already running")]
    JobExecutionAlreadyRunning(Uuid),
    #[error("Stale {entity} {id}: expected version {expected}, stored version {found}")]
    StaleState {
        entity: &'static str,
        id: Uuid,
        expected: i64,
        found: i64,
    },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid status value in store: {0}")]
    InvalidStatus(String),
    #[error("Invalid timestamp in store: {0}")]
    InvalidTimestamp(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
