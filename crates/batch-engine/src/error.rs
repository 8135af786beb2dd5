use batch_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Job instance for '{0}' has already completed; use different identifying parameters or force a restart")]
    JobInstanceAlreadyComplete(String),
    #[error("Job '{0}' is not restartable and has a prior execution")]
    JobNotRestartable(String),
    #[error("Job '{0}' has no steps")]
    EmptyJob(String),
    #[error("Transition from step '{from}' references unknown step '{to}'")]
    UnknownStep { from: String, to: String },
    #[error("Duplicate step name '{0}' in job definition")]
    DuplicateStep(String),
    #[error("Transition declared from unknown step '{0}'")]
    UnknownTransitionSource(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
