//! Batch execution engine
//!
//! Runs restartable batch jobs against a durable [`batch_store`]
//! repository:
//!
//! - **Chunk-oriented steps**: read/process/write in bounded, committed
//!   chunks with skip and retry policies
//! - **Flow**: steps wired by an exit-code transition table with wildcard
//!   patterns
//! - **Restart**: completed steps are skipped, interrupted steps resume
//!   from their last committed checkpoint
//! - **Cooperative stop**: a stop request takes effect at the next chunk
//!   boundary

pub mod chunk;
pub mod error;
pub mod flow;
pub mod item;
pub mod job;
pub mod launcher;
pub mod policy;
pub mod step;
pub mod stop;
pub mod support;

// Engine surface
pub use chunk::ChunkStep;
pub use error::{EngineError, Result};
pub use flow::{ExitPattern, JobBuilder, JobDefinition, Transition, TransitionTarget};
pub use item::{ItemProcessor, ItemReader, ItemWriter};
pub use job::JobExecutor;
pub use launcher::{JobLauncher, LaunchedJob};
pub use policy::{
    AlwaysSkip, LimitCheckingRetryPolicy, LimitCheckingSkipPolicy, NeverRetry, NeverSkip,
    RetryPolicy, SkipPolicy,
};
pub use step::{Step, StepResult, StepRunner, Tasklet, TaskletStep};
pub use stop::StopHandle;
pub use support::{FnProcessor, PassthroughProcessor, VecReader, VecWriter};

// Re-exported so downstream code can depend on this crate alone
pub use batch_core::{
    BatchStatus, ExecutionContext, ExitStatus, JobExecution, JobInstance, JobParameters,
    JobParametersBuilder, StepExecution,
};
pub use batch_store::{JobRepository, SqliteRepository, StoreError};
