//! Core domain model for batchframe
//!
//! # Modules
//!
//! - `parameters`: typed job parameters with identifying/non-identifying flags
//! - `context`: serializable execution context for checkpoint state
//! - `status`: `BatchStatus` state machine and `ExitStatus` outcome codes
//! - `execution`: `JobInstance`, `JobExecution`, `StepExecution` records

pub mod context;
pub mod execution;
pub mod parameters;
pub mod status;

// Re-exports
pub use context::ExecutionContext;
pub use execution::{JobExecution, JobInstance, StepExecution};
pub use parameters::{JobParameter, JobParameters, JobParametersBuilder, ParameterValue};
pub use status::{BatchStatus, ExitStatus};
