//! Job repository for batchframe
//!
//! Durable, ACID-consistent record keeping for job instances, job
//! executions, step executions, and their execution contexts.
//!
//! # Modules
//!
//! - `repository`: the backend-agnostic [`JobRepository`] contract
//! - `sqlite`: SQLx/SQLite implementation
//! - `error`: error types and Result alias

pub mod error;
pub mod repository;
pub mod sqlite;

// Re-exports
pub use error::{Result, StoreError};
pub use repository::JobRepository;
pub use sqlite::SqliteRepository;
