//! Item contracts
//!
//! The three collaborator seams of a chunk-oriented step. Implementations
//! live outside the engine; the engine only requires:
//! - readers are lazy, finite, and restartable from a saved context
//! - writers accept a batch and fail atomically per call
//! - processors are per-item transforms that may drop an item by
//!   returning `None` (filtered, not an error)

use anyhow::Result;
use async_trait::async_trait;
use batch_core::ExecutionContext;

/// Produces a lazy, finite sequence of items.
#[async_trait]
pub trait ItemReader<I>: Send {
    /// Restore position from a context persisted by a prior attempt.
    /// Called once before the first read of a step attempt.
    async fn open(&mut self, _ctx: &ExecutionContext) -> Result<()> {
        Ok(())
    }

    /// The next item, or `None` once the source is exhausted. Exhaustion
    /// is a sentinel, not an error.
    async fn read(&mut self) -> Result<Option<I>>;

    /// Record the current position into the context. Called immediately
    /// before each checkpoint commit, so the persisted offset always
    /// matches the committed items.
    fn update(&self, _ctx: &mut ExecutionContext) {}

    /// Release resources. Called after the last read of a step attempt.
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Transforms one item; `Ok(None)` drops the item without error.
#[async_trait]
pub trait ItemProcessor<I, O>: Send + Sync {
    async fn process(&self, item: I) -> Result<Option<O>>;
}

/// Accepts an ordered batch of items; each call is all-or-nothing.
#[async_trait]
pub trait ItemWriter<O>: Send {
    async fn write(&mut self, items: &[O]) -> Result<()>;
}
