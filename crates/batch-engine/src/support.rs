//! Ready-made item implementations
//!
//! Small building blocks used in tests and simple jobs: an in-memory
//! reader that checkpoints its position, a writer that collects batches,
//! and processor adapters.

use crate::item::{ItemProcessor, ItemReader, ItemWriter};
use anyhow::Result;
use async_trait::async_trait;
use batch_core::ExecutionContext;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

/// Reads from an in-memory list, checkpointing its position under
/// `<name>.position` so a restarted attempt resumes where the last
/// committed chunk ended.
pub struct VecReader<I> {
    key: String,
    items: Vec<I>,
    position: usize,
}

impl<I> VecReader<I> {
    pub fn new(name: &str, items: Vec<I>) -> Self {
        Self {
            key: format!("{}.position", name),
            items,
            position: 0,
        }
    }
}

#[async_trait]
impl<I: Clone + Send + Sync> ItemReader<I> for VecReader<I> {
    async fn open(&mut self, ctx: &ExecutionContext) -> Result<()> {
        self.position = ctx.get_i64(&self.key).unwrap_or(0) as usize;
        Ok(())
    }

    async fn read(&mut self) -> Result<Option<I>> {
        if self.position < self.items.len() {
            let item = self.items[self.position].clone();
            self.position += 1;
            Ok(Some(item))
        } else {
            Ok(None)
        }
    }

    fn update(&self, ctx: &mut ExecutionContext) {
        ctx.put_i64(&self.key, self.position as i64);
    }
}

/// Collects written batches in memory, preserving batch boundaries.
pub struct VecWriter<O> {
    batches: Arc<Mutex<Vec<Vec<O>>>>,
}

impl<O> VecWriter<O> {
    pub fn new() -> Self {
        Self {
            batches: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shared handle to the collected batches.
    pub fn batches(&self) -> Arc<Mutex<Vec<Vec<O>>>> {
        Arc::clone(&self.batches)
    }
}

impl<O> Default for VecWriter<O> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<O: Clone + Send + Sync> ItemWriter<O> for VecWriter<O> {
    async fn write(&mut self, items: &[O]) -> Result<()> {
        self.batches
            .lock()
            .expect("writer mutex poisoned")
            .push(items.to_vec());
        Ok(())
    }
}

/// Identity processor for steps with no transform.
pub struct PassthroughProcessor<I> {
    _marker: PhantomData<fn(I) -> I>,
}

impl<I> PassthroughProcessor<I> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<I> Default for PassthroughProcessor<I> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<I: Send + 'static> ItemProcessor<I, I> for PassthroughProcessor<I> {
    async fn process(&self, item: I) -> Result<Option<I>> {
        Ok(Some(item))
    }
}

/// Processor wrapping a plain function.
pub struct FnProcessor<I, O> {
    f: Box<dyn Fn(I) -> Result<Option<O>> + Send + Sync>,
}

impl<I, O> FnProcessor<I, O> {
    pub fn new(f: impl Fn(I) -> Result<Option<O>> + Send + Sync + 'static) -> Self {
        Self { f: Box::new(f) }
    }
}

#[async_trait]
impl<I: Send + 'static, O: Send> ItemProcessor<I, O> for FnProcessor<I, O> {
    async fn process(&self, item: I) -> Result<Option<O>> {
        (self.f)(item)
    }
}
