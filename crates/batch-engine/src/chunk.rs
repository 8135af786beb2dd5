//! Chunk-oriented step
//!
//! Transactional bulk transfer of items from a reader to a writer in
//! bounded groups. One chunk is one transaction: its counts and the
//! reader's offset are persisted in the same checkpoint commit, and a
//! failed chunk leaves no trace in the step's committed state. The chunk
//! boundary is also the only point where a stop request is honored.

use crate::error::Result;
use crate::item::{ItemProcessor, ItemReader, ItemWriter};
use crate::policy::{NeverRetry, NeverSkip, RetryPolicy, SkipPolicy};
use crate::step::{Step, StepResult};
use crate::stop::StopHandle;
use crate::support::PassthroughProcessor;
use async_trait::async_trait;
use batch_core::StepExecution;
use batch_store::JobRepository;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const DEFAULT_CHUNK_SIZE: usize = 10;

/// Counts staged for one chunk, applied to the step execution only when
/// the chunk commits. Dropping the tally is the rollback.
#[derive(Default)]
struct ChunkTally {
    read: u64,
    written: u64,
    filtered: u64,
    skipped: u64,
    rollbacks: u64,
}

impl ChunkTally {
    fn is_zero(&self) -> bool {
        self.read == 0
            && self.written == 0
            && self.filtered == 0
            && self.skipped == 0
            && self.rollbacks == 0
    }
}

/// A step that drives a read -> process -> write loop in fixed-size
/// chunks with per-item skip and per-chunk retry policies.
pub struct ChunkStep<I, O> {
    name: String,
    chunk_size: usize,
    reader: Mutex<Box<dyn ItemReader<I>>>,
    processor: Box<dyn ItemProcessor<I, O>>,
    writer: Mutex<Box<dyn ItemWriter<O>>>,
    skip_policy: Box<dyn SkipPolicy>,
    retry_policy: Box<dyn RetryPolicy>,
    allow_start_if_complete: bool,
    start_limit: Option<u64>,
}

impl<I, O> ChunkStep<I, O>
where
    I: Send + 'static,
    O: Send + Sync + 'static,
{
    pub fn with_processor(
        name: &str,
        reader: impl ItemReader<I> + 'static,
        processor: impl ItemProcessor<I, O> + 'static,
        writer: impl ItemWriter<O> + 'static,
    ) -> Self {
        Self {
            name: name.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            reader: Mutex::new(Box::new(reader)),
            processor: Box::new(processor),
            writer: Mutex::new(Box::new(writer)),
            skip_policy: Box::new(NeverSkip),
            retry_policy: Box::new(NeverRetry),
            allow_start_if_complete: false,
            start_limit: None,
        }
    }

    /// Chunk size doubles as the commit interval; there is no partial
    /// commit within a chunk.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_skip_policy(mut self, policy: impl SkipPolicy + 'static) -> Self {
        self.skip_policy = Box::new(policy);
        self
    }

    pub fn with_retry_policy(mut self, policy: impl RetryPolicy + 'static) -> Self {
        self.retry_policy = Box::new(policy);
        self
    }

    pub fn with_allow_start_if_complete(mut self, allow: bool) -> Self {
        self.allow_start_if_complete = allow;
        self
    }

    pub fn with_start_limit(mut self, limit: u64) -> Self {
        self.start_limit = Some(limit);
        self
    }

    /// Write one chunk: whole-batch retry per the retry policy, then,
    /// when the failure is skip-eligible, degrade to item-by-item writes
    /// so the failing item can be isolated. An unskippable failure aborts
    /// the chunk before any single write reaches the sink, keeping the
    /// chunk all-or-nothing so a restart cannot rewrite items the sink
    /// already accepted.
    async fn write_chunk(
        &self,
        writer: &mut dyn ItemWriter<O>,
        outputs: &[O],
        step_execution: &StepExecution,
        tally: &mut ChunkTally,
        retry_count: &mut u64,
    ) -> anyhow::Result<()> {
        loop {
            match writer.write(outputs).await {
                Ok(()) => {
                    tally.written += outputs.len() as u64;
                    return Ok(());
                }
                Err(e) => {
                    tally.rollbacks += 1;
                    if self.retry_policy.should_retry(&e, *retry_count) {
                        *retry_count += 1;
                        warn!(
                            step_name = %self.name,
                            error = %e,
                            retry = *retry_count,
                            "Chunk write failed; retrying whole batch"
                        );
                        continue;
                    }
                    if !self
                        .skip_policy
                        .should_skip(&e, step_execution.skip_count + tally.skipped)
                    {
                        return Err(e.context("unrecoverable write failure"));
                    }
                    warn!(
                        step_name = %self.name,
                        error = %e,
                        "Chunk write failed; degrading to item-by-item writes"
                    );
                    return self.write_singles(writer, outputs, step_execution, tally).await;
                }
            }
        }
    }

    async fn write_singles(
        &self,
        writer: &mut dyn ItemWriter<O>,
        outputs: &[O],
        step_execution: &StepExecution,
        tally: &mut ChunkTally,
    ) -> anyhow::Result<()> {
        for item in outputs {
            match writer.write(std::slice::from_ref(item)).await {
                Ok(()) => tally.written += 1,
                Err(e) => {
                    if self
                        .skip_policy
                        .should_skip(&e, step_execution.skip_count + tally.skipped)
                    {
                        debug!(step_name = %self.name, error = %e, "Skipping unwritable item");
                        tally.skipped += 1;
                    } else {
                        return Err(e.context("unrecoverable write failure"));
                    }
                }
            }
        }
        Ok(())
    }
}

impl<I> ChunkStep<I, I>
where
    I: Send + Sync + 'static,
{
    /// A chunk step with no transform.
    pub fn new(
        name: &str,
        reader: impl ItemReader<I> + 'static,
        writer: impl ItemWriter<I> + 'static,
    ) -> Self {
        Self::with_processor(name, reader, PassthroughProcessor::new(), writer)
    }
}

#[async_trait]
impl<I, O> Step for ChunkStep<I, O>
where
    I: Send + 'static,
    O: Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn allow_start_if_complete(&self) -> bool {
        self.allow_start_if_complete
    }

    fn start_limit(&self) -> Option<u64> {
        self.start_limit
    }

    async fn execute(
        &self,
        step_execution: &mut StepExecution,
        repository: &dyn JobRepository,
        stop: &StopHandle,
    ) -> Result<StepResult> {
        let mut reader = self.reader.lock().await;
        let mut writer = self.writer.lock().await;

        if let Err(e) = reader.open(&step_execution.execution_context).await {
            return Ok(StepResult::Failed(e.context("failed to open item reader")));
        }

        // Retry count is cumulative across chunks within one attempt
        let mut retry_count: u64 = 0;

        let outcome = loop {
            if stop.is_stop_requested() {
                info!(step_name = %self.name, "Stop requested; halting at chunk boundary");
                break StepResult::Stopped;
            }

            // Read phase: up to chunk_size items, finalized early on
            // exhaustion
            let mut tally = ChunkTally::default();
            let mut inputs: Vec<I> = Vec::with_capacity(self.chunk_size);
            let mut exhausted = false;
            let read_failure = loop {
                if inputs.len() >= self.chunk_size {
                    break None;
                }
                match reader.read().await {
                    Ok(Some(item)) => {
                        tally.read += 1;
                        inputs.push(item);
                    }
                    Ok(None) => {
                        exhausted = true;
                        break None;
                    }
                    Err(e) => {
                        if self
                            .skip_policy
                            .should_skip(&e, step_execution.skip_count + tally.skipped)
                        {
                            debug!(step_name = %self.name, error = %e, "Skipping unreadable item");
                            tally.skipped += 1;
                        } else {
                            break Some(e);
                        }
                    }
                }
            };
            if let Some(e) = read_failure {
                step_execution.rollback_count += 1;
                break StepResult::Failed(e.context("unrecoverable read failure"));
            }

            // Process phase
            let mut outputs: Vec<O> = Vec::with_capacity(inputs.len());
            let mut process_failure = None;
            for item in inputs {
                match self.processor.process(item).await {
                    Ok(Some(output)) => outputs.push(output),
                    Ok(None) => tally.filtered += 1,
                    Err(e) => {
                        if self
                            .skip_policy
                            .should_skip(&e, step_execution.skip_count + tally.skipped)
                        {
                            debug!(step_name = %self.name, error = %e, "Skipping item failed in processor");
                            tally.skipped += 1;
                        } else {
                            process_failure = Some(e);
                            break;
                        }
                    }
                }
            }
            if let Some(e) = process_failure {
                step_execution.rollback_count += 1;
                break StepResult::Failed(e.context("unrecoverable processing failure"));
            }

            // Write phase
            if !outputs.is_empty() {
                if let Err(e) = self
                    .write_chunk(
                        &mut **writer,
                        &outputs,
                        step_execution,
                        &mut tally,
                        &mut retry_count,
                    )
                    .await
                {
                    step_execution.rollback_count += 1;
                    break StepResult::Failed(e);
                }
            }

            // Checkpoint commit: counts and the reader offset persist in
            // the same repository transaction
            if !tally.is_zero() {
                step_execution.read_count += tally.read;
                step_execution.write_count += tally.written;
                step_execution.filter_count += tally.filtered;
                step_execution.skip_count += tally.skipped;
                step_execution.rollback_count += tally.rollbacks;
                step_execution.commit_count += 1;
                reader.update(&mut step_execution.execution_context);
                repository.update_step_execution(step_execution).await?;
                debug!(
                    step_name = %self.name,
                    commit_count = step_execution.commit_count,
                    read_count = step_execution.read_count,
                    write_count = step_execution.write_count,
                    "Chunk committed"
                );
            }

            if exhausted {
                break StepResult::Complete;
            }
        };

        if let Err(e) = reader.close().await {
            warn!(step_name = %self.name, error = %e, "Failed to close item reader");
        }
        Ok(outcome)
    }
}
