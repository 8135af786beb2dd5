//! Skip and retry policies
//!
//! Pluggable decision functions governing per-item fault tolerance. Both
//! counts are scoped to one step attempt: a limit of L permits the first
//! L occurrences and fails on the L+1-th.

use anyhow::Error;

/// Decides whether a failed item may be excluded from its chunk.
pub trait SkipPolicy: Send + Sync {
    /// `skip_count` is the number of items already skipped in this step
    /// attempt. Returning `false` fails the step.
    fn should_skip(&self, error: &Error, skip_count: u64) -> bool;
}

/// Decides whether a failed chunk write may be re-attempted.
pub trait RetryPolicy: Send + Sync {
    /// `retry_count` is the number of retries already consumed in this
    /// step attempt. Returning `false` stops retrying.
    fn should_retry(&self, error: &Error, retry_count: u64) -> bool;
}

/// Every item failure fails the step.
pub struct NeverSkip;

impl SkipPolicy for NeverSkip {
    fn should_skip(&self, _error: &Error, _skip_count: u64) -> bool {
        false
    }
}

/// Skip any error, without limit.
pub struct AlwaysSkip;

impl SkipPolicy for AlwaysSkip {
    fn should_skip(&self, _error: &Error, _skip_count: u64) -> bool {
        true
    }
}

/// Skip until the limit is reached.
pub struct LimitCheckingSkipPolicy {
    skip_limit: u64,
}

impl LimitCheckingSkipPolicy {
    pub fn new(skip_limit: u64) -> Self {
        Self { skip_limit }
    }
}

impl SkipPolicy for LimitCheckingSkipPolicy {
    fn should_skip(&self, _error: &Error, skip_count: u64) -> bool {
        skip_count < self.skip_limit
    }
}

/// A write failure immediately degrades or fails; no whole-chunk retry.
pub struct NeverRetry;

impl RetryPolicy for NeverRetry {
    fn should_retry(&self, _error: &Error, _retry_count: u64) -> bool {
        false
    }
}

/// Retry until the limit is reached.
pub struct LimitCheckingRetryPolicy {
    retry_limit: u64,
}

impl LimitCheckingRetryPolicy {
    pub fn new(retry_limit: u64) -> Self {
        Self { retry_limit }
    }
}

impl RetryPolicy for LimitCheckingRetryPolicy {
    fn should_retry(&self, _error: &Error, retry_count: u64) -> bool {
        retry_count < self.retry_limit
    }
}
