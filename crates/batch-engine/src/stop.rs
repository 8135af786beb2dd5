//! Cooperative stop signal
//!
//! A stop request sets a flag that running steps observe at chunk
//! boundaries only. The in-flight chunk completes or rolls back; nothing
//! is preempted mid-transaction.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cloneable handle used to request a cooperative stop.
#[derive(Clone, Debug, Default)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop. Observed at the next chunk boundary.
    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_visible_through_clones() {
        let handle = StopHandle::new();
        let observer = handle.clone();
        assert!(!observer.is_stop_requested());
        handle.stop();
        assert!(observer.is_stop_requested());
    }
}
