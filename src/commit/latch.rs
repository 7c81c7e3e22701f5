//! Commit acknowledgment
//!
//! A countdown latch shared between a synchronous caller and the commit
//! worker. The caller arms it once per emitted event, the worker counts it
//! down once per processed event, and the caller waits for zero.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::errors::{DbError, DbResult};

#[derive(Debug, Default)]
struct LatchState {
    remaining: usize,
    /// First failure reported by the worker
    error: Option<String>,
}

/// Countdown latch for commit acknowledgments
#[derive(Debug, Default)]
pub struct CommitLatch {
    state: Mutex<LatchState>,
    done: Condvar,
}

impl CommitLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expect one more acknowledgment. Must be called before the event is sent.
    pub fn arm(&self) {
        self.state.lock().remaining += 1;
    }

    /// Acknowledge one event, optionally with the failure that hit it
    pub fn count_down(&self, error: Option<String>) {
        let mut state = self.state.lock();
        if state.error.is_none() {
            state.error = error;
        }
        state.remaining = state.remaining.saturating_sub(1);
        if state.remaining == 0 {
            self.done.notify_all();
        }
    }

    pub fn remaining(&self) -> usize {
        self.state.lock().remaining
    }

    /// Wait until every armed event is acknowledged.
    ///
    /// `None` waits without bound. Expiry returns `CommitTimeout`; a worker
    /// failure returns `CommitFailed`. Either way the data is already on disk.
    pub fn wait(&self, timeout: Option<Duration>) -> DbResult<()> {
        let started = Instant::now();
        let deadline = timeout.map(|t| started + t);
        let mut state = self.state.lock();

        while state.remaining > 0 {
            match deadline {
                Some(deadline) => {
                    if self.done.wait_until(&mut state, deadline).timed_out() && state.remaining > 0 {
                        return Err(DbError::CommitTimeout {
                            waited_ms: started.elapsed().as_millis() as u64,
                        });
                    }
                }
                None => self.done.wait(&mut state),
            }
        }

        match state.error.take() {
            Some(reason) => Err(DbError::CommitFailed(reason)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_unarmed_latch_returns_immediately() {
        let latch = CommitLatch::new();
        assert!(latch.wait(Some(Duration::from_millis(1))).is_ok());
    }

    #[test]
    fn test_wait_for_all_acknowledgments() {
        let latch = Arc::new(CommitLatch::new());
        latch.arm();
        latch.arm();
        assert_eq!(latch.remaining(), 2);

        let worker = Arc::clone(&latch);
        let handle = thread::spawn(move || {
            worker.count_down(None);
            worker.count_down(None);
        });

        assert!(latch.wait(Some(Duration::from_secs(5))).is_ok());
        handle.join().unwrap();
        assert_eq!(latch.remaining(), 0);
    }

    #[test]
    fn test_timeout() {
        let latch = CommitLatch::new();
        latch.arm();

        let err = latch.wait(Some(Duration::from_millis(20))).unwrap_err();
        assert!(matches!(err, DbError::CommitTimeout { .. }));
        assert!(err.is_durability_warning());
    }

    #[test]
    fn test_first_failure_is_reported() {
        let latch = CommitLatch::new();
        latch.arm();
        latch.arm();
        latch.count_down(Some("remote rejected".into()));
        latch.count_down(Some("second".into()));

        match latch.wait(None) {
            Err(DbError::CommitFailed(reason)) => assert_eq!(reason, "remote rejected"),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
