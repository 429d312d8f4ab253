//! Advisory operation lock with a bounded wait
//!
//! Serializes selection operations arriving from concurrent triggers (UI,
//! remote control, queue-ended auto-advance, watchdog). A waiter polls at a
//! short interval; once the wait ceiling is reached the holder is presumed
//! wedged and the lock is taken over anyway, trading strict mutual
//! exclusion for liveness. The lock is a value owned by its engine, never
//! process-global state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::warn;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);
pub const DEFAULT_WAIT_CEILING: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub struct OperationLock {
    held: AtomicBool,
    poll_interval: Duration,
    wait_ceiling: Duration,
}

impl OperationLock {
    pub fn new() -> Self {
        Self::with_timing(DEFAULT_POLL_INTERVAL, DEFAULT_WAIT_CEILING)
    }

    pub fn with_timing(poll_interval: Duration, wait_ceiling: Duration) -> Self {
        Self {
            held: AtomicBool::new(false),
            poll_interval,
            wait_ceiling,
        }
    }

    /// Wait for the lock, forcing a takeover once the ceiling is reached.
    ///
    /// After a takeover the displaced holder's guard still clears the flag
    /// on drop, so a later waiter may slip in early; that window only opens
    /// after a holder has already blown the ceiling.
    pub async fn acquire(&self) -> LockGuard<'_> {
        let start = Instant::now();

        loop {
            if self
                .held
                .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return LockGuard { lock: self };
            }

            if start.elapsed() >= self.wait_ceiling {
                warn!(
                    "Operation lock held past {:?}, forcing takeover",
                    self.wait_ceiling
                );
                self.held.store(true, Ordering::Release);
                return LockGuard { lock: self };
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

impl Default for OperationLock {
    fn default() -> Self {
        Self::new()
    }
}

/// Releases the lock when dropped, whether the operation finished or not
pub struct LockGuard<'a> {
    lock: &'a OperationLock,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.lock.held.store(false, Ordering::Release);
    }
}
