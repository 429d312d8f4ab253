//! Trigger debouncing
//!
//! Rapid repeated next/previous triggers (double-tapped buttons, chattering
//! remote controls) are coalesced at the command boundary: within the
//! window only the first trigger reaches the engine. The engine itself
//! stays free of timing concerns.

use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub struct Debounce {
    window: Duration,
    last_accepted: Mutex<Option<Instant>>,
}

impl Debounce {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_accepted: Mutex::new(None),
        }
    }

    /// True if the trigger should proceed; false if it falls inside the
    /// window of the previously accepted trigger.
    pub async fn allow(&self) -> bool {
        let mut last = self.last_accepted.lock().await;
        let now = Instant::now();

        match *last {
            Some(prev) if now.duration_since(prev) < self.window => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }
}
