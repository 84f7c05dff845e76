//! Injectable sleeping for timed-retry loops

use std::sync::Mutex;
use std::time::Duration;

/// Something that can suspend the current thread
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Real wall-clock sleeping
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Records requested sleeps and returns immediately.
///
/// Lets poll loops be exercised at full attempt counts without waiting.
#[derive(Debug, Default)]
pub struct ManualSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every duration requested so far, in order
    pub fn recorded(&self) -> Vec<Duration> {
        self.sleeps.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.sleeps.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Sum of all requested sleeps
    pub fn total(&self) -> Duration {
        self.recorded().iter().sum()
    }
}

impl Sleeper for ManualSleeper {
    fn sleep(&self, duration: Duration) {
        if let Ok(mut sleeps) = self.sleeps.lock() {
            sleeps.push(duration);
        }
    }
}
