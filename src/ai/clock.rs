//! Injectable Clock
//!
//! All time observation and timed delays in the orchestration layer go
//! through this trait so tests can simulate minutes of elapsed time
//! without real waits. Backoff, batch pacing, rate windows, and the quota
//! TTL all read the same clock.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local};

/// Time source and scheduler for the orchestration layer
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current wall-clock time (local, for calendar-anchored day windows)
    fn now(&self) -> DateTime<Local>;

    /// Cooperative suspension for the given duration
    async fn sleep(&self, duration: Duration);
}

pub type SharedClock = Arc<dyn Clock>;

/// Real clock backed by the system time and the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Manually advanced clock for tests
///
/// `sleep` returns immediately after advancing the simulated time, so a
/// test run through minutes of backoff finishes in microseconds.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Local>>,
    slept: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Local>) -> Self {
        Self {
            now: Mutex::new(start),
            slept: Mutex::new(Vec::new()),
        }
    }

    /// Start at the current system time
    pub fn from_system() -> Self {
        Self::new(Local::now())
    }

    /// Advance the simulated time
    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::zero());
    }

    /// Every duration passed to `sleep`, in call order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.slept.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn sleep(&self, duration: Duration) {
        self.slept
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(duration);
        self.advance(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_manual_clock_advances_on_sleep() {
        let clock = ManualClock::from_system();
        let before = clock.now();
        clock.sleep(Duration::from_secs(90)).await;
        let after = clock.now();
        assert_eq!((after - before).num_seconds(), 90);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(90)]);
    }

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::from_system();
        let before = clock.now();
        clock.advance(Duration::from_secs(300));
        assert_eq!((clock.now() - before).num_seconds(), 300);
        assert!(clock.sleeps().is_empty());
    }
}
