//! Token-bucket-by-interval rate limiter with FIFO admission ordering.
//!
//! A plain struct with explicit state and `Instant`-driven transitions,
//! implementing the interval-spacing model instead of failure counting. The
//! clock is injectable so tests can assert exact sleep durations without
//! waiting on a real wall clock.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[async_trait]
pub trait LimiterClock: Send + Sync {
    fn now(&self) -> Instant;
    async fn sleep(&self, duration: Duration);
}

pub struct SystemClock;

#[async_trait]
impl LimiterClock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Spaces admissions at least `interval` apart. Callers queue on an internal
/// mutex, which Tokio serves FIFO, so admission order matches arrival order.
pub struct RateLimiter {
    interval: Duration,
    last_admission: Mutex<Option<Instant>>,
    clock: Arc<dyn LimiterClock>,
}

impl RateLimiter {
    pub fn new(rpm: u32) -> Self {
        Self::with_clock(rpm, Arc::new(SystemClock))
    }

    pub fn with_clock(rpm: u32, clock: Arc<dyn LimiterClock>) -> Self {
        let rpm = rpm.max(1);
        Self {
            interval: Duration::from_secs_f64(60.0 / rpm as f64),
            last_admission: Mutex::new(None),
            clock,
        }
    }

    /// Blocks until this caller is admitted. Holding the mutex across the
    /// sleep is deliberate: it is what gives FIFO ordering among waiters
    /// instead of a thundering-herd race on wakeup.
    pub async fn acquire(&self) -> Duration {
        let mut last = self.last_admission.lock().await;
        let now = self.clock.now();
        match *last {
            None => {
                *last = Some(now);
                Duration::ZERO
            }
            Some(previous) => {
                let earliest = previous + self.interval;
                if now < earliest {
                    let wait = earliest - now;
                    tracing::debug!(wait_ms = wait.as_millis() as u64, "rate limiter delaying admission");
                    self.clock.sleep(wait).await;
                    *last = Some(self.clock.now());
                    wait
                } else {
                    *last = Some(now);
                    Duration::ZERO
                }
            }
        }
    }
}
