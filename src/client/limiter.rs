//! Service-wide rate limiter
//!
//! The harvester talks to a single remote service, so one limiter spaces all
//! requests regardless of which worker issues them. The reservation state is
//! the only hot-path data shared between workers and is guarded by a mutex;
//! the sleep itself happens outside the lock.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Enforces a minimum interval between remote requests
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter; a zero interval disables spacing entirely
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_slot: Mutex::new(None),
        }
    }

    /// Waits until this caller's reserved request slot arrives.
    ///
    /// Each caller atomically reserves the next free slot, so concurrent
    /// workers are spaced `min_interval` apart in reservation order.
    pub async fn acquire(&self) {
        if self.min_interval.is_zero() {
            return;
        }

        let wake = {
            let mut next_slot = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match *next_slot {
                Some(slot) if slot > now => slot,
                _ => now,
            };
            *next_slot = Some(slot + self.min_interval);
            slot
        };

        tokio::time::sleep_until(wake).await;
    }
}
