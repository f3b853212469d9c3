use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Minimum spacing between verification calls, shared by every Stage 3 worker.
///
/// Each caller claims the next free slot and sleeps until it arrives, so the aggregate call
/// rate stays at one per `min_interval` no matter how many workers are running.
#[derive(Debug)]
pub struct RateGovernor {
    min_interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RateGovernor {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_slot: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Waits for the next call slot.
    pub async fn acquire(&self) {
        if self.min_interval.is_zero() {
            return;
        }

        let slot = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = next.map_or(now, |n| n.max(now));
            *next = Some(slot + self.min_interval);
            slot
        };

        tokio::time::sleep_until(slot).await;
    }
}
