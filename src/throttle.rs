use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Minimum spacing between successive evaluator calls.
#[derive(Debug)]
pub struct RateLimit {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimit {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Waits until a call is allowed, then records it.
    pub async fn acquire(&self) {
        let mut last_call = self.last_call.lock().await;
        if let Some(previous) = *last_call {
            tokio::time::sleep_until(previous + self.min_interval).await;
        }
        *last_call = Some(Instant::now());
    }
}
