//! Sliding-window limiter for outbound Pipedrive calls.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Budget documented by Pipedrive for token-based access: 40 requests
/// every 2 seconds.
pub const DEFAULT_MAX_REQUESTS: usize = 40;
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(2000);

/// Extra sleep past the window edge so a woken caller lands on a freed
/// slot instead of re-checking right on the boundary.
const WAKE_BUFFER: Duration = Duration::from_millis(100);

/// Tracks the instants of recent calls and makes callers wait until fewer
/// than `max_requests` of them fall inside the trailing window.
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    timestamps: Mutex<Vec<Instant>>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window,
            timestamps: Mutex::new(Vec::new()),
        }
    }

    /// Wait until a call slot is free, then claim it.
    ///
    /// After sleeping the caller re-checks the window: another task may
    /// have claimed the freed slot in the meantime.
    pub async fn wait_for_slot(&self) {
        loop {
            let wait = {
                let mut stamps = self.timestamps.lock().await;
                let now = Instant::now();
                stamps.retain(|t| now.duration_since(*t) < self.window);

                if stamps.len() < self.max_requests {
                    stamps.push(now);
                    return;
                }

                // Oldest surviving call defines when a slot opens up.
                self.window - now.duration_since(stamps[0]) + WAKE_BUFFER
            };
            tokio::time::sleep(wait).await;
        }
    }

    /// Calls recorded within the trailing window right now.
    pub async fn request_count(&self) -> usize {
        let mut stamps = self.timestamps.lock().await;
        let now = Instant::now();
        stamps.retain(|t| now.duration_since(*t) < self.window);
        stamps.len()
    }

    /// Forget every recorded call.
    pub async fn reset(&self) {
        self.timestamps.lock().await.clear();
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW)
    }
}
