//! Rate-limited logging utilities.
//!
//! Provides `LogThrottle` to prevent log storms while still tracking suppressed messages.

use std::time::{Duration, Instant};

/// A lightweight rate limiter for logging to prevent log storms.
#[derive(Debug)]
pub struct LogThrottle {
    last_log_time: Option<Instant>,
    suppressed_count: u64,
    interval: Duration,
}

impl LogThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            last_log_time: None,
            suppressed_count: 0,
            interval,
        }
    }

    /// Returns true if the interval has passed since the last emitted log,
    /// otherwise counts the message as suppressed.
    pub fn should_log(&mut self) -> bool {
        let now = Instant::now();
        match self.last_log_time {
            Some(last) if now.duration_since(last) < self.interval => {
                self.suppressed_count += 1;
                false
            }
            _ => {
                self.last_log_time = Some(now);
                true
            }
        }
    }

    /// Number of messages suppressed since the last emitted one. Resets the counter.
    pub fn get_and_reset_suppressed_count(&mut self) -> u64 {
        std::mem::take(&mut self.suppressed_count)
    }
}
