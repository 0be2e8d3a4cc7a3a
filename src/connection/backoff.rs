//! Reconnect backoff policy.

/// Linear backoff with a cap and an attempt budget.
///
/// The delay before attempt `n` (1-based) is `min(base_interval_ms * n,
/// max_interval_ms)`. Once more than `max_attempts` consecutive attempts
/// have failed the connection gives up and waits for an explicit `connect()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay unit for the first retry (milliseconds)
    pub base_interval_ms: u64,
    /// Maximum delay cap (milliseconds)
    pub max_interval_ms: u64,
    /// Failed attempts tolerated before giving up
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_interval_ms: 3_000, // 3 seconds
            max_interval_ms: 30_000, // 30 second cap
            max_attempts: 10,
        }
    }
}

impl ReconnectPolicy {
    /// Delay to wait before `attempt`.
    pub fn delay_for(&self, attempt: u32) -> u64 {
        self.base_interval_ms
            .saturating_mul(u64::from(attempt))
            .min(self.max_interval_ms)
    }

    /// Whether `attempts` consecutive failures exhaust the budget.
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        attempts > self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconnect_policy_default() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.base_interval_ms, 3_000);
        assert_eq!(policy.max_interval_ms, 30_000);
        assert_eq!(policy.max_attempts, 10);
    }

    #[test]
    fn test_linear_delay_is_capped() {
        let policy = ReconnectPolicy::default();

        // Attempt 1: 3000 * 1 = 3000ms
        assert_eq!(policy.delay_for(1), 3_000);
        // Attempt 4: 3000 * 4 = 12000ms
        assert_eq!(policy.delay_for(4), 12_000);
        // Attempt 10: 30000ms, exactly at the cap
        assert_eq!(policy.delay_for(10), 30_000);
        // Attempt 25: 75000ms, capped at 30000ms
        assert_eq!(policy.delay_for(25), 30_000);
    }

    #[test]
    fn test_no_overflow_on_huge_attempts() {
        let policy = ReconnectPolicy {
            base_interval_ms: u64::MAX / 2,
            max_interval_ms: u64::MAX,
            max_attempts: 3,
        };
        assert_eq!(policy.delay_for(u32::MAX), u64::MAX);
    }

    #[test]
    fn test_exhaustion_is_strictly_greater() {
        let policy = ReconnectPolicy::default();
        assert!(!policy.is_exhausted(10));
        assert!(policy.is_exhausted(11));
    }
}
