use std::time::Duration;

/// Retry policy applied by the pipeline driver around whole-language
/// fetches. Separate from the rate limiter: the limiter spaces individual
/// API calls, this decides how many times a failed language is re-fetched.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Equal jitter backoff for the given zero-based attempt:
    /// base/2 + rand(0, base/2), doubling per attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_millis() as u64 * 2u64.saturating_pow(attempt);
        let half = base / 2;
        Duration::from_millis(half + fastrand::u64(..half.max(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_per_attempt_within_jitter_bounds() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        };
        for attempt in 0..3 {
            let base = 1000u64 * 2u64.pow(attempt);
            let delay = policy.delay_for(attempt).as_millis() as u64;
            assert!(delay >= base / 2, "attempt {attempt}: {delay} < {}", base / 2);
            assert!(delay < base, "attempt {attempt}: {delay} >= {base}");
        }
    }
}
