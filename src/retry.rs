//! Bounded retry-with-backoff policy for external collaborator calls.
//!
//! The policy is an explicit value passed into the embedding and
//! generation wrappers, so tests and callers can tighten it without
//! touching global state. Delays grow exponentially from `base_delay_ms`
//! (doubling per attempt, capped at 2^5 × base) plus a small
//! deterministic jitter so concurrent workers don't retry in lockstep.

use std::time::Duration;

use crate::config::RetryConfig;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub jitter_ms: u64,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay_ms: config.base_delay_ms,
            jitter_ms: config.jitter_ms,
        }
    }

    /// Delay before retry number `attempt` (1-based; attempt 0 is the
    /// initial try and carries no delay).
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let exp = (attempt - 1).min(5);
        let backoff = self.base_delay_ms.saturating_mul(1u64 << exp);
        Duration::from_millis(backoff + self.jitter(attempt))
    }

    /// More attempts allowed after `attempt` tries have been made?
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts
    }

    // xorshift on the attempt number; deterministic so tests can assert
    // exact delays, spread enough to stagger concurrent workers.
    fn jitter(&self, attempt: u32) -> u64 {
        if self.jitter_ms == 0 {
            return 0;
        }
        let mut x = u64::from(attempt).wrapping_add(0x9e37_79b9_7f4a_7c15);
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        x % self.jitter_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 4,
            base_delay_ms: 100,
            jitter_ms: 0,
        }
    }

    #[test]
    fn first_attempt_has_no_delay() {
        assert_eq!(policy().delay(0), Duration::ZERO);
    }

    #[test]
    fn delays_double_per_attempt() {
        let p = policy();
        assert_eq!(p.delay(1), Duration::from_millis(100));
        assert_eq!(p.delay(2), Duration::from_millis(200));
        assert_eq!(p.delay(3), Duration::from_millis(400));
    }

    #[test]
    fn backoff_is_capped() {
        let p = policy();
        assert_eq!(p.delay(6), Duration::from_millis(3200));
        assert_eq!(p.delay(40), Duration::from_millis(3200));
    }

    #[test]
    fn jitter_is_deterministic_and_bounded() {
        let p = RetryPolicy {
            max_attempts: 4,
            base_delay_ms: 100,
            jitter_ms: 50,
        };
        let d1 = p.delay(2);
        let d2 = p.delay(2);
        assert_eq!(d1, d2);
        assert!(d1 >= Duration::from_millis(200));
        assert!(d1 < Duration::from_millis(250));
    }

    #[test]
    fn retry_budget_respected() {
        let p = policy();
        assert!(p.should_retry(0));
        assert!(p.should_retry(2));
        assert!(!p.should_retry(3));
    }
}
