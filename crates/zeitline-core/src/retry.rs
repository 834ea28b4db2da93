//! Retry policy: exponential backoff with full jitter

use std::time::Duration;

use rand::Rng;

/// Backoff schedule for transient fetch failures.
///
/// The deterministic part doubles per attempt (`base * 2^(attempt-1)`,
/// so 2s, 4s, 8s with the default base); [`delay`](RetryPolicy::delay)
/// adds jitter of up to half the step so parallel workers don't
/// re-hit the archive in lockstep. A server-provided `Retry-After`
/// hint overrides the schedule when it is longer.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum fetch attempts per work unit (first try included)
    pub max_attempts: u32,
    /// Backoff base step
    pub base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Deterministic backoff for retry `attempt` (1-based).
    pub const fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_secs(self.base.as_secs() * 2u64.pow(attempt.saturating_sub(1)))
    }

    /// Backoff plus jitter, honoring a server retry hint.
    pub fn delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let backoff = self.backoff(attempt);
        let jitter_max = (backoff / 2).as_millis() as u64;
        let jitter = if jitter_max == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::rng().random_range(0..=jitter_max))
        };
        let delay = backoff + jitter;
        match retry_after {
            Some(hint) if hint > delay => hint,
            _ => delay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_exponential() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
        assert_eq!(policy.backoff(3), Duration::from_secs(8));
    }

    #[test]
    fn delay_within_jitter_bounds() {
        let policy = RetryPolicy::default();
        for _ in 0..50 {
            let d = policy.delay(1, None);
            assert!(d >= Duration::from_secs(2));
            assert!(d <= Duration::from_secs(3));
        }
    }

    #[test]
    fn retry_after_hint_dominates_when_longer() {
        let policy = RetryPolicy::default();
        let d = policy.delay(1, Some(Duration::from_secs(30)));
        assert_eq!(d, Duration::from_secs(30));
    }

    #[test]
    fn short_retry_after_hint_is_ignored() {
        let policy = RetryPolicy::default();
        let d = policy.delay(3, Some(Duration::from_millis(10)));
        assert!(d >= Duration::from_secs(8));
    }
}
