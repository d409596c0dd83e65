//! Reconnect retry policies.

use std::time::Duration;

/// Default delay between reconnect attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Default bound on consecutive reconnect attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Decides how long to wait before each reconnect attempt, and when to stop.
///
/// Attempts are counted per identity and reset whenever a connection opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Same delay every time.
    Fixed {
        delay: Duration,
        max_attempts: Option<u32>,
    },
    /// Delay doubles per attempt up to `max_delay`.
    Exponential {
        initial: Duration,
        max_delay: Duration,
        max_attempts: Option<u32>,
    },
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::Fixed {
            delay: DEFAULT_RETRY_DELAY,
            max_attempts: Some(DEFAULT_MAX_ATTEMPTS),
        }
    }
}

impl RetryPolicy {
    /// Fixed delay, bounded by the default attempt cap.
    pub fn fixed(delay: Duration) -> Self {
        RetryPolicy::Fixed {
            delay,
            max_attempts: Some(DEFAULT_MAX_ATTEMPTS),
        }
    }

    /// Exponential backoff, bounded by the default attempt cap.
    pub fn exponential(initial: Duration, max_delay: Duration) -> Self {
        RetryPolicy::Exponential {
            initial,
            max_delay,
            max_attempts: Some(DEFAULT_MAX_ATTEMPTS),
        }
    }

    /// Replaces the attempt cap. `None` retries forever.
    pub fn with_max_attempts(self, max: Option<u32>) -> Self {
        match self {
            RetryPolicy::Fixed { delay, .. } => RetryPolicy::Fixed {
                delay,
                max_attempts: max,
            },
            RetryPolicy::Exponential {
                initial, max_delay, ..
            } => RetryPolicy::Exponential {
                initial,
                max_delay,
                max_attempts: max,
            },
        }
    }

    /// The attempt cap, if any.
    pub fn max_attempts(&self) -> Option<u32> {
        match self {
            RetryPolicy::Fixed { max_attempts, .. } => *max_attempts,
            RetryPolicy::Exponential { max_attempts, .. } => *max_attempts,
        }
    }

    /// Delay before the 1-based `attempt`, or `None` once the cap is exceeded.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 {
            return Some(Duration::ZERO);
        }
        if self.max_attempts().is_some_and(|max| attempt > max) {
            return None;
        }
        let delay = match self {
            RetryPolicy::Fixed { delay, .. } => *delay,
            RetryPolicy::Exponential {
                initial, max_delay, ..
            } => {
                let factor = 2u32.saturating_pow(attempt - 1);
                initial.saturating_mul(factor).min(*max_delay)
            }
        };
        Some(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Some(Duration::from_secs(5)));
        assert_eq!(policy.delay_for(10), Some(Duration::from_secs(5)));
        assert_eq!(policy.delay_for(11), None);
    }

    #[test]
    fn test_unbounded() {
        let policy = RetryPolicy::fixed(Duration::from_secs(1)).with_max_attempts(None);
        assert_eq!(policy.delay_for(10_000), Some(Duration::from_secs(1)));
        assert_eq!(policy.max_attempts(), None);
    }

    #[test]
    fn test_exponential_with_ceiling() {
        let policy = RetryPolicy::exponential(Duration::from_secs(1), Duration::from_secs(30))
            .with_max_attempts(Some(8));

        assert_eq!(policy.delay_for(1), Some(Duration::from_secs(1)));
        assert_eq!(policy.delay_for(2), Some(Duration::from_secs(2)));
        assert_eq!(policy.delay_for(5), Some(Duration::from_secs(16)));
        assert_eq!(policy.delay_for(6), Some(Duration::from_secs(30)));
        assert_eq!(policy.delay_for(8), Some(Duration::from_secs(30)));
        assert_eq!(policy.delay_for(9), None);
    }

    #[test]
    fn test_exponential_no_overflow() {
        let policy = RetryPolicy::exponential(Duration::from_secs(1), Duration::from_secs(60))
            .with_max_attempts(None);
        assert_eq!(policy.delay_for(200), Some(Duration::from_secs(60)));
    }
}
