//! Retry policy for bulk loads
//!
//! Retries are driven by an explicit attempt counter in an iterative loop
//! (see [`crate::loader`]), never by recursion, so the bound is
//! independently testable and the call stack stays flat.

use std::time::Duration;

/// Delay strategy between bulk-load attempts
#[derive(Debug, Clone, Copy)]
pub enum RetryStrategy {
    /// Retry immediately with no delay
    Immediate,

    /// Fixed delay between attempts
    Fixed,
}

/// Bounded retry configuration for bulk loads
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first)
    pub max_attempts: u32,

    /// Delay used by the `Fixed` strategy
    pub delay: Duration,

    /// Delay strategy between attempts
    pub strategy: RetryStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
            strategy: RetryStrategy::Immediate,
        }
    }
}

impl RetryPolicy {
    /// Policy with a custom attempt bound and immediate retry
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// Whether another attempt is allowed after `attempt` failures
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay before the next attempt
    pub fn delay_for(&self, _attempt: u32) -> Duration {
        match self.strategy {
            RetryStrategy::Immediate => Duration::ZERO,
            RetryStrategy::Fixed => self.delay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_three_immediate_attempts() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay_for(0), Duration::ZERO);
    }

    #[test]
    fn test_should_retry_respects_bound() {
        let policy = RetryPolicy::with_max_attempts(3);
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
        assert!(!policy.should_retry(4));
    }

    #[test]
    fn test_fixed_strategy_uses_configured_delay() {
        let policy = RetryPolicy {
            strategy: RetryStrategy::Fixed,
            delay: Duration::from_millis(250),
            ..Default::default()
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(250));
        assert_eq!(policy.delay_for(2), Duration::from_millis(250));
    }
}
