//! Reconnect backoff as an explicit state machine.
//!
//! The n-th consecutive failure schedules a retry after `n * base_delay`
//! while `n <= max_attempts`; the next failure after that gives up.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffDecision {
    Retry { attempt: u32, delay: Duration },
    GiveUp,
}

#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    base_delay: Duration,
    max_attempts: u32,
    attempt: u32,
}

impl ReconnectPolicy {
    pub fn new(base_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_attempts,
            attempt: 0,
        }
    }

    /// Record a failure and decide what happens next.
    pub fn on_failure(&mut self) -> BackoffDecision {
        if self.attempt >= self.max_attempts {
            return BackoffDecision::GiveUp;
        }
        self.attempt += 1;
        BackoffDecision::Retry {
            attempt: self.attempt,
            delay: self.base_delay * self.attempt.min(self.max_attempts),
        }
    }

    /// A connection succeeded; the next failure starts from one again.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_five_failures_then_give_up() {
        let mut p = ReconnectPolicy::new(Duration::from_secs(3), 5);
        let delays: Vec<u64> = (0..5)
            .map(|_| match p.on_failure() {
                BackoffDecision::Retry { delay, .. } => delay.as_secs(),
                BackoffDecision::GiveUp => panic!("gave up too early"),
            })
            .collect();
        assert_eq!(delays, vec![3, 6, 9, 12, 15]);
        assert_eq!(p.on_failure(), BackoffDecision::GiveUp);
        assert_eq!(p.on_failure(), BackoffDecision::GiveUp);
    }

    #[test]
    fn test_reset_restarts_the_ramp() {
        let mut p = ReconnectPolicy::new(Duration::from_secs(3), 5);
        p.on_failure();
        p.on_failure();
        p.reset();
        assert_eq!(p.attempts(), 0);
        assert_eq!(
            p.on_failure(),
            BackoffDecision::Retry {
                attempt: 1,
                delay: Duration::from_secs(3)
            }
        );
    }

    #[test]
    fn test_zero_max_attempts_gives_up_immediately() {
        let mut p = ReconnectPolicy::new(Duration::from_secs(3), 0);
        assert_eq!(p.on_failure(), BackoffDecision::GiveUp);
    }
}
