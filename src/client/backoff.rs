//! Bounded exponential backoff for reconnect attempts.
//!
//! An explicit state machine rather than ad hoc timers: a monotonic attempt counter
//! plus a capped doubling delay curve, independent of any transport library's
//! reconnection hooks. The [`ConnectionManager`](crate::ConnectionManager) asks for
//! the next delay after every connection loss; `None` means the retry budget is spent
//! and the manager goes terminally disconnected.

use web_time::Duration;

/// Retry budget and delay curve for reconnect attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Maximum number of reconnect attempts before giving up.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each subsequent one.
    pub base_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Backoff state for one connection: how many attempts were spent and what to wait
/// before the next one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    policy: ReconnectPolicy,
    attempt: u32,
}

impl Backoff {
    /// Creates a fresh backoff under the given policy.
    #[must_use]
    pub const fn new(policy: ReconnectPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    /// Number of attempts consumed so far.
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Whether the retry budget is spent.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.attempt >= self.policy.max_attempts
    }

    /// Consumes one attempt and returns the delay to wait before it, or `None` if the
    /// budget is exhausted.
    ///
    /// The delay doubles per attempt and never exceeds the policy cap, so the sequence
    /// is monotonically non-decreasing.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }
        // 2^(attempt) with the shift clamped; the cap below dominates long before 2^20.
        let factor = 1u32 << self.attempt.min(20);
        self.attempt += 1;
        let delay = self.policy.base_delay.saturating_mul(factor);
        Some(delay.min(self.policy.max_delay))
    }

    /// Resets the attempt counter after a successful connection.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn policy(max_attempts: u32, base_ms: u64, max_ms: u64) -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts,
            base_delay: Duration::from_millis(base_ms),
            max_delay: Duration::from_millis(max_ms),
        }
    }

    #[test]
    fn delays_double_up_to_the_cap() {
        let mut backoff = Backoff::new(policy(10, 100, 500));
        let delays: Vec<u64> = std::iter::from_fn(|| backoff.next_delay())
            .map(|d| d.as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![100, 200, 400, 500, 500, 500, 500, 500, 500, 500]);
    }

    #[test]
    fn delays_are_monotonically_non_decreasing() {
        let mut backoff = Backoff::new(policy(8, 250, 10_000));
        let mut last = Duration::ZERO;
        while let Some(delay) = backoff.next_delay() {
            assert!(delay >= last);
            last = delay;
        }
    }

    #[test]
    fn budget_is_bounded() {
        let mut backoff = Backoff::new(policy(3, 100, 1000));
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_none());
        assert!(backoff.is_exhausted());
        // Once exhausted it stays exhausted until reset.
        assert!(backoff.next_delay().is_none());
    }

    #[test]
    fn reset_restores_the_full_budget() {
        let mut backoff = Backoff::new(policy(2, 100, 1000));
        let first = backoff.next_delay().unwrap();
        let _ = backoff.next_delay();
        assert!(backoff.next_delay().is_none());

        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
        assert_eq!(backoff.next_delay().unwrap(), first);
    }

    #[test]
    fn zero_attempt_policy_never_yields_a_delay() {
        let mut backoff = Backoff::new(policy(0, 100, 1000));
        assert!(backoff.is_exhausted());
        assert!(backoff.next_delay().is_none());
    }
}
