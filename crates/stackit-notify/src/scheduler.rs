//! Reconnect timer bookkeeping.
//!
//! The scheduler doesn't sleep. It hands out tagged timers; the runtime
//! sleeps and reports back which timer fired. A fire for a timer that is no
//! longer pending is ignored, so a cancelled timer can never reconnect.

use std::fmt;
use std::time::Duration;

/// Identity of one scheduled retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

/// How long to wait between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay after the first failure.
    pub delay: Duration,
    /// Cap for exponential backoff. `None` keeps the delay fixed.
    pub max_delay: Option<Duration>,
}

impl RetryPolicy {
    pub fn fixed(delay: Duration) -> Self {
        Self {
            delay,
            max_delay: None,
        }
    }

    pub fn exponential(delay: Duration, max_delay: Duration) -> Self {
        Self {
            delay,
            max_delay: Some(max_delay),
        }
    }

    /// Delay before retry number `failures` (1-based, consecutive).
    pub fn delay_for(&self, failures: u32) -> Duration {
        match self.max_delay {
            None => self.delay,
            Some(max) => {
                let shift = failures.saturating_sub(1).min(31);
                self.delay.saturating_mul(1u32 << shift).min(max)
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(5))
    }
}

/// A retry the runtime should arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledRetry {
    pub timer: TimerId,
    pub delay: Duration,
}

/// At most one pending retry at a time.
#[derive(Debug)]
pub struct ReconnectScheduler {
    policy: RetryPolicy,
    pending: Option<TimerId>,
    next_id: u64,
    failures: u32,
}

impl ReconnectScheduler {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            pending: None,
            next_id: 0,
            failures: 0,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Arm a retry. Returns `None` if one is already pending.
    pub fn schedule(&mut self) -> Option<ScheduledRetry> {
        if self.pending.is_some() {
            return None;
        }
        self.next_id += 1;
        self.failures = self.failures.saturating_add(1);
        let timer = TimerId(self.next_id);
        self.pending = Some(timer);
        Some(ScheduledRetry {
            timer,
            delay: self.policy.delay_for(self.failures),
        })
    }

    /// Consume a fired timer. `false` means it was cancelled or superseded.
    pub fn fire(&mut self, timer: TimerId) -> bool {
        if self.pending == Some(timer) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    /// Disarm the pending retry, returning it so the runtime can stop it.
    pub fn cancel(&mut self) -> Option<TimerId> {
        self.pending.take()
    }

    /// A connection opened; backoff starts over.
    pub fn record_success(&mut self) {
        self.failures = 0;
    }

    pub fn pending(&self) -> Option<TimerId> {
        self.pending
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_is_idempotent_while_pending() {
        let mut scheduler = ReconnectScheduler::new(RetryPolicy::default());
        let first = scheduler.schedule().unwrap();
        assert_eq!(first.delay, Duration::from_secs(5));
        assert!(scheduler.schedule().is_none());
        assert_eq!(scheduler.pending(), Some(first.timer));
    }

    #[test]
    fn test_fire_consumes_only_the_pending_timer() {
        let mut scheduler = ReconnectScheduler::new(RetryPolicy::default());
        let first = scheduler.schedule().unwrap();
        assert!(scheduler.fire(first.timer));
        assert!(!scheduler.fire(first.timer));

        let second = scheduler.schedule().unwrap();
        assert_ne!(first.timer, second.timer);
        assert!(!scheduler.fire(first.timer));
        assert!(scheduler.fire(second.timer));
    }

    #[test]
    fn test_cancelled_timer_does_not_fire() {
        let mut scheduler = ReconnectScheduler::new(RetryPolicy::default());
        let retry = scheduler.schedule().unwrap();
        assert_eq!(scheduler.cancel(), Some(retry.timer));
        assert!(!scheduler.fire(retry.timer));
        assert_eq!(scheduler.cancel(), None);
    }

    #[test]
    fn test_fixed_delay() {
        let mut scheduler = ReconnectScheduler::new(RetryPolicy::fixed(Duration::from_secs(2)));
        for _ in 0..4 {
            let retry = scheduler.schedule().unwrap();
            assert_eq!(retry.delay, Duration::from_secs(2));
            scheduler.fire(retry.timer);
        }
    }

    #[test]
    fn test_exponential_backoff_caps_and_resets() {
        let policy = RetryPolicy::exponential(Duration::from_secs(1), Duration::from_secs(10));
        let mut scheduler = ReconnectScheduler::new(policy);

        let mut delays = Vec::new();
        for _ in 0..6 {
            let retry = scheduler.schedule().unwrap();
            delays.push(retry.delay.as_secs());
            scheduler.fire(retry.timer);
        }
        assert_eq!(delays, vec![1, 2, 4, 8, 10, 10]);

        scheduler.record_success();
        assert_eq!(scheduler.schedule().unwrap().delay, Duration::from_secs(1));
    }

    #[test]
    fn test_backoff_does_not_overflow() {
        let policy = RetryPolicy::exponential(Duration::from_secs(5), Duration::from_secs(60));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(60));
    }
}
