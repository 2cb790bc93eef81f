//! Progressive backoff for a drain's send loop.
//!
//! Every failure doubles the backoff, capped at `max_backoff`. A `budget` of
//! wall-clock time spent retrying since the first failure in the current
//! run bounds how long a drain stays in `Retrying` before the supervisor
//! gives up and moves it to `Fatal`. A success that holds for `reset_after`
//! clears the attempt counter and the budget clock, so a drain that
//! occasionally blips doesn't inherit an exhausted budget from long ago.

use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub reset_after: Duration,
    pub budget: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            reset_after: Duration::from_secs(5 * 60),
            budget: Duration::from_secs(10 * 60),
        }
    }
}

/// Tracks one drain's retry state across its supervisor's lifetime.
pub struct Retryer {
    policy: RetryPolicy,
    attempt: u32,
    spent: Duration,
    healthy_for: Duration,
}

impl Retryer {
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy, attempt: 0, spent: Duration::ZERO, healthy_for: Duration::ZERO }
    }

    /// Call after `elapsed` of uninterrupted `Running` state. Once
    /// accumulated healthy time passes `reset_after`, the budget and attempt
    /// counter are cleared.
    pub fn note_healthy(&mut self, elapsed: Duration) {
        self.healthy_for += elapsed;
        if self.healthy_for >= self.policy.reset_after {
            self.attempt = 0;
            self.spent = Duration::ZERO;
            self.healthy_for = Duration::ZERO;
        }
    }

    /// Call on a failed start/send attempt. Returns the backoff to wait
    /// before the next attempt, or `None` once the retry budget is
    /// exhausted, at which point the caller should transition to `Fatal`.
    pub fn next_backoff(&mut self) -> Option<Duration> {
        self.healthy_for = Duration::ZERO;
        let backoff = self.policy.initial_backoff.saturating_mul(1 << self.attempt.min(16));
        let backoff = backoff.min(self.policy.max_backoff);

        if self.spent + backoff > self.policy.budget {
            return None;
        }

        self.attempt += 1;
        self.spent += backoff;
        Some(backoff)
    }
}

/// Per-name-prefix overrides for the default retry budget, loaded from
/// `/proc/logyard/config/retry_limits/<prefix>`. The longest matching prefix
/// wins; no match falls back to the policy default.
#[derive(Debug, Clone, Default)]
pub struct RetryLimits {
    by_prefix: HashMap<String, Duration>,
}

impl RetryLimits {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, prefix: impl Into<String>, budget: Duration) {
        self.by_prefix.insert(prefix.into(), budget);
    }

    #[must_use]
    pub fn budget_for(&self, drain_name: &str, default_budget: Duration) -> Duration {
        self.by_prefix
            .iter()
            .filter(|(prefix, _)| drain_name.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map_or(default_budget, |(_, budget)| *budget)
    }
}
