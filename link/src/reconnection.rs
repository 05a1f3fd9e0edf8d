//! Reconnection policy for the subscribe loop.
//!
//! [`ReconnectionPolicy::decide`] is a pure function of the policy, the retry
//! bound and the number of consecutive failures; [`ReconnectionState`] is the
//! counter the loop owns and resets after every successful long-poll.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Largest shift applied to the exponential base (2^20 × base is already
/// far beyond any sensible cap).
const MAX_BACKOFF_SHIFT: u32 = 20;

/// Which retry strategy to use, as it appears in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReconnectionPolicyKind {
    /// Never retry; the first failure is terminal.
    None,
    /// Retry with a constant delay.
    Linear,
    /// Retry with a doubling delay up to a cap.
    #[default]
    Exponential,
}

/// Retry strategy with its timing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectionPolicy {
    /// No automatic retry.
    None,
    /// Constant `delay` between attempts.
    Linear {
        /// Delay before every retry
        delay: Duration,
    },
    /// `min(base * 2^(attempt-1), max)` between attempts.
    Exponential {
        /// Delay before the first retry
        base: Duration,
        /// Upper bound for any single delay
        max: Duration,
    },
}

/// Outcome of consulting the policy after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait `delay`, then issue retry number `attempt` (1-based).
    Retry {
        /// Retry number
        attempt: u32,
        /// Delay before the retry
        delay: Duration,
    },
    /// No further retries; `failures` consecutive failures were observed.
    Exhausted {
        /// Consecutive failures that led to exhaustion
        failures: u32,
    },
}

impl ReconnectionPolicy {
    /// Build a policy from its configuration form.
    pub fn from_kind(kind: ReconnectionPolicyKind, base: Duration, max: Duration) -> Self {
        match kind {
            ReconnectionPolicyKind::None => Self::None,
            ReconnectionPolicyKind::Linear => Self::Linear { delay: base },
            ReconnectionPolicyKind::Exponential => Self::Exponential {
                base,
                max: max.max(base),
            },
        }
    }

    /// Delay before retry number `attempt` (1-based), or `None` when the
    /// policy never retries.
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        match *self {
            Self::None => None,
            Self::Linear { delay } => Some(delay),
            Self::Exponential { base, max } => {
                let shift = attempt.saturating_sub(1).min(MAX_BACKOFF_SHIFT);
                let multiplier = 1_u32 << shift;
                Some(base.saturating_mul(multiplier).min(max))
            },
        }
    }

    /// Decide what to do after `failures` consecutive failures.
    ///
    /// `max_retries` of `None` means unbounded. With `Some(r)`, failures
    /// `1..=r` are retried and failure `r + 1` is exhausted.
    pub fn decide(&self, max_retries: Option<u32>, failures: u32) -> RetryDecision {
        let failures = failures.max(1);
        if let Some(max) = max_retries {
            if failures > max {
                return RetryDecision::Exhausted { failures };
            }
        }
        match self.delay_for_attempt(failures) {
            Some(delay) => RetryDecision::Retry {
                attempt: failures,
                delay,
            },
            None => RetryDecision::Exhausted { failures },
        }
    }
}

/// Consecutive-failure bookkeeping owned by the subscribe loop.
#[derive(Debug, Clone)]
pub struct ReconnectionState {
    policy: ReconnectionPolicy,
    max_retries: Option<u32>,
    consecutive_failures: u32,
}

impl ReconnectionState {
    /// Create a fresh state with no recorded failures.
    pub fn new(policy: ReconnectionPolicy, max_retries: Option<u32>) -> Self {
        Self {
            policy,
            max_retries,
            consecutive_failures: 0,
        }
    }

    /// Record one more failure and return what the loop should do next.
    pub fn record_failure(&mut self) -> RetryDecision {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.policy.decide(self.max_retries, self.consecutive_failures)
    }

    /// Forget all failures (called after any successful long-poll).
    pub fn reset(&mut self) {
        self.consecutive_failures = 0;
    }

    /// Failures since the last success.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Whether the last long-poll failed.
    pub fn is_recovering(&self) -> bool {
        self.consecutive_failures > 0
    }

    /// The configured policy.
    pub fn policy(&self) -> ReconnectionPolicy {
        self.policy
    }
}
