// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Delivery backoff schedule and retry limit.
//!
//! Unlike a computed exponential backoff, delivery retries follow a fixed
//! table indexed by attempt count. The table is deliberately coarse: the
//! host process may be suspended for long stretches, so fine-grained delay
//! tuning buys nothing, while the 1-day floor keeps a permanently failing
//! collector from waking the app more than once a day per item.
//!
//! # Schedule
//!
//! | attempt | delay before resubmission |
//! |---------|---------------------------|
//! | 0       | immediate                 |
//! | 1       | 1 minute                  |
//! | 2       | 10 minutes                |
//! | 3       | 30 minutes                |
//! | 4       | 1 hour                    |
//! | ≥5      | 1 day                     |
//!
//! An item is retried while its attempt count is at most
//! [`BackoffSchedule::DEFAULT_MAX_ATTEMPTS`]; beyond that it is dropped.
//!
//! # Example
//!
//! ```
//! use courier_core::backoff::{BackoffSchedule, RetryDecision};
//! use std::time::Duration;
//!
//! let schedule = BackoffSchedule::standard();
//! assert_eq!(schedule.delay_for_attempt(1), Duration::from_secs(60));
//!
//! match schedule.decide(6) {
//!     RetryDecision::Drop => {}
//!     RetryDecision::Retry(_) => panic!("attempt 6 must drop"),
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// =============================================================================
// Retry Decision
// =============================================================================

/// Decision on whether to resubmit a failed delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Resubmit after the given delay.
    Retry(Duration),
    /// Drop the item permanently.
    Drop,
}

// =============================================================================
// Backoff Schedule
// =============================================================================

/// The fixed backoff table used by the delivery scheduler.
///
/// The table maps attempt counts to delays; attempts beyond the table length
/// use the last entry as a floor. The maximum attempt count bounds total
/// retries: a descriptor whose incremented attempt count exceeds it is
/// dropped instead of resubmitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffSchedule {
    /// Delay steps in seconds, indexed by attempt count.
    #[serde(default = "default_steps")]
    steps_secs: Vec<u64>,

    /// Highest attempt count that is still resubmitted.
    #[serde(default = "default_max_attempts")]
    max_attempts: u32,
}

/// Standard table: immediate, 1 min, 10 min, 30 min, 1 h, 1 day.
fn default_steps() -> Vec<u64> {
    vec![0, 60, 600, 1_800, 3_600, 86_400]
}

fn default_max_attempts() -> u32 {
    BackoffSchedule::DEFAULT_MAX_ATTEMPTS
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self::standard()
    }
}

impl BackoffSchedule {
    /// An item is retried while `attempt_count <= DEFAULT_MAX_ATTEMPTS`.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

    /// Creates the standard schedule.
    pub fn standard() -> Self {
        Self {
            steps_secs: default_steps(),
            max_attempts: default_max_attempts(),
        }
    }

    /// Creates a schedule with custom steps and retry limit.
    ///
    /// Intended for tests; an empty `steps` falls back to the standard table.
    pub fn custom(steps: Vec<Duration>, max_attempts: u32) -> Self {
        if steps.is_empty() {
            return Self {
                steps_secs: default_steps(),
                max_attempts,
            };
        }
        Self {
            steps_secs: steps.iter().map(Duration::as_secs).collect(),
            max_attempts,
        }
    }

    /// Creates a schedule with near-zero delays for tests.
    pub fn for_testing() -> Self {
        Self {
            steps_secs: vec![0, 0, 0, 0, 0, 0],
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Returns the highest attempt count that is still resubmitted.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the delay before resubmitting at the given attempt count.
    ///
    /// Attempt counts beyond the table length saturate at the last entry.
    pub fn delay_for_attempt(&self, attempt_count: u32) -> Duration {
        let index = (attempt_count as usize).min(self.steps_secs.len().saturating_sub(1));
        Duration::from_secs(self.steps_secs[index])
    }

    /// Decides whether a delivery with the given (already incremented)
    /// attempt count is resubmitted or dropped.
    pub fn decide(&self, attempt_count: u32) -> RetryDecision {
        if attempt_count > self.max_attempts {
            RetryDecision::Drop
        } else {
            RetryDecision::Retry(self.delay_for_attempt(attempt_count))
        }
    }

    /// Computes the earliest resubmission time for the given attempt count.
    pub fn not_before(&self, now: DateTime<Utc>, attempt_count: u32) -> DateTime<Utc> {
        let delay = self.delay_for_attempt(attempt_count);
        now + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_table_values() {
        let schedule = BackoffSchedule::standard();

        assert_eq!(schedule.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(schedule.delay_for_attempt(1), Duration::from_secs(60));
        assert_eq!(schedule.delay_for_attempt(2), Duration::from_secs(600));
        assert_eq!(schedule.delay_for_attempt(3), Duration::from_secs(1_800));
        assert_eq!(schedule.delay_for_attempt(4), Duration::from_secs(3_600));
        assert_eq!(schedule.delay_for_attempt(5), Duration::from_secs(86_400));
    }

    #[test]
    fn test_delay_is_monotonic_and_floors_at_one_day() {
        let schedule = BackoffSchedule::standard();

        let mut previous = Duration::ZERO;
        for attempt in 0..=5 {
            let delay = schedule.delay_for_attempt(attempt);
            assert!(delay >= previous, "delay decreased at attempt {attempt}");
            previous = delay;
        }

        // Beyond the table the floor holds.
        for attempt in 5..20 {
            assert_eq!(schedule.delay_for_attempt(attempt), Duration::from_secs(86_400));
        }
    }

    #[test]
    fn test_decide_retries_through_limit() {
        let schedule = BackoffSchedule::standard();

        for attempt in 0..=5 {
            assert!(
                matches!(schedule.decide(attempt), RetryDecision::Retry(_)),
                "attempt {attempt} should retry"
            );
        }
        assert_eq!(schedule.decide(6), RetryDecision::Drop);
        assert_eq!(schedule.decide(100), RetryDecision::Drop);
    }

    #[test]
    fn test_not_before_advances_by_delay() {
        let schedule = BackoffSchedule::standard();
        let now = Utc::now();

        let not_before = schedule.not_before(now, 1);
        assert_eq!((not_before - now).num_seconds(), 60);

        let immediate = schedule.not_before(now, 0);
        assert_eq!(immediate, now);
    }

    #[test]
    fn test_custom_schedule() {
        let schedule = BackoffSchedule::custom(
            vec![Duration::ZERO, Duration::from_secs(5)],
            2,
        );

        assert_eq!(schedule.delay_for_attempt(1), Duration::from_secs(5));
        // Saturates at the last step.
        assert_eq!(schedule.delay_for_attempt(9), Duration::from_secs(5));
        assert_eq!(schedule.decide(3), RetryDecision::Drop);
    }

    #[test]
    fn test_custom_empty_steps_falls_back() {
        let schedule = BackoffSchedule::custom(Vec::new(), 1);
        assert_eq!(schedule.delay_for_attempt(5), Duration::from_secs(86_400));
        assert_eq!(schedule.max_attempts(), 1);
    }

    #[test]
    fn test_schedule_serialization() {
        let schedule = BackoffSchedule::standard();
        let json = serde_json::to_string(&schedule).unwrap();
        let parsed: BackoffSchedule = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.max_attempts(), schedule.max_attempts());
        assert_eq!(parsed.delay_for_attempt(3), schedule.delay_for_attempt(3));
    }
}
