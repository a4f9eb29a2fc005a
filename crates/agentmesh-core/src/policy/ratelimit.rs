// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Sliding-window rate limiting, per `(rule, agent)` pair.
//!
//! A single counter per pair tracks the count within the *current* window,
//! which opens on the first match after the previous window fully elapsed.
//! This is a fixed-window approximation of a sliding window (not a rolling
//! log of individual timestamps), favoring a single counter value per key
//! over a more precise but heavier structure.

use crate::policy::document::RateLimit;
use crate::storage::RateCounter;

/// Result of checking a rate limit on a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitOutcome {
    pub limited: bool,
    /// Earliest timestamp (ms) at which the window will next admit a
    /// request, present only when `limited`.
    pub reset_at_ms: Option<u64>,
    pub updated_counter: RateCounter,
}

/// Record a match against `limit` for the counter state `current` (or a
/// fresh counter if `None`), at `now_ms`.
pub fn check_and_record(limit: RateLimit, current: Option<RateCounter>, now_ms: u64) -> RateLimitOutcome {
    let window_ms = limit.window.as_millis();

    let counter = match current {
        Some(counter) if now_ms < counter.window_start_ms + window_ms => RateCounter {
            window_start_ms: counter.window_start_ms,
            count: counter.count + 1,
        },
        _ => RateCounter {
            window_start_ms: now_ms,
            count: 1,
        },
    };

    if counter.count > limit.limit {
        RateLimitOutcome {
            limited: true,
            reset_at_ms: Some(counter.window_start_ms + window_ms),
            updated_counter: counter,
        }
    } else {
        RateLimitOutcome {
            limited: false,
            reset_at_ms: None,
            updated_counter: counter,
        }
    }
}

/// Has the window for `counter` fully elapsed as of `now_ms`, meaning it can
/// be evicted?
pub fn is_expired(counter: &RateCounter, window_ms: u64, now_ms: u64) -> bool {
    now_ms >= counter.window_start_ms + window_ms
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::document::Window;

    fn limit(n: u32) -> RateLimit {
        RateLimit { limit: n, window: Window::Minute }
    }

    #[test]
    fn allows_up_to_limit_within_window() {
        let mut counter = None;
        for _ in 0..3 {
            let outcome = check_and_record(limit(3), counter, 0);
            assert!(!outcome.limited);
            counter = Some(outcome.updated_counter);
        }
        let outcome = check_and_record(limit(3), counter, 0);
        assert!(outcome.limited);
        assert_eq!(outcome.reset_at_ms, Some(60_000));
    }

    #[test]
    fn new_window_resets_the_counter() {
        let first = check_and_record(limit(1), None, 0);
        assert!(!first.limited);
        let second = check_and_record(limit(1), Some(first.updated_counter), 70_000);
        assert!(!second.limited);
        assert_eq!(second.updated_counter.count, 1);
    }

    #[test]
    fn expiry_check() {
        let counter = RateCounter { window_start_ms: 0, count: 5 };
        assert!(!is_expired(&counter, 60_000, 30_000));
        assert!(is_expired(&counter, 60_000, 60_000));
    }
}
