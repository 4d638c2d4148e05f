// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Window counter store.
//!
//! Keyed store of per-(identity, category) fixed-window counters with
//! escalating penalties. The store exclusively owns every
//! [`CounterEntry`]; all access goes through its API, and each
//! operation runs under the map's per-key shard guard so window reset,
//! quota increment and penalty check are linearized per key. Cross-key
//! operations proceed in parallel.
//!
//! Fixed-window counting (not a sliding log): O(1) memory and O(1)
//! time per request.

use crate::config::PenaltyConfig;
use crate::penalty;
use crate::policy::RateLimitConfig;
use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

/// Violation count floor applied by an administrative block, so future
/// organic violations continue the high end of the escalation curve.
pub const FORCED_VIOLATION_FLOOR: u32 = 10;

/// Current wall-clock time in epoch milliseconds. Adapters call this
/// once per request; everything below takes `now` as a parameter.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Mutable per-key state. `count` resets to 0 exactly when the window
/// lapses; `violation_count` only grows; `penalty_until`, when set,
/// strictly exceeds the time it was set.
#[derive(Debug, Clone, Serialize)]
pub struct CounterEntry {
    /// Requests counted in the current window
    pub count: u32,

    /// End of the current window, epoch ms
    pub window_reset_at: i64,

    /// Lifetime violations for this key
    pub violation_count: u32,

    /// Active lockout end, epoch ms
    pub penalty_until: Option<i64>,
}

impl CounterEntry {
    pub fn new(window_reset_at: i64) -> Self {
        Self {
            count: 0,
            window_reset_at,
            violation_count: 0,
            penalty_until: None,
        }
    }
}

/// Outcome of one quota check.
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitDecision {
    /// Whether the request may proceed
    pub allowed: bool,

    /// Quota for the resolved window
    pub limit: u32,

    /// Requests counted against the current window
    pub current: u32,

    /// Requests left in the current window
    pub remaining: u32,

    /// Window reset time, epoch ms
    pub reset_at: i64,

    /// Whether an escalation penalty is in force
    pub penalized: bool,

    /// Time until the caller may retry; 0 when allowed
    pub retry_after_ms: i64,

    /// Denial hint from the resolved preset
    pub message: Option<String>,
}

impl RateLimitDecision {
    /// Retry hint in whole seconds, rounded up, at least 1 on denial.
    pub fn retry_after_secs(&self) -> u64 {
        if self.retry_after_ms <= 0 {
            return u64::from(!self.allowed);
        }
        ((self.retry_after_ms + 999) / 1000) as u64
    }
}

/// Produced when a check pushes a key over quota; the engine forwards
/// it to the violation reporter outside the store's shard guard.
#[derive(Debug, Clone)]
pub struct ViolationNotice {
    pub key: String,
    pub violation_count: u32,
    pub window_start: i64,
    pub window_end: i64,
    pub penalty_until: i64,
}

/// Store failure. The decision path treats this as fail-open: the
/// limiter is defense-in-depth, not a correctness gate.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("counter store at capacity ({tracked} keys tracked)")]
    CapacityExhausted { tracked: usize },
}

/// Keyed store of window counters. Explicitly constructed and injected;
/// never a module-level singleton.
pub struct WindowCounterStore {
    entries: DashMap<String, CounterEntry>,
    penalty: PenaltyConfig,
    max_tracked_keys: usize,
}

impl WindowCounterStore {
    pub fn new(penalty: PenaltyConfig, max_tracked_keys: usize) -> Self {
        Self {
            entries: DashMap::new(),
            penalty,
            max_tracked_keys,
        }
    }

    /// Check the key against its quota and count the request.
    ///
    /// Window reset, penalty check and increment happen as a unit under
    /// the key's shard guard. A penalized caller is denied without
    /// consuming window budget, which keeps the remaining penalty
    /// duration stable and auditable. The request that causes the
    /// overage is itself denied and escalates the penalty.
    pub fn check_and_increment(
        &self,
        key: &str,
        config: &RateLimitConfig,
        now: i64,
    ) -> Result<(RateLimitDecision, Option<ViolationNotice>), StoreError> {
        if !self.entries.contains_key(key) && self.entries.len() >= self.max_tracked_keys {
            // Try to reclaim before giving up; the janitor may be behind.
            self.sweep(now);
            let tracked = self.entries.len();
            if tracked >= self.max_tracked_keys {
                return Err(StoreError::CapacityExhausted { tracked });
            }
        }

        let mut guard = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| CounterEntry::new(now + config.window_ms));
        let entry = guard.value_mut();

        if now >= entry.window_reset_at {
            entry.count = 0;
            entry.window_reset_at = now + config.window_ms;
        }

        // An expired penalty is dropped on observation; violation_count
        // survives for the life of the entry.
        if matches!(entry.penalty_until, Some(until) if now >= until) {
            entry.penalty_until = None;
        }

        if let Some(until) = entry.penalty_until {
            let decision = RateLimitDecision {
                allowed: false,
                limit: config.max_requests,
                current: entry.count,
                remaining: 0,
                reset_at: entry.window_reset_at,
                penalized: true,
                retry_after_ms: until - now,
                message: config.message.clone(),
            };
            return Ok((decision, None));
        }

        entry.count += 1;

        if entry.count > config.max_requests {
            let until = penalty::escalate(entry, &self.penalty, now);
            let notice = ViolationNotice {
                key: key.to_string(),
                violation_count: entry.violation_count,
                window_start: entry.window_reset_at - config.window_ms,
                window_end: entry.window_reset_at,
                penalty_until: until,
            };
            let decision = RateLimitDecision {
                allowed: false,
                limit: config.max_requests,
                current: entry.count,
                remaining: 0,
                reset_at: entry.window_reset_at,
                penalized: true,
                retry_after_ms: until - now,
                message: config.message.clone(),
            };
            return Ok((decision, Some(notice)));
        }

        let decision = RateLimitDecision {
            allowed: true,
            limit: config.max_requests,
            current: entry.count,
            remaining: config.max_requests - entry.count,
            reset_at: entry.window_reset_at,
            penalized: false,
            retry_after_ms: 0,
            message: None,
        };
        Ok((decision, None))
    }

    /// Force a penalty window onto an identity, independent of organic
    /// violations. Creates the entry if absent. The violation count is
    /// floored at [`FORCED_VIOLATION_FLOOR`] so later organic
    /// violations continue at the top of the escalation curve.
    pub fn block(&self, identity: &str, duration_ms: i64, reason: &str, now: i64) -> i64 {
        let mut guard = self
            .entries
            .entry(identity.to_string())
            .or_insert_with(|| CounterEntry::new(now));
        let entry = guard.value_mut();

        let until = now + duration_ms.max(1);
        entry.penalty_until = Some(until);
        entry.violation_count = entry.violation_count.max(FORCED_VIOLATION_FLOOR);

        warn!(identity, duration_ms, reason, "administrative block applied");
        until
    }

    /// Whether an identity is under an active penalty.
    pub fn is_blocked(&self, identity: &str, now: i64) -> bool {
        self.blocked_until(identity, now).is_some()
    }

    /// End of an identity's active penalty, if one is in force.
    pub fn blocked_until(&self, identity: &str, now: i64) -> Option<i64> {
        self.entries
            .get(identity)
            .and_then(|entry| entry.penalty_until)
            .filter(|until| now < *until)
    }

    /// Drop a key's state entirely (operator intervention).
    pub fn reset(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Snapshot of a key's state for introspection.
    pub fn status(&self, key: &str) -> Option<CounterEntry> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Evict every entry whose window has lapsed and whose penalty, if
    /// any, has expired. Returns the number of entries removed. The
    /// only deletion path besides [`reset`](Self::reset); eligibility
    /// ignores `count` and `violation_count`.
    pub fn sweep(&self, now: i64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| {
            now < entry.window_reset_at
                || entry.penalty_until.is_some_and(|until| now < until)
        });
        before - self.entries.len()
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(window_ms: i64, max_requests: u32) -> RateLimitConfig {
        RateLimitConfig {
            window_ms,
            max_requests,
            label: "test".to_string(),
            message: None,
        }
    }

    fn test_store() -> WindowCounterStore {
        WindowCounterStore::new(PenaltyConfig::default(), 1000)
    }

    #[test]
    fn test_quota_inclusive_of_max_requests() {
        let store = test_store();
        let config = test_config(1000, 2);
        let now = 10_000;

        let (first, _) = store.check_and_increment("k", &config, now).unwrap();
        assert!(first.allowed);
        assert_eq!(first.remaining, 1);

        let (second, _) = store.check_and_increment("k", &config, now).unwrap();
        assert!(second.allowed);
        assert_eq!(second.remaining, 0);

        let (third, notice) = store.check_and_increment("k", &config, now).unwrap();
        assert!(!third.allowed);
        assert_eq!(third.remaining, 0);
        assert!(third.penalized);
        assert!(notice.is_some());
    }

    #[test]
    fn test_overage_reports_window_bounds() {
        let store = test_store();
        let config = test_config(1000, 1);
        let now = 10_000;

        store.check_and_increment("k", &config, now).unwrap();
        let (_, notice) = store.check_and_increment("k", &config, now).unwrap();

        let notice = notice.unwrap();
        assert_eq!(notice.violation_count, 1);
        assert_eq!(notice.window_start, now);
        assert_eq!(notice.window_end, now + 1000);
        assert_eq!(notice.penalty_until, now + PenaltyConfig::default().base_ms);
    }

    #[test]
    fn test_penalized_caller_does_not_consume_budget() {
        let store = test_store();
        let config = test_config(1000, 1);
        let now = 10_000;

        store.check_and_increment("k", &config, now).unwrap();
        store.check_and_increment("k", &config, now).unwrap(); // violation

        let count_after_violation = store.status("k").unwrap().count;

        let (denied, notice) = store.check_and_increment("k", &config, now + 1).unwrap();
        assert!(!denied.allowed);
        assert!(denied.penalized);
        assert!(notice.is_none(), "penalty denial is not a new violation");
        assert_eq!(store.status("k").unwrap().count, count_after_violation);
        assert_eq!(denied.retry_after_ms, PenaltyConfig::default().base_ms - 1);
    }

    #[test]
    fn test_window_lapse_resets_count() {
        let store = test_store();
        let config = test_config(1000, 2);
        let now = 10_000;

        store.check_and_increment("k", &config, now).unwrap();
        store.check_and_increment("k", &config, now).unwrap();

        let (next, _) = store.check_and_increment("k", &config, now + 1000).unwrap();
        assert!(next.allowed);
        assert_eq!(next.current, 1);
        assert_eq!(next.reset_at, now + 2000);
    }

    #[test]
    fn test_violation_count_survives_window_reset() {
        let store = test_store();
        let config = test_config(1000, 1);
        let now = 10_000;

        store.check_and_increment("k", &config, now).unwrap();
        store.check_and_increment("k", &config, now).unwrap(); // violation 1

        // well past both penalty and window
        let later = now + PenaltyConfig::default().base_ms + 1000;
        store.check_and_increment("k", &config, later).unwrap();
        let (_, notice) = store.check_and_increment("k", &config, later).unwrap();

        assert_eq!(notice.unwrap().violation_count, 2);
    }

    #[test]
    fn test_admin_block_simulated_clock() {
        let store = test_store();
        let now = 10_000;

        let until = store.block("203.0.113.9", 60_000, "test", now);
        assert_eq!(until, now + 60_000);
        assert!(store.is_blocked("203.0.113.9", now));
        assert!(store.is_blocked("203.0.113.9", now + 59_999));
        assert!(!store.is_blocked("203.0.113.9", now + 60_000));

        let entry = store.status("203.0.113.9").unwrap();
        assert_eq!(entry.violation_count, FORCED_VIOLATION_FLOOR);
    }

    #[test]
    fn test_sweep_spares_active_penalties() {
        let store = test_store();
        let config = test_config(1000, 1);
        let now = 10_000;

        store.check_and_increment("offender", &config, now).unwrap();
        store.check_and_increment("offender", &config, now).unwrap(); // penalty until now+5min
        store.check_and_increment("idle", &config, now).unwrap();

        // window lapsed for both, penalty still running for the offender
        let evicted = store.sweep(now + 2000);
        assert_eq!(evicted, 1);
        assert!(store.status("offender").is_some());
        assert!(store.status("idle").is_none());

        // penalty expired too: now eligible
        let evicted = store.sweep(now + PenaltyConfig::default().base_ms + 1);
        assert_eq!(evicted, 1);
        assert_eq!(store.tracked_keys(), 0);
    }

    #[test]
    fn test_capacity_fails_with_store_error() {
        let store = WindowCounterStore::new(PenaltyConfig::default(), 2);
        let config = test_config(60_000, 10);
        let now = 10_000;

        store.check_and_increment("a", &config, now).unwrap();
        store.check_and_increment("b", &config, now).unwrap();

        let err = store.check_and_increment("c", &config, now).unwrap_err();
        assert!(matches!(err, StoreError::CapacityExhausted { tracked: 2 }));

        // existing keys keep working at capacity
        assert!(store.check_and_increment("a", &config, now).is_ok());

        // a sweep opening space unblocks new keys
        let (decision, _) = store
            .check_and_increment("c", &config, now + 60_000)
            .unwrap();
        assert!(decision.allowed);
    }

    #[test]
    fn test_retry_after_secs_rounds_up() {
        let decision = RateLimitDecision {
            allowed: false,
            limit: 1,
            current: 2,
            remaining: 0,
            reset_at: 0,
            penalized: true,
            retry_after_ms: 1001,
            message: None,
        };
        assert_eq!(decision.retry_after_secs(), 2);
    }
}
