// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Penalty escalation.
//!
//! Each quota violation locks the key out for
//! `min(base * multiplier^(n-1), cap)` where `n` is the key's lifetime
//! violation count: 5m, 10m, 20m, 40m, … capped at 24h with the
//! reference constants. A single burst incurs a mild delay; sustained
//! abuse converges on near-total blocking. Violation counts never
//! decay; only the janitor deleting a fully expired entry forgives
//! history (a recorded product decision, not an accident).

use crate::config::PenaltyConfig;
use crate::store::CounterEntry;

/// Penalty duration for the n-th violation, saturating at the cap.
pub fn penalty_duration_ms(config: &PenaltyConfig, violation_count: u32) -> i64 {
    let exponent = violation_count.saturating_sub(1);
    let factor = i64::from(config.multiplier).saturating_pow(exponent);
    config.base_ms.saturating_mul(factor).min(config.cap_ms)
}

/// Record one more violation against the entry and apply the lockout.
/// Returns the new `penalty_until` timestamp.
pub fn escalate(entry: &mut CounterEntry, config: &PenaltyConfig, now: i64) -> i64 {
    entry.violation_count = entry.violation_count.saturating_add(1);
    let until = now + penalty_duration_ms(config, entry.violation_count);
    entry.penalty_until = Some(until);
    until
}
