// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

use lazy_static::lazy_static;
use prometheus::{register_counter, register_gauge, Counter, Gauge};

lazy_static! {
    pub static ref ALLOWED_TOTAL: Counter = register_counter!(
        "tender_rl_requests_allowed_total",
        "Requests allowed by the rate limiter"
    )
    .unwrap();
    pub static ref DENIED_TOTAL: Counter = register_counter!(
        "tender_rl_requests_denied_total",
        "Requests denied by the rate limiter"
    )
    .unwrap();
    pub static ref VIOLATIONS_TOTAL: Counter = register_counter!(
        "tender_rl_violations_total",
        "Quota violations that triggered a penalty"
    )
    .unwrap();
    pub static ref ADMIN_BLOCKS_TOTAL: Counter = register_counter!(
        "tender_rl_admin_blocks_total",
        "Administrative blocks applied"
    )
    .unwrap();
    pub static ref TRACKED_KEYS: Gauge = register_gauge!(
        "tender_rl_tracked_keys",
        "Counter entries currently tracked"
    )
    .unwrap();
}
