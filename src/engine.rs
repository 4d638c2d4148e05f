// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Rate limit decision engine.
//!
//! Orchestrates identity resolution, policy resolution, the counter
//! store and violation reporting into a single allow/deny decision.
//! The hot path never touches I/O: reporter dispatch is
//! fire-and-forget on a separate task.

use crate::identity::client_identity;
use crate::metrics;
use crate::policy::{LimitPolicyResolver, RateLimitConfig};
use crate::report::{SecurityEvent, Severity, ViolationRecord, ViolationReporter};
use crate::store::{RateLimitDecision, StoreError, ViolationNotice, WindowCounterStore};
use serde_json::json;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::warn;

/// Protocol-neutral view of one request, as the adapters hand it in.
#[derive(Debug, Clone)]
pub struct RequestContext<'a> {
    pub peer_ip: Option<IpAddr>,
    pub forwarded_for: Option<&'a str>,
    pub real_ip: Option<&'a str>,
    pub path: &'a str,
    pub method: &'a str,
    pub authenticated: bool,
}

/// Decision engine over an injected store, policy and reporter.
pub struct RateLimitEngine {
    store: Arc<WindowCounterStore>,
    policy: LimitPolicyResolver,
    reporter: Arc<dyn ViolationReporter>,
}

impl RateLimitEngine {
    pub fn new(
        store: Arc<WindowCounterStore>,
        policy: LimitPolicyResolver,
        reporter: Arc<dyn ViolationReporter>,
    ) -> Self {
        Self {
            store,
            policy,
            reporter,
        }
    }

    /// The underlying store, for the janitor and the admin surface.
    pub fn store(&self) -> &Arc<WindowCounterStore> {
        &self.store
    }

    /// The policy resolver, for hosts that pin endpoints to presets.
    pub fn policy(&self) -> &LimitPolicyResolver {
        &self.policy
    }

    /// Decide whether the request may proceed.
    pub fn check(
        &self,
        ctx: &RequestContext<'_>,
        now: i64,
    ) -> Result<RateLimitDecision, StoreError> {
        let identity = client_identity(ctx.forwarded_for, ctx.real_ip, ctx.peer_ip);
        let config = self.policy.resolve(ctx.path, ctx.method, ctx.authenticated);
        self.check_identity(&identity, &config, now)
    }

    /// Decide for an already-resolved identity and config. Hosts that
    /// select a preset directly (configuration surface) enter here.
    pub fn check_identity(
        &self,
        identity: &str,
        config: &RateLimitConfig,
        now: i64,
    ) -> Result<RateLimitDecision, StoreError> {
        // An administrative block on the identity covers every
        // endpoint category, ahead of the per-category counters.
        if let Some(until) = self.store.blocked_until(identity, now) {
            metrics::DENIED_TOTAL.inc();
            return Ok(RateLimitDecision {
                allowed: false,
                limit: config.max_requests,
                current: 0,
                remaining: 0,
                reset_at: until,
                penalized: true,
                retry_after_ms: until - now,
                message: config.message.clone(),
            });
        }

        let key = format!("{identity}:{}", config.label);
        let (decision, violation) = self.store.check_and_increment(&key, config, now)?;

        if let Some(notice) = violation {
            metrics::VIOLATIONS_TOTAL.inc();
            self.dispatch_report(identity, config, notice, now);
        }

        if decision.allowed {
            metrics::ALLOWED_TOTAL.inc();
        } else {
            metrics::DENIED_TOTAL.inc();
        }
        metrics::TRACKED_KEYS.set(self.store.tracked_keys() as f64);

        Ok(decision)
    }

    /// Hand the violation to the reporter off the decision path.
    /// Audit failures are logged inside the task and never surface.
    fn dispatch_report(
        &self,
        identity: &str,
        config: &RateLimitConfig,
        notice: ViolationNotice,
        now: i64,
    ) {
        let record = ViolationRecord {
            identifier: identity.to_string(),
            endpoint: config.label.clone(),
            violation_count: notice.violation_count,
            window_start: notice.window_start,
            window_end: notice.window_end,
            blocked: true,
            timestamp: now,
        };

        let severity = if notice.violation_count > 3 {
            Severity::High
        } else {
            Severity::Medium
        };
        let event = SecurityEvent {
            event_type: "rate_limit_exceeded",
            severity,
            description: format!(
                "rate limit exceeded by {identity} on {} ({} violations)",
                config.label, notice.violation_count
            ),
            details: json!({
                "key": notice.key,
                "windowStart": notice.window_start,
                "windowEnd": notice.window_end,
                "penaltyUntil": notice.penalty_until,
            }),
            identity: identity.to_string(),
            endpoint: config.label.clone(),
        };

        let reporter = Arc::clone(&self.reporter);
        tokio::spawn(async move {
            if let Err(err) = reporter.report_violation(&record) {
                warn!(error = %err, "violation report failed");
            }
            if let Err(err) = reporter.report_security_event(&event) {
                warn!(error = %err, "security event report failed");
            }
        });
    }
}
