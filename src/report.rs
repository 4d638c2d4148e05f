// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Violation reporting seam.
//!
//! The durable audit/security-event store is an external collaborator;
//! this module defines the boundary. The engine dispatches records
//! fire-and-forget, so a reporter must never block the decision path;
//! a database-backed implementation should enqueue internally.
//! Reporter failures stay in the audit domain: logged, never
//! propagated to the caller-facing decision.

use crate::config::AuditMode;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// One quota violation, as handed to the audit pipeline.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationRecord {
    pub identifier: String,
    pub endpoint: String,
    pub violation_count: u32,
    pub window_start: i64,
    pub window_end: i64,
    pub blocked: bool,
    pub timestamp: i64,
}

/// Security-event severity. Repeat offenders (more than three
/// violations) escalate to high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
}

/// Structured security event raised alongside every violation record.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityEvent {
    pub event_type: &'static str,
    pub severity: Severity,
    pub description: String,
    pub details: serde_json::Value,
    pub identity: String,
    pub endpoint: String,
}

/// Sink for violation records and security events.
pub trait ViolationReporter: Send + Sync + 'static {
    fn report_violation(&self, record: &ViolationRecord) -> anyhow::Result<()>;

    fn report_security_event(&self, event: &SecurityEvent) -> anyhow::Result<()>;
}

/// Hands records to the audit pipeline as structured logs.
pub struct LogViolationReporter;

impl ViolationReporter for LogViolationReporter {
    fn report_violation(&self, record: &ViolationRecord) -> anyhow::Result<()> {
        warn!(
            identifier = %record.identifier,
            endpoint = %record.endpoint,
            violation_count = record.violation_count,
            window_start = record.window_start,
            window_end = record.window_end,
            blocked = record.blocked,
            "rate limit violation recorded"
        );
        Ok(())
    }

    fn report_security_event(&self, event: &SecurityEvent) -> anyhow::Result<()> {
        match event.severity {
            Severity::High => warn!(
                event_type = event.event_type,
                severity = "high",
                identity = %event.identity,
                endpoint = %event.endpoint,
                description = %event.description,
                "security event"
            ),
            Severity::Medium => info!(
                event_type = event.event_type,
                severity = "medium",
                identity = %event.identity,
                endpoint = %event.endpoint,
                description = %event.description,
                "security event"
            ),
        }
        Ok(())
    }
}

/// Ephemeral mode: counters only, no audit trail.
pub struct NullViolationReporter;

impl ViolationReporter for NullViolationReporter {
    fn report_violation(&self, _record: &ViolationRecord) -> anyhow::Result<()> {
        Ok(())
    }

    fn report_security_event(&self, _event: &SecurityEvent) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Select the reporter backend for the configured audit mode.
pub fn reporter_for(mode: AuditMode) -> Arc<dyn ViolationReporter> {
    match mode {
        AuditMode::Log => Arc::new(LogViolationReporter),
        AuditMode::Off => Arc::new(NullViolationReporter),
    }
}
