// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the tender platform rate limiter.
//!
//! Default values mirror the platform abuse-governance policy: a strict
//! preset for authentication endpoints, an hourly preset for uploads, a
//! scaled preset for mutating API calls, and a general fallback. Penalty
//! escalation runs from five minutes up to a 24-hour cap.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the rate limiter service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:8080)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Named limit presets
    #[serde(default)]
    pub limits: LimitPresets,

    /// Penalty escalation configuration
    #[serde(default)]
    pub penalty: PenaltyConfig,

    /// Janitor sweep configuration
    #[serde(default)]
    pub janitor: JanitorConfig,

    /// Counter store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Audit backend configuration
    #[serde(default)]
    pub audit: AuditConfig,
}

/// One named window/quota pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitPreset {
    /// Window duration in milliseconds
    pub window_ms: i64,

    /// Requests permitted per window
    pub max_requests: u32,

    /// Human-readable hint returned on denial
    #[serde(default)]
    pub message: Option<String>,
}

/// The named presets the policy resolver draws from, plus the quota
/// multipliers applied to authenticated callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitPresets {
    /// Authentication endpoints: strict, regardless of auth state
    #[serde(default = "default_auth_preset")]
    pub auth: LimitPreset,

    /// Upload endpoints: hourly window, low quota
    #[serde(default = "default_upload_preset")]
    pub upload: LimitPreset,

    /// Mutating API calls (POST/PUT/DELETE/PATCH under /api)
    #[serde(default = "default_mutation_preset")]
    pub mutation: LimitPreset,

    /// Sensitive operations; selectable by the hosting application,
    /// never routed to automatically
    #[serde(default = "default_sensitive_preset")]
    pub sensitive: LimitPreset,

    /// Everything else
    #[serde(default = "default_default_preset")]
    pub default: LimitPreset,

    /// Quota multiplier for authenticated callers on mutating calls
    #[serde(default = "default_mutation_auth_factor")]
    pub mutation_auth_factor: u32,

    /// Quota multiplier for authenticated callers on uploads
    #[serde(default = "default_upload_auth_factor")]
    pub upload_auth_factor: u32,

    /// Quota multiplier for authenticated callers on everything else
    #[serde(default = "default_default_auth_factor")]
    pub default_auth_factor: u32,
}

/// Exponential penalty escalation: `min(base * multiplier^(n-1), cap)`
/// for the n-th violation of a key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PenaltyConfig {
    /// First-violation penalty in milliseconds (default: 5 minutes)
    #[serde(default = "default_penalty_base_ms")]
    pub base_ms: i64,

    /// Growth factor per repeat violation (default: 2)
    #[serde(default = "default_penalty_multiplier")]
    pub multiplier: u32,

    /// Penalty ceiling in milliseconds (default: 24 hours)
    #[serde(default = "default_penalty_cap_ms")]
    pub cap_ms: i64,
}

/// Background eviction of expired, non-penalized entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JanitorConfig {
    /// Sweep interval in seconds (default: 300)
    #[serde(default = "default_janitor_interval_secs")]
    pub interval_secs: u64,
}

/// Counter store bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Maximum keys tracked before the decision path fails open
    #[serde(default = "default_max_tracked_keys")]
    pub max_tracked_keys: usize,
}

/// Audit backend selection: one counting algorithm, two audit modes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default)]
    pub mode: AuditMode,
}

/// Where violation records and security events go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditMode {
    /// Hand records to the audit pipeline via structured logs
    #[default]
    Log,
    /// Ephemeral: keep counters, drop the audit trail
    Off,
}

// Default value functions
fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_auth_preset() -> LimitPreset {
    LimitPreset {
        window_ms: 15 * 60 * 1000,
        max_requests: 5,
        message: Some("Too many authentication attempts, please try again later.".to_string()),
    }
}

fn default_upload_preset() -> LimitPreset {
    LimitPreset {
        window_ms: 60 * 60 * 1000,
        max_requests: 10,
        message: Some("Upload limit reached, please try again later.".to_string()),
    }
}

fn default_mutation_preset() -> LimitPreset {
    LimitPreset {
        window_ms: 60 * 1000,
        max_requests: 20,
        message: None,
    }
}

fn default_sensitive_preset() -> LimitPreset {
    LimitPreset {
        window_ms: 15 * 60 * 1000,
        max_requests: 10,
        message: Some("Too many sensitive operations, please try again later.".to_string()),
    }
}

fn default_default_preset() -> LimitPreset {
    LimitPreset {
        window_ms: 60 * 1000,
        max_requests: 30,
        message: None,
    }
}

fn default_mutation_auth_factor() -> u32 {
    5
}

fn default_upload_auth_factor() -> u32 {
    2
}

fn default_default_auth_factor() -> u32 {
    2
}

fn default_penalty_base_ms() -> i64 {
    5 * 60 * 1000
}

fn default_penalty_multiplier() -> u32 {
    2
}

fn default_penalty_cap_ms() -> i64 {
    24 * 60 * 60 * 1000
}

fn default_janitor_interval_secs() -> u64 {
    300
}

fn default_max_tracked_keys() -> usize {
    100_000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            limits: LimitPresets::default(),
            penalty: PenaltyConfig::default(),
            janitor: JanitorConfig::default(),
            store: StoreConfig::default(),
            audit: AuditConfig::default(),
        }
    }
}

impl Default for LimitPresets {
    fn default() -> Self {
        Self {
            auth: default_auth_preset(),
            upload: default_upload_preset(),
            mutation: default_mutation_preset(),
            sensitive: default_sensitive_preset(),
            default: default_default_preset(),
            mutation_auth_factor: default_mutation_auth_factor(),
            upload_auth_factor: default_upload_auth_factor(),
            default_auth_factor: default_default_auth_factor(),
        }
    }
}

impl Default for PenaltyConfig {
    fn default() -> Self {
        Self {
            base_ms: default_penalty_base_ms(),
            multiplier: default_penalty_multiplier(),
            cap_ms: default_penalty_cap_ms(),
        }
    }
}

impl Default for JanitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_janitor_interval_secs(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_tracked_keys: default_max_tracked_keys(),
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            mode: AuditMode::default(),
        }
    }
}

impl JanitorConfig {
    /// Get the sweep interval duration
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}
