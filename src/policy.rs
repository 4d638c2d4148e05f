// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Limit policy resolution.
//!
//! Maps an incoming request's path, method and auth state to a
//! [`RateLimitConfig`]. Pure and deterministic: no store access, no
//! side effects, re-evaluated on every request because the policy
//! depends on request attributes, not on the caller's history.

use crate::config::{LimitPreset, LimitPresets};
use serde::{Deserialize, Serialize};

/// Category label for authentication endpoints.
pub const LABEL_AUTH: &str = "auth";
/// Category label for upload endpoints.
pub const LABEL_UPLOAD: &str = "upload";
/// Category label for mutating API calls.
pub const LABEL_MUTATION: &str = "mutation";
/// Category label for sensitive operations.
pub const LABEL_SENSITIVE: &str = "sensitive";
/// Category label for everything else.
pub const LABEL_DEFAULT: &str = "default";

/// The window/quota pair chosen for one request. Immutable once
/// resolved; presets are looked up and scaled, never mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Window duration in milliseconds
    pub window_ms: i64,

    /// Requests permitted per window
    pub max_requests: u32,

    /// Endpoint category; second half of the counter key
    pub label: String,

    /// Human-readable hint returned on denial
    pub message: Option<String>,
}

impl RateLimitConfig {
    fn from_preset(preset: &LimitPreset, label: &str, quota_factor: u32) -> Self {
        Self {
            window_ms: preset.window_ms,
            max_requests: preset.max_requests.saturating_mul(quota_factor.max(1)),
            label: label.to_string(),
            message: preset.message.clone(),
        }
    }
}

/// Resolves the limit policy for a request.
pub struct LimitPolicyResolver {
    presets: LimitPresets,
}

impl LimitPolicyResolver {
    /// Create a resolver over the given presets.
    pub fn new(presets: LimitPresets) -> Self {
        Self { presets }
    }

    /// Resolve the config for a request.
    ///
    /// - Authentication paths get the strict preset regardless of auth
    ///   state.
    /// - Upload paths get the hourly preset, scaled for authenticated
    ///   callers. Checked before the general mutation rule since
    ///   uploads are POSTs under the API namespace too.
    /// - Mutating methods under `/api` get the mutation preset, scaled
    ///   for authenticated callers.
    /// - Everything else gets the default preset, scaled for
    ///   authenticated callers.
    pub fn resolve(&self, path: &str, method: &str, authenticated: bool) -> RateLimitConfig {
        if is_auth_path(path) {
            return RateLimitConfig::from_preset(&self.presets.auth, LABEL_AUTH, 1);
        }

        if is_upload_path(path) {
            let factor = if authenticated {
                self.presets.upload_auth_factor
            } else {
                1
            };
            return RateLimitConfig::from_preset(&self.presets.upload, LABEL_UPLOAD, factor);
        }

        if is_mutating(method) && path.starts_with("/api/") {
            let factor = if authenticated {
                self.presets.mutation_auth_factor
            } else {
                1
            };
            return RateLimitConfig::from_preset(&self.presets.mutation, LABEL_MUTATION, factor);
        }

        let factor = if authenticated {
            self.presets.default_auth_factor
        } else {
            1
        };
        RateLimitConfig::from_preset(&self.presets.default, LABEL_DEFAULT, factor)
    }

    /// Look up a named preset directly, unscaled. Lets the hosting
    /// application pin an endpoint to a preset (notably `sensitive`)
    /// without touching the decision engine.
    pub fn preset(&self, label: &str) -> Option<RateLimitConfig> {
        let preset = match label {
            LABEL_AUTH => &self.presets.auth,
            LABEL_UPLOAD => &self.presets.upload,
            LABEL_MUTATION => &self.presets.mutation,
            LABEL_SENSITIVE => &self.presets.sensitive,
            LABEL_DEFAULT => &self.presets.default,
            _ => return None,
        };
        Some(RateLimitConfig::from_preset(preset, label, 1))
    }
}

fn is_auth_path(path: &str) -> bool {
    path.starts_with("/api/auth") || path.starts_with("/login")
}

fn is_upload_path(path: &str) -> bool {
    path.starts_with("/api/upload")
}

fn is_mutating(method: &str) -> bool {
    method.eq_ignore_ascii_case("POST")
        || method.eq_ignore_ascii_case("PUT")
        || method.eq_ignore_ascii_case("DELETE")
        || method.eq_ignore_ascii_case("PATCH")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_resolver() -> LimitPolicyResolver {
        LimitPolicyResolver::new(LimitPresets::default())
    }

    #[test]
    fn test_auth_paths_ignore_auth_state() {
        let resolver = default_resolver();

        let anon = resolver.resolve("/api/auth/login", "POST", false);
        let auth = resolver.resolve("/api/auth/login", "POST", true);

        assert_eq!(anon.label, LABEL_AUTH);
        assert_eq!(anon.max_requests, 5);
        assert_eq!(auth.max_requests, anon.max_requests);
        assert_eq!(anon.window_ms, 15 * 60 * 1000);
    }

    #[test]
    fn test_mutation_scaled_for_authenticated() {
        let resolver = default_resolver();

        let anon = resolver.resolve("/api/tenders", "POST", false);
        let auth = resolver.resolve("/api/tenders", "POST", true);

        assert_eq!(anon.label, LABEL_MUTATION);
        assert_eq!(anon.max_requests, 20);
        assert_eq!(auth.max_requests, 100);
    }

    #[test]
    fn test_upload_beats_mutation_rule() {
        let resolver = default_resolver();

        let anon = resolver.resolve("/api/upload/documents", "POST", false);
        let auth = resolver.resolve("/api/upload/documents", "POST", true);

        assert_eq!(anon.label, LABEL_UPLOAD);
        assert_eq!(anon.window_ms, 60 * 60 * 1000);
        assert_eq!(anon.max_requests, 10);
        assert_eq!(auth.max_requests, 20);
    }

    #[test]
    fn test_reads_fall_back_to_default() {
        let resolver = default_resolver();

        let anon = resolver.resolve("/api/tenders", "GET", false);
        let auth = resolver.resolve("/api/tenders", "GET", true);

        assert_eq!(anon.label, LABEL_DEFAULT);
        assert_eq!(anon.max_requests, 30);
        assert_eq!(auth.max_requests, 60);
    }

    #[test]
    fn test_method_case_insensitive() {
        let resolver = default_resolver();
        let config = resolver.resolve("/api/tenders", "delete", false);
        assert_eq!(config.label, LABEL_MUTATION);
    }

    #[test]
    fn test_sensitive_preset_lookup() {
        let resolver = default_resolver();

        let sensitive = resolver.preset(LABEL_SENSITIVE).expect("preset exists");
        assert_eq!(sensitive.label, LABEL_SENSITIVE);
        assert_eq!(sensitive.max_requests, 10);

        assert!(resolver.preset("nonexistent").is_none());
    }
}
