// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the rate limiter service.
//!
//! `/check` serves reverse-proxy integrations: the proxy posts the
//! request attributes and receives the allow/deny decision with quota
//! metadata. The `/admin` endpoints expose the operator surface
//! (block, reset, status). Deployments embedding the limiter
//! in-process use [`crate::middleware::rate_limit_middleware`] instead.

use crate::config::Config;
use crate::engine::{RateLimitEngine, RequestContext};
use crate::metrics;
use crate::store::now_ms;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Shared application state.
pub struct AppState {
    pub engine: RateLimitEngine,
    pub config: Config,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Rate limit check request (for external validation).
#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub ip: String,
    pub path: String,
    pub method: String,
    #[serde(default)]
    pub authenticated: bool,
}

/// Rate limit check response.
#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Window reset time, epoch seconds
    pub reset_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Administrative block request.
#[derive(Debug, Deserialize)]
pub struct BlockRequest {
    pub identity: String,
    pub duration_ms: i64,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BlockResponse {
    pub identity: String,
    /// Block end, epoch ms
    pub blocked_until: i64,
}

/// Administrative reset request.
#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub key: String,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub key: String,
    pub removed: bool,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub key: String,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "tender-rate-limiter",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Check the rate limit for a request on behalf of a reverse proxy.
///
/// The proxy has already terminated the connection, so the client
/// address arrives resolved in the body and forwarded headers are not
/// consulted again here.
pub async fn check(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CheckRequest>,
) -> Response {
    debug!(
        ip = %req.ip,
        path = %req.path,
        method = %req.method,
        authenticated = req.authenticated,
        "Processing rate limit check"
    );

    if req.ip.trim().is_empty() {
        warn!("Missing client address in check request");
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Missing client address".to_string(),
                code: "INVALID_REQUEST",
            }),
        )
            .into_response();
    }

    let now = now_ms();
    let ctx = RequestContext {
        peer_ip: None,
        forwarded_for: Some(req.ip.as_str()),
        real_ip: None,
        path: &req.path,
        method: &req.method,
        authenticated: req.authenticated,
    };

    match state.engine.check(&ctx, now) {
        Ok(decision) => {
            let retry_after_secs = (!decision.allowed).then(|| decision.retry_after_secs());
            let reason = (!decision.allowed).then(|| "TOO_MANY_REQUESTS".to_string());
            Json(CheckResponse {
                allowed: decision.allowed,
                limit: decision.limit,
                remaining: decision.remaining,
                reset_at: decision.reset_at / 1000,
                retry_after_secs,
                reason,
            })
            .into_response()
        }
        Err(err) => {
            // fail open, mirroring the in-process middleware
            warn!(error = %err, "rate limiter unavailable, allowing request");
            Json(CheckResponse {
                allowed: true,
                limit: 0,
                remaining: 0,
                reset_at: now / 1000,
                retry_after_secs: None,
                reason: None,
            })
            .into_response()
        }
    }
}

/// Force-apply a penalty window to an identity (DDoS response).
pub async fn admin_block(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BlockRequest>,
) -> Response {
    if req.duration_ms <= 0 {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "duration_ms must be positive".to_string(),
                code: "INVALID_REQUEST",
            }),
        )
            .into_response();
    }

    let reason = req.reason.as_deref().unwrap_or("manual");
    let blocked_until =
        state
            .engine
            .store()
            .block(&req.identity, req.duration_ms, reason, now_ms());
    metrics::ADMIN_BLOCKS_TOTAL.inc();

    Json(BlockResponse {
        identity: req.identity,
        blocked_until,
    })
    .into_response()
}

/// Drop a key's counter state (operator intervention).
pub async fn admin_reset(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResetRequest>,
) -> Json<ResetResponse> {
    let removed = state.engine.store().reset(&req.key);
    Json(ResetResponse {
        key: req.key,
        removed,
    })
}

/// Introspect a key's counter state.
pub async fn admin_status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatusQuery>,
) -> Response {
    match state.engine.store().status(&query.key) {
        Some(entry) => Json(serde_json::json!({
            "key": query.key,
            "count": entry.count,
            "window_reset_at": entry.window_reset_at,
            "violation_count": entry.violation_count,
            "penalty_until": entry.penalty_until,
        }))
        .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("No counter state for key {}", query.key),
                code: "KEY_NOT_FOUND",
            }),
        )
            .into_response(),
    }
}

/// Prometheus metrics endpoint.
pub async fn metrics_endpoint() -> Response {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    match encoder.encode(&families, &mut buffer) {
        Ok(()) => (StatusCode::OK, buffer).into_response(),
        Err(err) => {
            warn!(error = %err, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
