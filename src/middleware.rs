// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Axum middleware adapter.
//!
//! Translates an engine decision into protocol-level effects: quota
//! headers on every response, 429 with a retry hint on denial. The
//! decision path fails open (an internal limiter fault must never
//! become a denial of service against legitimate traffic), while the
//! denial itself always carries a machine-readable reason and never
//! leaks internal state.

use crate::handlers::AppState;
use crate::store::{now_ms, RateLimitDecision};
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::warn;

/// Inserted into request extensions by the session layer when the
/// caller holds a valid session. Presence alone selects the
/// authenticated quota tier; the subject is carried for audit.
#[derive(Debug, Clone)]
pub struct AuthenticatedCaller {
    pub subject: String,
}

const DEFAULT_DENIAL_MESSAGE: &str = "Too many requests, please try again later.";

/// Denial body, shaped for the platform's JS frontend.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RateLimitedBody<'a> {
    error: &'static str,
    message: &'a str,
    retry_after_ms: i64,
}

/// Guard a router with the rate limiter. Apply with
/// `axum::middleware::from_fn_with_state(state, rate_limit_middleware)`.
pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let now = now_ms();

    let decision = {
        let peer_ip = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0.ip());
        let forwarded_for = header_str(req.headers(), "x-forwarded-for");
        let real_ip = header_str(req.headers(), "x-real-ip");
        let authenticated = req.extensions().get::<AuthenticatedCaller>().is_some();

        let ctx = crate::engine::RequestContext {
            peer_ip,
            forwarded_for,
            real_ip,
            path: req.uri().path(),
            method: req.method().as_str(),
            authenticated,
        };
        state.engine.check(&ctx, now)
    };

    match decision {
        Ok(decision) if decision.allowed => {
            let mut response = next.run(req).await;
            apply_quota_headers(response.headers_mut(), &decision);
            response
        }
        Ok(decision) => too_many_requests(&decision),
        Err(err) => {
            // fail open on the decision path
            warn!(error = %err, "rate limiter unavailable, allowing request");
            next.run(req).await
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Quota headers are set on success and denial alike.
fn apply_quota_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(
        HeaderName::from_static("x-ratelimit-limit"),
        HeaderValue::from(decision.limit),
    );
    headers.insert(
        HeaderName::from_static("x-ratelimit-remaining"),
        HeaderValue::from(decision.remaining),
    );
    headers.insert(
        HeaderName::from_static("x-ratelimit-reset"),
        HeaderValue::from(decision.reset_at / 1000),
    );
}

fn too_many_requests(decision: &RateLimitDecision) -> Response {
    let body = RateLimitedBody {
        error: "TOO_MANY_REQUESTS",
        message: decision.message.as_deref().unwrap_or(DEFAULT_DENIAL_MESSAGE),
        retry_after_ms: decision.retry_after_ms,
    };

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    apply_quota_headers(response.headers_mut(), decision);
    response.headers_mut().insert(
        header::RETRY_AFTER,
        HeaderValue::from(decision.retry_after_secs()),
    );
    response
}
