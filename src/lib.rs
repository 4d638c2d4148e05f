// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Tender Platform Rate Limiter
//!
//! This crate provides the abuse-governance subsystem for the tender
//! platform API: a request-rate limiter with progressive, escalating
//! penalties and administrative IP-blocking, sitting in front of all
//! mutating and authentication endpoints.
//!
//! - Fixed-window counting per (caller identity, endpoint category)
//! - Policy presets: auth, upload, mutation, sensitive, default
//! - Exponential penalties (5m doubling up to 24h) for repeat offenders
//! - Administrative block/reset/status surface
//! - Background janitor bounding memory
//! - Fire-and-forget violation reporting for audit
//!
//! ## Usage
//!
//! Two modes of operation:
//!
//! 1. **In-process middleware**: guard an axum router with
//!    [`middleware::rate_limit_middleware`].
//!
//! 2. **External decision service**: a reverse proxy posts request
//!    attributes to `/check` and enforces the returned decision.
//!
//! The decision path fails open: an internal limiter fault is logged
//! and the request allowed, never turned into an outage.

pub mod config;
pub mod engine;
pub mod handlers;
pub mod identity;
pub mod janitor;
pub mod metrics;
pub mod middleware;
pub mod penalty;
pub mod policy;
pub mod report;
pub mod store;

pub use config::Config;
pub use engine::{RateLimitEngine, RequestContext};
pub use janitor::{Janitor, JanitorHandle};
pub use middleware::{rate_limit_middleware, AuthenticatedCaller};
pub use policy::{LimitPolicyResolver, RateLimitConfig};
pub use store::{RateLimitDecision, WindowCounterStore};
