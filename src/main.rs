// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Tender Platform Rate Limiter Service
//!
//! Runs the abuse-governance rate limiter as a standalone decision
//! service: a reverse proxy posts request attributes to `/check` and
//! enforces the returned decision, while `/admin/*` exposes the
//! operator surface. Deployments embedding the limiter in-process use
//! the library's middleware instead of this binary.
//!
//! ## Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! - `TENDER_RL_BIND_ADDR`: Server bind address (default: 0.0.0.0:8080)
//! - `TENDER_RL_PENALTY_BASE_MS`: First-violation penalty (default: 300000)
//! - `TENDER_RL_PENALTY_CAP_MS`: Penalty ceiling (default: 86400000)
//! - `TENDER_RL_JANITOR_INTERVAL_SECS`: Sweep interval (default: 300)
//! - `TENDER_RL_MAX_TRACKED_KEYS`: Counter capacity (default: 100000)
//! - `TENDER_RL_AUDIT`: Audit backend, `log` or `off` (default: log)

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tender_rate_limiter::{
    config::{AuditMode, Config},
    handlers::{admin_block, admin_reset, admin_status, check, health, metrics_endpoint, AppState},
    report,
    Janitor, LimitPolicyResolver, RateLimitEngine, WindowCounterStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    // Load configuration
    let config = load_config();
    info!(
        bind_addr = %config.bind_addr,
        penalty_base_ms = config.penalty.base_ms,
        penalty_cap_ms = config.penalty.cap_ms,
        janitor_interval_secs = config.janitor.interval_secs,
        max_tracked_keys = config.store.max_tracked_keys,
        "Starting tender rate limiter"
    );

    // Create application state
    let store = Arc::new(WindowCounterStore::new(
        config.penalty.clone(),
        config.store.max_tracked_keys,
    ));
    let policy = LimitPolicyResolver::new(config.limits.clone());
    let reporter = report::reporter_for(config.audit.mode);
    let engine = RateLimitEngine::new(Arc::clone(&store), policy, reporter);

    let state = Arc::new(AppState {
        engine,
        config: config.clone(),
    });

    // Spawn janitor sweep
    let _janitor = Janitor::new(store, config.janitor.interval()).spawn();

    // Build router
    let app = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/check", post(check))
        .route("/metrics", get(metrics_endpoint))
        .route("/admin/block", post(admin_block))
        .route("/admin/reset", post(admin_reset))
        .route("/admin/status", get(admin_status))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Load configuration from environment variables.
fn load_config() -> Config {
    let mut config = Config::default();

    if let Ok(addr) = std::env::var("TENDER_RL_BIND_ADDR") {
        config.bind_addr = addr;
    }
    config.penalty.base_ms = std::env::var("TENDER_RL_PENALTY_BASE_MS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(config.penalty.base_ms);
    config.penalty.cap_ms = std::env::var("TENDER_RL_PENALTY_CAP_MS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(config.penalty.cap_ms);
    config.janitor.interval_secs = std::env::var("TENDER_RL_JANITOR_INTERVAL_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(config.janitor.interval_secs);
    config.store.max_tracked_keys = std::env::var("TENDER_RL_MAX_TRACKED_KEYS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(config.store.max_tracked_keys);
    config.audit.mode = match std::env::var("TENDER_RL_AUDIT").as_deref() {
        Ok("off") => AuditMode::Off,
        _ => AuditMode::Log,
    };

    config
}
