//! Axum HTTP surface for the auth gate.
//!
//! Mounts the public `/auth` routes (status, login, logout), a guarded demo
//! route under `/api`, and the hardening layers the gate expects from its
//! host: a request body limit and a request timeout. The gate itself lives
//! in [`crate::gate`]; everything here is wiring.

pub(crate) mod handlers;

use crate::config::Config;
use crate::gate::{AuthGate, SetupOutcome};
use anyhow::{Context, Result};
use axum::{
    Router,
    http::StatusCode,
    middleware,
    routing::{get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Maximum request body size (64KB) — login bodies are tiny
pub const MAX_BODY_SIZE: usize = 65_536;
/// Request timeout (30s) — prevents slow-loris attacks
pub const REQUEST_TIMEOUT_SECS: u64 = 30;
/// How often stale attempt-tracker entries are swept.
const ATTEMPT_SWEEP_INTERVAL_SECS: u64 = 600;

/// Shared state for all axum handlers
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<AuthGate>,
}

/// Login request body
#[derive(serde::Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

/// Run the gate server on the configured address.
pub async fn run_server(config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("parse server bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("bind server socket")?;
    let host = config.server.host.clone();
    run_server_with_listener(&host, listener, config).await
}

/// Run the gate server from a pre-bound listener.
pub async fn run_server_with_listener(
    host: &str,
    listener: tokio::net::TcpListener,
    config: Config,
) -> Result<()> {
    let actual_port = listener
        .local_addr()
        .context("get listener local address")?
        .port();
    let display_addr = format!("{host}:{actual_port}");

    let (gate, outcome) = AuthGate::setup(config.auth_options())
        .await
        .context("set up auth gate")?;
    let gate = Arc::new(gate);

    print_banner(&display_addr, &outcome);

    // Bound the attempts map for long-running processes; throttling inside
    // a live window is unaffected.
    let sweep_gate = Arc::clone(&gate);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(ATTEMPT_SWEEP_INTERVAL_SECS));
        loop {
            ticker.tick().await;
            sweep_gate.sweep_attempts();
        }
    });

    let app = build_app(AppState { gate });
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("serve auth gate")?;

    Ok(())
}

fn build_app(state: AppState) -> Router {
    let auth = Router::new()
        .route("/status", get(handlers::handle_status))
        .route("/login", post(handlers::handle_login))
        .route("/logout", post(handlers::handle_logout));

    let protected = Router::new()
        .route("/ping", get(handlers::handle_ping))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            handlers::require_auth,
        ));

    Router::new()
        .nest("/auth", auth)
        .nest("/api", protected)
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        ))
}

fn print_banner(display_addr: &str, outcome: &SetupOutcome) {
    println!("mdgate listening on {display_addr}");
    println!("  GET  /auth/status");
    println!("  POST /auth/login");
    println!("  POST /auth/logout");
    if outcome.enabled {
        if let Some(ref password) = outcome.generated_password {
            println!();
            println!("  Generated password (shown once, not persisted):");
            println!("     {password}");
        } else {
            println!("  Password auth active");
        }
    } else {
        println!("  Auth disabled — all routes are open");
    }
}
