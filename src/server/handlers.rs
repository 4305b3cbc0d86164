use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use std::net::SocketAddr;

use super::{AppState, LoginRequest};
use crate::error::GateError;
use crate::gate::cookie;

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({"error": message}))).into_response()
}

fn gate_error_response(err: &GateError) -> Response {
    match err {
        GateError::Validation(message) => error_response(StatusCode::BAD_REQUEST, message),
        GateError::Authentication => error_response(StatusCode::UNAUTHORIZED, "Invalid password"),
        GateError::RateLimited => {
            error_response(StatusCode::TOO_MANY_REQUESTS, "Too many attempts. Try later.")
        }
        GateError::Kdf(_) | GateError::Internal(_) => {
            tracing::error!(error = %err, "login failed internally");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Auth failed")
        }
    }
}

fn cookie_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())
}

/// Resolve the throttling address: first `x-forwarded-for` value, else the
/// peer address, else one shared bucket for unidentifiable clients.
pub(super) fn client_address(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|first| !first.is_empty())
        .map(ToOwned::to_owned)
        .or_else(|| peer.map(|peer| peer.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_owned())
}

// The server itself speaks plain HTTP; TLS termination happens upstream and
// is signalled through the forwarded-proto header.
pub(super) fn request_is_https(headers: &HeaderMap) -> bool {
    headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|proto| proto.eq_ignore_ascii_case("https"))
}

/// GET /auth/status — always public.
pub(super) async fn handle_status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if !state.gate.enabled() {
        return Json(json!({"authenticated": true, "disabled": true}));
    }
    let authenticated = state.gate.is_authenticated(cookie_header(&headers));
    Json(json!({"authenticated": authenticated}))
}

/// POST /auth/login — throttled password check; sets the session cookie.
pub(super) async fn handle_login(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Result<Json<LoginRequest>, axum::extract::rejection::JsonRejection>,
) -> Response {
    if !state.gate.enabled() {
        return (StatusCode::OK, Json(json!({"ok": true}))).into_response();
    }

    let Ok(Json(login)) = body else {
        return gate_error_response(&GateError::Validation("Password required"));
    };

    let addr = client_address(&headers, Some(peer));
    match state.gate.attempt_login(&addr, &login.password).await {
        Ok(token) => {
            let cookie = cookie::session_cookie(
                &token,
                request_is_https(&headers),
                state.gate.session_ttl_secs(),
            );
            (
                StatusCode::OK,
                [(header::SET_COOKIE, cookie)],
                Json(json!({"ok": true})),
            )
                .into_response()
        }
        Err(err) => gate_error_response(&err),
    }
}

/// POST /auth/logout — clear the cookie unconditionally.
pub(super) async fn handle_logout() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::SET_COOKIE, cookie::clear_cookie())],
        Json(json!({"ok": true})),
    )
}

/// GET /api/ping — stands in for the host's guarded routes.
pub(super) async fn handle_ping() -> impl IntoResponse {
    Json(json!({"ok": true}))
}

/// Guard middleware for protected routes.
///
/// Absent and invalid sessions produce the identical response; nothing
/// reveals which check failed.
pub(super) async fn require_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if state.gate.is_authenticated(cookie_header(request.headers())) {
        next.run(request).await
    } else {
        error_response(StatusCode::UNAUTHORIZED, "Unauthorized")
    }
}
