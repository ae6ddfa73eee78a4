// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sponsorship Gateway contributors

//! HTTP middleware: security headers, the JSON content-type gate, API-key
//! and admin authentication, and per-key rate limiting.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use std::net::SocketAddr;

use crate::auth::{extract_bearer_token, sha256_hex};
use crate::error::Error;
use crate::models::{ApiKey, ApiKeyStatus};
use crate::state::AppState;

/// Authenticated admin identity attached to request extensions.
#[derive(Debug, Clone)]
pub struct AdminEmail(pub String);

/// Add the standard security headers to every response.
pub async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert(
        "Content-Security-Policy",
        HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
    );
    headers.insert(
        "Strict-Transport-Security",
        HeaderValue::from_static("max-age=63072000; includeSubDomains"),
    );
    response
}

/// Reject body-carrying requests whose Content-Type is not JSON. An empty
/// or absent Content-Type is accepted.
pub async fn require_json(request: Request, next: Next) -> Response {
    if matches!(
        *request.method(),
        Method::POST | Method::PUT | Method::PATCH
    ) {
        let content_type = request
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("");
        if !content_type.is_empty() && !content_type.starts_with("application/json") {
            return Error::unsupported_media_type(
                "unsupported_media_type",
                "Content-Type must be application/json",
            )
            .into_response();
        }
    }
    next.run(request).await
}

/// Authenticate data-plane requests via `Authorization: Bearer <raw_key>`.
///
/// Failures count against the per-IP auth-attempt limiter; a success
/// clears the IP's entry and attaches the [`ApiKey`] to the request.
pub async fn api_key_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let attempt_key = client_ip_key(&request, "api_key");
    if !state.auth_attempts.allow(&attempt_key) {
        return Error::too_many_requests("rate_limited", "Too many authentication failures")
            .into_response();
    }

    let Some(token) = extract_bearer_token(request.headers()).map(str::to_string) else {
        state.auth_attempts.register_failure(&attempt_key);
        return Error::unauthorized("invalid_api_key", "Missing API key").into_response();
    };

    let key_hash = sha256_hex(&token);
    let api_key = match state.store.get_api_key_by_hash(&key_hash).await {
        Ok(Some(api_key)) => api_key,
        Ok(None) => {
            state.auth_attempts.register_failure(&attempt_key);
            return Error::unauthorized("invalid_api_key", "Invalid API key").into_response();
        }
        Err(err) => {
            tracing::error!(error = %err, "failed to look up API key");
            state.auth_attempts.register_failure(&attempt_key);
            return Error::unauthorized("invalid_api_key", "Invalid API key").into_response();
        }
    };

    if Utc::now() > api_key.expires_at {
        state.auth_attempts.register_failure(&attempt_key);
        return Error::unauthorized("invalid_api_key", "API key has expired").into_response();
    }

    if api_key.status != ApiKeyStatus::Active {
        state.auth_attempts.register_failure(&attempt_key);
        return Error::forbidden("key_disabled", "API key is not active").into_response();
    }

    state.auth_attempts.register_success(&attempt_key);
    request.extensions_mut().insert(api_key);
    next.run(request).await
}

/// Authenticate admin requests via Google ID tokens.
pub async fn admin_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let attempt_key = client_ip_key(&request, "google_admin");
    if !state.auth_attempts.allow(&attempt_key) {
        return Error::too_many_requests("rate_limited", "Too many authentication failures")
            .into_response();
    }

    let Some(token) = extract_bearer_token(request.headers()).map(str::to_string) else {
        state.auth_attempts.register_failure(&attempt_key);
        return Error::unauthorized("unauthorized", "Missing authorization token")
            .into_response();
    };

    match state.admin_auth.authenticate(&token).await {
        Ok(email) => {
            state.auth_attempts.register_success(&attempt_key);
            request.extensions_mut().insert(AdminEmail(email));
            next.run(request).await
        }
        Err(err) => {
            state.auth_attempts.register_failure(&attempt_key);
            err.into_response()
        }
    }
}

/// Enforce the authenticated key's rate limit and attach the
/// `X-RateLimit-*` headers to the response.
pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(api_key) = request.extensions().get::<ApiKey>().cloned() else {
        return next.run(request).await;
    };

    if api_key.rate_limit_max <= 0 || api_key.rate_limit_window <= 0 {
        return Error::internal(
            "invalid_key_configuration",
            "API key rate limit configuration is invalid",
        )
        .into_response();
    }

    let decision = state.rate_limiter.allow(&api_key);

    let mut response = if decision.allowed {
        next.run(request).await
    } else {
        Error::too_many_requests("rate_limited", "Rate limit exceeded").into_response()
    };

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&api_key.rate_limit_max.to_string()) {
        headers.insert("X-RateLimit-Limit", value);
    }
    if let Ok(value) = HeaderValue::from_str(&decision.remaining.to_string()) {
        headers.insert("X-RateLimit-Remaining", value);
    }
    if let Ok(value) = HeaderValue::from_str(&decision.reset_at.timestamp().to_string()) {
        headers.insert("X-RateLimit-Reset", value);
    }
    response
}

/// Namespaced client-IP key for the auth-attempt limiter. Falls back to
/// `"unknown"` when the peer address is unavailable.
fn client_ip_key(request: &Request, prefix: &str) -> String {
    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    format!("{prefix}:{ip}")
}
