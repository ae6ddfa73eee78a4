// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sponsorship Gateway contributors

//! HTTP surface: router assembly, middleware layering, and OpenAPI
//! documentation.

use axum::{
    body::Bytes,
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::error::Error;
use crate::state::AppState;

pub mod admin;
pub mod health;
pub mod info;
pub mod middleware;
pub mod pagination;
pub mod sign;
pub mod usage;

/// Request body size limit (1 MiB).
const MAX_BODY_BYTES: usize = 1 << 20;

pub fn router(state: AppState) -> Router {
    let client_routes = Router::new()
        .route("/sign", post(sign::sign))
        .route("/usage", get(usage::usage))
        .layer(from_fn_with_state(state.clone(), middleware::rate_limit))
        .layer(from_fn_with_state(state.clone(), middleware::api_key_auth));

    let admin_routes = Router::new()
        .route(
            "/api-keys",
            get(admin::keys::list).post(admin::keys::create),
        )
        .route(
            "/api-keys/{id}",
            get(admin::keys::get).patch(admin::keys::update),
        )
        .route("/api-keys/{id}/revoke", post(admin::keys::revoke))
        .route("/api-keys/{id}/regenerate", post(admin::keys::regenerate))
        .route("/api-keys/{id}/activate", post(admin::funding::build_activate))
        .route(
            "/api-keys/{id}/activate/submit",
            post(admin::funding::submit_activate),
        )
        .route("/api-keys/{id}/fund", post(admin::funding::build_fund))
        .route(
            "/api-keys/{id}/fund/submit",
            post(admin::funding::submit_fund),
        )
        .route("/api-keys/{id}/sweep", post(admin::funding::sweep))
        .route("/transactions", get(admin::transactions::list))
        .route(
            "/transactions/{id}/check",
            post(admin::transactions::check),
        )
        .layer(from_fn_with_state(state.clone(), middleware::admin_auth));

    Router::new()
        .route("/health", get(health::health))
        .route("/info", get(info::info))
        .route("/api-doc/openapi.json", get(openapi_json))
        .nest("/v1", client_routes)
        .nest("/admin", admin_routes)
        .layer(from_fn(middleware::require_json))
        .layer(from_fn(middleware::security_headers))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(build_cors_layer(&state.config.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Parse a JSON request body into the standard error envelope on failure.
pub(crate) fn parse_json_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, Error> {
    serde_json::from_slice(body)
        .map_err(|_| Error::bad_request("invalid_request", "Invalid request body"))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Build the CORS layer from configuration.
///
/// With no configured origins the layer is permissive, which is only
/// acceptable in development.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        tracing::warn!("CORS_ORIGINS not set - using permissive CORS (development only)");
        return CorsLayer::permissive();
    }

    let allowed: Vec<_> = origins
        .iter()
        .map(|origin| origin.parse().expect("Invalid CORS origin"))
        .collect();
    tracing::info!(origins = ?origins, "CORS: restricting to configured origins");
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        info::info,
        sign::sign,
        usage::usage,
        admin::keys::list,
        admin::keys::get,
        admin::keys::create,
        admin::keys::update,
        admin::keys::revoke,
        admin::keys::regenerate,
        admin::funding::build_activate,
        admin::funding::submit_activate,
        admin::funding::build_fund,
        admin::funding::submit_fund,
        admin::funding::sweep,
        admin::transactions::list,
        admin::transactions::check,
    ),
    components(
        schemas(
            crate::models::ApiKeyStatus,
            crate::models::TransactionStatus,
            crate::models::SubmissionStatus,
            crate::storage::ApiKeyUpdates,
            health::HealthResponse,
            info::InfoResponse,
            sign::SignRequest,
            sign::SignResponse,
            usage::UsageResponse,
            usage::RateLimitInfo,
            admin::keys::ApiKeyItem,
            admin::keys::ApiKeyListResponse,
            admin::keys::CreateApiKeyRequest,
            admin::keys::RateLimitRequest,
            admin::keys::CreateApiKeyResponse,
            admin::keys::RevokeApiKeyResponse,
            admin::keys::RegenerateApiKeyResponse,
            admin::funding::BuildActivateResponse,
            admin::funding::SubmitTransactionRequest,
            admin::funding::SubmitActivateResponse,
            admin::funding::BuildFundRequest,
            admin::funding::BuildFundResponse,
            admin::funding::SubmitFundResponse,
            admin::funding::SweepResponse,
            admin::transactions::TransactionItem,
            admin::transactions::TransactionListResponse,
            admin::transactions::CheckTransactionResponse,
        )
    ),
    tags(
        (name = "Public", description = "Unauthenticated service information"),
        (name = "Signing", description = "API-key authenticated co-signing"),
        (name = "Admin", description = "OIDC-protected key and lifecycle management")
    ),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
            let scheme = Http::builder()
                .scheme(HttpAuthScheme::Bearer)
                .description(Some("API key or Google ID token"))
                .build();
            components.add_security_scheme("bearer", SecurityScheme::Http(scheme));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ApiKeyStatus;
    use crate::service::testutil::{active_key, MockStore, StubHorizon};
    use crate::state::testutil::test_state;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_app() -> (Router, Arc<MockStore>, Arc<StubHorizon>) {
        let store = Arc::new(MockStore::new());
        let horizon = Arc::new(StubHorizon::default());
        let state = test_state(store.clone(), horizon.clone());
        (router(state), store, horizon)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_is_public_and_carries_security_headers() {
        let (app, _, _) = test_app();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("X-Content-Type-Options").unwrap(),
            "nosniff"
        );
        assert_eq!(response.headers().get("X-Frame-Options").unwrap(), "DENY");
        assert_eq!(
            response.headers().get("Strict-Transport-Security").unwrap(),
            "max-age=63072000; includeSubDomains"
        );

        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["stellar_network"], "testnet");
    }

    #[tokio::test]
    async fn info_reports_base_reserve_and_supported_operations() {
        let (app, _, _) = test_app();
        let response = app
            .oneshot(Request::builder().uri("/info").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["base_reserve"], "0.5000000");
        let ops = body["supported_operations"].as_array().unwrap();
        assert_eq!(ops.len(), 7);
        assert!(!ops.iter().any(|o| o == "BEGIN_SPONSORING_FUTURE_RESERVES"));
    }

    #[tokio::test]
    async fn sign_requires_an_api_key() {
        let (app, _, _) = test_app();
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/sign")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["error"], "invalid_api_key");
    }

    #[tokio::test]
    async fn content_type_gate_rejects_non_json_posts() {
        let (app, _, _) = test_app();
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/sign")
                    .header(header::CONTENT_TYPE, "text/plain")
                    .body(Body::from("hello"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        let body = body_json(response).await;
        assert_eq!(body["error"], "unsupported_media_type");
    }

    #[tokio::test]
    async fn rate_limit_headers_count_down_and_block() {
        let store = Arc::new(MockStore::new());
        let horizon = Arc::new(StubHorizon::default());

        let mut key = active_key("GSPONSOR", &["MANAGE_DATA"]);
        key.key_hash = crate::auth::sha256_hex("sk_test_ratelimit");
        key.rate_limit_max = 2;
        key.rate_limit_window = 60;
        store.insert_key(key);

        let app = router(test_state(store, horizon));

        let request = || {
            Request::builder()
                .uri("/v1/usage")
                .header(header::AUTHORIZATION, "Bearer sk_test_ratelimit")
                .body(Body::empty())
                .unwrap()
        };

        let first = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(first.headers().get("X-RateLimit-Limit").unwrap(), "2");
        assert_eq!(first.headers().get("X-RateLimit-Remaining").unwrap(), "1");

        let second = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(second.headers().get("X-RateLimit-Remaining").unwrap(), "0");

        let third = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(third.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(third.headers().get("X-RateLimit-Remaining").unwrap(), "0");
        let body = body_json(third).await;
        assert_eq!(body["error"], "rate_limited");
    }

    #[tokio::test]
    async fn expired_and_disabled_keys_cannot_authenticate() {
        let store = Arc::new(MockStore::new());
        let horizon = Arc::new(StubHorizon::default());

        let mut expired = active_key("GSPONSOR", &["MANAGE_DATA"]);
        expired.key_hash = crate::auth::sha256_hex("sk_test_expired");
        expired.expires_at = chrono::Utc::now() - chrono::Duration::hours(1);
        store.insert_key(expired);

        let mut pending = active_key("GSPONSOR", &["MANAGE_DATA"]);
        pending.key_hash = crate::auth::sha256_hex("sk_test_pending");
        pending.status = ApiKeyStatus::PendingFunding;
        store.insert_key(pending);

        let app = router(test_state(store, horizon));

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/v1/usage")
                    .header(header::AUTHORIZATION, "Bearer sk_test_expired")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["message"], "API key has expired");

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v1/usage")
                    .header(header::AUTHORIZATION, "Bearer sk_test_pending")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = body_json(response).await;
        assert_eq!(body["error"], "key_disabled");
    }

    #[tokio::test]
    async fn admin_routes_require_a_valid_token() {
        let (app, _, _) = test_app();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/admin/api-keys")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/admin/api-keys")
                    .header(header::AUTHORIZATION, "Bearer wrong-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/admin/api-keys")
                    .header(header::AUTHORIZATION, "Bearer admin-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["total"], 0);
    }

    #[tokio::test]
    async fn admin_create_key_returns_raw_secret_once() {
        let (app, store, _) = test_app();

        let payload = serde_json::json!({
            "name": "integration",
            "xlm_budget": "50",
            "allowed_operations": ["MANAGE_DATA"],
            "expires_at": (chrono::Utc::now() + chrono::Duration::days(7)).to_rfc3339(),
        });

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/admin/api-keys")
                    .header(header::AUTHORIZATION, "Bearer admin-token")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert!(body["api_key"].as_str().unwrap().starts_with("sk_test_"));
        assert_eq!(body["status"], "pending_funding");
        assert_eq!(store.keys.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn generate_openapi_document() {
        let doc = ApiDoc::openapi().to_json().unwrap();
        assert!(doc.contains("/v1/sign"));
        assert!(doc.contains("/admin/api-keys"));
    }
}
