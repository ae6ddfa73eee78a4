// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sponsorship Gateway contributors

//! Admin API-key CRUD.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::{pagination::Pagination, parse_json_body};
use crate::error::Error;
use crate::models::{ApiKey, ApiKeyStatus};
use crate::service::api_keys::CreateApiKeyInput;
use crate::state::AppState;
use crate::stellar::amount::format_stroops;
use crate::storage::ApiKeyUpdates;

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiKeyItem {
    pub id: Uuid,
    pub name: String,
    pub key_prefix: String,
    pub sponsor_account: String,
    pub xlm_budget: String,
    pub xlm_available: String,
    pub allowed_operations: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allowed_source_accounts: Vec<String>,
    pub rate_limit_max: i32,
    pub rate_limit_window: i32,
    pub expires_at: String,
    pub status: ApiKeyStatus,
    pub created_at: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiKeyListResponse {
    pub api_keys: Vec<ApiKeyItem>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateApiKeyRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub xlm_budget: String,
    #[serde(default)]
    pub allowed_operations: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub rate_limit: Option<RateLimitRequest>,
    #[serde(default)]
    pub allowed_source_accounts: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RateLimitRequest {
    pub max_requests: i32,
    pub window_seconds: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateApiKeyResponse {
    pub id: Uuid,
    pub name: String,
    /// The raw secret. Returned exactly once, at creation.
    pub api_key: String,
    pub xlm_budget: String,
    pub allowed_operations: Vec<String>,
    pub expires_at: String,
    pub status: ApiKeyStatus,
    pub created_at: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RevokeApiKeyResponse {
    pub id: Uuid,
    pub status: ApiKeyStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegenerateApiKeyResponse {
    pub id: Uuid,
    /// The new raw secret. Returned exactly once.
    pub api_key: String,
    pub key_prefix: String,
}

/// Available balance for display: only fetched for active keys, and a
/// ledger failure degrades to the zero default.
async fn display_available(state: &AppState, key: &ApiKey) -> String {
    if key.status != ApiKeyStatus::Active {
        return "0.0000000".to_string();
    }
    match state.accounts.get_balance(key.sponsor_account()).await {
        Ok((available, _)) => available,
        Err(err) => {
            tracing::error!(
                sponsor = %key.sponsor_account(),
                error = %err,
                "failed to get balance"
            );
            "0.0000000".to_string()
        }
    }
}

fn to_item(key: &ApiKey, available: String) -> ApiKeyItem {
    ApiKeyItem {
        id: key.id,
        name: key.name.clone(),
        key_prefix: key.key_prefix.clone(),
        sponsor_account: key.sponsor_account().to_string(),
        xlm_budget: format_stroops(key.xlm_budget),
        xlm_available: available,
        allowed_operations: key.allowed_operations.clone(),
        allowed_source_accounts: key.allowed_source_accounts.clone(),
        rate_limit_max: key.rate_limit_max,
        rate_limit_window: key.rate_limit_window,
        expires_at: key.expires_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        status: key.status,
        created_at: key.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
    }
}

/// List API keys with on-chain balances.
#[utoipa::path(
    get,
    path = "/admin/api-keys",
    tag = "Admin",
    params(Pagination),
    responses((status = 200, description = "API keys", body = ApiKeyListResponse)),
    security(("bearer" = []))
)]
pub async fn list(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<ApiKeyListResponse>, Error> {
    let (page, per_page) = pagination.resolve()?;

    let (keys, total) = state.store.list_api_keys(page, per_page).await.map_err(|err| {
        tracing::error!(error = %err, "failed to list API keys");
        Error::internal("internal_error", "Failed to list API keys")
    })?;

    let mut items = Vec::with_capacity(keys.len());
    for key in &keys {
        let available = display_available(&state, key).await;
        items.push(to_item(key, available));
    }

    Ok(Json(ApiKeyListResponse {
        api_keys: items,
        total,
        page,
        per_page,
    }))
}

/// A single API key with its on-chain balance.
#[utoipa::path(
    get,
    path = "/admin/api-keys/{id}",
    tag = "Admin",
    params(("id" = Uuid, Path, description = "API key id")),
    responses(
        (status = 200, description = "API key", body = ApiKeyItem),
        (status = 404, description = "Unknown API key")
    ),
    security(("bearer" = []))
)]
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiKeyItem>, Error> {
    let key = state.api_keys.get(id).await?;
    let available = display_available(&state, &key).await;
    Ok(Json(to_item(&key, available)))
}

/// Create a new API key in `pending_funding`.
#[utoipa::path(
    post,
    path = "/admin/api-keys",
    tag = "Admin",
    request_body = CreateApiKeyRequest,
    responses(
        (status = 201, description = "Key created; raw secret included once", body = CreateApiKeyResponse),
        (status = 400, description = "Invalid input")
    ),
    security(("bearer" = []))
)]
pub async fn create(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<CreateApiKeyResponse>), Error> {
    let request: CreateApiKeyRequest = parse_json_body(&body)?;

    let created = state
        .api_keys
        .create(CreateApiKeyInput {
            name: request.name,
            xlm_budget: request.xlm_budget,
            allowed_operations: request.allowed_operations,
            allowed_source_accounts: request.allowed_source_accounts,
            expires_at: request.expires_at,
            rate_limit_max: request.rate_limit.as_ref().map(|r| r.max_requests),
            rate_limit_window: request.rate_limit.as_ref().map(|r| r.window_seconds),
        })
        .await?;

    let key = created.api_key;
    Ok((
        StatusCode::CREATED,
        Json(CreateApiKeyResponse {
            id: key.id,
            name: key.name.clone(),
            api_key: created.raw_key,
            xlm_budget: format_stroops(key.xlm_budget),
            allowed_operations: key.allowed_operations.clone(),
            expires_at: key.expires_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            status: key.status,
            created_at: key.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        }),
    ))
}

/// Apply a partial update to an API key.
#[utoipa::path(
    patch,
    path = "/admin/api-keys/{id}",
    tag = "Admin",
    params(("id" = Uuid, Path, description = "API key id")),
    request_body = ApiKeyUpdates,
    responses(
        (status = 200, description = "Updated key", body = ApiKeyItem),
        (status = 404, description = "Unknown API key")
    ),
    security(("bearer" = []))
)]
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<ApiKeyItem>, Error> {
    let updates: ApiKeyUpdates = parse_json_body(&body)?;
    let key = state.api_keys.update(id, updates).await?;
    let available = display_available(&state, &key).await;
    Ok(Json(to_item(&key, available)))
}

/// Revoke an API key. Terminal; required before sweep.
#[utoipa::path(
    post,
    path = "/admin/api-keys/{id}/revoke",
    tag = "Admin",
    params(("id" = Uuid, Path, description = "API key id")),
    responses(
        (status = 200, description = "Key revoked", body = RevokeApiKeyResponse),
        (status = 400, description = "Already revoked"),
        (status = 404, description = "Unknown API key")
    ),
    security(("bearer" = []))
)]
pub async fn revoke(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RevokeApiKeyResponse>, Error> {
    state.api_keys.revoke(id).await?;
    Ok(Json(RevokeApiKeyResponse {
        id,
        status: ApiKeyStatus::Revoked,
    }))
}

/// Rotate the raw secret of a non-revoked key.
#[utoipa::path(
    post,
    path = "/admin/api-keys/{id}/regenerate",
    tag = "Admin",
    params(("id" = Uuid, Path, description = "API key id")),
    responses(
        (status = 200, description = "New secret issued", body = RegenerateApiKeyResponse),
        (status = 400, description = "Key is revoked"),
        (status = 404, description = "Unknown API key")
    ),
    security(("bearer" = []))
)]
pub async fn regenerate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RegenerateApiKeyResponse>, Error> {
    let rotated = state.api_keys.regenerate(id).await?;
    Ok(Json(RegenerateApiKeyResponse {
        id,
        api_key: rotated.raw_key,
        key_prefix: rotated.key_prefix,
    }))
}
