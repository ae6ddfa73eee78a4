// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sponsorship Gateway contributors

//! The `/v1/usage` endpoint: budget, balance, and rate-limit status for
//! the authenticated key.

use axum::{extract::State, Extension, Json};
use chrono::SecondsFormat;
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::Error;
use crate::models::{ApiKey, ApiKeyStatus};
use crate::state::AppState;
use crate::stellar::amount::format_stroops;

#[derive(Debug, Serialize, ToSchema)]
pub struct UsageResponse {
    pub api_key_name: String,
    pub sponsor_account: String,
    pub xlm_budget: String,
    pub xlm_available: String,
    pub xlm_locked_in_reserves: String,
    pub allowed_operations: Vec<String>,
    pub expires_at: String,
    pub is_active: bool,
    pub transactions_signed: i64,
    pub rate_limit: RateLimitInfo,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RateLimitInfo {
    pub max_requests: i32,
    pub window_seconds: i32,
    pub remaining: i32,
}

/// Report the authenticated key's budget, balances, and rate limit.
#[utoipa::path(
    get,
    path = "/v1/usage",
    tag = "Signing",
    responses(
        (status = 200, description = "Usage for the authenticated key", body = UsageResponse),
        (status = 401, description = "Missing or invalid API key")
    ),
    security(("bearer" = []))
)]
pub async fn usage(
    State(state): State<AppState>,
    Extension(api_key): Extension<ApiKey>,
) -> Result<Json<UsageResponse>, Error> {
    let (available, locked) = state
        .accounts
        .get_balance(api_key.sponsor_account())
        .await
        .map_err(|err| {
            tracing::error!(
                sponsor = %api_key.sponsor_account(),
                error = %err,
                "failed to get sponsor balance"
            );
            Error::internal("balance_error", "Failed to retrieve balance")
        })?;

    let transactions_signed = match state.store.count_signed_by_api_key(api_key.id).await {
        Ok(count) => count,
        Err(err) => {
            tracing::error!(error = %err, "failed to count transactions");
            0
        }
    };

    // Read-only: does not consume a request.
    let remaining = state.rate_limiter.remaining(&api_key);

    Ok(Json(UsageResponse {
        api_key_name: api_key.name.clone(),
        sponsor_account: api_key.sponsor_account().to_string(),
        xlm_budget: format_stroops(api_key.xlm_budget),
        xlm_available: available,
        xlm_locked_in_reserves: locked,
        allowed_operations: api_key.allowed_operations.clone(),
        expires_at: api_key.expires_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        is_active: api_key.status == ApiKeyStatus::Active,
        transactions_signed,
        rate_limit: RateLimitInfo {
            max_requests: api_key.rate_limit_max,
            window_seconds: api_key.rate_limit_window,
            remaining,
        },
    }))
}
