// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sponsorship Gateway contributors

//! The public `/health` endpoint.
//!
//! Ledger and database failures degrade the report rather than failing
//! it: the balance shows as `"unknown"` and counts default to zero.

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

/// Crate version reported by the health endpoint.
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub stellar_network: String,
    pub master_public_key: String,
    pub master_account_balance: String,
    pub total_sponsor_accounts: i64,
    pub uptime_seconds: i64,
}

/// Service health with master-account context.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Public",
    responses((status = 200, description = "Service health", body = HealthResponse))
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let master_balance = match state
        .accounts
        .get_raw_balance(&state.config.master_funding_public_key)
        .await
    {
        Ok(balance) => balance,
        Err(err) => {
            tracing::error!(error = %err, "failed to get master account balance");
            "unknown".to_string()
        }
    };

    let total = match state.store.count_api_keys().await {
        Ok(total) => total,
        Err(err) => {
            tracing::error!(error = %err, "failed to count API keys");
            0
        }
    };

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: VERSION.to_string(),
        stellar_network: state.config.stellar_network.as_str().to_string(),
        master_public_key: state.config.master_funding_public_key.clone(),
        master_account_balance: master_balance,
        total_sponsor_accounts: total,
        uptime_seconds: state.start_time.elapsed().as_secs() as i64,
    })
}
