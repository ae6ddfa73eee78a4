// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sponsorship Gateway contributors

//! The `/v1/sign` endpoint.

use axum::{body::Bytes, extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::parse_json_body;
use crate::error::Error;
use crate::models::ApiKey;
use crate::state::AppState;

/// Request to co-sign a transaction envelope.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SignRequest {
    /// Base64-encoded unsigned transaction envelope.
    #[serde(default)]
    pub transaction_xdr: String,
    /// Must match the network the gateway is configured for.
    #[serde(default)]
    pub network_passphrase: String,
}

/// A co-signed envelope with sponsor context.
#[derive(Debug, Serialize, ToSchema)]
pub struct SignResponse {
    pub signed_transaction_xdr: String,
    pub sponsor_public_key: String,
    pub sponsor_account_balance: String,
}

/// Verify, balance-check, and co-sign a client transaction.
#[utoipa::path(
    post,
    path = "/v1/sign",
    tag = "Signing",
    request_body = SignRequest,
    responses(
        (status = 200, description = "Transaction signed", body = SignResponse),
        (status = 400, description = "Verification rejected the transaction"),
        (status = 401, description = "Missing or invalid API key"),
        (status = 429, description = "Rate limit exceeded")
    ),
    security(("bearer" = []))
)]
pub async fn sign(
    State(state): State<AppState>,
    Extension(api_key): Extension<ApiKey>,
    body: Bytes,
) -> Result<Json<SignResponse>, Error> {
    let request: SignRequest = parse_json_body(&body)?;

    if request.transaction_xdr.is_empty() {
        return Err(Error::bad_request(
            "invalid_request",
            "transaction_xdr is required",
        ));
    }
    if request.network_passphrase.is_empty() {
        return Err(Error::bad_request(
            "invalid_request",
            "network_passphrase is required",
        ));
    }
    if request.network_passphrase != state.config.network_passphrase() {
        return Err(Error::bad_request(
            "invalid_network",
            "network_passphrase does not match the configured network",
        ));
    }

    let outcome = state.signing.sign(&api_key, &request.transaction_xdr).await?;

    Ok(Json(SignResponse {
        signed_transaction_xdr: outcome.signed_xdr,
        sponsor_public_key: outcome.sponsor_account,
        sponsor_account_balance: outcome.sponsor_balance,
    }))
}
