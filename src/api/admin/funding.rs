// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sponsorship Gateway contributors

//! Admin funding lifecycle endpoints: activate, fund, sweep.

use axum::{
    body::Bytes,
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::parse_json_body;
use crate::error::Error;
use crate::models::ApiKeyStatus;
use crate::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct BuildActivateResponse {
    pub sponsor_account: String,
    pub xlm_budget: String,
    /// Pre-signed by the ephemeral sponsor key; needs the master signature.
    pub activate_transaction_xdr: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitTransactionRequest {
    #[serde(default)]
    pub signed_transaction_xdr: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SubmitActivateResponse {
    pub id: Uuid,
    pub status: ApiKeyStatus,
    pub sponsor_account: String,
    pub transaction_hash: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BuildFundRequest {
    #[serde(default)]
    pub amount: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BuildFundResponse {
    pub sponsor_account: String,
    pub xlm_to_add: String,
    pub funding_transaction_xdr: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SubmitFundResponse {
    pub sponsor_account: String,
    pub xlm_added: String,
    pub xlm_available: String,
    pub transaction_hash: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SweepResponse {
    pub sponsor_account: String,
    pub xlm_swept: String,
    pub xlm_remaining_locked: String,
    pub destination: String,
    /// Empty when there was nothing to sweep.
    pub transaction_hash: String,
}

/// Build the activation transaction for a pending key.
#[utoipa::path(
    post,
    path = "/admin/api-keys/{id}/activate",
    tag = "Admin",
    params(("id" = Uuid, Path, description = "API key id")),
    responses(
        (status = 200, description = "Activation envelope built", body = BuildActivateResponse),
        (status = 400, description = "Key is not pending funding")
    ),
    security(("bearer" = []))
)]
pub async fn build_activate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BuildActivateResponse>, Error> {
    let result = state.funding.build_activate(id).await?;
    Ok(Json(BuildActivateResponse {
        sponsor_account: result.sponsor_account,
        xlm_budget: result.xlm_budget,
        activate_transaction_xdr: result.transaction_xdr,
    }))
}

/// Submit a master-signed activation transaction.
#[utoipa::path(
    post,
    path = "/admin/api-keys/{id}/activate/submit",
    tag = "Admin",
    params(("id" = Uuid, Path, description = "API key id")),
    request_body = SubmitTransactionRequest,
    responses(
        (status = 200, description = "Key activated", body = SubmitActivateResponse),
        (status = 400, description = "Invalid or tampered envelope")
    ),
    security(("bearer" = []))
)]
pub async fn submit_activate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<SubmitActivateResponse>, Error> {
    let request: SubmitTransactionRequest = parse_json_body(&body)?;
    if request.signed_transaction_xdr.is_empty() {
        return Err(Error::bad_request(
            "invalid_request",
            "signed_transaction_xdr is required",
        ));
    }

    let result = state
        .funding
        .submit_activate(id, &request.signed_transaction_xdr)
        .await?;

    Ok(Json(SubmitActivateResponse {
        id: result.id,
        status: result.status,
        sponsor_account: result.sponsor_account,
        transaction_hash: result.transaction_hash,
    }))
}

/// Build an unsigned funding payment for an active key.
#[utoipa::path(
    post,
    path = "/admin/api-keys/{id}/fund",
    tag = "Admin",
    params(("id" = Uuid, Path, description = "API key id")),
    request_body = BuildFundRequest,
    responses(
        (status = 200, description = "Funding envelope built", body = BuildFundResponse),
        (status = 400, description = "Key is not active or amount invalid")
    ),
    security(("bearer" = []))
)]
pub async fn build_fund(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<BuildFundResponse>, Error> {
    let request: BuildFundRequest = parse_json_body(&body)?;
    let result = state.funding.build_fund(id, &request.amount).await?;
    Ok(Json(BuildFundResponse {
        sponsor_account: result.sponsor_account,
        xlm_to_add: result.xlm_to_add,
        funding_transaction_xdr: result.transaction_xdr,
    }))
}

/// Submit a master-signed funding payment.
#[utoipa::path(
    post,
    path = "/admin/api-keys/{id}/fund/submit",
    tag = "Admin",
    params(("id" = Uuid, Path, description = "API key id")),
    request_body = SubmitTransactionRequest,
    responses(
        (status = 200, description = "Sponsor funded", body = SubmitFundResponse),
        (status = 400, description = "Invalid or tampered envelope")
    ),
    security(("bearer" = []))
)]
pub async fn submit_fund(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<SubmitFundResponse>, Error> {
    let request: SubmitTransactionRequest = parse_json_body(&body)?;
    if request.signed_transaction_xdr.is_empty() {
        return Err(Error::bad_request(
            "invalid_request",
            "signed_transaction_xdr is required",
        ));
    }

    let result = state
        .funding
        .submit_fund(id, &request.signed_transaction_xdr)
        .await?;

    Ok(Json(SubmitFundResponse {
        sponsor_account: result.sponsor_account,
        xlm_added: result.xlm_added,
        xlm_available: result.xlm_available,
        transaction_hash: result.transaction_hash,
    }))
}

/// Sweep a revoked key's available balance back to master.
#[utoipa::path(
    post,
    path = "/admin/api-keys/{id}/sweep",
    tag = "Admin",
    params(("id" = Uuid, Path, description = "API key id")),
    responses(
        (status = 200, description = "Sweep result", body = SweepResponse),
        (status = 400, description = "Key is not revoked")
    ),
    security(("bearer" = []))
)]
pub async fn sweep(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SweepResponse>, Error> {
    let result = state.funding.sweep(id).await?;
    Ok(Json(SweepResponse {
        sponsor_account: result.sponsor_account,
        xlm_swept: result.xlm_swept,
        xlm_remaining_locked: result.xlm_remaining_locked,
        destination: result.destination,
        transaction_hash: result.transaction_hash,
    }))
}
