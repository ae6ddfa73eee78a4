// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sponsorship Gateway contributors

//! The public `/info` endpoint.

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;
use crate::stellar::operations::supported_operations;

#[derive(Debug, Serialize, ToSchema)]
pub struct InfoResponse {
    pub network_passphrase: String,
    pub base_reserve: String,
    pub supported_operations: Vec<String>,
}

/// Network parameters and the sponsorable operation set.
#[utoipa::path(
    get,
    path = "/info",
    tag = "Public",
    responses((status = 200, description = "Gateway parameters", body = InfoResponse))
)]
pub async fn info(State(state): State<AppState>) -> Json<InfoResponse> {
    Json(InfoResponse {
        network_passphrase: state.config.network_passphrase().to_string(),
        base_reserve: "0.5000000".to_string(),
        supported_operations: supported_operations()
            .iter()
            .map(|s| s.to_string())
            .collect(),
    })
}
