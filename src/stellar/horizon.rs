// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sponsorship Gateway contributors

//! Horizon ledger API client.
//!
//! The [`Horizon`] trait is the seam between the gateway and the ledger:
//! services depend on the trait so tests can substitute a stub, and
//! [`HorizonClient`] implements it over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// Request timeout for all Horizon calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum HorizonError {
    #[error("resource not found")]
    NotFound,

    #[error("horizon request failed: {0}")]
    Transport(String),

    #[error("horizon returned {status}: {detail}")]
    Api { status: u16, detail: String },
}

/// One balance line of an account.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountBalance {
    /// Display-format amount, e.g. `"100.5000000"`.
    pub balance: String,
    pub asset_type: String,
}

/// The slice of a Horizon account record the gateway uses.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountDetail {
    pub account_id: String,
    /// Current sequence number. Horizon serves this as a string.
    #[serde(deserialize_with = "i64_from_string_or_number")]
    pub sequence: i64,
    pub balances: Vec<AccountBalance>,
    #[serde(default)]
    pub subentry_count: u32,
    #[serde(default)]
    pub num_sponsoring: u32,
    #[serde(default)]
    pub num_sponsored: u32,
}

/// A confirmed transaction record.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionDetail {
    pub hash: String,
    pub ledger: i64,
    pub created_at: DateTime<Utc>,
}

/// Response to a transaction submission.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    pub hash: String,
    #[serde(default)]
    pub ledger: i64,
}

/// Ledger queries and submission.
#[async_trait]
pub trait Horizon: Send + Sync {
    async fn account_detail(&self, account_id: &str) -> Result<AccountDetail, HorizonError>;

    async fn transaction_detail(&self, hash: &str) -> Result<TransactionDetail, HorizonError>;

    async fn submit_transaction(&self, tx_xdr: &str) -> Result<SubmitResponse, HorizonError>;
}

/// HTTP implementation of [`Horizon`].
#[derive(Clone)]
pub struct HorizonClient {
    base_url: String,
    client: reqwest::Client,
}

impl HorizonClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("Failed to create HTTP client"),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, HorizonError> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .map_err(|e| HorizonError::Transport(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(HorizonError::NotFound);
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let detail = response.text().await.unwrap_or_default();
            return Err(HorizonError::Api { status, detail });
        }

        response
            .json()
            .await
            .map_err(|e| HorizonError::Transport(e.to_string()))
    }
}

#[async_trait]
impl Horizon for HorizonClient {
    async fn account_detail(&self, account_id: &str) -> Result<AccountDetail, HorizonError> {
        self.get_json(&format!("/accounts/{account_id}")).await
    }

    async fn transaction_detail(&self, hash: &str) -> Result<TransactionDetail, HorizonError> {
        self.get_json(&format!("/transactions/{hash}")).await
    }

    async fn submit_transaction(&self, tx_xdr: &str) -> Result<SubmitResponse, HorizonError> {
        let response = self
            .client
            .post(format!("{}/transactions", self.base_url))
            .form(&[("tx", tx_xdr)])
            .send()
            .await
            .map_err(|e| HorizonError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let detail = response.text().await.unwrap_or_default();
            return Err(HorizonError::Api { status, detail });
        }

        response
            .json()
            .await
            .map_err(|e| HorizonError::Transport(e.to_string()))
    }
}

/// Horizon encodes sequence numbers as JSON strings; accept both forms.
fn i64_from_string_or_number<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(i64),
    }

    match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => s.parse().map_err(serde::de::Error::custom),
        StringOrNumber::Number(n) => Ok(n),
    }
}
