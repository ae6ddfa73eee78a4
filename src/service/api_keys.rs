// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sponsorship Gateway contributors

//! API key management: creation, updates, revocation, and secret rotation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::RngCore;
use uuid::Uuid;

use crate::auth::sha256_hex;
use crate::config::StellarNetwork;
use crate::error::Error;
use crate::models::{ApiKey, ApiKeyStatus};
use crate::stellar::amount::parse_stroops;
use crate::stellar::keys::is_valid_public_key;
use crate::stellar::operations::supported_operations;
use crate::storage::{ApiKeyUpdates, NewApiKey, Store, StoreError};

const DEFAULT_RATE_LIMIT_MAX: i32 = 100;
const DEFAULT_RATE_LIMIT_WINDOW: i32 = 60;
const MAX_RATE_LIMIT_MAX: i32 = 10_000;
const MAX_RATE_LIMIT_WINDOW: i32 = 86_400;

/// Parameters for creating a new API key.
#[derive(Debug, Clone)]
pub struct CreateApiKeyInput {
    pub name: String,
    /// Budget in display format, e.g. `"100"` or `"25.5"`.
    pub xlm_budget: String,
    pub allowed_operations: Vec<String>,
    pub allowed_source_accounts: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub rate_limit_max: Option<i32>,
    pub rate_limit_window: Option<i32>,
}

/// A freshly created key together with its raw secret. The raw secret is
/// shown exactly once.
#[derive(Debug, Clone)]
pub struct CreatedApiKey {
    pub api_key: ApiKey,
    pub raw_key: String,
}

/// A rotated secret.
#[derive(Debug, Clone)]
pub struct RegeneratedApiKey {
    pub raw_key: String,
    pub key_prefix: String,
}

/// API key business logic.
pub struct ApiKeyService {
    store: Arc<dyn Store>,
    network: StellarNetwork,
}

impl ApiKeyService {
    pub fn new(store: Arc<dyn Store>, network: StellarNetwork) -> Self {
        Self { store, network }
    }

    /// Validate input, generate a key, and persist it in `pending_funding`.
    pub async fn create(&self, input: CreateApiKeyInput) -> Result<CreatedApiKey, Error> {
        if input.name.trim().is_empty() {
            return Err(Error::bad_request("invalid_request", "name is required"));
        }
        if input.xlm_budget.is_empty() {
            return Err(Error::bad_request("invalid_request", "xlm_budget is required"));
        }
        if input.allowed_operations.is_empty() {
            return Err(Error::bad_request(
                "invalid_request",
                "allowed_operations is required",
            ));
        }
        validate_allowed_operations(&input.allowed_operations)?;
        validate_source_accounts(&input.allowed_source_accounts)?;

        let Some(expires_at) = input.expires_at else {
            return Err(Error::bad_request("invalid_request", "expires_at is required"));
        };
        if expires_at <= Utc::now() {
            return Err(Error::bad_request(
                "invalid_request",
                "expires_at must be in the future",
            ));
        }

        let budget_stroops = parse_stroops(&input.xlm_budget)
            .map_err(|_| Error::bad_request("invalid_request", "Invalid xlm_budget format"))?;
        if budget_stroops <= 0 {
            return Err(Error::bad_request(
                "invalid_request",
                "xlm_budget must be positive",
            ));
        }

        let (rate_limit_max, rate_limit_window) =
            normalize_rate_limit(input.rate_limit_max, input.rate_limit_window)?;

        let raw_key = generate_api_key(self.network);
        let key_hash = sha256_hex(&raw_key);
        let key_prefix = format!("{}...", &raw_key[..16]);

        let api_key = self
            .store
            .create_api_key(NewApiKey {
                name: input.name,
                key_hash,
                key_prefix,
                xlm_budget: budget_stroops,
                allowed_operations: input.allowed_operations,
                allowed_source_accounts: input.allowed_source_accounts,
                rate_limit_max,
                rate_limit_window,
                status: ApiKeyStatus::PendingFunding,
                expires_at,
            })
            .await
            .map_err(|err| {
                tracing::error!(error = %err, "failed to create API key");
                Error::internal("internal_error", "Failed to create API key")
            })?;

        Ok(CreatedApiKey { api_key, raw_key })
    }

    /// Validate and apply a partial update.
    pub async fn update(&self, id: Uuid, updates: ApiKeyUpdates) -> Result<ApiKey, Error> {
        if let Some(name) = &updates.name {
            if name.trim().is_empty() {
                return Err(Error::bad_request("invalid_request", "name cannot be empty"));
            }
        }
        if let Some(operations) = &updates.allowed_operations {
            if operations.is_empty() {
                return Err(Error::bad_request(
                    "invalid_request",
                    "allowed_operations cannot be empty",
                ));
            }
            validate_allowed_operations(operations)?;
        }
        if let Some(source_accounts) = &updates.allowed_source_accounts {
            validate_source_accounts(source_accounts)?;
        }
        if let Some(max) = updates.rate_limit_max {
            if !(1..=MAX_RATE_LIMIT_MAX).contains(&max) {
                return Err(Error::bad_request(
                    "invalid_request",
                    "rate_limit_max must be between 1 and 10000",
                ));
            }
        }
        if let Some(window) = updates.rate_limit_window {
            if !(1..=MAX_RATE_LIMIT_WINDOW).contains(&window) {
                return Err(Error::bad_request(
                    "invalid_request",
                    "rate_limit_window must be between 1 and 86400",
                ));
            }
        }
        if let Some(expires_at) = updates.expires_at {
            if expires_at <= Utc::now() {
                return Err(Error::bad_request(
                    "invalid_request",
                    "expires_at must be in the future",
                ));
            }
        }

        self.store
            .update_api_key(id, updates)
            .await
            .map_err(|err| match err {
                StoreError::NotFound => Error::not_found("not_found", "API key not found"),
                err => {
                    tracing::error!(id = %id, error = %err, "failed to update API key");
                    Error::internal("internal_error", "Failed to update API key")
                }
            })?;

        self.store
            .get_api_key_by_id(id)
            .await
            .ok()
            .flatten()
            .ok_or_else(|| Error::not_found("not_found", "API key not found"))
    }

    /// Mark a key as revoked. Terminal.
    pub async fn revoke(&self, id: Uuid) -> Result<(), Error> {
        let api_key = self.get(id).await?;

        if api_key.status == ApiKeyStatus::Revoked {
            return Err(Error::bad_request(
                "invalid_status",
                "API key is already revoked",
            ));
        }

        self.store
            .update_api_key_status(id, ApiKeyStatus::Revoked)
            .await
            .map_err(|err| {
                tracing::error!(id = %id, error = %err, "failed to revoke API key");
                Error::internal("internal_error", "Failed to revoke API key")
            })
    }

    /// Rotate the raw secret of a non-revoked key.
    pub async fn regenerate(&self, id: Uuid) -> Result<RegeneratedApiKey, Error> {
        let api_key = self.get(id).await?;

        if api_key.status == ApiKeyStatus::Revoked {
            return Err(Error::bad_request(
                "invalid_status",
                "Cannot regenerate a revoked API key",
            ));
        }

        let raw_key = generate_api_key(self.network);
        let key_hash = sha256_hex(&raw_key);
        let key_prefix = format!("{}...", &raw_key[..16]);

        self.store
            .regenerate_api_key(id, &key_hash, &key_prefix)
            .await
            .map_err(|err| {
                tracing::error!(id = %id, error = %err, "failed to regenerate API key");
                Error::internal("internal_error", "Failed to regenerate API key")
            })?;

        Ok(RegeneratedApiKey {
            raw_key,
            key_prefix,
        })
    }

    pub async fn get(&self, id: Uuid) -> Result<ApiKey, Error> {
        self.store
            .get_api_key_by_id(id)
            .await
            .ok()
            .flatten()
            .ok_or_else(|| Error::not_found("not_found", "API key not found"))
    }
}

/// All operations must be supported and unique.
fn validate_allowed_operations(operations: &[String]) -> Result<(), Error> {
    let supported = supported_operations();
    let mut seen = std::collections::HashSet::new();

    for operation in operations {
        if !supported.contains(&operation.as_str()) {
            return Err(Error::bad_request(
                "invalid_request",
                format!("operation {operation:?} is not supported"),
            ));
        }
        if !seen.insert(operation.as_str()) {
            return Err(Error::bad_request(
                "invalid_request",
                format!("duplicate operation {operation:?} is not allowed"),
            ));
        }
    }
    Ok(())
}

/// All source accounts must be valid Stellar public keys.
fn validate_source_accounts(accounts: &[String]) -> Result<(), Error> {
    for account in accounts {
        if !is_valid_public_key(account) {
            return Err(Error::bad_request(
                "invalid_request",
                format!("invalid source account {account:?}"),
            ));
        }
    }
    Ok(())
}

fn normalize_rate_limit(
    max_requests: Option<i32>,
    window_seconds: Option<i32>,
) -> Result<(i32, i32), Error> {
    let max = match max_requests {
        Some(max) if !(1..=MAX_RATE_LIMIT_MAX).contains(&max) => {
            return Err(Error::bad_request(
                "invalid_request",
                "rate_limit.max_requests must be between 1 and 10000",
            ))
        }
        Some(max) => max,
        None => DEFAULT_RATE_LIMIT_MAX,
    };

    let window = match window_seconds {
        Some(window) if !(1..=MAX_RATE_LIMIT_WINDOW).contains(&window) => {
            return Err(Error::bad_request(
                "invalid_request",
                "rate_limit.window_seconds must be between 1 and 86400",
            ))
        }
        Some(window) => window,
        None => DEFAULT_RATE_LIMIT_WINDOW,
    };

    Ok((max, window))
}

/// `sk_live_<64 hex>` on mainnet, `sk_test_<64 hex>` on testnet;
/// 32 bytes from the OS CSPRNG.
fn generate_api_key(network: StellarNetwork) -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    let prefix = match network {
        StellarNetwork::Mainnet => "sk_live_",
        StellarNetwork::Testnet => "sk_test_",
    };
    format!("{prefix}{}", hex::encode(bytes))
}
