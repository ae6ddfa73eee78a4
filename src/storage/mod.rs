// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sponsorship Gateway contributors

//! Persistence layer.
//!
//! Services depend on the [`ApiKeyStore`] and [`TransactionLogStore`]
//! traits; [`postgres::PgStore`] implements them over sqlx. Tests
//! substitute in-memory stores.

pub mod postgres;

mod api_keys;
mod transactions;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    ApiKey, ApiKeyStatus, SubmissionStatus, TransactionLog, TransactionStatus,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("stored value could not be decoded: {0}")]
    Decode(String),
}

/// Fields of a new API key supplied at creation time.
#[derive(Debug, Clone)]
pub struct NewApiKey {
    pub name: String,
    pub key_hash: String,
    pub key_prefix: String,
    pub xlm_budget: i64,
    pub allowed_operations: Vec<String>,
    pub allowed_source_accounts: Vec<String>,
    pub rate_limit_max: i32,
    pub rate_limit_window: i32,
    pub status: ApiKeyStatus,
    pub expires_at: DateTime<Utc>,
}

/// Partial update applied to an API key.
#[derive(Debug, Clone, Default, serde::Deserialize, utoipa::ToSchema)]
pub struct ApiKeyUpdates {
    pub name: Option<String>,
    pub allowed_operations: Option<Vec<String>>,
    pub allowed_source_accounts: Option<Vec<String>>,
    pub rate_limit_max: Option<i32>,
    pub rate_limit_window: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ApiKeyUpdates {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.allowed_operations.is_none()
            && self.allowed_source_accounts.is_none()
            && self.rate_limit_max.is_none()
            && self.rate_limit_window.is_none()
            && self.expires_at.is_none()
    }
}

/// Fields of a new audit row.
#[derive(Debug, Clone)]
pub struct NewTransactionLog {
    pub api_key_id: Uuid,
    pub transaction_hash: Option<String>,
    pub transaction_xdr: String,
    pub operations: Vec<String>,
    pub source_account: String,
    pub status: TransactionStatus,
    pub rejection_reason: Option<String>,
    pub reserves_locked: Option<i32>,
}

/// Filters for the admin transaction listing.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilters {
    pub api_key_id: Option<Uuid>,
    pub status: Option<TransactionStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: i64,
    pub per_page: i64,
}

/// API key persistence operations.
#[async_trait]
pub trait ApiKeyStore: Send + Sync {
    async fn create_api_key(&self, key: NewApiKey) -> Result<ApiKey, StoreError>;

    async fn get_api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, StoreError>;

    async fn get_api_key_by_id(&self, id: Uuid) -> Result<Option<ApiKey>, StoreError>;

    /// Keys ordered newest-first, plus the total count.
    async fn list_api_keys(
        &self,
        page: i64,
        per_page: i64,
    ) -> Result<(Vec<ApiKey>, i64), StoreError>;

    async fn count_api_keys(&self) -> Result<i64, StoreError>;

    async fn update_api_key(&self, id: Uuid, updates: ApiKeyUpdates) -> Result<(), StoreError>;

    async fn update_api_key_status(
        &self,
        id: Uuid,
        status: ApiKeyStatus,
    ) -> Result<(), StoreError>;

    async fn set_sponsor_account(&self, id: Uuid, sponsor_account: &str)
        -> Result<(), StoreError>;

    async fn regenerate_api_key(
        &self,
        id: Uuid,
        key_hash: &str,
        key_prefix: &str,
    ) -> Result<(), StoreError>;
}

/// Transaction audit-log persistence operations.
#[async_trait]
pub trait TransactionLogStore: Send + Sync {
    async fn create_transaction_log(
        &self,
        log: NewTransactionLog,
    ) -> Result<TransactionLog, StoreError>;

    /// Filtered rows ordered newest-first, plus the total matching count.
    async fn list_transaction_logs(
        &self,
        filters: TransactionFilters,
    ) -> Result<(Vec<TransactionLog>, i64), StoreError>;

    async fn count_signed_by_api_key(&self, api_key_id: Uuid) -> Result<i64, StoreError>;

    async fn get_transaction_log_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<TransactionLog>, StoreError>;

    async fn update_submission_status(
        &self,
        id: Uuid,
        status: SubmissionStatus,
        ledger_sequence: Option<i64>,
        submitted_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError>;
}

/// Combined store handed to services.
pub trait Store: ApiKeyStore + TransactionLogStore {}

impl<T: ApiKeyStore + TransactionLogStore> Store for T {}
