// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sponsorship Gateway contributors

//! Postgres-backed store.

use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use super::StoreError;
use crate::models::{ApiKey, ApiKeyStatus, SubmissionStatus, TransactionLog, TransactionStatus};

/// Store over a Postgres connection pool.
#[derive(Clone)]
pub struct PgStore {
    pub(super) pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Create the connection pool.
pub async fn connect(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
}

/// Apply pending migrations from `migrations/`.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

pub(super) fn parse_api_key_status(raw: &str) -> Result<ApiKeyStatus, StoreError> {
    ApiKeyStatus::parse(raw)
        .ok_or_else(|| StoreError::Decode(format!("unknown api key status {raw:?}")))
}

pub(super) fn parse_transaction_status(raw: &str) -> Result<TransactionStatus, StoreError> {
    TransactionStatus::parse(raw)
        .ok_or_else(|| StoreError::Decode(format!("unknown transaction status {raw:?}")))
}

pub(super) fn parse_submission_status(
    raw: Option<&str>,
) -> Result<Option<SubmissionStatus>, StoreError> {
    raw.map(|s| {
        SubmissionStatus::parse(s)
            .ok_or_else(|| StoreError::Decode(format!("unknown submission status {s:?}")))
    })
    .transpose()
}

pub(super) fn api_key_from_row(row: &sqlx::postgres::PgRow) -> Result<ApiKey, StoreError> {
    let status: String = row.try_get("status")?;
    let operations: serde_json::Value = row.try_get("allowed_operations")?;
    let source_accounts: Option<serde_json::Value> = row.try_get("allowed_source_accounts")?;

    Ok(ApiKey {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        key_hash: row.try_get("key_hash")?,
        key_prefix: row.try_get("key_prefix")?,
        sponsor_account: row.try_get("sponsor_account")?,
        xlm_budget: row.try_get("xlm_budget")?,
        allowed_operations: decode_string_list(operations)?,
        allowed_source_accounts: source_accounts
            .map(decode_string_list)
            .transpose()?
            .unwrap_or_default(),
        rate_limit_max: row.try_get("rate_limit_max")?,
        rate_limit_window: row.try_get("rate_limit_window")?,
        status: parse_api_key_status(&status)?,
        expires_at: row.try_get("expires_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub(super) fn transaction_log_from_row(
    row: &sqlx::postgres::PgRow,
) -> Result<TransactionLog, StoreError> {
    let status: String = row.try_get("status")?;
    let submission_status: Option<String> = row.try_get("submission_status")?;
    let operations: serde_json::Value = row.try_get("operations")?;

    Ok(TransactionLog {
        id: row.try_get("id")?,
        api_key_id: row.try_get("api_key_id")?,
        transaction_hash: row.try_get("transaction_hash")?,
        transaction_xdr: row.try_get("transaction_xdr")?,
        operations: decode_string_list(operations)?,
        source_account: row.try_get("source_account")?,
        status: parse_transaction_status(&status)?,
        rejection_reason: row.try_get("rejection_reason")?,
        submission_status: parse_submission_status(submission_status.as_deref())?,
        submission_checked_at: row.try_get("submission_checked_at")?,
        ledger_sequence: row.try_get("ledger_sequence")?,
        submitted_at: row.try_get("submitted_at")?,
        reserves_locked: row.try_get("reserves_locked")?,
        created_at: row.try_get("created_at")?,
    })
}

fn decode_string_list(value: serde_json::Value) -> Result<Vec<String>, StoreError> {
    serde_json::from_value(value).map_err(|e| StoreError::Decode(e.to_string()))
}
