// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sponsorship Gateway contributors

//! Admin transaction-log listing and submission checks.
//!
//! The listing lazily refreshes submission status for rows that need it,
//! fanning out at most five concurrent ledger lookups under a five-second
//! batch deadline. Individual failures are logged and skipped; the
//! listing itself never fails because of them.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, SecondsFormat, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::api::pagination::Pagination;
use crate::error::Error;
use crate::models::{SubmissionStatus, TransactionLog, TransactionStatus};
use crate::state::AppState;
use crate::stellar::submission::CheckResult;
use crate::storage::TransactionFilters;

/// Rows older than this that were never checked are left alone.
const MAX_AUTO_CHECK_AGE: chrono::Duration = chrono::Duration::hours(24);

/// Rows checked this recently are not re-checked.
const AUTO_CHECK_MIN_INTERVAL: chrono::Duration = chrono::Duration::minutes(5);

const MAX_CONCURRENT_CHECKS: usize = 5;
const AUTO_CHECK_DEADLINE: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize, IntoParams)]
pub struct TransactionListQuery {
    pub api_key_id: Option<Uuid>,
    /// `signed` or `rejected`.
    pub status: Option<String>,
    /// RFC 3339 lower bound on `created_at`.
    pub from: Option<DateTime<Utc>>,
    /// RFC 3339 upper bound on `created_at`.
    pub to: Option<DateTime<Utc>>,
    /// Page number, 1-based.
    pub page: Option<i64>,
    /// Rows per page, 1..=100.
    pub per_page: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionItem {
    pub id: Uuid,
    pub api_key_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
    pub operations: Vec<String>,
    pub source_account: String,
    pub status: TransactionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    pub submission_status: Option<SubmissionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_checked_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger_sequence: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reserves_locked: Option<i32>,
    pub created_at: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionListResponse {
    pub transactions: Vec<TransactionItem>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckTransactionResponse {
    pub id: Uuid,
    pub submission_status: SubmissionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger_sequence: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<String>,
}

fn to_item(log: &TransactionLog) -> TransactionItem {
    TransactionItem {
        id: log.id,
        api_key_id: log.api_key_id,
        transaction_hash: log.transaction_hash.clone(),
        operations: log.operations.clone(),
        source_account: log.source_account.clone(),
        status: log.status,
        rejection_reason: log.rejection_reason.clone(),
        submission_status: log.submission_status,
        submission_checked_at: log
            .submission_checked_at
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true)),
        ledger_sequence: log.ledger_sequence,
        submitted_at: log
            .submitted_at
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true)),
        reserves_locked: log.reserves_locked,
        created_at: log.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
    }
}

/// List audit rows with filters, refreshing submission status lazily.
#[utoipa::path(
    get,
    path = "/admin/transactions",
    tag = "Admin",
    params(TransactionListQuery),
    responses((status = 200, description = "Audit rows", body = TransactionListResponse)),
    security(("bearer" = []))
)]
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<TransactionListQuery>,
) -> Result<Json<TransactionListResponse>, Error> {
    let (page, per_page) = Pagination {
        page: query.page,
        per_page: query.per_page,
    }
    .resolve()?;

    let status = query
        .status
        .as_deref()
        .map(|raw| {
            TransactionStatus::parse(raw).ok_or_else(|| {
                Error::bad_request("invalid_request", "status must be 'signed' or 'rejected'")
            })
        })
        .transpose()?;

    let (mut logs, total) = state
        .store
        .list_transaction_logs(TransactionFilters {
            api_key_id: query.api_key_id,
            status,
            from: query.from,
            to: query.to,
            page,
            per_page,
        })
        .await
        .map_err(|err| {
            tracing::error!(error = %err, "failed to list transactions");
            Error::internal("internal_error", "Failed to list transactions")
        })?;

    auto_check_submissions(&state, &mut logs).await;

    Ok(Json(TransactionListResponse {
        transactions: logs.iter().map(to_item).collect(),
        total,
        page,
        per_page,
    }))
}

/// Which rows in the listing are due for a submission check.
fn needs_check(log: &TransactionLog, cutoff: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    if log.status != TransactionStatus::Signed {
        return false;
    }
    let Some(hash) = &log.transaction_hash else {
        return false;
    };
    if hash.is_empty() {
        return false;
    }
    if log.submission_status == Some(SubmissionStatus::Confirmed) {
        return false;
    }
    if log.submission_status.is_some() {
        if let Some(checked_at) = log.submission_checked_at {
            if now - checked_at < AUTO_CHECK_MIN_INTERVAL {
                return false;
            }
        }
    }
    // Too old and never checked: assume it was abandoned.
    if log.created_at < cutoff && log.submission_status.is_none() {
        return false;
    }
    true
}

/// Refresh submission status for rows that need it, in place.
///
/// Results are cached in the database best-effort; the whole batch is
/// bounded by [`AUTO_CHECK_DEADLINE`], and tasks still waiting on the
/// semaphore when it expires are dropped.
pub(crate) async fn auto_check_submissions(state: &AppState, logs: &mut [TransactionLog]) {
    let now = Utc::now();
    let cutoff = now - MAX_AUTO_CHECK_AGE;

    let to_check: Vec<usize> = logs
        .iter()
        .enumerate()
        .filter(|(_, log)| needs_check(log, cutoff, now))
        .map(|(idx, _)| idx)
        .collect();

    if to_check.is_empty() {
        return;
    }

    let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_CHECKS));
    let results: Arc<Mutex<Vec<(usize, CheckResult)>>> = Arc::new(Mutex::new(Vec::new()));

    let tasks: Vec<_> = to_check
        .into_iter()
        .map(|idx| {
            let log_id = logs[idx].id;
            let tx_hash = logs[idx].transaction_hash.clone().unwrap_or_default();
            let semaphore = semaphore.clone();
            let results = results.clone();
            let checker = state.checker.clone();
            let store = state.store.clone();

            async move {
                let Ok(_permit) = semaphore.acquire().await else {
                    return;
                };

                match checker.check_transaction(&tx_hash).await {
                    Ok(result) => {
                        if let Err(err) = store
                            .update_submission_status(
                                log_id,
                                result.status,
                                result.ledger_sequence,
                                result.submitted_at,
                            )
                            .await
                        {
                            tracing::error!(
                                tx_hash = %tx_hash,
                                error = %err,
                                "failed to cache submission status"
                            );
                        }
                        results.lock().unwrap_or_else(|e| e.into_inner()).push((idx, result));
                    }
                    Err(err) => {
                        tracing::warn!(
                            tx_hash = %tx_hash,
                            error = %err,
                            "failed to check transaction submission"
                        );
                    }
                }
            }
        })
        .collect();

    let _ = tokio::time::timeout(AUTO_CHECK_DEADLINE, join_all(tasks)).await;

    let mut results = results.lock().unwrap_or_else(|e| e.into_inner());
    for (idx, result) in results.drain(..) {
        let log = &mut logs[idx];
        log.submission_status = Some(result.status);
        log.submission_checked_at = Some(now);
        log.ledger_sequence = result.ledger_sequence;
        log.submitted_at = result.submitted_at;
    }
}

/// Check one signed transaction against the ledger, on demand.
#[utoipa::path(
    post,
    path = "/admin/transactions/{id}/check",
    tag = "Admin",
    params(("id" = Uuid, Path, description = "Transaction log id")),
    responses(
        (status = 200, description = "Check result", body = CheckTransactionResponse),
        (status = 400, description = "Row was not signed"),
        (status = 404, description = "Unknown transaction"),
        (status = 502, description = "Ledger query failed")
    ),
    security(("bearer" = []))
)]
pub async fn check(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CheckTransactionResponse>, Error> {
    let log = state
        .store
        .get_transaction_log_by_id(id)
        .await
        .map_err(|err| {
            tracing::error!(id = %id, error = %err, "failed to get transaction");
            Error::internal("internal_error", "Failed to load transaction")
        })?
        .ok_or_else(|| Error::not_found("not_found", "Transaction not found"))?;

    let tx_hash = match (&log.status, &log.transaction_hash) {
        (TransactionStatus::Signed, Some(hash)) if !hash.is_empty() => hash.clone(),
        _ => {
            return Err(Error::bad_request(
                "invalid_request",
                "Transaction was not signed or has no hash",
            ))
        }
    };

    let result = state.checker.check_transaction(&tx_hash).await.map_err(|err| {
        tracing::error!(tx_hash = %tx_hash, error = %err, "failed to check transaction on Horizon");
        Error::bad_gateway("horizon_error", "Failed to check transaction on Horizon")
    })?;

    if let Err(err) = state
        .store
        .update_submission_status(log.id, result.status, result.ledger_sequence, result.submitted_at)
        .await
    {
        tracing::error!(error = %err, "failed to update submission status");
    }

    Ok(Json(CheckTransactionResponse {
        id: log.id,
        submission_status: result.status,
        ledger_sequence: result.ledger_sequence,
        submitted_at: result
            .submitted_at
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true)),
    }))
}
