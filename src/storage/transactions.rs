// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sponsorship Gateway contributors

//! Transaction audit-log queries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::QueryBuilder;
use uuid::Uuid;

use super::postgres::{transaction_log_from_row, PgStore};
use super::{NewTransactionLog, StoreError, TransactionFilters, TransactionLogStore};
use crate::models::{SubmissionStatus, TransactionLog};

const TRANSACTION_LOG_COLUMNS: &str = "id, api_key_id, transaction_hash, transaction_xdr, \
     operations, source_account, status, rejection_reason, submission_status, \
     submission_checked_at, ledger_sequence, submitted_at, reserves_locked, created_at";

fn push_filters(builder: &mut QueryBuilder<'_, sqlx::Postgres>, filters: &TransactionFilters) {
    builder.push(" WHERE 1=1");
    if let Some(api_key_id) = filters.api_key_id {
        builder.push(" AND api_key_id = ");
        builder.push_bind(api_key_id);
    }
    if let Some(status) = filters.status {
        builder.push(" AND status = ");
        builder.push_bind(status.as_str());
    }
    if let Some(from) = filters.from {
        builder.push(" AND created_at >= ");
        builder.push_bind(from);
    }
    if let Some(to) = filters.to {
        builder.push(" AND created_at <= ");
        builder.push_bind(to);
    }
}

#[async_trait]
impl TransactionLogStore for PgStore {
    async fn create_transaction_log(
        &self,
        log: NewTransactionLog,
    ) -> Result<TransactionLog, StoreError> {
        let operations = serde_json::to_value(&log.operations)
            .map_err(|e| StoreError::Decode(e.to_string()))?;

        let row = sqlx::query(&format!(
            "INSERT INTO transaction_logs (
                api_key_id, transaction_hash, transaction_xdr,
                operations, source_account, status, rejection_reason, reserves_locked
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {TRANSACTION_LOG_COLUMNS}"
        ))
        .bind(log.api_key_id)
        .bind(&log.transaction_hash)
        .bind(&log.transaction_xdr)
        .bind(operations)
        .bind(&log.source_account)
        .bind(log.status.as_str())
        .bind(&log.rejection_reason)
        .bind(log.reserves_locked)
        .fetch_one(&self.pool)
        .await?;

        transaction_log_from_row(&row)
    }

    async fn list_transaction_logs(
        &self,
        filters: TransactionFilters,
    ) -> Result<(Vec<TransactionLog>, i64), StoreError> {
        let mut count_builder = QueryBuilder::new("SELECT COUNT(*) FROM transaction_logs");
        push_filters(&mut count_builder, &filters);
        let total: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let page = filters.page.max(1);
        let per_page = if (1..=100).contains(&filters.per_page) {
            filters.per_page
        } else {
            20
        };
        let offset = (page - 1) * per_page;

        let mut builder = QueryBuilder::new(format!(
            "SELECT {TRANSACTION_LOG_COLUMNS} FROM transaction_logs"
        ));
        push_filters(&mut builder, &filters);
        builder.push(" ORDER BY created_at DESC LIMIT ");
        builder.push_bind(per_page);
        builder.push(" OFFSET ");
        builder.push_bind(offset);

        let rows = builder.build().fetch_all(&self.pool).await?;
        let logs = rows
            .iter()
            .map(transaction_log_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((logs, total))
    }

    async fn count_signed_by_api_key(&self, api_key_id: Uuid) -> Result<i64, StoreError> {
        Ok(sqlx::query_scalar(
            "SELECT COUNT(*) FROM transaction_logs WHERE api_key_id = $1 AND status = 'signed'",
        )
        .bind(api_key_id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn get_transaction_log_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<TransactionLog>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {TRANSACTION_LOG_COLUMNS} FROM transaction_logs WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(transaction_log_from_row).transpose()
    }

    async fn update_submission_status(
        &self,
        id: Uuid,
        status: SubmissionStatus,
        ledger_sequence: Option<i64>,
        submitted_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE transaction_logs
             SET submission_status = $1,
                 submission_checked_at = NOW(),
                 ledger_sequence = $2,
                 submitted_at = $3
             WHERE id = $4",
        )
        .bind(status.as_str())
        .bind(ledger_sequence)
        .bind(submitted_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
