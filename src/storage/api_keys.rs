// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sponsorship Gateway contributors

//! API key queries.

use async_trait::async_trait;
use sqlx::QueryBuilder;
use uuid::Uuid;

use super::postgres::{api_key_from_row, PgStore};
use super::{ApiKeyStore, ApiKeyUpdates, NewApiKey, StoreError};
use crate::models::{ApiKey, ApiKeyStatus};

const API_KEY_COLUMNS: &str = "id, name, key_hash, key_prefix, sponsor_account, xlm_budget, \
     allowed_operations, allowed_source_accounts, rate_limit_max, rate_limit_window, status, \
     expires_at, created_at, updated_at";

#[async_trait]
impl ApiKeyStore for PgStore {
    async fn create_api_key(&self, key: NewApiKey) -> Result<ApiKey, StoreError> {
        let operations = serde_json::to_value(&key.allowed_operations)
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        let source_accounts = if key.allowed_source_accounts.is_empty() {
            None
        } else {
            Some(
                serde_json::to_value(&key.allowed_source_accounts)
                    .map_err(|e| StoreError::Decode(e.to_string()))?,
            )
        };

        let row = sqlx::query(&format!(
            "INSERT INTO api_keys (
                name, key_hash, key_prefix, xlm_budget,
                allowed_operations, allowed_source_accounts,
                rate_limit_max, rate_limit_window,
                status, expires_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {API_KEY_COLUMNS}"
        ))
        .bind(&key.name)
        .bind(&key.key_hash)
        .bind(&key.key_prefix)
        .bind(key.xlm_budget)
        .bind(operations)
        .bind(source_accounts)
        .bind(key.rate_limit_max)
        .bind(key.rate_limit_window)
        .bind(key.status.as_str())
        .bind(key.expires_at)
        .fetch_one(&self.pool)
        .await?;

        api_key_from_row(&row)
    }

    async fn get_api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {API_KEY_COLUMNS} FROM api_keys WHERE key_hash = $1"
        ))
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(api_key_from_row).transpose()
    }

    async fn get_api_key_by_id(&self, id: Uuid) -> Result<Option<ApiKey>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {API_KEY_COLUMNS} FROM api_keys WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(api_key_from_row).transpose()
    }

    async fn list_api_keys(
        &self,
        page: i64,
        per_page: i64,
    ) -> Result<(Vec<ApiKey>, i64), StoreError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM api_keys")
            .fetch_one(&self.pool)
            .await?;

        let offset = (page - 1) * per_page;
        let rows = sqlx::query(&format!(
            "SELECT {API_KEY_COLUMNS} FROM api_keys
             ORDER BY created_at DESC LIMIT $1 OFFSET $2"
        ))
        .bind(per_page)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let keys = rows
            .iter()
            .map(api_key_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((keys, total))
    }

    async fn count_api_keys(&self) -> Result<i64, StoreError> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM api_keys")
            .fetch_one(&self.pool)
            .await?)
    }

    async fn update_api_key(&self, id: Uuid, updates: ApiKeyUpdates) -> Result<(), StoreError> {
        if updates.is_empty() {
            return Ok(());
        }

        let mut builder = QueryBuilder::new("UPDATE api_keys SET ");
        let mut fields = builder.separated(", ");

        if let Some(name) = &updates.name {
            fields.push("name = ");
            fields.push_bind_unseparated(name);
        }
        if let Some(operations) = &updates.allowed_operations {
            let value = serde_json::to_value(operations)
                .map_err(|e| StoreError::Decode(e.to_string()))?;
            fields.push("allowed_operations = ");
            fields.push_bind_unseparated(value);
        }
        if let Some(source_accounts) = &updates.allowed_source_accounts {
            let value = serde_json::to_value(source_accounts)
                .map_err(|e| StoreError::Decode(e.to_string()))?;
            fields.push("allowed_source_accounts = ");
            fields.push_bind_unseparated(value);
        }
        if let Some(max) = updates.rate_limit_max {
            fields.push("rate_limit_max = ");
            fields.push_bind_unseparated(max);
        }
        if let Some(window) = updates.rate_limit_window {
            fields.push("rate_limit_window = ");
            fields.push_bind_unseparated(window);
        }
        if let Some(expires_at) = updates.expires_at {
            fields.push("expires_at = ");
            fields.push_bind_unseparated(expires_at);
        }
        fields.push("updated_at = NOW()");

        builder.push(" WHERE id = ");
        builder.push_bind(id);

        let result = builder.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn update_api_key_status(
        &self,
        id: Uuid,
        status: ApiKeyStatus,
    ) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE api_keys SET status = $1, updated_at = NOW() WHERE id = $2")
                .bind(status.as_str())
                .bind(id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn set_sponsor_account(
        &self,
        id: Uuid,
        sponsor_account: &str,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE api_keys SET sponsor_account = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(sponsor_account)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn regenerate_api_key(
        &self,
        id: Uuid,
        key_hash: &str,
        key_prefix: &str,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE api_keys SET key_hash = $1, key_prefix = $2, updated_at = NOW() WHERE id = $3",
        )
        .bind(key_hash)
        .bind(key_prefix)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
