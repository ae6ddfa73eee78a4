// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sponsorship Gateway contributors

//! Core entities: API keys and the append-only transaction audit log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle status of an API key.
///
/// Transitions only move forward: `pending_funding -> active -> revoked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ApiKeyStatus {
    PendingFunding,
    Active,
    Revoked,
}

impl ApiKeyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiKeyStatus::PendingFunding => "pending_funding",
            ApiKeyStatus::Active => "active",
            ApiKeyStatus::Revoked => "revoked",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending_funding" => Some(ApiKeyStatus::PendingFunding),
            "active" => Some(ApiKeyStatus::Active),
            "revoked" => Some(ApiKeyStatus::Revoked),
            _ => None,
        }
    }
}

/// Identity and policy for one tenant.
///
/// The raw secret is never stored; only its SHA-256 hash and a loggable
/// prefix survive creation.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiKey {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing)]
    pub key_hash: String,
    pub key_prefix: String,
    /// Sponsor account address; absent until the key is activated.
    pub sponsor_account: Option<String>,
    /// Reserve budget in stroops.
    pub xlm_budget: i64,
    pub allowed_operations: Vec<String>,
    /// Optional source-account allowlist; empty means unrestricted.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allowed_source_accounts: Vec<String>,
    pub rate_limit_max: i32,
    pub rate_limit_window: i32,
    pub status: ApiKeyStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApiKey {
    /// The sponsor account address, or the empty string while pending.
    pub fn sponsor_account(&self) -> &str {
        self.sponsor_account.as_deref().unwrap_or_default()
    }
}

/// Outcome of a sign request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Signed,
    Rejected,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Signed => "signed",
            TransactionStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "signed" => Some(TransactionStatus::Signed),
            "rejected" => Some(TransactionStatus::Rejected),
            _ => None,
        }
    }
}

/// Result of a ledger submission check, cached lazily.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Confirmed,
    NotFound,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Confirmed => "confirmed",
            SubmissionStatus::NotFound => "not_found",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "confirmed" => Some(SubmissionStatus::Confirmed),
            "not_found" => Some(SubmissionStatus::NotFound),
            _ => None,
        }
    }
}

/// Append-only audit record, one per sign request.
///
/// Body fields are immutable once written; only the submission-check
/// fields are appended later.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TransactionLog {
    pub id: Uuid,
    pub api_key_id: Uuid,
    /// Absent for rejections.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
    pub transaction_xdr: String,
    /// Canonical operation names, structural operations excluded.
    pub operations: Vec<String>,
    pub source_account: String,
    pub status: TransactionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    pub submission_status: Option<SubmissionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_checked_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger_sequence: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reserves_locked: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_round_trip() {
        for status in [
            ApiKeyStatus::PendingFunding,
            ApiKeyStatus::Active,
            ApiKeyStatus::Revoked,
        ] {
            assert_eq!(ApiKeyStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ApiKeyStatus::parse("disabled"), None);

        assert_eq!(
            TransactionStatus::parse("signed"),
            Some(TransactionStatus::Signed)
        );
        assert_eq!(
            SubmissionStatus::parse("not_found"),
            Some(SubmissionStatus::NotFound)
        );
    }

    #[test]
    fn key_hash_is_never_serialized() {
        let key = ApiKey {
            id: Uuid::new_v4(),
            name: "demo".to_string(),
            key_hash: "secret-hash".to_string(),
            key_prefix: "sk_test_deadbeef...".to_string(),
            sponsor_account: None,
            xlm_budget: 100,
            allowed_operations: vec!["MANAGE_DATA".to_string()],
            allowed_source_accounts: Vec::new(),
            rate_limit_max: 100,
            rate_limit_window: 60,
            status: ApiKeyStatus::PendingFunding,
            expires_at: Utc::now(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_string(&key).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(json.contains("sk_test_deadbeef"));
    }
}
