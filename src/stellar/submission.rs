// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sponsorship Gateway contributors

//! Lazy confirmation checks for signed transactions.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::horizon::{Horizon, HorizonError};
use crate::models::SubmissionStatus;

/// Outcome of a submission check against the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub status: SubmissionStatus,
    pub ledger_sequence: Option<i64>,
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Looks up transaction hashes on Horizon.
#[derive(Clone)]
pub struct SubmissionChecker {
    horizon: Arc<dyn Horizon>,
}

impl SubmissionChecker {
    pub fn new(horizon: Arc<dyn Horizon>) -> Self {
        Self { horizon }
    }

    /// Check whether a transaction hash is confirmed on the ledger.
    ///
    /// A missing transaction maps to `not_found`; any other ledger error
    /// propagates to the caller.
    pub async fn check_transaction(&self, tx_hash: &str) -> Result<CheckResult, HorizonError> {
        match self.horizon.transaction_detail(tx_hash).await {
            Ok(detail) => Ok(CheckResult {
                status: SubmissionStatus::Confirmed,
                ledger_sequence: Some(detail.ledger),
                submitted_at: Some(detail.created_at),
            }),
            Err(HorizonError::NotFound) => Ok(CheckResult {
                status: SubmissionStatus::NotFound,
                ledger_sequence: None,
                submitted_at: None,
            }),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stellar::horizon::{AccountDetail, SubmitResponse, TransactionDetail};
    use async_trait::async_trait;

    enum StubBehavior {
        Confirmed,
        Missing,
        Failing,
    }

    struct StubHorizon(StubBehavior);

    #[async_trait]
    impl Horizon for StubHorizon {
        async fn account_detail(&self, _account_id: &str) -> Result<AccountDetail, HorizonError> {
            Err(HorizonError::NotFound)
        }

        async fn transaction_detail(&self, hash: &str) -> Result<TransactionDetail, HorizonError> {
            match self.0 {
                StubBehavior::Confirmed => Ok(TransactionDetail {
                    hash: hash.to_string(),
                    ledger: 1234,
                    created_at: Utc::now(),
                }),
                StubBehavior::Missing => Err(HorizonError::NotFound),
                StubBehavior::Failing => Err(HorizonError::Api {
                    status: 500,
                    detail: "boom".to_string(),
                }),
            }
        }

        async fn submit_transaction(&self, _tx_xdr: &str) -> Result<SubmitResponse, HorizonError> {
            Err(HorizonError::NotFound)
        }
    }

    #[tokio::test]
    async fn confirmed_transaction_carries_ledger_details() {
        let checker = SubmissionChecker::new(Arc::new(StubHorizon(StubBehavior::Confirmed)));
        let result = checker.check_transaction("abc123").await.unwrap();

        assert_eq!(result.status, SubmissionStatus::Confirmed);
        assert_eq!(result.ledger_sequence, Some(1234));
        assert!(result.submitted_at.is_some());
    }

    #[tokio::test]
    async fn missing_transaction_maps_to_not_found() {
        let checker = SubmissionChecker::new(Arc::new(StubHorizon(StubBehavior::Missing)));
        let result = checker.check_transaction("abc123").await.unwrap();

        assert_eq!(result.status, SubmissionStatus::NotFound);
        assert_eq!(result.ledger_sequence, None);
    }

    #[tokio::test]
    async fn other_errors_propagate() {
        let checker = SubmissionChecker::new(Arc::new(StubHorizon(StubBehavior::Failing)));
        assert!(checker.check_transaction("abc123").await.is_err());
    }
}
