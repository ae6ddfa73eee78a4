// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sponsorship Gateway contributors

//! Business logic: the signing pipeline, API key management, and the
//! sponsor-account funding lifecycle.

pub mod api_keys;
pub mod funding;
pub mod signing;

pub use api_keys::ApiKeyService;
pub use funding::FundingService;
pub use signing::SigningService;

#[cfg(test)]
pub(crate) mod testutil {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{DateTime, Duration, Utc};
    use uuid::Uuid;

    use crate::models::{
        ApiKey, ApiKeyStatus, SubmissionStatus, TransactionLog, TransactionStatus,
    };
    use crate::stellar::horizon::{
        AccountBalance, AccountDetail, Horizon, HorizonError, SubmitResponse, TransactionDetail,
    };
    use crate::storage::{
        ApiKeyStore, ApiKeyUpdates, NewApiKey, NewTransactionLog, StoreError, TransactionFilters,
        TransactionLogStore,
    };

    /// In-memory store standing in for Postgres in service tests.
    #[derive(Default)]
    pub struct MockStore {
        pub keys: Mutex<Vec<ApiKey>>,
        pub logs: Mutex<Vec<TransactionLog>>,
        pub fail_log_writes: Mutex<bool>,
    }

    impl MockStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_key(key: ApiKey) -> Self {
            let store = Self::new();
            store.keys.lock().unwrap().push(key);
            store
        }

        pub fn insert_key(&self, key: ApiKey) {
            self.keys.lock().unwrap().push(key);
        }

        pub fn set_fail_log_writes(&self, fail: bool) {
            *self.fail_log_writes.lock().unwrap() = fail;
        }

        pub fn logged(&self) -> Vec<TransactionLog> {
            self.logs.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ApiKeyStore for MockStore {
        async fn create_api_key(&self, key: NewApiKey) -> Result<ApiKey, StoreError> {
            let now = Utc::now();
            let api_key = ApiKey {
                id: Uuid::new_v4(),
                name: key.name,
                key_hash: key.key_hash,
                key_prefix: key.key_prefix,
                sponsor_account: None,
                xlm_budget: key.xlm_budget,
                allowed_operations: key.allowed_operations,
                allowed_source_accounts: key.allowed_source_accounts,
                rate_limit_max: key.rate_limit_max,
                rate_limit_window: key.rate_limit_window,
                status: key.status,
                expires_at: key.expires_at,
                created_at: now,
                updated_at: now,
            };
            self.keys.lock().unwrap().push(api_key.clone());
            Ok(api_key)
        }

        async fn get_api_key_by_hash(
            &self,
            key_hash: &str,
        ) -> Result<Option<ApiKey>, StoreError> {
            Ok(self
                .keys
                .lock()
                .unwrap()
                .iter()
                .find(|k| k.key_hash == key_hash)
                .cloned())
        }

        async fn get_api_key_by_id(&self, id: Uuid) -> Result<Option<ApiKey>, StoreError> {
            Ok(self
                .keys
                .lock()
                .unwrap()
                .iter()
                .find(|k| k.id == id)
                .cloned())
        }

        async fn list_api_keys(
            &self,
            page: i64,
            per_page: i64,
        ) -> Result<(Vec<ApiKey>, i64), StoreError> {
            let keys = self.keys.lock().unwrap();
            let total = keys.len() as i64;
            let start = ((page - 1) * per_page) as usize;
            let slice = keys
                .iter()
                .skip(start)
                .take(per_page as usize)
                .cloned()
                .collect();
            Ok((slice, total))
        }

        async fn count_api_keys(&self) -> Result<i64, StoreError> {
            Ok(self.keys.lock().unwrap().len() as i64)
        }

        async fn update_api_key(
            &self,
            id: Uuid,
            updates: ApiKeyUpdates,
        ) -> Result<(), StoreError> {
            let mut keys = self.keys.lock().unwrap();
            let key = keys
                .iter_mut()
                .find(|k| k.id == id)
                .ok_or(StoreError::NotFound)?;
            if let Some(name) = updates.name {
                key.name = name;
            }
            if let Some(ops) = updates.allowed_operations {
                key.allowed_operations = ops;
            }
            if let Some(sources) = updates.allowed_source_accounts {
                key.allowed_source_accounts = sources;
            }
            if let Some(max) = updates.rate_limit_max {
                key.rate_limit_max = max;
            }
            if let Some(window) = updates.rate_limit_window {
                key.rate_limit_window = window;
            }
            if let Some(expires_at) = updates.expires_at {
                key.expires_at = expires_at;
            }
            key.updated_at = Utc::now();
            Ok(())
        }

        async fn update_api_key_status(
            &self,
            id: Uuid,
            status: ApiKeyStatus,
        ) -> Result<(), StoreError> {
            let mut keys = self.keys.lock().unwrap();
            let key = keys
                .iter_mut()
                .find(|k| k.id == id)
                .ok_or(StoreError::NotFound)?;
            key.status = status;
            Ok(())
        }

        async fn set_sponsor_account(
            &self,
            id: Uuid,
            sponsor_account: &str,
        ) -> Result<(), StoreError> {
            let mut keys = self.keys.lock().unwrap();
            let key = keys
                .iter_mut()
                .find(|k| k.id == id)
                .ok_or(StoreError::NotFound)?;
            key.sponsor_account = Some(sponsor_account.to_string());
            Ok(())
        }

        async fn regenerate_api_key(
            &self,
            id: Uuid,
            key_hash: &str,
            key_prefix: &str,
        ) -> Result<(), StoreError> {
            let mut keys = self.keys.lock().unwrap();
            let key = keys
                .iter_mut()
                .find(|k| k.id == id)
                .ok_or(StoreError::NotFound)?;
            key.key_hash = key_hash.to_string();
            key.key_prefix = key_prefix.to_string();
            Ok(())
        }
    }

    #[async_trait]
    impl TransactionLogStore for MockStore {
        async fn create_transaction_log(
            &self,
            log: NewTransactionLog,
        ) -> Result<TransactionLog, StoreError> {
            if *self.fail_log_writes.lock().unwrap() {
                return Err(StoreError::Decode("simulated log-write failure".to_string()));
            }
            let entry = TransactionLog {
                id: Uuid::new_v4(),
                api_key_id: log.api_key_id,
                transaction_hash: log.transaction_hash,
                transaction_xdr: log.transaction_xdr,
                operations: log.operations,
                source_account: log.source_account,
                status: log.status,
                rejection_reason: log.rejection_reason,
                submission_status: None,
                submission_checked_at: None,
                ledger_sequence: None,
                submitted_at: None,
                reserves_locked: log.reserves_locked,
                created_at: Utc::now(),
            };
            self.logs.lock().unwrap().push(entry.clone());
            Ok(entry)
        }

        async fn list_transaction_logs(
            &self,
            _filters: TransactionFilters,
        ) -> Result<(Vec<TransactionLog>, i64), StoreError> {
            let logs = self.logs.lock().unwrap();
            Ok((logs.clone(), logs.len() as i64))
        }

        async fn count_signed_by_api_key(&self, api_key_id: Uuid) -> Result<i64, StoreError> {
            Ok(self
                .logs
                .lock()
                .unwrap()
                .iter()
                .filter(|l| l.api_key_id == api_key_id && l.status == TransactionStatus::Signed)
                .count() as i64)
        }

        async fn get_transaction_log_by_id(
            &self,
            id: Uuid,
        ) -> Result<Option<TransactionLog>, StoreError> {
            Ok(self
                .logs
                .lock()
                .unwrap()
                .iter()
                .find(|l| l.id == id)
                .cloned())
        }

        async fn update_submission_status(
            &self,
            id: Uuid,
            status: SubmissionStatus,
            ledger_sequence: Option<i64>,
            submitted_at: Option<DateTime<Utc>>,
        ) -> Result<(), StoreError> {
            let mut logs = self.logs.lock().unwrap();
            let log = logs
                .iter_mut()
                .find(|l| l.id == id)
                .ok_or(StoreError::NotFound)?;
            log.submission_status = Some(status);
            log.submission_checked_at = Some(Utc::now());
            log.ledger_sequence = ledger_sequence;
            log.submitted_at = submitted_at;
            Ok(())
        }
    }

    /// Configurable Horizon stand-in.
    pub struct StubHorizon {
        /// Native balance served for every account.
        pub native_balance: Mutex<String>,
        pub sequence: i64,
        pub fail_accounts: Mutex<bool>,
        pub submitted: Mutex<Vec<String>>,
        pub fail_submission: Mutex<bool>,
        pub confirmed_transactions: Mutex<HashMap<String, i64>>,
    }

    impl Default for StubHorizon {
        fn default() -> Self {
            Self {
                native_balance: Mutex::new("100.0000000".to_string()),
                sequence: 7,
                fail_accounts: Mutex::new(false),
                submitted: Mutex::new(Vec::new()),
                fail_submission: Mutex::new(false),
                confirmed_transactions: Mutex::new(HashMap::new()),
            }
        }
    }

    impl StubHorizon {
        pub fn with_balance(balance: &str) -> Self {
            Self {
                native_balance: Mutex::new(balance.to_string()),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl Horizon for StubHorizon {
        async fn account_detail(&self, account_id: &str) -> Result<AccountDetail, HorizonError> {
            if *self.fail_accounts.lock().unwrap() {
                return Err(HorizonError::Api {
                    status: 503,
                    detail: "horizon down".to_string(),
                });
            }
            Ok(AccountDetail {
                account_id: account_id.to_string(),
                sequence: self.sequence,
                balances: vec![AccountBalance {
                    balance: self.native_balance.lock().unwrap().clone(),
                    asset_type: "native".to_string(),
                }],
                subentry_count: 0,
                num_sponsoring: 0,
                num_sponsored: 0,
            })
        }

        async fn transaction_detail(&self, hash: &str) -> Result<TransactionDetail, HorizonError> {
            match self.confirmed_transactions.lock().unwrap().get(hash) {
                Some(ledger) => Ok(TransactionDetail {
                    hash: hash.to_string(),
                    ledger: *ledger,
                    created_at: Utc::now(),
                }),
                None => Err(HorizonError::NotFound),
            }
        }

        async fn submit_transaction(&self, tx_xdr: &str) -> Result<SubmitResponse, HorizonError> {
            if *self.fail_submission.lock().unwrap() {
                return Err(HorizonError::Api {
                    status: 400,
                    detail: "tx_failed".to_string(),
                });
            }
            self.submitted.lock().unwrap().push(tx_xdr.to_string());
            Ok(SubmitResponse {
                hash: crate::auth::sha256_hex(tx_xdr),
                ledger: 4242,
            })
        }
    }

    /// An active key bound to the given sponsor account.
    pub fn active_key(sponsor: &str, allowed: &[&str]) -> ApiKey {
        ApiKey {
            id: Uuid::new_v4(),
            name: "test-key".to_string(),
            key_hash: crate::auth::sha256_hex("sk_test_raw"),
            key_prefix: "sk_test_raw...".to_string(),
            sponsor_account: Some(sponsor.to_string()),
            xlm_budget: 1_000_000_000,
            allowed_operations: allowed.iter().map(|s| s.to_string()).collect(),
            allowed_source_accounts: Vec::new(),
            rate_limit_max: 100,
            rate_limit_window: 60,
            status: ApiKeyStatus::Active,
            expires_at: Utc::now() + Duration::hours(24),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}
