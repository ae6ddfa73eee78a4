// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sponsorship Gateway contributors

//! The sign pipeline: verify, balance-check, co-sign, audit.
//!
//! Audit writes are best-effort on both branches: a database outage must
//! not stop a legitimate client from getting a signature, and a rejection
//! is still returned if it could not be recorded.

use std::sync::Arc;

use crate::error::Error;
use crate::models::{ApiKey, TransactionStatus};
use crate::stellar::account::AccountService;
use crate::stellar::amount::parse_stroops;
use crate::stellar::signer::Signer;
use crate::stellar::verifier::{Verifier, VerifyOutcome};
use crate::stellar::BASE_RESERVE_STROOPS;
use crate::storage::{NewTransactionLog, Store};

/// Output of a successful signing operation.
#[derive(Debug, Clone)]
pub struct SignOutcome {
    pub signed_xdr: String,
    pub tx_hash: String,
    pub sponsor_account: String,
    pub sponsor_balance: String,
}

/// Core transaction co-signing pipeline.
pub struct SigningService {
    store: Arc<dyn Store>,
    signer: Arc<Signer>,
    verifier: Verifier,
    accounts: AccountService,
}

impl SigningService {
    pub fn new(store: Arc<dyn Store>, signer: Arc<Signer>, accounts: AccountService) -> Self {
        Self {
            store,
            signer,
            verifier: Verifier::new(),
            accounts,
        }
    }

    /// Verify, balance-check, sign, and log a transaction.
    pub async fn sign(
        &self,
        api_key: &ApiKey,
        transaction_xdr: &str,
    ) -> Result<SignOutcome, Error> {
        // 1. Verify the transaction against the API key's rules
        let verified = match self.verifier.verify(transaction_xdr, api_key) {
            VerifyOutcome::Valid(verified) => verified,
            VerifyOutcome::Rejected(rejection) => {
                if let Err(err) = self
                    .store
                    .create_transaction_log(NewTransactionLog {
                        api_key_id: api_key.id,
                        transaction_hash: None,
                        transaction_xdr: transaction_xdr.to_string(),
                        operations: Vec::new(),
                        source_account: rejection.source_account.clone().unwrap_or_default(),
                        status: TransactionStatus::Rejected,
                        rejection_reason: Some(rejection.message.clone()),
                        reserves_locked: None,
                    })
                    .await
                {
                    tracing::error!(
                        api_key_id = %api_key.id,
                        error = %err,
                        "failed to log rejected transaction"
                    );
                }

                return Err(Error::bad_request(rejection.code, rejection.message));
            }
        };

        // 2. Pre-sign balance check
        let sponsor_account = api_key.sponsor_account().to_string();
        let available = match self.accounts.get_balance(&sponsor_account).await {
            Ok((available, _locked)) => available,
            Err(err) => {
                tracing::error!(
                    sponsor = %sponsor_account,
                    error = %err,
                    "failed to get sponsor balance"
                );
                return Err(Error::unavailable(
                    "balance_check_failed",
                    "Unable to verify sponsor account balance",
                ));
            }
        };

        let required_stroops = i64::from(verified.reserves_locked) * BASE_RESERVE_STROOPS;
        let available_stroops = parse_stroops(&available).map_err(|err| {
            tracing::error!(available = %available, error = %err, "failed to parse available balance");
            Error::internal(
                "balance_check_failed",
                "Unable to verify sponsor account balance",
            )
        })?;

        if available_stroops < required_stroops {
            return Err(Error::bad_request(
                "insufficient_balance",
                "Sponsor account does not have enough available balance to cover the reserves \
                 required by this transaction",
            ));
        }

        // 3. Sign
        let (signed_xdr, tx_hash) = self.signer.sign(transaction_xdr).map_err(|err| {
            tracing::error!(error = %err, "failed to sign transaction");
            Error::internal("signing_failed", "Failed to sign transaction")
        })?;

        // 4. Log the signed transaction (best effort)
        if let Err(err) = self
            .store
            .create_transaction_log(NewTransactionLog {
                api_key_id: api_key.id,
                transaction_hash: Some(tx_hash.clone()),
                transaction_xdr: signed_xdr.clone(),
                operations: verified.operations,
                source_account: verified.source_account,
                status: TransactionStatus::Signed,
                rejection_reason: None,
                reserves_locked: Some(verified.reserves_locked),
            })
            .await
        {
            tracing::error!(
                api_key_id = %api_key.id,
                error = %err,
                "failed to log signed transaction"
            );
        }

        Ok(SignOutcome {
            signed_xdr,
            tx_hash,
            sponsor_account,
            sponsor_balance: available,
        })
    }
}
