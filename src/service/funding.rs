// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sponsorship Gateway contributors

//! Sponsor-account lifecycle: activate, fund, and sweep.
//!
//! Every state transition is guarded by the key's current status, and a
//! failed ledger submission never advances that status — the admin can
//! retry with the same client-returned envelope.

use std::sync::Arc;

use uuid::Uuid;

use crate::error::Error;
use crate::models::{ApiKey, ApiKeyStatus};
use crate::stellar::account::AccountService;
use crate::stellar::amount::{format_stroops, parse_stroops};
use crate::stellar::builder::{
    validate_activate_transaction, validate_fund_transaction, Builder,
};
use crate::stellar::horizon::Horizon;
use crate::stellar::keys::Keypair;
use crate::stellar::signer::Signer;
use crate::storage::Store;

/// Output of building an activation transaction.
#[derive(Debug, Clone)]
pub struct BuildActivate {
    pub sponsor_account: String,
    pub xlm_budget: String,
    pub transaction_xdr: String,
}

/// Output of a submitted activation transaction.
#[derive(Debug, Clone)]
pub struct SubmitActivate {
    pub id: Uuid,
    pub status: ApiKeyStatus,
    pub sponsor_account: String,
    pub transaction_hash: String,
}

/// Output of building a fund transaction.
#[derive(Debug, Clone)]
pub struct BuildFund {
    pub sponsor_account: String,
    pub xlm_to_add: String,
    pub transaction_xdr: String,
}

/// Output of a submitted fund transaction.
#[derive(Debug, Clone)]
pub struct SubmitFund {
    pub sponsor_account: String,
    pub xlm_added: String,
    pub xlm_available: String,
    pub transaction_hash: String,
}

/// Output of a sweep.
#[derive(Debug, Clone)]
pub struct Sweep {
    pub sponsor_account: String,
    pub xlm_swept: String,
    pub xlm_remaining_locked: String,
    pub destination: String,
    /// Empty when there was nothing to sweep.
    pub transaction_hash: String,
}

/// Activation, funding, and sweep orchestration.
pub struct FundingService {
    store: Arc<dyn Store>,
    builder: Builder,
    signer: Arc<Signer>,
    accounts: AccountService,
    horizon: Arc<dyn Horizon>,
    master_public_key: String,
    network_passphrase: String,
}

impl FundingService {
    pub fn new(
        store: Arc<dyn Store>,
        builder: Builder,
        signer: Arc<Signer>,
        accounts: AccountService,
        horizon: Arc<dyn Horizon>,
        master_public_key: impl Into<String>,
        network_passphrase: impl Into<String>,
    ) -> Self {
        Self {
            store,
            builder,
            signer,
            accounts,
            horizon,
            master_public_key: master_public_key.into(),
            network_passphrase: network_passphrase.into(),
        }
    }

    async fn get_key(&self, id: Uuid) -> Result<ApiKey, Error> {
        self.store
            .get_api_key_by_id(id)
            .await
            .ok()
            .flatten()
            .ok_or_else(|| Error::not_found("not_found", "API key not found"))
    }

    /// Generate an ephemeral sponsor keypair and build the activation
    /// transaction for a key awaiting funding.
    pub async fn build_activate(&self, id: Uuid) -> Result<BuildActivate, Error> {
        let api_key = self.get_key(id).await?;

        if api_key.status != ApiKeyStatus::PendingFunding {
            return Err(Error::bad_request(
                "invalid_status",
                "API key is not pending funding",
            ));
        }

        let sponsor_kp = Keypair::random();
        let presigned_xdr = self
            .builder
            .build_create_sponsor_account(&sponsor_kp, api_key.xlm_budget)
            .await
            .map_err(|err| {
                tracing::error!(id = %id, error = %err, "failed to build activate transaction");
                Error::internal("internal_error", "Failed to build activation transaction")
            })?;

        Ok(BuildActivate {
            sponsor_account: sponsor_kp.public_key(),
            xlm_budget: format_stroops(api_key.xlm_budget),
            transaction_xdr: presigned_xdr,
        })
    }

    /// Re-validate and submit a master-signed activation transaction,
    /// then bind the sponsor account and flip the key to `active`.
    pub async fn submit_activate(
        &self,
        id: Uuid,
        signed_xdr: &str,
    ) -> Result<SubmitActivate, Error> {
        let api_key = self.get_key(id).await?;

        if api_key.status != ApiKeyStatus::PendingFunding {
            return Err(Error::bad_request(
                "invalid_status",
                "API key is not pending funding",
            ));
        }

        let sponsor_account = validate_activate_transaction(
            signed_xdr,
            &self.network_passphrase,
            &self.master_public_key,
        )
        .map_err(|err| Error::bad_request("invalid_request", err.to_string()))?;

        let response = self
            .horizon
            .submit_transaction(signed_xdr)
            .await
            .map_err(|err| {
                tracing::error!(id = %id, error = %err, "failed to submit activation transaction");
                Error::bad_request(
                    "submission_failed",
                    format!("Failed to submit transaction to Stellar: {err}"),
                )
            })?;

        self.store
            .set_sponsor_account(id, &sponsor_account)
            .await
            .map_err(|err| {
                tracing::error!(id = %id, error = %err, "failed to save sponsor account");
                Error::internal("internal_error", "Failed to save sponsor account")
            })?;

        self.store
            .update_api_key_status(id, ApiKeyStatus::Active)
            .await
            .map_err(|err| {
                tracing::error!(id = %id, error = %err, "failed to activate API key");
                Error::internal("internal_error", "Failed to activate API key")
            })?;

        Ok(SubmitActivate {
            id: api_key.id,
            status: ApiKeyStatus::Active,
            sponsor_account,
            transaction_hash: response.hash,
        })
    }

    /// Build an unsigned fund transaction for an active key's sponsor.
    pub async fn build_fund(&self, id: Uuid, amount_xlm: &str) -> Result<BuildFund, Error> {
        let fund_stroops = parse_stroops(amount_xlm)
            .ok()
            .filter(|stroops| *stroops > 0)
            .ok_or_else(|| Error::bad_request("invalid_request", "Invalid amount"))?;

        let api_key = self.get_key(id).await?;

        if api_key.status != ApiKeyStatus::Active {
            return Err(Error::bad_request(
                "invalid_status",
                "API key must be active to fund",
            ));
        }

        let sponsor_account = api_key.sponsor_account().to_string();
        let unsigned_xdr = self
            .builder
            .build_fund_transaction(&sponsor_account, fund_stroops)
            .await
            .map_err(|err| {
                tracing::error!(id = %id, error = %err, "failed to build fund transaction");
                Error::internal("internal_error", "Failed to build funding transaction")
            })?;

        Ok(BuildFund {
            sponsor_account,
            xlm_to_add: amount_xlm.to_string(),
            transaction_xdr: unsigned_xdr,
        })
    }

    /// Re-validate and submit a master-signed fund transaction.
    pub async fn submit_fund(&self, id: Uuid, signed_xdr: &str) -> Result<SubmitFund, Error> {
        let api_key = self.get_key(id).await?;

        if api_key.status != ApiKeyStatus::Active {
            return Err(Error::bad_request(
                "invalid_status",
                "API key must be active to fund",
            ));
        }

        let sponsor_account = api_key.sponsor_account().to_string();
        let xlm_added = validate_fund_transaction(
            signed_xdr,
            &self.network_passphrase,
            &self.master_public_key,
            &sponsor_account,
        )
        .map_err(|err| Error::bad_request("invalid_request", err.to_string()))?;

        let response = self
            .horizon
            .submit_transaction(signed_xdr)
            .await
            .map_err(|err| {
                tracing::error!(id = %id, error = %err, "failed to submit fund transaction");
                Error::bad_request(
                    "submission_failed",
                    format!("Failed to submit transaction: {err}"),
                )
            })?;

        let xlm_available = match self.accounts.get_balance(&sponsor_account).await {
            Ok((available, _)) => available,
            Err(err) => {
                tracing::error!(error = %err, "failed to get updated balance");
                "unknown".to_string()
            }
        };

        Ok(SubmitFund {
            sponsor_account,
            xlm_added,
            xlm_available,
            transaction_hash: response.hash,
        })
    }

    /// Sweep a revoked key's available sponsor balance back to master.
    pub async fn sweep(&self, id: Uuid) -> Result<Sweep, Error> {
        let api_key = self.get_key(id).await?;

        if api_key.status != ApiKeyStatus::Revoked {
            return Err(Error::bad_request(
                "invalid_status",
                "Can only sweep revoked API keys",
            ));
        }

        let sponsor_account = api_key.sponsor_account().to_string();
        let build = self
            .builder
            .build_sweep_transaction(&self.signer, &self.accounts, &sponsor_account)
            .await
            .map_err(|err| {
                tracing::error!(id = %id, error = %err, "failed to build sweep transaction");
                Error::internal(
                    "sweep_failed",
                    format!("Failed to build sweep transaction: {err}"),
                )
            })?;

        if build.nothing_to_sweep {
            return Ok(Sweep {
                sponsor_account,
                xlm_swept: build.xlm_swept,
                xlm_remaining_locked: build.xlm_remaining_locked,
                destination: self.master_public_key.clone(),
                transaction_hash: String::new(),
            });
        }

        let response = self
            .horizon
            .submit_transaction(&build.signed_xdr)
            .await
            .map_err(|err| {
                tracing::error!(id = %id, error = %err, "failed to submit sweep transaction");
                Error::internal(
                    "sweep_failed",
                    format!("Failed to submit sweep transaction: {err}"),
                )
            })?;

        Ok(Sweep {
            sponsor_account,
            xlm_swept: build.xlm_swept,
            xlm_remaining_locked: build.xlm_remaining_locked,
            destination: self.master_public_key.clone(),
            transaction_hash: response.hash,
        })
    }
}
