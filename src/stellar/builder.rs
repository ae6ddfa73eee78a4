// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sponsorship Gateway contributors

//! Construction of the admin lifecycle transactions (activate, fund,
//! sweep) and the symmetric re-validation of client-returned envelopes.
//!
//! Every built transaction carries a 300-second validity window and the
//! minimum base fee per operation. The re-validators enforce the exact
//! structural contract of each shape before anything is submitted, so a
//! tampered envelope coming back from a client is caught here.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use super::account::AccountService;
use super::amount::format_stroops;
use super::envelope::{
    Asset, DecoratedSignature, EnvelopeError, Operation, OperationBody, SignerKey, TimeBounds,
    Transaction, TransactionEnvelope,
};
use super::horizon::{Horizon, HorizonError};
use super::keys::Keypair;
use super::signer::Signer;
use super::MIN_BASE_FEE;

/// Transaction validity window in seconds.
const TRANSACTION_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Error)]
pub enum BuilderError {
    #[error("{context}: {source}")]
    Horizon {
        context: &'static str,
        #[source]
        source: HorizonError,
    },

    #[error("encode transaction: {0}")]
    Envelope(#[from] EnvelopeError),

    #[error("{0}")]
    Invalid(String),
}

fn invalid(message: impl Into<String>) -> BuilderError {
    BuilderError::Invalid(message.into())
}

/// Outputs from building a sweep transaction.
#[derive(Debug, Clone)]
pub struct SweepBuild {
    /// Base64 signed envelope; empty when there is nothing to sweep.
    pub signed_xdr: String,
    /// Amount swept, display format.
    pub xlm_swept: String,
    /// Reserves still locked in the sponsor, display format.
    pub xlm_remaining_locked: String,
    /// True when the available balance is zero or below the base fee.
    pub nothing_to_sweep: bool,
}

/// Builds the admin lifecycle transactions.
pub struct Builder {
    horizon: Arc<dyn Horizon>,
    signing_public_key: String,
    master_public_key: String,
    network_passphrase: String,
}

impl Builder {
    pub fn new(
        horizon: Arc<dyn Horizon>,
        signing_public_key: impl Into<String>,
        master_public_key: impl Into<String>,
        network_passphrase: impl Into<String>,
    ) -> Self {
        Self {
            horizon,
            signing_public_key: signing_public_key.into(),
            master_public_key: master_public_key.into(),
            network_passphrase: network_passphrase.into(),
        }
    }

    fn time_bounds() -> TimeBounds {
        TimeBounds {
            min_time: 0,
            max_time: Utc::now().timestamp() as u64 + TRANSACTION_TIMEOUT_SECS,
        }
    }

    /// Build the activation transaction for a new sponsor account:
    ///
    /// 1. master begins sponsoring reserves for the new account
    /// 2. master creates the account funded with the XLM budget
    /// 3. the account adds the service signing key as a signer
    /// 4. the account adds master as a signer and zeroes its own master
    ///    weight, so it can never authorize payments on its own
    /// 5. the account ends the sponsoring block
    ///
    /// The result is pre-signed with the sponsor keypair (required for the
    /// operations it sources); the client adds the master signature.
    pub async fn build_create_sponsor_account(
        &self,
        sponsor_kp: &Keypair,
        xlm_budget: i64,
    ) -> Result<String, BuilderError> {
        let sponsor_address = sponsor_kp.public_key();

        let master = self
            .horizon
            .account_detail(&self.master_public_key)
            .await
            .map_err(|source| BuilderError::Horizon {
                context: "load master account",
                source,
            })?;

        let operations = vec![
            Operation::new(OperationBody::BeginSponsoringFutureReserves {
                sponsored_id: sponsor_address.clone(),
            }),
            Operation::new(OperationBody::CreateAccount {
                destination: sponsor_address.clone(),
                starting_balance: xlm_budget,
            }),
            Operation::with_source(
                sponsor_address.clone(),
                OperationBody::SetOptions {
                    signer: Some(SignerKey {
                        key: self.signing_public_key.clone(),
                        weight: 1,
                    }),
                    master_weight: None,
                    low_threshold: None,
                    medium_threshold: None,
                    high_threshold: None,
                    home_domain: None,
                },
            ),
            Operation::with_source(
                sponsor_address.clone(),
                OperationBody::SetOptions {
                    signer: Some(SignerKey {
                        key: self.master_public_key.clone(),
                        weight: 1,
                    }),
                    master_weight: Some(0),
                    low_threshold: Some(1),
                    medium_threshold: Some(1),
                    high_threshold: Some(1),
                    home_domain: None,
                },
            ),
            Operation::with_source(
                sponsor_address.clone(),
                OperationBody::EndSponsoringFutureReserves,
            ),
        ];

        let tx = Transaction {
            source_account: self.master_public_key.clone(),
            fee: MIN_BASE_FEE * operations.len() as u32,
            seq_num: master.sequence + 1,
            time_bounds: Some(Self::time_bounds()),
            operations,
        };

        // Pre-sign with the sponsor keypair (needed for ops sourced from
        // the sponsor account).
        let hash = tx.hash(&self.network_passphrase)?;
        let envelope = TransactionEnvelope::Tx {
            tx,
            signatures: vec![DecoratedSignature::sign(sponsor_kp, &hash)],
        };

        Ok(envelope.to_base64()?)
    }

    /// Build an unsigned native payment from master to a sponsor account.
    pub async fn build_fund_transaction(
        &self,
        sponsor_account: &str,
        fund_amount: i64,
    ) -> Result<String, BuilderError> {
        let master = self
            .horizon
            .account_detail(&self.master_public_key)
            .await
            .map_err(|source| BuilderError::Horizon {
                context: "load master account",
                source,
            })?;

        let tx = Transaction {
            source_account: self.master_public_key.clone(),
            fee: MIN_BASE_FEE,
            seq_num: master.sequence + 1,
            time_bounds: Some(Self::time_bounds()),
            operations: vec![Operation::new(OperationBody::Payment {
                destination: sponsor_account.to_string(),
                asset: Asset::Native,
                amount: fund_amount,
            })],
        };

        Ok(TransactionEnvelope::new(tx).to_base64()?)
    }

    /// Build and sign a payment returning a revoked sponsor's available
    /// balance to master, minus the base fee.
    pub async fn build_sweep_transaction(
        &self,
        signer: &Signer,
        accounts: &AccountService,
        sponsor_account: &str,
    ) -> Result<SweepBuild, BuilderError> {
        let (available, locked) =
            accounts
                .get_balance(sponsor_account)
                .await
                .map_err(|source| BuilderError::Horizon {
                    context: "get sponsor balance",
                    source,
                })?;

        let available_stroops = super::amount::parse_stroops(&available)
            .map_err(|e| invalid(format!("parse available balance: {e}")))?;

        let sweep_amount = available_stroops - i64::from(MIN_BASE_FEE);
        if available_stroops <= 0 || sweep_amount <= 0 {
            return Ok(SweepBuild {
                signed_xdr: String::new(),
                xlm_swept: "0.0000000".to_string(),
                xlm_remaining_locked: locked,
                nothing_to_sweep: true,
            });
        }

        let sponsor = self
            .horizon
            .account_detail(sponsor_account)
            .await
            .map_err(|source| BuilderError::Horizon {
                context: "load sponsor account",
                source,
            })?;

        let tx = Transaction {
            source_account: sponsor_account.to_string(),
            fee: MIN_BASE_FEE,
            seq_num: sponsor.sequence + 1,
            time_bounds: Some(Self::time_bounds()),
            operations: vec![Operation::new(OperationBody::Payment {
                destination: self.master_public_key.clone(),
                asset: Asset::Native,
                amount: sweep_amount,
            })],
        };

        let hash = tx.hash(&self.network_passphrase)?;
        let envelope = TransactionEnvelope::Tx {
            tx,
            signatures: vec![DecoratedSignature::sign(signer.keypair(), &hash)],
        };

        Ok(SweepBuild {
            signed_xdr: envelope.to_base64()?,
            xlm_swept: format_stroops(sweep_amount),
            xlm_remaining_locked: locked,
            nothing_to_sweep: false,
        })
    }
}

/// Re-validate a client-returned activation envelope.
///
/// Enforces the exact structural contract of
/// [`Builder::build_create_sponsor_account`] and checks the sponsor
/// pre-signature under the expected network passphrase. Returns the
/// sponsor account address.
pub fn validate_activate_transaction(
    signed_xdr: &str,
    network_passphrase: &str,
    master_public_key: &str,
) -> Result<String, BuilderError> {
    let (tx, signatures) = decode_v1(signed_xdr)?;

    if tx.source_account != master_public_key {
        return Err(invalid(
            "activation transaction source must be the master account",
        ));
    }

    if tx.operations.len() != 5 {
        return Err(invalid(
            "activation transaction must contain exactly 5 operations",
        ));
    }

    let OperationBody::BeginSponsoringFutureReserves { sponsored_id } = &tx.operations[0].body
    else {
        return Err(invalid("operation 0 must be BeginSponsoringFutureReserves"));
    };

    let OperationBody::CreateAccount { destination, .. } = &tx.operations[1].body else {
        return Err(invalid("operation 1 must be CreateAccount"));
    };

    let sponsor_account = destination.clone();
    if sponsor_account.is_empty() {
        return Err(invalid("CreateAccount destination must not be empty"));
    }

    if sponsored_id != &sponsor_account {
        return Err(invalid(
            "BeginSponsoringFutureReserves must target the sponsor account",
        ));
    }

    if !matches!(tx.operations[2].body, OperationBody::SetOptions { .. }) {
        return Err(invalid("operation 2 must be SetOptions"));
    }
    if !matches!(tx.operations[3].body, OperationBody::SetOptions { .. }) {
        return Err(invalid("operation 3 must be SetOptions"));
    }

    if !matches!(
        tx.operations[4].body,
        OperationBody::EndSponsoringFutureReserves
    ) {
        return Err(invalid("operation 4 must be EndSponsoringFutureReserves"));
    }
    if tx.operations[4].source_account.as_deref() != Some(sponsor_account.as_str()) {
        return Err(invalid(
            "EndSponsoringFutureReserves source must be the sponsor account",
        ));
    }

    // The sponsor pre-signature must verify under the expected network
    // passphrase; a mismatched network invalidates it.
    let hash = tx.hash(network_passphrase)?;
    if !signatures
        .iter()
        .any(|sig| sig.verifies(&sponsor_account, &hash))
    {
        return Err(invalid("invalid signed_transaction_xdr"));
    }

    Ok(sponsor_account)
}

/// Re-validate a client-returned funding envelope. Returns the funded
/// amount in display format.
pub fn validate_fund_transaction(
    signed_xdr: &str,
    _network_passphrase: &str,
    master_public_key: &str,
    sponsor_account: &str,
) -> Result<String, BuilderError> {
    let (tx, signatures) = decode_v1(signed_xdr)?;

    if tx.source_account != master_public_key {
        return Err(invalid(
            "funding transaction source must be the master account",
        ));
    }

    if tx.operations.len() != 1 {
        return Err(invalid(
            "funding transaction must contain exactly one operation",
        ));
    }

    let operation = &tx.operations[0];
    let OperationBody::Payment {
        destination,
        asset,
        amount,
    } = &operation.body
    else {
        return Err(invalid("funding transaction must be a payment operation"));
    };

    if !asset.is_native() {
        return Err(invalid("funding transaction must transfer native XLM"));
    }
    if destination != sponsor_account {
        return Err(invalid(
            "funding transaction destination must match the sponsor account",
        ));
    }
    if let Some(op_source) = operation.source_account.as_deref() {
        if !op_source.is_empty() && op_source != master_public_key {
            return Err(invalid("funding operation source must be the master account"));
        }
    }
    if *amount <= 0 {
        return Err(invalid("funding amount must be positive"));
    }

    if signatures.is_empty() {
        return Err(invalid("invalid signed_transaction_xdr"));
    }

    Ok(format_stroops(*amount))
}

fn decode_v1(
    signed_xdr: &str,
) -> Result<(Transaction, Vec<DecoratedSignature>), BuilderError> {
    let envelope = TransactionEnvelope::from_base64(signed_xdr)
        .map_err(|_| invalid("invalid signed_transaction_xdr"))?;
    envelope
        .into_v1()
        .map_err(|_| invalid("fee bump transactions are not supported"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stellar::amount::parse_stroops;
    use crate::stellar::horizon::{
        AccountBalance, AccountDetail, SubmitResponse, TransactionDetail,
    };
    use async_trait::async_trait;

    const TEST_PASSPHRASE: &str = "Test SDF Network ; September 2015";

    struct StubHorizon {
        sequence: i64,
        native_balance: &'static str,
        subentry_count: u32,
        num_sponsoring: u32,
        num_sponsored: u32,
    }

    impl Default for StubHorizon {
        fn default() -> Self {
            Self {
                sequence: 100,
                native_balance: "50.0000000",
                subentry_count: 0,
                num_sponsoring: 0,
                num_sponsored: 0,
            }
        }
    }

    #[async_trait]
    impl Horizon for StubHorizon {
        async fn account_detail(&self, account_id: &str) -> Result<AccountDetail, HorizonError> {
            Ok(AccountDetail {
                account_id: account_id.to_string(),
                sequence: self.sequence,
                balances: vec![AccountBalance {
                    balance: self.native_balance.to_string(),
                    asset_type: "native".to_string(),
                }],
                subentry_count: self.subentry_count,
                num_sponsoring: self.num_sponsoring,
                num_sponsored: self.num_sponsored,
            })
        }

        async fn transaction_detail(
            &self,
            _hash: &str,
        ) -> Result<TransactionDetail, HorizonError> {
            Err(HorizonError::NotFound)
        }

        async fn submit_transaction(&self, _tx_xdr: &str) -> Result<SubmitResponse, HorizonError> {
            Err(HorizonError::NotFound)
        }
    }

    fn builder_with(horizon: Arc<dyn Horizon>) -> (Builder, Keypair, Keypair) {
        let signing_kp = Keypair::random();
        let master_kp = Keypair::random();
        let builder = Builder::new(
            horizon,
            signing_kp.public_key(),
            master_kp.public_key(),
            TEST_PASSPHRASE,
        );
        (builder, signing_kp, master_kp)
    }

    #[tokio::test]
    async fn activate_round_trips_through_validation() {
        let (builder, _, master_kp) = builder_with(Arc::new(StubHorizon::default()));
        let sponsor_kp = Keypair::random();

        let xdr = builder
            .build_create_sponsor_account(&sponsor_kp, parse_stroops("100").unwrap())
            .await
            .unwrap();

        let sponsor = validate_activate_transaction(
            &xdr,
            TEST_PASSPHRASE,
            &master_kp.public_key(),
        )
        .unwrap();
        assert_eq!(sponsor, sponsor_kp.public_key());

        // Structure checks on the built envelope itself.
        let (tx, signatures) = TransactionEnvelope::from_base64(&xdr)
            .unwrap()
            .into_v1()
            .unwrap();
        assert_eq!(tx.source_account, master_kp.public_key());
        assert_eq!(tx.seq_num, 101);
        assert_eq!(tx.fee, MIN_BASE_FEE * 5);
        assert_eq!(tx.operations.len(), 5);
        assert_eq!(signatures.len(), 1);
        assert!(matches!(
            tx.operations[1].body,
            OperationBody::CreateAccount {
                starting_balance: 1_000_000_000,
                ..
            }
        ));
        // Op 4 removes the sponsor's own signing privilege.
        assert!(matches!(
            &tx.operations[3].body,
            OperationBody::SetOptions {
                master_weight: Some(0),
                low_threshold: Some(1),
                medium_threshold: Some(1),
                high_threshold: Some(1),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn activate_validation_rejects_tampering() {
        let (builder, _, master_kp) = builder_with(Arc::new(StubHorizon::default()));
        let sponsor_kp = Keypair::random();
        let master = master_kp.public_key();

        let xdr = builder
            .build_create_sponsor_account(&sponsor_kp, 1_000_000_000)
            .await
            .unwrap();
        let (tx, signatures) = TransactionEnvelope::from_base64(&xdr)
            .unwrap()
            .into_v1()
            .unwrap();

        // Swap op 0 for a native payment (hostile client).
        let mut swapped = tx.clone();
        swapped.operations[0] = Operation::new(OperationBody::Payment {
            destination: Keypair::random().public_key(),
            asset: Asset::Native,
            amount: 1_000_000_000,
        });
        let hostile = TransactionEnvelope::Tx {
            tx: swapped,
            signatures: signatures.clone(),
        }
        .to_base64()
        .unwrap();
        assert!(validate_activate_transaction(&hostile, TEST_PASSPHRASE, &master).is_err());

        // Drop an operation.
        let mut truncated = tx.clone();
        truncated.operations.pop();
        let hostile = TransactionEnvelope::Tx {
            tx: truncated,
            signatures: signatures.clone(),
        }
        .to_base64()
        .unwrap();
        assert!(validate_activate_transaction(&hostile, TEST_PASSPHRASE, &master).is_err());

        // Redirect the created account: the BEGIN block no longer matches.
        let mut redirected = tx.clone();
        if let OperationBody::CreateAccount { destination, .. } = &mut redirected.operations[1].body
        {
            *destination = Keypair::random().public_key();
        }
        let hostile = TransactionEnvelope::Tx {
            tx: redirected,
            signatures: signatures.clone(),
        }
        .to_base64()
        .unwrap();
        assert!(validate_activate_transaction(&hostile, TEST_PASSPHRASE, &master).is_err());

        // Wrong network passphrase invalidates the pre-signature.
        assert!(validate_activate_transaction(
            &xdr,
            "Public Global Stellar Network ; September 2015",
            &master
        )
        .is_err());

        // Wrong master account.
        assert!(validate_activate_transaction(
            &xdr,
            TEST_PASSPHRASE,
            &Keypair::random().public_key()
        )
        .is_err());
    }

    #[tokio::test]
    async fn fund_round_trips_through_validation() {
        let (builder, _, master_kp) = builder_with(Arc::new(StubHorizon::default()));
        let sponsor = Keypair::random().public_key();
        let master = master_kp.public_key();

        let xdr = builder
            .build_fund_transaction(&sponsor, parse_stroops("25.5").unwrap())
            .await
            .unwrap();

        // The build output is unsigned; the client signs with master.
        let (tx, signatures) = TransactionEnvelope::from_base64(&xdr)
            .unwrap()
            .into_v1()
            .unwrap();
        assert!(signatures.is_empty());
        let hash = tx.hash(TEST_PASSPHRASE).unwrap();
        let signed = TransactionEnvelope::Tx {
            tx,
            signatures: vec![DecoratedSignature::sign(&master_kp, &hash)],
        }
        .to_base64()
        .unwrap();

        let amount =
            validate_fund_transaction(&signed, TEST_PASSPHRASE, &master, &sponsor).unwrap();
        assert_eq!(amount, "25.5000000");
    }

    #[tokio::test]
    async fn fund_validation_rejects_tampering() {
        let (builder, _, master_kp) = builder_with(Arc::new(StubHorizon::default()));
        let sponsor = Keypair::random().public_key();
        let master = master_kp.public_key();

        let xdr = builder.build_fund_transaction(&sponsor, 1_000).await.unwrap();
        let (tx, _) = TransactionEnvelope::from_base64(&xdr)
            .unwrap()
            .into_v1()
            .unwrap();

        let sign = |tx: Transaction| {
            let hash = tx.hash(TEST_PASSPHRASE).unwrap();
            TransactionEnvelope::Tx {
                tx,
                signatures: vec![DecoratedSignature::sign(&master_kp, &hash)],
            }
            .to_base64()
            .unwrap()
        };

        // Redirected destination.
        let mut redirected = tx.clone();
        if let OperationBody::Payment { destination, .. } = &mut redirected.operations[0].body {
            *destination = Keypair::random().public_key();
        }
        assert!(
            validate_fund_transaction(&sign(redirected), TEST_PASSPHRASE, &master, &sponsor)
                .is_err()
        );

        // Non-native asset.
        let mut swapped = tx.clone();
        if let OperationBody::Payment { asset, .. } = &mut swapped.operations[0].body {
            *asset = Asset::Credit {
                code: "USDC".to_string(),
                issuer: Keypair::random().public_key(),
            };
        }
        assert!(
            validate_fund_transaction(&sign(swapped), TEST_PASSPHRASE, &master, &sponsor).is_err()
        );

        // Extra operation.
        let mut padded = tx.clone();
        padded.operations.push(Operation::new(OperationBody::Inflation));
        assert!(
            validate_fund_transaction(&sign(padded), TEST_PASSPHRASE, &master, &sponsor).is_err()
        );

        // Non-positive amount.
        let mut zeroed = tx.clone();
        if let OperationBody::Payment { amount, .. } = &mut zeroed.operations[0].body {
            *amount = 0;
        }
        assert!(
            validate_fund_transaction(&sign(zeroed), TEST_PASSPHRASE, &master, &sponsor).is_err()
        );
    }

    #[tokio::test]
    async fn sweep_builds_signed_payment_to_master() {
        // available = 50 - (2 * 0.5) = 49 XLM
        let (builder, signing_kp, master_kp) = builder_with(Arc::new(StubHorizon::default()));
        let signer = Signer::new(&signing_kp.secret_seed(), TEST_PASSPHRASE).unwrap();
        let accounts = AccountService::new(Arc::new(StubHorizon::default()));
        let sponsor = Keypair::random().public_key();

        let result = builder
            .build_sweep_transaction(&signer, &accounts, &sponsor)
            .await
            .unwrap();

        assert!(!result.nothing_to_sweep);
        assert_eq!(result.xlm_remaining_locked, "1.0000000");
        // 49 XLM minus the base fee.
        assert_eq!(result.xlm_swept, format_stroops(490_000_000 - 100));

        let (tx, signatures) = TransactionEnvelope::from_base64(&result.signed_xdr)
            .unwrap()
            .into_v1()
            .unwrap();
        assert_eq!(tx.source_account, sponsor);
        assert_eq!(signatures.len(), 1);
        let hash = tx.hash(TEST_PASSPHRASE).unwrap();
        assert!(signatures[0].verifies(&signing_kp.public_key(), &hash));
        assert!(matches!(
            &tx.operations[0].body,
            OperationBody::Payment { destination, asset: Asset::Native, .. }
                if destination == &master_kp.public_key()
        ));
    }

    #[tokio::test]
    async fn sweep_reports_nothing_to_sweep_when_balance_is_locked() {
        // native balance 1 XLM, min balance 1 XLM -> available 0
        let horizon = Arc::new(StubHorizon {
            native_balance: "1.0000000",
            ..StubHorizon::default()
        });
        let (builder, signing_kp, _) = builder_with(horizon.clone());
        let signer = Signer::new(&signing_kp.secret_seed(), TEST_PASSPHRASE).unwrap();
        let accounts = AccountService::new(horizon);

        let result = builder
            .build_sweep_transaction(&signer, &accounts, &Keypair::random().public_key())
            .await
            .unwrap();

        assert!(result.nothing_to_sweep);
        assert_eq!(result.xlm_swept, "0.0000000");
        assert!(result.signed_xdr.is_empty());
    }
}
