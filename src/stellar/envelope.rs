// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sponsorship Gateway contributors

//! Transaction envelope codec.
//!
//! The gateway treats envelopes as an opaque codec exposing the structural
//! fields policy enforcement needs: typed operations, source accounts,
//! assets, and signatures. On the wire an envelope is the JSON encoding of
//! [`TransactionEnvelope`] wrapped in base64.
//!
//! The transaction hash is domain-separated by the network passphrase:
//! `sha256(sha256(passphrase) || "ENVELOPE_TYPE_TX" || tx_bytes)`. Only the
//! transaction body is hashed; signatures never feed the hash.

use base64::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::keys::Keypair;

/// Domain separator mixed into every transaction hash.
const ENVELOPE_TYPE_TX: &[u8] = b"ENVELOPE_TYPE_TX";

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid envelope encoding: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("fee bump transactions are not supported")]
    FeeBumpUnsupported,
}

/// An asset: native XLM or an issued credit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Asset {
    Native,
    Credit { code: String, issuer: String },
}

impl Asset {
    pub fn is_native(&self) -> bool {
        matches!(self, Asset::Native)
    }
}

/// Offer price as a rational number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    pub n: i32,
    pub d: i32,
}

/// A signer entry added or removed by `SET_OPTIONS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerKey {
    pub key: String,
    pub weight: u8,
}

/// The typed body of a ledger operation. Amounts are stroops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OperationBody {
    CreateAccount {
        destination: String,
        starting_balance: i64,
    },
    Payment {
        destination: String,
        asset: Asset,
        amount: i64,
    },
    PathPaymentStrictSend {
        send_asset: Asset,
        send_amount: i64,
        destination: String,
        dest_asset: Asset,
        dest_min: i64,
    },
    PathPaymentStrictReceive {
        send_asset: Asset,
        send_max: i64,
        destination: String,
        dest_asset: Asset,
        dest_amount: i64,
    },
    ManageSellOffer {
        selling: Asset,
        buying: Asset,
        amount: i64,
        price: Price,
        offer_id: i64,
    },
    ManageBuyOffer {
        selling: Asset,
        buying: Asset,
        buy_amount: i64,
        price: Price,
        offer_id: i64,
    },
    SetOptions {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signer: Option<SignerKey>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        master_weight: Option<u8>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        low_threshold: Option<u8>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        medium_threshold: Option<u8>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        high_threshold: Option<u8>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        home_domain: Option<String>,
    },
    ChangeTrust {
        line: Asset,
        /// Trust limit in stroops; zero removes the trustline.
        limit: i64,
    },
    AccountMerge {
        destination: String,
    },
    Inflation,
    ManageData {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
    Clawback {
        asset: Asset,
        from: String,
        amount: i64,
    },
    CreateClaimableBalance {
        asset: Asset,
        amount: i64,
        claimants: Vec<String>,
    },
    BeginSponsoringFutureReserves {
        sponsored_id: String,
    },
    EndSponsoringFutureReserves,
}

/// One operation with its optional explicit source account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_account: Option<String>,
    pub body: OperationBody,
}

impl Operation {
    pub fn new(body: OperationBody) -> Self {
        Self {
            source_account: None,
            body,
        }
    }

    pub fn with_source(source: impl Into<String>, body: OperationBody) -> Self {
        Self {
            source_account: Some(source.into()),
            body,
        }
    }

    /// The effective source: the explicit source if set, else the
    /// transaction source.
    pub fn effective_source<'a>(&'a self, tx_source: &'a str) -> &'a str {
        match self.source_account.as_deref() {
            Some(src) if !src.is_empty() => src,
            _ => tx_source,
        }
    }
}

/// Validity window for a transaction, in unix seconds. Zero means open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBounds {
    pub min_time: u64,
    pub max_time: u64,
}

/// A V1 transaction body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub source_account: String,
    pub fee: u32,
    pub seq_num: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_bounds: Option<TimeBounds>,
    pub operations: Vec<Operation>,
}

impl Transaction {
    /// Network-scoped transaction hash.
    pub fn hash(&self, network_passphrase: &str) -> Result<[u8; 32], EnvelopeError> {
        let network_id = Sha256::digest(network_passphrase.as_bytes());
        let tx_bytes = serde_json::to_vec(self)?;

        let mut hasher = Sha256::new();
        hasher.update(network_id);
        hasher.update(ENVELOPE_TYPE_TX);
        hasher.update(&tx_bytes);
        Ok(hasher.finalize().into())
    }

    /// Hex-encoded network-scoped transaction hash.
    pub fn hash_hex(&self, network_passphrase: &str) -> Result<String, EnvelopeError> {
        Ok(hex::encode(self.hash(network_passphrase)?))
    }
}

/// An Ed25519 signature with its public-key hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoratedSignature {
    /// Hex-encoded last four bytes of the signing public key.
    pub hint: String,
    /// Base64-encoded 64-byte signature.
    pub signature: String,
}

impl DecoratedSignature {
    /// Sign a transaction hash with the given keypair.
    pub fn sign(keypair: &Keypair, hash: &[u8; 32]) -> Self {
        Self {
            hint: hex::encode(keypair.hint()),
            signature: BASE64_STANDARD.encode(keypair.sign(hash)),
        }
    }

    /// Whether this signature verifies for `address` over `hash`.
    pub fn verifies(&self, address: &str, hash: &[u8; 32]) -> bool {
        let Ok(bytes) = BASE64_STANDARD.decode(&self.signature) else {
            return false;
        };
        let Ok(raw) = <[u8; 64]>::try_from(bytes.as_slice()) else {
            return false;
        };
        super::keys::verify_signature(address, hash, &raw)
    }
}

/// A transaction envelope: the transaction plus collected signatures.
///
/// Fee-bump envelopes are represented so they can be decoded and rejected;
/// the gateway never signs or builds them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "envelope_type", rename_all = "snake_case")]
pub enum TransactionEnvelope {
    Tx {
        tx: Transaction,
        signatures: Vec<DecoratedSignature>,
    },
    FeeBump {
        fee_source: String,
        fee: i64,
        inner_tx: Box<TransactionEnvelope>,
        signatures: Vec<DecoratedSignature>,
    },
}

impl TransactionEnvelope {
    pub fn new(tx: Transaction) -> Self {
        TransactionEnvelope::Tx {
            tx,
            signatures: Vec::new(),
        }
    }

    /// Decode an envelope from its base64 transport form.
    pub fn from_base64(encoded: &str) -> Result<Self, EnvelopeError> {
        let bytes = BASE64_STANDARD.decode(encoded.trim())?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Encode the envelope into its base64 transport form.
    pub fn to_base64(&self) -> Result<String, EnvelopeError> {
        let bytes = serde_json::to_vec(self)?;
        Ok(BASE64_STANDARD.encode(bytes))
    }

    /// Split a V1 envelope into its transaction and signatures, rejecting
    /// fee-bump wrappers.
    pub fn into_v1(self) -> Result<(Transaction, Vec<DecoratedSignature>), EnvelopeError> {
        match self {
            TransactionEnvelope::Tx { tx, signatures } => Ok((tx, signatures)),
            TransactionEnvelope::FeeBump { .. } => Err(EnvelopeError::FeeBumpUnsupported),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tx() -> Transaction {
        Transaction {
            source_account: "GSOURCE".to_string(),
            fee: 100,
            seq_num: 42,
            time_bounds: Some(TimeBounds {
                min_time: 0,
                max_time: 1_700_000_300,
            }),
            operations: vec![Operation::new(OperationBody::ManageData {
                name: "k".to_string(),
                value: Some("v".to_string()),
            })],
        }
    }

    #[test]
    fn envelope_round_trips_through_base64() {
        let envelope = TransactionEnvelope::new(sample_tx());
        let encoded = envelope.to_base64().unwrap();
        let decoded = TransactionEnvelope::from_base64(&encoded).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn from_base64_rejects_garbage() {
        assert!(TransactionEnvelope::from_base64("not base64 at all!").is_err());
        let junk = BASE64_STANDARD.encode(b"{\"nope\":1}");
        assert!(TransactionEnvelope::from_base64(&junk).is_err());
    }

    #[test]
    fn fee_bump_envelopes_are_refused() {
        let fee_bump = TransactionEnvelope::FeeBump {
            fee_source: "GFEESOURCE".to_string(),
            fee: 200,
            inner_tx: Box::new(TransactionEnvelope::new(sample_tx())),
            signatures: Vec::new(),
        };
        assert!(matches!(
            fee_bump.into_v1(),
            Err(EnvelopeError::FeeBumpUnsupported)
        ));
    }

    #[test]
    fn hash_is_deterministic_and_network_scoped() {
        let tx = sample_tx();
        let a = tx.hash_hex("Test SDF Network ; September 2015").unwrap();
        let b = tx.hash_hex("Test SDF Network ; September 2015").unwrap();
        let c = tx
            .hash_hex("Public Global Stellar Network ; September 2015")
            .unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn hash_ignores_signatures_but_not_body() {
        let tx = sample_tx();
        let mut other = sample_tx();
        other.seq_num += 1;
        assert_ne!(tx.hash("net").unwrap(), other.hash("net").unwrap());
    }

    #[test]
    fn decorated_signature_signs_and_verifies() {
        let kp = Keypair::random();
        let tx = sample_tx();
        let hash = tx.hash("net").unwrap();

        let sig = DecoratedSignature::sign(&kp, &hash);
        assert!(sig.verifies(&kp.public_key(), &hash));
        assert!(!sig.verifies(&kp.public_key(), &tx.hash("other net").unwrap()));
        assert_eq!(sig.hint, hex::encode(kp.hint()));
    }

    #[test]
    fn effective_source_falls_back_to_tx_source() {
        let op = Operation::new(OperationBody::Inflation);
        assert_eq!(op.effective_source("GTX"), "GTX");

        let op = Operation::with_source("GOP", OperationBody::Inflation);
        assert_eq!(op.effective_source("GTX"), "GOP");
    }
}
