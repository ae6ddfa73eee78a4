// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sponsorship Gateway contributors

//! Service co-signing of verified transaction envelopes.

use thiserror::Error;

use super::envelope::{DecoratedSignature, EnvelopeError, TransactionEnvelope};
use super::keys::{KeyError, Keypair};

#[derive(Debug, Error)]
pub enum SignError {
    #[error("invalid signing key: {0}")]
    InvalidKey(#[from] KeyError),

    #[error("{0}")]
    Envelope(#[from] EnvelopeError),
}

/// Holds the service signing key and signs verified transactions.
pub struct Signer {
    signing_key: Keypair,
    network_passphrase: String,
}

impl Signer {
    /// Create a signer from a Stellar secret seed (`S...`).
    pub fn new(secret_seed: &str, network_passphrase: impl Into<String>) -> Result<Self, SignError> {
        Ok(Self {
            signing_key: Keypair::from_secret_seed(secret_seed)?,
            network_passphrase: network_passphrase.into(),
        })
    }

    /// The public address (`G...`) of the signing key.
    pub fn public_key(&self) -> String {
        self.signing_key.public_key()
    }

    pub(crate) fn keypair(&self) -> &Keypair {
        &self.signing_key
    }

    /// Attach the service signature to an envelope.
    ///
    /// Returns `(signed_xdr, transaction_hash_hex)`. Fee-bump envelopes
    /// are rejected.
    pub fn sign(&self, tx_xdr: &str) -> Result<(String, String), SignError> {
        let envelope = TransactionEnvelope::from_base64(tx_xdr)?;
        let (tx, mut signatures) = envelope.into_v1()?;

        let hash = tx.hash(&self.network_passphrase)?;
        signatures.push(DecoratedSignature::sign(&self.signing_key, &hash));

        let hash_hex = hex::encode(hash);
        let signed = TransactionEnvelope::Tx { tx, signatures };
        Ok((signed.to_base64()?, hash_hex))
    }
}
