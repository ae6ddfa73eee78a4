// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sponsorship Gateway contributors

//! Transaction verification against an API key's sponsorship policy.
//!
//! The verifier is a single forward pass over the operation list with a
//! stack of open sponsoring blocks. It is pure: no I/O, no clocks, and a
//! deterministic outcome for a given envelope/key pair. The first failing
//! check short-circuits the pass.

use std::collections::HashSet;

use super::envelope::{OperationBody, TransactionEnvelope};
use super::operations::{
    is_native_transfer, operation_type_name, reserves_for_operation,
};
use crate::models::ApiKey;

/// A verified transaction and its reserve accounting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedTransaction {
    /// Canonical names of the payload operations, in order.
    pub operations: Vec<String>,
    /// Transaction source account.
    pub source_account: String,
    /// Number of base reserves the transaction will lock in the sponsor.
    pub reserves_locked: i32,
}

/// A typed rejection with a stable machine-readable code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub code: &'static str,
    pub message: String,
    /// Transaction source, when it was decodable.
    pub source_account: Option<String>,
}

/// Outcome of verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    Valid(VerifiedTransaction),
    Rejected(Rejection),
}

impl VerifyOutcome {
    fn reject(code: &'static str, message: impl Into<String>) -> Self {
        VerifyOutcome::Rejected(Rejection {
            code,
            message: message.into(),
            source_account: None,
        })
    }

    fn reject_with_source(
        code: &'static str,
        message: impl Into<String>,
        source: &str,
    ) -> Self {
        VerifyOutcome::Rejected(Rejection {
            code,
            message: message.into(),
            source_account: Some(source.to_string()),
        })
    }
}

/// Validates transactions against sponsorship service rules.
#[derive(Debug, Default, Clone, Copy)]
pub struct Verifier;

impl Verifier {
    pub fn new() -> Self {
        Verifier
    }

    /// Check a transaction envelope against the API key's rules.
    pub fn verify(&self, tx_xdr: &str, api_key: &ApiKey) -> VerifyOutcome {
        // 1. Decode the envelope
        let envelope = match TransactionEnvelope::from_base64(tx_xdr) {
            Ok(envelope) => envelope,
            Err(err) => {
                return VerifyOutcome::reject(
                    "invalid_transaction",
                    format!("Failed to decode transaction envelope: {err}"),
                )
            }
        };

        let (tx, _signatures) = match envelope.into_v1() {
            Ok(parts) => parts,
            Err(_) => {
                return VerifyOutcome::reject(
                    "invalid_transaction",
                    "Only V1 transaction envelopes are supported (not fee bump transactions)",
                )
            }
        };

        // 2. Source account check: the sponsor must never be the
        // transaction source
        let sponsor = api_key.sponsor_account();
        let tx_source = tx.source_account.clone();
        if tx_source == sponsor {
            return VerifyOutcome::reject_with_source(
                "sponsor_as_source",
                "Transaction source account matches the sponsor account — this is not allowed",
                &tx_source,
            );
        }

        if tx.operations.is_empty() {
            return VerifyOutcome::reject(
                "invalid_transaction",
                "Transaction must contain at least one operation",
            );
        }

        let allowed_ops: HashSet<&str> = api_key
            .allowed_operations
            .iter()
            .map(String::as_str)
            .collect();

        let allowed_sources: Option<HashSet<&str>> =
            if api_key.allowed_source_accounts.is_empty() {
                None
            } else {
                Some(
                    api_key
                        .allowed_source_accounts
                        .iter()
                        .map(String::as_str)
                        .collect(),
                )
            };

        // Open sponsoring blocks, by the SponsoredID they bind.
        let mut sponsored_stack: Vec<&str> = Vec::new();
        let mut op_names: Vec<String> = Vec::new();
        let mut reserves_locked = 0i32;

        // 3. Operation iteration
        for op in &tx.operations {
            let op_source = op.effective_source(&tx_source);

            // Sponsor account as source is only allowed for BEGIN_SPONSORING
            if op_source == sponsor
                && !matches!(op.body, OperationBody::BeginSponsoringFutureReserves { .. })
            {
                return VerifyOutcome::reject_with_source(
                    "sponsor_as_source",
                    "Operation uses the sponsor account as source — this is not allowed",
                    &tx_source,
                );
            }

            // Structural operations maintain the sponsoring-block stack
            if let OperationBody::BeginSponsoringFutureReserves { sponsored_id } = &op.body {
                if op_source != sponsor {
                    return VerifyOutcome::reject_with_source(
                        "invalid_sponsor",
                        format!(
                            "BEGIN_SPONSORING_FUTURE_RESERVES source must be the sponsor \
                             account ({sponsor}), got {op_source}"
                        ),
                        &tx_source,
                    );
                }
                if sponsored_id.is_empty() {
                    return VerifyOutcome::reject_with_source(
                        "invalid_transaction",
                        "BEGIN_SPONSORING_FUTURE_RESERVES missing SponsoredID",
                        &tx_source,
                    );
                }
                sponsored_stack.push(sponsored_id);
                continue;
            }

            if matches!(op.body, OperationBody::EndSponsoringFutureReserves) {
                if sponsored_stack.pop().is_none() {
                    return VerifyOutcome::reject_with_source(
                        "invalid_transaction",
                        "END_SPONSORING_FUTURE_RESERVES without matching BEGIN",
                        &tx_source,
                    );
                }
                continue;
            }

            // Payload operation from here on.

            // XLM transfer check runs BEFORE the allowed-operations check,
            // so a misconfigured allowlist still cannot leak native funds.
            if is_native_transfer(&op.body) {
                return VerifyOutcome::reject_with_source(
                    "xlm_transfer_detected",
                    "Transaction attempts to transfer native XLM — this is not allowed",
                    &tx_source,
                );
            }

            let op_name = match operation_type_name(&op.body) {
                Some(name) => name,
                None => {
                    return VerifyOutcome::reject_with_source(
                        "disallowed_operation",
                        "Unknown or unsupported operation type",
                        &tx_source,
                    )
                }
            };

            if !allowed_ops.contains(op_name) {
                return VerifyOutcome::reject_with_source(
                    "disallowed_operation",
                    format!("Operation {op_name} is not allowed for this API key"),
                    &tx_source,
                );
            }

            // Payload operations must sit inside an open sponsoring block
            let Some(active_sponsored_id) = sponsored_stack.last() else {
                return VerifyOutcome::reject_with_source(
                    "invalid_transaction",
                    format!(
                        "Operation {op_name} must be wrapped in \
                         BEGIN_SPONSORING_FUTURE_RESERVES / END_SPONSORING_FUTURE_RESERVES"
                    ),
                    &tx_source,
                );
            };

            if op_source != *active_sponsored_id {
                return VerifyOutcome::reject_with_source(
                    "invalid_transaction",
                    format!(
                        "Operation source {op_source} does not match SponsoredID \
                         {active_sponsored_id} in active BEGIN_SPONSORING_FUTURE_RESERVES block"
                    ),
                    &tx_source,
                );
            }

            if let Some(sources) = &allowed_sources {
                if !sources.contains(op_source) {
                    return VerifyOutcome::reject_with_source(
                        "disallowed_operation",
                        format!("Operation source account {op_source} is not in the allowed list"),
                        &tx_source,
                    );
                }
            }

            op_names.push(op_name.to_string());
            reserves_locked += reserves_for_operation(&op.body);
        }

        // 4. Every sponsoring block must be closed
        if !sponsored_stack.is_empty() {
            return VerifyOutcome::reject_with_source(
                "invalid_transaction",
                "Unmatched BEGIN_SPONSORING_FUTURE_RESERVES — missing END",
                &tx_source,
            );
        }

        if let Some(sources) = &allowed_sources {
            if !sources.contains(tx_source.as_str()) {
                return VerifyOutcome::reject_with_source(
                    "disallowed_operation",
                    format!(
                        "Transaction source account {tx_source} is not in the allowed list"
                    ),
                    &tx_source,
                );
            }
        }

        VerifyOutcome::Valid(VerifiedTransaction {
            operations: op_names,
            source_account: tx_source,
            reserves_locked,
        })
    }
}
