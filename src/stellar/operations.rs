// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sponsorship Gateway contributors

//! Operation catalog: canonical names, reserve costs, and the native-egress
//! classification used by the verifier.

use super::envelope::OperationBody;

/// Canonical name for an operation type. Only sponsorable operations and
/// the two structural sponsoring operations are named; everything else is
/// unknown to the catalog.
pub fn operation_type_name(body: &OperationBody) -> Option<&'static str> {
    match body {
        OperationBody::CreateAccount { .. } => Some("CREATE_ACCOUNT"),
        OperationBody::ChangeTrust { .. } => Some("CHANGE_TRUST"),
        OperationBody::ManageSellOffer { .. } => Some("MANAGE_SELL_OFFER"),
        OperationBody::ManageBuyOffer { .. } => Some("MANAGE_BUY_OFFER"),
        OperationBody::SetOptions { .. } => Some("SET_OPTIONS"),
        OperationBody::ManageData { .. } => Some("MANAGE_DATA"),
        OperationBody::CreateClaimableBalance { .. } => Some("CREATE_CLAIMABLE_BALANCE"),
        OperationBody::BeginSponsoringFutureReserves { .. } => {
            Some("BEGIN_SPONSORING_FUTURE_RESERVES")
        }
        OperationBody::EndSponsoringFutureReserves => Some("END_SPONSORING_FUTURE_RESERVES"),
        _ => None,
    }
}

/// Whether an operation attempts to transfer native XLM. These are
/// unconditionally rejected, before any allowlist is consulted.
pub fn is_native_transfer(body: &OperationBody) -> bool {
    match body {
        OperationBody::Payment { asset, .. } => asset.is_native(),
        OperationBody::PathPaymentStrictSend {
            send_asset,
            dest_asset,
            ..
        } => send_asset.is_native() || dest_asset.is_native(),
        OperationBody::PathPaymentStrictReceive {
            send_asset,
            dest_asset,
            ..
        } => send_asset.is_native() || dest_asset.is_native(),
        OperationBody::AccountMerge { .. } => true,
        OperationBody::Inflation => true,
        OperationBody::Clawback { asset, .. } => asset.is_native(),
        _ => false,
    }
}

/// How many base reserves a sponsored operation will lock in the sponsor
/// account. Zero for operations that do not create new ledger entries
/// (updates and deletions).
pub fn reserves_for_operation(body: &OperationBody) -> i32 {
    match body {
        // New account requires 2 base reserves
        OperationBody::CreateAccount { .. } => 2,
        // Adding a trustline locks 1 reserve; removing (limit 0) frees it
        OperationBody::ChangeTrust { limit, .. } => {
            if *limit == 0 {
                0
            } else {
                1
            }
        }
        // New offer (offer id 0) locks 1 reserve; update/delete does not
        OperationBody::ManageSellOffer { offer_id, .. }
        | OperationBody::ManageBuyOffer { offer_id, .. } => {
            if *offer_id == 0 {
                1
            } else {
                0
            }
        }
        // Adding a signer locks 1 reserve
        OperationBody::SetOptions { signer, .. } => {
            if signer.is_some() {
                1
            } else {
                0
            }
        }
        // Setting a value creates a data entry; absent value deletes it
        OperationBody::ManageData { value, .. } => {
            if value.is_some() {
                1
            } else {
                0
            }
        }
        OperationBody::CreateClaimableBalance { .. } => 1,
        _ => 0,
    }
}

/// The sponsorable operation names exposed to admins for allowlist
/// building (the catalog minus the structural sponsoring operations).
pub fn supported_operations() -> &'static [&'static str] {
    &[
        "CREATE_ACCOUNT",
        "CHANGE_TRUST",
        "MANAGE_SELL_OFFER",
        "MANAGE_BUY_OFFER",
        "SET_OPTIONS",
        "MANAGE_DATA",
        "CREATE_CLAIMABLE_BALANCE",
    ]
}
