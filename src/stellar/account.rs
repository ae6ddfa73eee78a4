// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sponsorship Gateway contributors

//! Account balance reads and reserve accounting.

use std::sync::Arc;

use super::amount::{format_stroops, parse_stroops};
use super::horizon::{Horizon, HorizonError};
use super::BASE_RESERVE_STROOPS;

/// Queries Stellar account data via Horizon.
#[derive(Clone)]
pub struct AccountService {
    horizon: Arc<dyn Horizon>,
}

impl AccountService {
    pub fn new(horizon: Arc<dyn Horizon>) -> Self {
        Self { horizon }
    }

    /// The native balance of an account split into `(available, locked)`,
    /// both as display-format strings.
    ///
    /// The locked portion is the minimum balance:
    /// `(2 + subentry_count + num_sponsoring - num_sponsored) * base_reserve`.
    pub async fn get_balance(&self, account_id: &str) -> Result<(String, String), HorizonError> {
        let account = self.horizon.account_detail(account_id).await?;

        let mut balance_stroops = 0i64;
        for balance in &account.balances {
            if balance.asset_type == "native" {
                balance_stroops = parse_stroops(&balance.balance).map_err(|e| {
                    HorizonError::Transport(format!("parse native balance: {e}"))
                })?;
                break;
            }
        }

        let min_balance = (2 + i64::from(account.subentry_count)
            + i64::from(account.num_sponsoring)
            - i64::from(account.num_sponsored))
            * BASE_RESERVE_STROOPS;

        let available = (balance_stroops - min_balance).max(0);

        Ok((format_stroops(available), format_stroops(min_balance)))
    }

    /// The unadjusted native balance string, for display.
    pub async fn get_raw_balance(&self, account_id: &str) -> Result<String, HorizonError> {
        let account = self.horizon.account_detail(account_id).await?;

        for balance in account.balances {
            if balance.asset_type == "native" {
                return Ok(balance.balance);
            }
        }
        Ok("0.0000000".to_string())
    }
}
