// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sponsorship Gateway contributors

//! Page / per-page query parameters for admin listings.

use serde::Deserialize;
use utoipa::IntoParams;

use crate::error::Error;

const DEFAULT_PER_PAGE: i64 = 20;
const MAX_PER_PAGE: i64 = 100;

/// Standard pagination query parameters.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct Pagination {
    /// Page number, 1-based. Values below 1 are coerced to 1.
    pub page: Option<i64>,
    /// Rows per page, 1..=100. Defaults to 20.
    pub per_page: Option<i64>,
}

impl Pagination {
    /// Resolve to a validated `(page, per_page)` pair.
    pub fn resolve(&self) -> Result<(i64, i64), Error> {
        let page = self.page.unwrap_or(1).max(1);

        let per_page = match self.per_page {
            None => DEFAULT_PER_PAGE,
            Some(per_page) if (1..=MAX_PER_PAGE).contains(&per_page) => per_page,
            Some(_) => {
                return Err(Error::bad_request(
                    "invalid_request",
                    "per_page must be between 1 and 100",
                ))
            }
        };

        Ok((page, per_page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pagination(page: Option<i64>, per_page: Option<i64>) -> Pagination {
        Pagination { page, per_page }
    }

    #[test]
    fn defaults_apply() {
        assert_eq!(pagination(None, None).resolve().unwrap(), (1, 20));
    }

    #[test]
    fn page_below_one_is_coerced() {
        assert_eq!(pagination(Some(0), None).resolve().unwrap(), (1, 20));
        assert_eq!(pagination(Some(-3), Some(50)).resolve().unwrap(), (1, 50));
    }

    #[test]
    fn per_page_out_of_range_is_rejected() {
        assert!(pagination(None, Some(0)).resolve().is_err());
        assert!(pagination(None, Some(101)).resolve().is_err());
        assert_eq!(pagination(Some(3), Some(100)).resolve().unwrap(), (3, 100));
    }
}
