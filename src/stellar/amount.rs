// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sponsorship Gateway contributors

//! Lumen amount formatting and parsing.
//!
//! Stellar amounts are fixed-point values with seven decimal places. The
//! integer unit is the stroop: 1 XLM = 10,000,000 stroops. Amounts cross
//! the API boundary as decimal strings like `"10.5000000"` and are handled
//! internally as `i64` stroops.

use thiserror::Error;

/// Stroops per whole lumen.
pub const STROOPS_PER_LUMEN: i64 = 10_000_000;

/// Number of decimal places in the display format.
const DECIMAL_PLACES: usize = 7;

#[derive(Debug, Error, PartialEq)]
pub enum AmountError {
    #[error("invalid amount {0:?}")]
    Invalid(String),

    #[error("amount {0:?} has more than 7 decimal places")]
    TooPrecise(String),

    #[error("amount {0:?} is out of range")]
    OutOfRange(String),
}

/// Format stroops as a decimal string with exactly seven decimal places.
///
/// `5_000_000` becomes `"0.5000000"`, `-15_000_000` becomes `"-1.5000000"`.
pub fn format_stroops(stroops: i64) -> String {
    let sign = if stroops < 0 { "-" } else { "" };
    let magnitude = stroops.unsigned_abs();
    let whole = magnitude / STROOPS_PER_LUMEN as u64;
    let frac = magnitude % STROOPS_PER_LUMEN as u64;
    format!("{sign}{whole}.{frac:07}")
}

/// Parse a decimal lumen string into stroops.
///
/// Accepts up to seven decimal places; anything finer is rejected rather
/// than silently truncated.
pub fn parse_stroops(s: &str) -> Result<i64, AmountError> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(AmountError::Invalid(s.to_string()));
    }

    let (sign, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1i64, rest),
        None => (1i64, trimmed),
    };

    let (whole_part, frac_part) = match digits.split_once('.') {
        Some((w, f)) => (w, f),
        None => (digits, ""),
    };

    if whole_part.is_empty() && frac_part.is_empty() {
        return Err(AmountError::Invalid(s.to_string()));
    }
    if !whole_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return Err(AmountError::Invalid(s.to_string()));
    }
    if frac_part.len() > DECIMAL_PLACES {
        return Err(AmountError::TooPrecise(s.to_string()));
    }

    let whole: i64 = if whole_part.is_empty() {
        0
    } else {
        whole_part
            .parse()
            .map_err(|_| AmountError::OutOfRange(s.to_string()))?
    };

    let mut frac: i64 = 0;
    if !frac_part.is_empty() {
        frac = frac_part
            .parse()
            .map_err(|_| AmountError::Invalid(s.to_string()))?;
        for _ in frac_part.len()..DECIMAL_PLACES {
            frac *= 10;
        }
    }

    whole
        .checked_mul(STROOPS_PER_LUMEN)
        .and_then(|w| w.checked_add(frac))
        .and_then(|v| v.checked_mul(sign))
        .ok_or_else(|| AmountError::OutOfRange(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_whole_and_fractional_amounts() {
        assert_eq!(format_stroops(10_000_000), "1.0000000");
        assert_eq!(format_stroops(5_000_000), "0.5000000");
        assert_eq!(format_stroops(0), "0.0000000");
        assert_eq!(format_stroops(1), "0.0000001");
        assert_eq!(format_stroops(1_234_567_890), "123.4567890");
        assert_eq!(format_stroops(-15_000_000), "-1.5000000");
    }

    #[test]
    fn parses_display_strings() {
        assert_eq!(parse_stroops("1"), Ok(10_000_000));
        assert_eq!(parse_stroops("0.5"), Ok(5_000_000));
        assert_eq!(parse_stroops("10.0000000"), Ok(100_000_000));
        assert_eq!(parse_stroops("123.4567890"), Ok(1_234_567_890));
        assert_eq!(parse_stroops(".5"), Ok(5_000_000));
        assert_eq!(parse_stroops("-1.5"), Ok(-15_000_000));
    }

    #[test]
    fn round_trips_through_format() {
        for stroops in [0, 1, 42, 5_000_000, 9_999_999_999, -7] {
            assert_eq!(parse_stroops(&format_stroops(stroops)), Ok(stroops));
        }
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(parse_stroops("").is_err());
        assert!(parse_stroops("abc").is_err());
        assert!(parse_stroops("1.2.3").is_err());
        assert!(parse_stroops("1,5").is_err());
        assert!(parse_stroops(".").is_err());
    }

    #[test]
    fn rejects_excess_precision() {
        assert_eq!(
            parse_stroops("1.00000001"),
            Err(AmountError::TooPrecise("1.00000001".to_string()))
        );
    }

    #[test]
    fn rejects_overflow() {
        assert!(parse_stroops("99999999999999999999").is_err());
    }
}
