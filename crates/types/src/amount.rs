//! Decimal amount parsing.
//!
//! Amounts are stored as integers in the smallest currency unit. User-facing
//! surfaces accept decimal strings such as `"0.5"`.

use thiserror::Error;

use crate::Amount;

/// Decimal places of a lamport-denominated currency
pub const LAMPORT_DECIMALS: u32 = 9;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("Amount is empty")]
    Empty,

    #[error("Invalid amount: {0}")]
    Invalid(String),

    #[error("Amount has more than {0} decimal places")]
    TooPrecise(u32),

    #[error("Amount overflows")]
    Overflow,
}

/// Parse a decimal string into smallest units with `decimals` places.
pub fn parse_amount(input: &str, decimals: u32) -> Result<Amount, AmountError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(AmountError::Empty);
    }

    let (whole, frac) = input.split_once('.').unwrap_or((input, ""));
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (whole.is_empty() && frac.is_empty()) || !all_digits(whole) || !all_digits(frac) {
        return Err(AmountError::Invalid(input.to_string()));
    }
    if frac.len() > decimals as usize {
        return Err(AmountError::TooPrecise(decimals));
    }

    let scale = 10u64.checked_pow(decimals).ok_or(AmountError::Overflow)?;
    let whole: u64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| AmountError::Overflow)?
    };
    let frac: u64 = if frac.is_empty() {
        0
    } else {
        format!("{:0<width$}", frac, width = decimals as usize)
            .parse()
            .map_err(|_| AmountError::Invalid(input.to_string()))?
    };

    whole
        .checked_mul(scale)
        .and_then(|units| units.checked_add(frac))
        .ok_or(AmountError::Overflow)
}

/// Format smallest units as a decimal string, trimming trailing zeros.
pub fn format_amount(amount: Amount, decimals: u32) -> String {
    let Some(scale) = 10u64.checked_pow(decimals) else {
        return amount.to_string();
    };
    let whole = amount / scale;
    let frac = amount % scale;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{:0>width$}", frac, width = decimals as usize);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("0.5", LAMPORT_DECIMALS), Ok(500_000_000));
        assert_eq!(parse_amount("10", LAMPORT_DECIMALS), Ok(10_000_000_000));
        assert_eq!(parse_amount(".25", 2), Ok(25));
        assert_eq!(parse_amount("3.", 2), Ok(300));
    }

    #[test]
    fn test_parse_amount_rejects_garbage() {
        assert_eq!(parse_amount("", 9), Err(AmountError::Empty));
        assert!(matches!(parse_amount(".", 9), Err(AmountError::Invalid(_))));
        assert!(matches!(parse_amount("-1", 9), Err(AmountError::Invalid(_))));
        assert!(matches!(parse_amount("1.2.3", 9), Err(AmountError::Invalid(_))));
        assert_eq!(parse_amount("0.001", 2), Err(AmountError::TooPrecise(2)));
        assert_eq!(
            parse_amount("99999999999999999999", 9),
            Err(AmountError::Overflow)
        );
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(500_000_000, LAMPORT_DECIMALS), "0.5");
        assert_eq!(format_amount(10_000_000_000, LAMPORT_DECIMALS), "10");
        assert_eq!(format_amount(1, LAMPORT_DECIMALS), "0.000000001");
    }
}
