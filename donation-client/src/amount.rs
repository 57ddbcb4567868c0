//! Token amount formatting
//!
//! Amounts are fixed-point integers in the token's smallest unit. All
//! conversions here use integer division and remainder by `10^decimals`; no
//! value ever passes through a float.

use thiserror::Error;

/// Decimal places of the donation token (ckUSDT)
pub const DEFAULT_DECIMALS: u8 = 6;

/// Largest decimal count whose scale fits in a u64 (10^19)
pub const MAX_DECIMALS: u8 = 19;

/// Basis points in 100%
const FULL_PROGRESS_BPS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,
    #[error("invalid amount '{0}': only digits and a single '.' are allowed")]
    InvalidFormat(String),
    #[error("amount '{0}' does not fit in a 64-bit token balance")]
    Overflow(String),
    #[error("{0} decimal places is more than the supported {max}", max = MAX_DECIMALS)]
    UnsupportedDecimals(u8),
}

fn scale(decimals: u8) -> Result<u64, AmountError> {
    if decimals > MAX_DECIMALS {
        return Err(AmountError::UnsupportedDecimals(decimals));
    }
    Ok(10u64.pow(decimals as u32))
}

/// Format an amount in base units as a decimal string.
///
/// Trailing fractional zeros are trimmed, so `2_500_000` with 6 decimals is
/// `"2.5"` and `1_000_000` is `"1"`.
pub fn format_amount(amount: u64, decimals: u8) -> Result<String, AmountError> {
    let divisor = scale(decimals)?;
    let major = amount / divisor;
    let minor = amount % divisor;

    if minor == 0 {
        return Ok(major.to_string());
    }

    let minor = format!("{:0width$}", minor, width = decimals as usize);
    Ok(format!("{}.{}", major, minor.trim_end_matches('0')))
}

/// Format an amount followed by the token symbol, e.g. `"2.5 ckUSDT"`
pub fn format_tokens(amount: u64, decimals: u8, symbol: &str) -> Result<String, AmountError> {
    Ok(format!("{} {}", format_amount(amount, decimals)?, symbol))
}

/// Parse a decimal string into base units.
///
/// Fractional digits beyond `decimals` are truncated. A trailing token symbol
/// is not accepted; strip it before calling.
pub fn parse_amount(text: &str, decimals: u8) -> Result<u64, AmountError> {
    let divisor = scale(decimals)?;
    let text = text.trim();
    if text.is_empty() {
        return Err(AmountError::Empty);
    }

    let (major, minor) = match text.split_once('.') {
        Some((major, minor)) => (major, minor),
        None => (text, ""),
    };

    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (major.is_empty() && minor.is_empty()) || !all_digits(major) || !all_digits(minor) {
        return Err(AmountError::InvalidFormat(text.to_string()));
    }

    let overflow = || AmountError::Overflow(text.to_string());

    let major_units = if major.is_empty() {
        0
    } else {
        major.parse::<u64>().map_err(|_| overflow())?
    };

    let kept = &minor[..minor.len().min(decimals as usize)];
    let mut minor_units = if kept.is_empty() {
        0
    } else {
        kept.parse::<u64>().map_err(|_| overflow())?
    };
    for _ in kept.len()..decimals as usize {
        minor_units *= 10;
    }

    major_units
        .checked_mul(divisor)
        .and_then(|v| v.checked_add(minor_units))
        .ok_or_else(overflow)
}

/// Progress toward a target in basis points (10000 = 100%).
///
/// Uncapped: an over-funded campaign reports more than 10000. A zero target
/// reports zero.
pub fn progress_bps(current: u64, target: u64) -> u64 {
    if target == 0 {
        return 0;
    }
    let bps = current as u128 * FULL_PROGRESS_BPS as u128 / target as u128;
    bps.min(u64::MAX as u128) as u64
}

/// Progress rendered with two decimals, e.g. `"50.00%"`
pub fn format_progress(current: u64, target: u64) -> String {
    let bps = progress_bps(current, target);
    format!("{}.{:02}%", bps / 100, bps % 100)
}

/// Compare two campaigns' progress without dividing.
///
/// Zero targets sort as zero progress.
pub fn compare_progress(a: (u64, u64), b: (u64, u64)) -> std::cmp::Ordering {
    let (a_current, a_target) = a;
    let (b_current, b_target) = b;
    match (a_target == 0, b_target == 0) {
        (true, true) => std::cmp::Ordering::Equal,
        (true, false) => 0u128.cmp(&(b_current as u128)),
        (false, true) => (a_current as u128).cmp(&0),
        (false, false) => {
            (a_current as u128 * b_target as u128).cmp(&(b_current as u128 * a_target as u128))
        }
    }
}
