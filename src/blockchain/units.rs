//! Decimal token amounts and their base-unit integer form.
//!
//! Amounts are parsed exactly from their decimal text. Nothing here goes
//! through floating point, so `"1.5"` is always `1.5 * 10^18`.

use alloy::primitives::U256;
use serde_json::Value;
use thiserror::Error;

/// Number of fractional digits of the native currency and the store token.
pub const DEFAULT_DECIMALS: u8 = 18;

/// Largest exponent for which `10^decimals` fits in a `U256`.
pub const MAX_DECIMALS: u8 = 77;

/// Reasons a decimal amount cannot be turned into base units.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,
    #[error("'{0}' is not a decimal number")]
    Malformed(String),
    #[error("amount must be greater than zero")]
    NotPositive,
    #[error("amount has more than {0} fractional digits")]
    TooPrecise(u8),
    #[error("amount is too large")]
    Overflow,
}

fn pow10(exp: u8) -> U256 {
    U256::from(10u64).pow(U256::from(exp))
}

/// Convert a positive decimal string into base units (`amount * 10^decimals`).
///
/// Accepts `"1"`, `"1.5"`, `".5"` and `"5."`. Rejects signs, exponents and
/// any digit beyond `decimals` that is not a trailing zero.
pub fn parse_token_amount(input: &str, decimals: u8) -> Result<U256, AmountError> {
    let text = input.trim();
    if text.is_empty() {
        return Err(AmountError::Empty);
    }

    let (whole, fraction) = match text.split_once('.') {
        Some((w, f)) => (w, f),
        None => (text, ""),
    };
    let digits_only = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty()) || !digits_only(whole) || !digits_only(fraction) {
        return Err(AmountError::Malformed(text.to_string()));
    }

    let fraction = fraction.trim_end_matches('0');
    if fraction.len() > decimals as usize {
        return Err(AmountError::TooPrecise(decimals));
    }

    let whole_units = if whole.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(whole, 10).map_err(|_| AmountError::Overflow)?
    };
    let fraction_units = if fraction.is_empty() {
        U256::ZERO
    } else {
        let padded = format!("{:0<width$}", fraction, width = decimals as usize);
        U256::from_str_radix(&padded, 10).map_err(|_| AmountError::Overflow)?
    };

    let total = whole_units
        .checked_mul(pow10(decimals))
        .and_then(|v| v.checked_add(fraction_units))
        .ok_or(AmountError::Overflow)?;

    if total.is_zero() {
        return Err(AmountError::NotPositive);
    }
    Ok(total)
}

/// Render base units as the shortest exact decimal (`1500000000000000000` -> `"1.5"`).
pub fn format_base_units(value: U256, decimals: u8) -> String {
    let unit = pow10(decimals);
    let whole = value / unit;
    let fraction = value % unit;
    if fraction.is_zero() {
        return whole.to_string();
    }
    let fraction = format!("{:0>width$}", fraction.to_string(), width = decimals as usize);
    format!("{}.{}", whole, fraction.trim_end_matches('0'))
}

/// Render base units with a fixed number of decimal places, rounding half up.
pub fn format_fixed(value: U256, decimals: u8, places: u8) -> String {
    let places = places.min(decimals);
    let step = pow10(decimals - places);
    let half = step / U256::from(2u64);
    let rounded = value.saturating_add(half) / step;

    if places == 0 {
        return rounded.to_string();
    }
    let scale = pow10(places);
    format!(
        "{}.{:0>width$}",
        rounded / scale,
        (rounded % scale).to_string(),
        width = places as usize
    )
}

/// Parse a JSON-RPC quantity (`"0x..."` hex string).
pub fn parse_quantity(value: &Value) -> Option<U256> {
    let s = value.as_str()?;
    let hex = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))?;
    if hex.is_empty() {
        return None;
    }
    U256::from_str_radix(hex, 16).ok()
}

/// [`parse_quantity`] narrowed to `u64`, for block numbers and status flags.
pub fn parse_u64_quantity(value: &Value) -> Option<u64> {
    parse_quantity(value).and_then(|q| u64::try_from(q).ok())
}
