//! Decimal amounts in a token's smallest unit. Everything stays in `U256`;
//! display strings are produced with integer rounding, never floats.

use crate::error::WalletError;
use alloy_primitives::{Address, U256};

pub const ETHER_DECIMALS: u8 = 18;

/// 10^78 no longer fits in 256 bits.
pub const MAX_DECIMALS: u8 = 77;

fn pow10(exp: u8) -> Option<U256> {
    U256::from(10u64).checked_pow(U256::from(exp))
}

/// Parses a user-typed decimal string into base units. Zero is allowed here;
/// use [`parse_amount`] for values that must be positive.
pub fn parse_units(input: &str, decimals: u8) -> Result<U256, WalletError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(WalletError::InvalidAmount("amount is empty".into()));
    }
    let unit = pow10(decimals).ok_or_else(|| {
        WalletError::InvalidAmount(format!("{decimals} decimals exceed 256-bit precision"))
    })?;
    if s.starts_with('-') {
        return Err(WalletError::InvalidAmount(format!("negative amount: {s}")));
    }
    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(WalletError::InvalidAmount(format!("not a number: {s}")));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(WalletError::InvalidAmount(format!("not a number: {s}")));
    }
    let frac = frac.trim_end_matches('0');
    if frac.len() > decimals as usize {
        return Err(WalletError::InvalidAmount(format!(
            "{s} has more than {decimals} decimal places"
        )));
    }

    let overflow = || WalletError::InvalidAmount(format!("amount too large: {s}"));
    let whole_units = if whole.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(whole, 10).map_err(|_| overflow())?
    };
    let mut value = whole_units.checked_mul(unit).ok_or_else(overflow)?;
    if !frac.is_empty() {
        let frac_units = U256::from_str_radix(frac, 10).map_err(|_| overflow())?;
        let scale = pow10(decimals - frac.len() as u8).ok_or_else(overflow)?;
        value = value.checked_add(frac_units.checked_mul(scale).ok_or_else(overflow)?).ok_or_else(overflow)?;
    }
    Ok(value)
}

/// Like [`parse_units`] but rejects zero.
pub fn parse_amount(input: &str, decimals: u8) -> Result<U256, WalletError> {
    let v = parse_units(input, decimals)?;
    if v.is_zero() {
        return Err(WalletError::InvalidAmount("amount must be greater than zero".into()));
    }
    Ok(v)
}

/// Cheap syntactic check usable before `decimals` is known.
pub fn precheck_amount(input: &str) -> Result<(), WalletError> {
    let s = input.trim();
    let frac_len = s.split_once('.').map(|(_, f)| f.trim_end_matches('0').len()).unwrap_or(0);
    if frac_len > MAX_DECIMALS as usize {
        return Err(WalletError::InvalidAmount(format!("too many decimal places: {s}")));
    }
    parse_amount(s, frac_len as u8).map(|_| ())
}

/// Full-precision rendering with trailing fractional zeros removed.
pub fn format_units(value: U256, decimals: u8) -> String {
    // Past 77 decimals every representable value is below one whole unit.
    let Some(unit) = pow10(decimals) else {
        if value.is_zero() {
            return "0".to_string();
        }
        let frac = format!("{:0>width$}", value.to_string(), width = decimals as usize);
        return format!("0.{}", frac.trim_end_matches('0'));
    };
    let whole = value / unit;
    let frac = value % unit;
    if frac.is_zero() {
        return whole.to_string();
    }
    let frac = format!("{:0>width$}", frac.to_string(), width = decimals as usize);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}

/// Rounds `value / 10^decimals` to `places` fractional digits (half up) and renders it.
pub fn format_fixed(value: U256, decimals: u8, places: u8) -> String {
    let scaled = if places >= decimals {
        pow10(places - decimals).map_or(U256::MAX, |m| value.saturating_mul(m))
    } else {
        match pow10(decimals - places) {
            Some(div) => {
                let q = value / div;
                if (value % div).saturating_mul(U256::from(2u64)) >= div { q + U256::from(1u64) } else { q }
            }
            None => U256::ZERO,
        }
    };
    if places == 0 {
        return scaled.to_string();
    }
    let Some(unit) = pow10(places) else {
        return scaled.to_string();
    };
    let frac = format!("{:0>width$}", (scaled % unit).to_string(), width = places as usize);
    format!("{}.{}", scaled / unit, frac)
}

/// Widget stat display: `1.23M`, `4.56K`, `12.00`.
pub fn format_compact(value: U256, decimals: u8) -> String {
    let scaled_by = |n: u64| pow10(decimals).and_then(|unit| unit.checked_mul(U256::from(n)));
    if scaled_by(1_000_000).is_some_and(|million| value >= million) {
        format!("{}M", format_fixed(value, decimals.saturating_add(6), 2))
    } else if scaled_by(1_000).is_some_and(|thousand| value >= thousand) {
        format!("{}K", format_fixed(value, decimals.saturating_add(3), 2))
    } else {
        format_fixed(value, decimals, 2)
    }
}

/// Pending rewards are shown in ETH with six places.
pub fn format_ether(value: U256) -> String {
    format_fixed(value, ETHER_DECIMALS, 6)
}

/// `0x1234...abcd`
pub fn short_address(a: &Address) -> String {
    let full = format!("0x{}", hex::encode(a.as_slice()));
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}
