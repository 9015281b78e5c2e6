/// Currency utility functions for wallet amounts.
///
/// All monetary values are fixed-point decimals with two fractional digits
/// (the currency's minor unit). Floats never touch a balance.
use std::str::FromStr;

use bigdecimal::{BigDecimal, RoundingMode};
use num_traits::{Signed, Zero};
use serde_json::Value;

/// Number of fractional digits in the currency's minor unit.
pub const MINOR_UNIT_SCALE: i64 = 2;

/// Largest difference still treated as equal when reconciling balances.
pub fn reconciliation_tolerance() -> BigDecimal {
    BigDecimal::new(1.into(), MINOR_UNIT_SCALE)
}

/// Rounds half-up to the minor unit.
pub fn round_to_minor_unit(amount: &BigDecimal) -> BigDecimal {
    amount.with_scale_round(MINOR_UNIT_SCALE, RoundingMode::HalfUp)
}

/// Reads an amount that the gateway may send either as a JSON number or as a
/// numeric string. Numbers are parsed from their shortest textual form so that
/// `1000.555` stays exactly `1000.555`.
pub fn parse_amount(value: &Value) -> Option<BigDecimal> {
    match value {
        Value::Number(number) => BigDecimal::from_str(&number.to_string()).ok(),
        Value::String(text) => BigDecimal::from_str(text.trim().replace(',', "").as_str()).ok(),
        _ => None,
    }
}

/// Amount actually credited to a wallet: gross minus fee, rounded to the minor unit.
/// Returns `None` when the result is zero or negative.
pub fn net_amount(amount: &BigDecimal, fee: &BigDecimal) -> Option<BigDecimal> {
    let net = round_to_minor_unit(&(amount - fee));
    if net.is_positive() {
        Some(net)
    } else {
        None
    }
}

/// Whether two balances agree within the reconciliation tolerance.
pub fn within_tolerance(left: &BigDecimal, right: &BigDecimal) -> bool {
    (left - right).abs() <= reconciliation_tolerance()
}

/// Clamps negative values to zero.
pub fn floor_at_zero(amount: BigDecimal) -> BigDecimal {
    if amount.is_negative() {
        BigDecimal::zero()
    } else {
        amount
    }
}
