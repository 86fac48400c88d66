//! Prices and lenient decimal parsing of wire values.
//!
//! The remote API is loose about numbers: prices show up as JSON numbers,
//! numeric strings, or not at all. [`lenient_decimal`] and [`lenient_count`]
//! centralize how such values are read.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (reais, not centavos).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// A price in the store's default currency.
    #[must_use]
    pub fn store(amount: Decimal) -> Self {
        Self::new(amount, CurrencyCode::default())
    }

    /// Format for display with two decimal places (e.g. `R$ 25.00`).
    #[must_use]
    pub fn display(&self) -> String {
        format!(
            "{} {:.2}",
            self.currency_code.symbol(),
            self.amount.round_dp(2)
        )
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display())
    }
}

/// ISO 4217 currency codes the storefront can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    BRL,
    USD,
    EUR,
}

impl CurrencyCode {
    /// Display symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::BRL => "R$",
            Self::USD => "$",
            Self::EUR => "€",
        }
    }
}

/// Read a decimal out of a loosely typed JSON value.
///
/// Numbers and numeric strings parse; everything else (including `null`,
/// blank strings and garbage) is `None`.
#[must_use]
pub fn lenient_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => parse_decimal(&n.to_string()),
        Value::String(s) => parse_decimal(s.trim()),
        _ => None,
    }
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    if s.is_empty() {
        return None;
    }
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

/// Read a non-negative whole count out of a loosely typed JSON value.
///
/// Fractional values are truncated; negative or non-numeric values are
/// `None`.
#[must_use]
pub fn lenient_count(value: &Value) -> Option<u64> {
    let decimal = lenient_decimal(value)?;
    if decimal.is_sign_negative() {
        return None;
    }
    u64::try_from(decimal.trunc()).ok()
}

/// Serde adapter for price fields: lenient, defaulting to zero.
///
/// # Errors
///
/// Only fails when the underlying deserializer cannot produce any JSON value.
pub fn deserialize_lenient_price<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(lenient_decimal)
        .unwrap_or(Decimal::ZERO))
}
