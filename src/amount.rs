//! Arbitrary-precision amounts
//!
//! Every monetary value in the engine flows through [`AmountValue`]. It wraps a
//! `BigDecimal` (never a float) and carries an explicit "undefined" state so that
//! "no data yet" is never confused with a real zero.

use bigdecimal::{BigDecimal, Zero};
use std::fmt;
use std::str::FromStr;

use crate::error::AmountError;
use crate::token::BlockchainToken;

/// Immutable decimal amount with an undefined sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AmountValue(Option<BigDecimal>);

impl AmountValue {
    /// Lenient constructor: empty or malformed input becomes undefined
    pub fn new(raw: &str) -> Self {
        Self::normalize(raw)
    }

    /// Strict parse, used where a malformed string is a caller bug
    pub fn parse(raw: &str) -> Result<Self, AmountError> {
        let cleaned = clean_input(raw);
        if cleaned.is_empty() {
            return Err(AmountError::Empty);
        }
        if cleaned.contains(['e', 'E']) {
            return Err(AmountError::Invalid { raw: raw.to_string() });
        }
        BigDecimal::from_str(&cleaned)
            .map(|value| Self(Some(value)))
            .map_err(|_| AmountError::Invalid { raw: raw.to_string() })
    }

    /// Coerce anything into an amount; never fails
    pub fn normalize(raw: &str) -> Self {
        Self::parse(raw).unwrap_or_default()
    }

    pub fn undefined() -> Self {
        Self(None)
    }

    pub fn zero() -> Self {
        Self(Some(BigDecimal::zero()))
    }

    pub fn from_decimal(value: BigDecimal) -> Self {
        Self(Some(value))
    }

    pub fn as_decimal(&self) -> Option<&BigDecimal> {
        self.0.as_ref()
    }

    pub fn is_undefined(&self) -> bool {
        self.0.is_none()
    }

    /// Undefined is not zero
    pub fn is_zero(&self) -> bool {
        matches!(&self.0, Some(v) if v.is_zero())
    }

    pub fn plus(&self, other: &AmountValue) -> AmountValue {
        self.combine(other, |a, b| Some(a + b))
    }

    pub fn minus(&self, other: &AmountValue) -> AmountValue {
        self.combine(other, |a, b| Some(a - b))
    }

    pub fn times(&self, other: &AmountValue) -> AmountValue {
        self.combine(other, |a, b| Some(a * b))
    }

    /// Division by zero or by undefined yields undefined
    pub fn div(&self, other: &AmountValue) -> AmountValue {
        self.combine(other, |a, b| if b.is_zero() { None } else { Some(a / b) })
    }

    /// Display units -> base units (x 10^decimals)
    pub fn multiply_by_decimals(&self, decimals: u32) -> AmountValue {
        self.rescale(-(decimals as i64))
    }

    /// Base units -> display units (/ 10^decimals)
    pub fn divide_by_decimals(&self, decimals: u32) -> AmountValue {
        self.rescale(decimals as i64)
    }

    /// Strictly greater. Any undefined operand compares false.
    pub fn gt(&self, other: &AmountValue) -> bool {
        matches!((&self.0, &other.0), (Some(a), Some(b)) if a > b)
    }

    pub fn gte(&self, other: &AmountValue) -> bool {
        matches!((&self.0, &other.0), (Some(a), Some(b)) if a >= b)
    }

    /// True when the value carries digits after the decimal point
    pub fn has_fractional_digits(&self) -> bool {
        match &self.0 {
            Some(value) => value.normalized().as_bigint_and_exponent().1 > 0,
            None => false,
        }
    }

    /// Plain decimal string, truncated to `precision` places when given.
    /// Trailing zeros are stripped. Undefined formats as `""`.
    pub fn format(&self, precision: Option<u32>) -> String {
        let Some(value) = &self.0 else {
            return String::new();
        };
        let value = match precision {
            Some(places) => value.with_scale(places as i64),
            None => value.clone(),
        };
        plain_string(&value.normalized())
    }

    /// Two decimal places with thousands separators and a currency marker
    pub fn format_as_fiat(&self, currency_code: &str) -> String {
        let Some(value) = &self.0 else {
            return String::new();
        };
        let rounded = plain_string(&value.round(2).with_scale(2));
        let (negative, body) = match rounded.strip_prefix('-') {
            Some(rest) => (true, rest.to_string()),
            None => (false, rounded),
        };
        let (int_part, frac_part) = body.split_once('.').unwrap_or((body.as_str(), "00"));
        let grouped = group_thousands(int_part);
        let sign = if negative { "-" } else { "" };

        match currency_symbol(currency_code) {
            Some(symbol) => format!("{}{}{}.{}", sign, symbol, grouped, frac_part),
            None => format!("{}{}.{} {}", sign, grouped, frac_part, currency_code.to_uppercase()),
        }
    }

    /// `"<amount> <symbol>"`, or `""` when undefined
    pub fn format_as_asset(&self, precision: Option<u32>, symbol: &str) -> String {
        if self.is_undefined() {
            return String::new();
        }
        format!("{} {}", self.format(precision), symbol)
    }

    fn combine<F>(&self, other: &AmountValue, op: F) -> AmountValue
    where
        F: FnOnce(&BigDecimal, &BigDecimal) -> Option<BigDecimal>,
    {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => AmountValue(op(a, b)),
            _ => AmountValue::undefined(),
        }
    }

    fn rescale(&self, delta: i64) -> AmountValue {
        match &self.0 {
            Some(value) => {
                let (digits, scale) = value.as_bigint_and_exponent();
                match scale.checked_add(delta) {
                    Some(scale) => AmountValue(Some(BigDecimal::new(digits, scale))),
                    None => AmountValue::undefined(),
                }
            }
            None => AmountValue::undefined(),
        }
    }
}

impl fmt::Display for AmountValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format(None))
    }
}

impl FromStr for AmountValue {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<BigDecimal> for AmountValue {
    fn from(value: BigDecimal) -> Self {
        Self(Some(value))
    }
}

impl From<u64> for AmountValue {
    fn from(value: u64) -> Self {
        Self(Some(BigDecimal::from(value)))
    }
}

/// True when `amount` (display units) cannot be expressed in the token's base unit,
/// i.e. it has more fractional digits than `token.decimals`.
pub fn has_decimals_overflow(amount: &str, token: &BlockchainToken) -> bool {
    AmountValue::new(amount)
        .multiply_by_decimals(token.decimals)
        .has_fractional_digits()
}

/// Accepts what a user can type into an amount field: `".5"`, `"1."`, `" 2 "`.
/// Exponent notation is rejected by the caller.
fn clean_input(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut cleaned = String::with_capacity(trimmed.len() + 2);
    if trimmed.starts_with('.') {
        cleaned.push('0');
    }
    cleaned.push_str(trimmed);
    if cleaned.ends_with('.') {
        cleaned.push('0');
    }
    cleaned
}

/// Renders without scientific notation regardless of magnitude
fn plain_string(value: &BigDecimal) -> String {
    let negative = value < &BigDecimal::zero();
    let (digits, scale) = value.abs().as_bigint_and_exponent();
    let digits = digits.to_string();

    let body = if scale <= 0 {
        if digits == "0" {
            digits
        } else {
            format!("{}{}", digits, "0".repeat((-scale) as usize))
        }
    } else {
        let scale = scale as usize;
        let padded = if digits.len() <= scale {
            format!("{}{}", "0".repeat(scale - digits.len() + 1), digits)
        } else {
            digits
        };
        let (int_part, frac_part) = padded.split_at(padded.len() - scale);
        format!("{}.{}", int_part, frac_part)
    };

    if negative {
        format!("-{}", body)
    } else {
        body
    }
}

fn group_thousands(int_part: &str) -> String {
    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

fn currency_symbol(code: &str) -> Option<&'static str> {
    match code.to_uppercase().as_str() {
        "USD" => Some("$"),
        "EUR" => Some("€"),
        "GBP" => Some("£"),
        "JPY" => Some("¥"),
        _ => None,
    }
}
