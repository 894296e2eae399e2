//! Exact conversion of decimal price strings to integer minor units.
//!
//! Shopify and Lightspeed report amounts as decimal strings (`"12.50"`);
//! everything downstream works in cents. Parsing is done on the digits so
//! no floating point rounding is involved.

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Invalid decimal amount: {0:?}")]
    Invalid(String),

    #[error("Amount out of range: {0:?}")]
    Overflow(String),
}

/// Convert a decimal string in major units to minor units (x100).
///
/// Digits past the second decimal place are rounded half-up away from zero.
pub fn decimal_to_minor_units(raw: &str) -> Result<i64, MoneyError> {
    let invalid = || MoneyError::Invalid(raw.to_string());
    let overflow = || MoneyError::Overflow(raw.to_string());

    let text = raw.trim();
    let (negative, unsigned) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };

    let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(invalid());
    }

    let whole_value: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| overflow())?
    };

    let digit = |i: usize| -> i64 {
        fraction
            .as_bytes()
            .get(i)
            .map_or(0, |b| i64::from(b - b'0'))
    };
    let mut cents = digit(0) * 10 + digit(1);
    if digit(2) >= 5 {
        cents += 1;
    }

    let total = whole_value
        .checked_mul(100)
        .and_then(|v| v.checked_add(cents))
        .ok_or_else(overflow)?;

    Ok(if negative { -total } else { total })
}
