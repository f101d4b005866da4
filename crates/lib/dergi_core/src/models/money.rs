//! Amounts are held as integer cents and exchanged as decimal numbers.

use serde::{Deserialize, Deserializer, Serializer};

/// Convert a decimal amount to cents, rejecting negative or non-finite input.
pub fn to_cents(amount: f64) -> Option<i64> {
    if !amount.is_finite() || amount < 0.0 {
        return None;
    }
    let cents = (amount * 100.0).round();
    if cents > i64::MAX as f64 {
        return None;
    }
    Some(cents as i64)
}

/// Convert cents back to a decimal amount.
pub fn from_cents(cents: i64) -> f64 {
    cents as f64 / 100.0
}

/// `#[serde(with = "cents")]` for `i64` cent fields exposed as decimals.
pub mod cents {
    use super::*;

    pub fn serialize<S: Serializer>(value: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(from_cents(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        let amount = f64::deserialize(deserializer)?;
        to_cents(amount).ok_or_else(|| serde::de::Error::custom("amount must be a non-negative number"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_amounts_round_to_cents() {
        assert_eq!(to_cents(29.99), Some(2999));
        assert_eq!(to_cents(0.0), Some(0));
        assert_eq!(to_cents(12.5), Some(1250));
        assert_eq!(from_cents(2999), 29.99);
    }

    #[test]
    fn rejects_negative_and_non_finite() {
        assert_eq!(to_cents(-1.0), None);
        assert_eq!(to_cents(f64::NAN), None);
        assert_eq!(to_cents(f64::INFINITY), None);
    }
}
