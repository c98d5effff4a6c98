use std::fmt;

use serde::{Deserialize, Serialize};

/// Monetary amount in centavos, stored as a scaled integer.
///
/// Currency values never carry more than two decimal digits, so all
/// arithmetic stays exact.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_centavos(value: i64) -> Self {
        Amount(value)
    }

    pub fn from_reais(value: f64) -> Self {
        Amount((value * 100.0).round() as i64)
    }

    pub fn centavos(self) -> i64 {
        self.0
    }

    pub fn as_reais(self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Parse a user-entered value, accepting both `10.50` and `10,50`.
    pub fn parse_brl(input: &str) -> Option<Amount> {
        let normalized = input.trim().replace(',', ".");
        let value: f64 = normalized.parse().ok()?;
        if !value.is_finite() || value < 0.0 {
            return None;
        }
        Some(Amount::from_reais(value))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl std::ops::Add for Amount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Amount(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Amount {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Amount(self.0 - rhs.0)
    }
}

impl std::ops::AddAssign for Amount {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl std::ops::SubAssign for Amount {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_reais_rounds_to_centavos() {
        assert_eq!(Amount::from_reais(10.0), Amount::from_centavos(1000));
        assert_eq!(Amount::from_reais(0.1), Amount::from_centavos(10));
        assert_eq!(Amount::from_reais(1.005), Amount::from_centavos(101));
    }

    #[test]
    fn parse_accepts_comma_and_dot() {
        assert_eq!(Amount::parse_brl("10,50"), Some(Amount::from_centavos(1050)));
        assert_eq!(Amount::parse_brl("10.50"), Some(Amount::from_centavos(1050)));
        assert_eq!(Amount::parse_brl(" 1 "), Some(Amount::from_centavos(100)));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(Amount::parse_brl("abc"), None);
        assert_eq!(Amount::parse_brl("-5"), None);
        assert_eq!(Amount::parse_brl(""), None);
    }

    #[test]
    fn display_uses_two_decimals() {
        assert_eq!(Amount::from_centavos(1050).to_string(), "10.50");
        assert_eq!(Amount::from_centavos(5).to_string(), "0.05");
        assert_eq!(Amount::from_centavos(0).to_string(), "0.00");
    }

    #[test]
    fn arithmetic() {
        let mut a = Amount::from_centavos(5000);
        a -= Amount::from_centavos(1000);
        assert_eq!(a, Amount::from_centavos(4000));
        a += Amount::from_centavos(1000);
        assert_eq!(a, Amount::from_centavos(5000));
        assert_eq!(
            Amount::from_centavos(300) + Amount::from_centavos(200),
            Amount::from_centavos(500)
        );
    }
}
