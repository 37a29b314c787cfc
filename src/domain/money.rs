use crate::error::PaymentError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A strictly positive amount handed to a payment provider.
///
/// The currency is implied by the rail the amount travels on (fiat for
/// card and PayPal, points for the loyalty rail).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, PaymentError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(PaymentError::Validation(
                "Amount must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = PaymentError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl FromStr for Amount {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s.trim())
            .map_err(|_| PaymentError::Validation(format!("'{s}' is not a valid amount")))?;
        Self::new(value)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Loyalty points held by the user on the payment backend.
///
/// Never negative. This crate only ever replaces it with a freshly fetched
/// value; arithmetic on it belongs to the backend.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct PointsBalance(Decimal);

impl PointsBalance {
    pub fn new(amount: Decimal) -> Result<Self, PaymentError> {
        if amount >= Decimal::ZERO {
            Ok(Self(amount))
        } else {
            Err(PaymentError::Validation(
                "Points balance cannot be negative".to_string(),
            ))
        }
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for PointsBalance {
    type Error = PaymentError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PointsBalance> for Decimal {
    fn from(balance: PointsBalance) -> Self {
        balance.0
    }
}

impl fmt::Display for PointsBalance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_amount_validation() {
        assert!(Amount::new(dec!(1.0)).is_ok());
        assert!(matches!(
            Amount::new(dec!(0.0)),
            Err(PaymentError::Validation(_))
        ));
        assert!(matches!(
            Amount::new(dec!(-1.0)),
            Err(PaymentError::Validation(_))
        ));
    }

    #[test]
    fn test_amount_from_str() {
        let amount: Amount = " 12.50 ".parse().unwrap();
        assert_eq!(amount.value(), dec!(12.50));
        assert!("abc".parse::<Amount>().is_err());
        assert!("0".parse::<Amount>().is_err());
    }

    #[test]
    fn test_points_balance_rejects_negative() {
        assert!(PointsBalance::new(dec!(0)).is_ok());
        assert!(PointsBalance::new(dec!(-0.01)).is_err());
    }

    #[test]
    fn test_points_balance_deserializes_from_number() {
        let balance: PointsBalance = serde_json::from_str("42.5").unwrap();
        assert_eq!(balance.amount(), dec!(42.5));
        assert!(serde_json::from_str::<PointsBalance>("-1").is_err());
    }
}
