use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// A vehicle registered on the parking-fee contract.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleInfo {
    pub vehicle_number: String,
    pub user_name: String,
    pub wallet_address: String,
    pub parking_hours: u64,
    pub total_fee: Decimal,
    pub violation_fee: Decimal,
}

impl VehicleInfo {
    /// Everything currently owed for the vehicle.
    pub fn outstanding(&self) -> Decimal {
        self.total_fee + self.violation_fee
    }
}

/// A settled fee, as recorded by the contract.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentRecord {
    pub vehicle_number: String,
    pub user_name: String,
    pub parking_hours: u64,
    pub amount_paid: Decimal,
    pub violation_fee: Decimal,
    pub paid_at: DateTime<Utc>,
}

/// Input of a vehicle registration.
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub vehicle_number: String,
    pub user_name: String,
}

impl Registration {
    /// Trims both fields, returning `None` when either is blank.
    pub fn normalized(vehicle_number: &str, user_name: &str) -> Option<Self> {
        let vehicle_number = vehicle_number.trim();
        let user_name = user_name.trim();
        if vehicle_number.is_empty() || user_name.is_empty() {
            return None;
        }
        Some(Self {
            vehicle_number: vehicle_number.to_string(),
            user_name: user_name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_outstanding_includes_violations() {
        let info = VehicleInfo {
            vehicle_number: "ABC-123".to_string(),
            user_name: "Mike".to_string(),
            wallet_address: "0x0".to_string(),
            parking_hours: 3,
            total_fee: dec!(30),
            violation_fee: dec!(5),
        };
        assert_eq!(info.outstanding(), dec!(35));
    }

    #[test]
    fn test_registration_requires_both_fields() {
        assert!(Registration::normalized("ABC-123", " ").is_none());
        assert!(Registration::normalized("", "Mike").is_none());
        let reg = Registration::normalized(" ABC-123 ", "Mike ").unwrap();
        assert_eq!(reg.vehicle_number, "ABC-123");
        assert_eq!(reg.user_name, "Mike");
    }
}
