use super::money::Amount;
use crate::error::PaymentError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The fixed set of rails a parking fee can be paid through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Card,
    Crypto,
    PayPal,
    Points,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 5] = [
        PaymentMethod::Cash,
        PaymentMethod::Card,
        PaymentMethod::Crypto,
        PaymentMethod::PayPal,
        PaymentMethod::Points,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Crypto => "crypto",
            PaymentMethod::PayPal => "paypal",
            PaymentMethod::Points => "points",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        PaymentMethod::ALL
            .into_iter()
            .find(|method| method.as_str() == wanted)
            .ok_or_else(|| PaymentError::Validation(format!("Unknown payment method '{s}'")))
    }
}

/// One user attempt to pay the fee of a vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub vehicle_id: String,
    pub method: PaymentMethod,
    pub amount: Option<Amount>,
}

impl PaymentRequest {
    pub fn new(vehicle_id: impl Into<String>, method: PaymentMethod) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            method,
            amount: None,
        }
    }

    pub fn with_amount(mut self, amount: Amount) -> Self {
        self.amount = Some(amount);
        self
    }

    /// The trimmed vehicle identifier, or a validation error when blank.
    pub fn vehicle(&self) -> Result<&str, PaymentError> {
        let vehicle = self.vehicle_id.trim();
        if vehicle.is_empty() {
            Err(PaymentError::Validation(
                "Please enter a valid vehicle number.".to_string(),
            ))
        } else {
            Ok(vehicle)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Succeeded,
    UserCancelled,
    Failed,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::UserCancelled => "user_cancelled",
            PaymentStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Result of a single payment attempt. Never stored by this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentOutcome {
    pub status: PaymentStatus,
    /// Transaction hash, checkout order id, or nothing for local rails.
    pub reference: Option<String>,
    pub message: String,
}

impl PaymentOutcome {
    pub fn succeeded(reference: Option<String>, message: impl Into<String>) -> Self {
        Self {
            status: PaymentStatus::Succeeded,
            reference,
            message: message.into(),
        }
    }

    pub fn user_cancelled(message: impl Into<String>) -> Self {
        Self {
            status: PaymentStatus::UserCancelled,
            reference: None,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: PaymentStatus::Failed,
            reference: None,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == PaymentStatus::Succeeded
    }
}

/// Whether the orchestrator is currently waiting on a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Idle,
    AwaitingProviderResponse,
}
