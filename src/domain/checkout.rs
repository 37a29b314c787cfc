use super::money::Amount;
use serde::{Deserialize, Serialize};

/// What the hosted checkout is asked to collect.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckoutOrder {
    pub vehicle_id: String,
    pub amount: Amount,
    pub currency: String,
}

/// The single terminal message posted back by the hosted checkout page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CheckoutMessage {
    Success {
        #[serde(rename = "orderID")]
        order_id: String,
    },
    Cancel,
    Error {
        #[serde(default)]
        error: String,
    },
}
