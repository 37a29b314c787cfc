use super::card::SavedCard;
use super::checkout::{CheckoutMessage, CheckoutOrder};
use super::money::{Amount, PointsBalance};
use super::slot::Slot;
use super::vehicle::{PaymentRecord, Registration, VehicleInfo};
use crate::error::{BackendError, CheckoutError, LedgerError};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Charge of a saved card for a vehicle's fee.
#[derive(Debug, Clone, PartialEq)]
pub struct CardCharge {
    pub user_id: String,
    pub vehicle_id: String,
    pub amount: Amount,
    pub card_id: String,
}

/// Payment of a vehicle's fee out of the user's points.
#[derive(Debug, Clone, PartialEq)]
pub struct PointsPayment {
    pub user_id: String,
    pub vehicle_id: String,
    pub amount: Amount,
}

/// Positive acknowledgement from the backend, with an optional note.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BackendAck {
    pub message: Option<String>,
}

/// The on-chain parking-fee contract, reached through the user's wallet.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Pays the outstanding fee of `vehicle_id` and returns the transaction hash.
    async fn pay_fee(&self, vehicle_id: &str) -> Result<String, LedgerError>;
    async fn register_vehicle(&self, registration: &Registration) -> Result<String, LedgerError>;
    /// The wallet account transactions are sent from, if one is connected.
    async fn connected_account(&self) -> Result<Option<String>, LedgerError>;
    async fn vehicles(&self, owner: &str) -> Result<Vec<VehicleInfo>, LedgerError>;
    async fn payment_history(&self, owner: &str) -> Result<Vec<PaymentRecord>, LedgerError>;
}

/// The REST backend owning cards, points and parking slots.
#[async_trait]
pub trait PaymentBackend: Send + Sync {
    async fn charge_card(&self, charge: &CardCharge) -> Result<BackendAck, BackendError>;
    async fn pay_points(&self, payment: &PointsPayment) -> Result<BackendAck, BackendError>;
    async fn top_up_points(
        &self,
        user_id: &str,
        amount: Amount,
    ) -> Result<PointsBalance, BackendError>;
    async fn points_balance(&self, user_id: &str) -> Result<PointsBalance, BackendError>;
    async fn saved_cards(&self, user_id: &str) -> Result<Vec<SavedCard>, BackendError>;
    async fn slots(&self) -> Result<Vec<Slot>, BackendError>;
    async fn book_slot(&self, slot_id: u32, plate: &str) -> Result<BackendAck, BackendError>;
    async fn clear_slot(
        &self,
        slot_id: u32,
        rate_per_hour: Decimal,
    ) -> Result<BackendAck, BackendError>;
}

/// A hosted payment button running in a separate browsing context.
///
/// Resolves once, with whatever terminal message the page posted.
#[async_trait]
pub trait CheckoutWidget: Send + Sync {
    async fn checkout(&self, order: &CheckoutOrder) -> Result<CheckoutMessage, CheckoutError>;
}

pub type LedgerGatewayArc = Arc<dyn LedgerGateway>;
pub type PaymentBackendArc = Arc<dyn PaymentBackend>;
pub type CheckoutWidgetArc = Arc<dyn CheckoutWidget>;
