use crate::domain::card::SavedCard;
use crate::domain::checkout::{CheckoutMessage, CheckoutOrder};
use crate::domain::money::{Amount, PointsBalance};
use crate::domain::ports::{
    BackendAck, CardCharge, CheckoutWidget, LedgerGateway, PaymentBackend, PointsPayment,
};
use crate::domain::slot::{Slot, SlotStatus};
use crate::domain::vehicle::{PaymentRecord, Registration, VehicleInfo};
use crate::error::{BackendError, CheckoutError, LedgerError};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::{Notify, RwLock};

/// Wallet account used by the in-memory ledger unless told otherwise.
pub const SANDBOX_ACCOUNT: &str = "0x00000000000000000000000000000000000000aa";

/// An in-memory stand-in for the parking-fee contract.
///
/// Vehicles belong to the connected account. Paying a fee moves the
/// outstanding amount into the payment history and returns a synthetic
/// transaction hash.
#[derive(Default)]
pub struct InMemoryLedger {
    account: RwLock<Option<String>>,
    vehicles: RwLock<HashMap<String, Vec<VehicleInfo>>>,
    history: RwLock<HashMap<String, Vec<PaymentRecord>>>,
    next_failure: RwLock<Option<LedgerError>>,
    pay_fee_calls: AtomicUsize,
    tx_counter: AtomicUsize,
    hold: AtomicBool,
    release: Notify,
}

impl InMemoryLedger {
    /// Creates a ledger with [`SANDBOX_ACCOUNT`] connected and no vehicles.
    pub fn new() -> Self {
        Self {
            account: RwLock::new(Some(SANDBOX_ACCOUNT.to_string())),
            ..Self::default()
        }
    }

    /// Creates a ledger with no wallet connected.
    pub fn disconnected() -> Self {
        Self::default()
    }

    /// Registers a vehicle for the connected account with an outstanding fee.
    pub async fn register_owned(&self, vehicle: &str, user_name: &str, fee: Decimal) {
        let owner = self.account.read().await.clone().unwrap_or_default();
        let info = VehicleInfo {
            vehicle_number: vehicle.to_string(),
            user_name: user_name.to_string(),
            wallet_address: owner.clone(),
            parking_hours: 0,
            total_fee: fee,
            violation_fee: Decimal::ZERO,
        };
        self.vehicles.write().await.entry(owner).or_default().push(info);
    }

    /// Makes the next transaction fail with `err`.
    pub async fn fail_next_payment(&self, err: LedgerError) {
        *self.next_failure.write().await = Some(err);
    }

    /// Keeps `pay_fee` pending until [`release_payments`](Self::release_payments).
    pub fn hold_payments(&self) {
        self.hold.store(true, Ordering::SeqCst);
    }

    pub fn release_payments(&self) {
        self.hold.store(false, Ordering::SeqCst);
        self.release.notify_one();
    }

    pub fn pay_fee_calls(&self) -> usize {
        self.pay_fee_calls.load(Ordering::SeqCst)
    }

    fn next_hash(&self) -> String {
        let n = self.tx_counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("0x{n:064x}")
    }

    async fn take_failure(&self) -> Option<LedgerError> {
        self.next_failure.write().await.take()
    }
}

#[async_trait]
impl LedgerGateway for InMemoryLedger {
    async fn pay_fee(&self, vehicle_id: &str) -> Result<String, LedgerError> {
        self.pay_fee_calls.fetch_add(1, Ordering::SeqCst);
        if self.hold.load(Ordering::SeqCst) {
            self.release.notified().await;
        }
        if let Some(err) = self.take_failure().await {
            return Err(err);
        }

        let mut vehicles = self.vehicles.write().await;
        let (owner, info) = vehicles
            .iter_mut()
            .find_map(|(owner, list)| {
                list.iter_mut()
                    .find(|v| v.vehicle_number == vehicle_id)
                    .map(|info| (owner.clone(), info))
            })
            .ok_or_else(|| LedgerError::Rpc {
                code: -32000,
                message: "execution reverted: Vehicle not registered".to_string(),
            })?;

        let record = PaymentRecord {
            vehicle_number: info.vehicle_number.clone(),
            user_name: info.user_name.clone(),
            parking_hours: info.parking_hours,
            amount_paid: info.total_fee,
            violation_fee: info.violation_fee,
            paid_at: Utc::now(),
        };
        info.total_fee = Decimal::ZERO;
        info.violation_fee = Decimal::ZERO;
        info.parking_hours = 0;
        drop(vehicles);

        self.history.write().await.entry(owner).or_default().push(record);
        Ok(self.next_hash())
    }

    async fn register_vehicle(&self, registration: &Registration) -> Result<String, LedgerError> {
        if let Some(err) = self.take_failure().await {
            return Err(err);
        }
        let owner = self.account.read().await.clone().ok_or_else(|| LedgerError::Rpc {
            code: 4100,
            message: "No wallet connected".to_string(),
        })?;

        let mut vehicles = self.vehicles.write().await;
        if vehicles
            .values()
            .flatten()
            .any(|v| v.vehicle_number == registration.vehicle_number)
        {
            return Err(LedgerError::Rpc {
                code: -32000,
                message: "execution reverted: Vehicle already registered".to_string(),
            });
        }
        vehicles.entry(owner.clone()).or_default().push(VehicleInfo {
            vehicle_number: registration.vehicle_number.clone(),
            user_name: registration.user_name.clone(),
            wallet_address: owner,
            parking_hours: 0,
            total_fee: Decimal::ZERO,
            violation_fee: Decimal::ZERO,
        });
        drop(vehicles);

        Ok(self.next_hash())
    }

    async fn connected_account(&self) -> Result<Option<String>, LedgerError> {
        Ok(self.account.read().await.clone())
    }

    async fn vehicles(&self, owner: &str) -> Result<Vec<VehicleInfo>, LedgerError> {
        let vehicles = self.vehicles.read().await;
        Ok(vehicles.get(owner).cloned().unwrap_or_default())
    }

    async fn payment_history(&self, owner: &str) -> Result<Vec<PaymentRecord>, LedgerError> {
        let history = self.history.read().await;
        Ok(history.get(owner).cloned().unwrap_or_default())
    }
}

/// An in-memory stand-in for the REST payment backend.
///
/// Every call is recorded as `"<METHOD> <path>"` so tests can assert which
/// endpoints were reached.
#[derive(Default)]
pub struct InMemoryBackend {
    points: RwLock<Decimal>,
    cards: RwLock<Vec<SavedCard>>,
    slots: RwLock<Vec<Slot>>,
    charges: RwLock<Vec<CardCharge>>,
    next_failure: RwLock<Option<BackendError>>,
    calls: RwLock<Vec<String>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_points(&self, points: Decimal) {
        *self.points.write().await = points;
    }

    pub async fn add_card(&self, id: &str, last4: &str, exp_month: u8, exp_year: u16) {
        self.cards.write().await.push(SavedCard {
            id: id.to_string(),
            last4: last4.to_string(),
            exp_month,
            exp_year,
        });
    }

    pub async fn set_slots(&self, slots: Vec<Slot>) {
        *self.slots.write().await = slots;
    }

    /// Makes the next mutating call fail with `err`.
    pub async fn fail_next(&self, err: BackendError) {
        *self.next_failure.write().await = Some(err);
    }

    pub async fn calls(&self) -> Vec<String> {
        self.calls.read().await.clone()
    }

    pub async fn card_charges(&self) -> Vec<CardCharge> {
        self.charges.read().await.clone()
    }

    async fn record(&self, call: &str) {
        self.calls.write().await.push(call.to_string());
    }

    async fn check_failure(&self) -> Result<(), BackendError> {
        match self.next_failure.write().await.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn not_found(message: impl Into<String>) -> BackendError {
    BackendError::Status {
        status: 404,
        message: message.into(),
    }
}

fn conflict(message: impl Into<String>) -> BackendError {
    BackendError::Status {
        status: 409,
        message: message.into(),
    }
}

#[async_trait]
impl PaymentBackend for InMemoryBackend {
    async fn charge_card(&self, charge: &CardCharge) -> Result<BackendAck, BackendError> {
        self.record("POST /pay/card").await;
        self.check_failure().await?;
        if !self.cards.read().await.iter().any(|c| c.id == charge.card_id) {
            return Err(not_found("Card not found"));
        }
        self.charges.write().await.push(charge.clone());
        Ok(BackendAck::default())
    }

    async fn pay_points(&self, payment: &PointsPayment) -> Result<BackendAck, BackendError> {
        self.record("POST /pay/points").await;
        self.check_failure().await?;
        let mut points = self.points.write().await;
        if *points < payment.amount.value() {
            return Err(BackendError::Status {
                status: 402,
                message: "Insufficient points".to_string(),
            });
        }
        *points -= payment.amount.value();
        Ok(BackendAck::default())
    }

    async fn top_up_points(
        &self,
        _user_id: &str,
        amount: Amount,
    ) -> Result<PointsBalance, BackendError> {
        self.record("POST /topup/points").await;
        self.check_failure().await?;
        let mut points = self.points.write().await;
        *points += amount.value();
        PointsBalance::new(*points).map_err(|e| BackendError::Decode(e.to_string()))
    }

    async fn points_balance(&self, _user_id: &str) -> Result<PointsBalance, BackendError> {
        self.record("GET /points").await;
        let points = *self.points.read().await;
        PointsBalance::new(points).map_err(|e| BackendError::Decode(e.to_string()))
    }

    async fn saved_cards(&self, _user_id: &str) -> Result<Vec<SavedCard>, BackendError> {
        self.record("GET /cards").await;
        Ok(self.cards.read().await.clone())
    }

    async fn slots(&self) -> Result<Vec<Slot>, BackendError> {
        self.record("GET /slots").await;
        Ok(self.slots.read().await.clone())
    }

    async fn book_slot(&self, slot_id: u32, plate: &str) -> Result<BackendAck, BackendError> {
        self.record("POST /slots/book").await;
        self.check_failure().await?;
        let mut slots = self.slots.write().await;
        let slot = slots
            .iter_mut()
            .find(|s| s.id == slot_id)
            .ok_or_else(|| not_found(format!("Slot {slot_id} not found")))?;
        if !slot.is_free() {
            return Err(conflict(format!("Slot {slot_id} is already booked")));
        }
        slot.status = SlotStatus::Booked;
        slot.plate = Some(plate.to_string());
        Ok(BackendAck::default())
    }

    async fn clear_slot(
        &self,
        slot_id: u32,
        _rate_per_hour: Decimal,
    ) -> Result<BackendAck, BackendError> {
        self.record("POST /slots/clear").await;
        self.check_failure().await?;
        let mut slots = self.slots.write().await;
        let slot = slots
            .iter_mut()
            .find(|s| s.id == slot_id)
            .ok_or_else(|| not_found(format!("Slot {slot_id} not found")))?;
        if slot.is_free() {
            return Err(conflict(format!("Slot {slot_id} is not booked")));
        }
        slot.status = SlotStatus::Free;
        slot.plate = None;
        Ok(BackendAck::default())
    }
}

/// A checkout that answers every order with a preset message.
pub struct InMemoryCheckout {
    reply: RwLock<Option<CheckoutMessage>>,
    orders: RwLock<Vec<CheckoutOrder>>,
    calls: AtomicUsize,
}

impl Default for InMemoryCheckout {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCheckout {
    /// Approves every order with a generated order id until told otherwise.
    pub fn new() -> Self {
        Self {
            reply: RwLock::new(None),
            orders: RwLock::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub async fn reply_with(&self, message: CheckoutMessage) {
        *self.reply.write().await = Some(message);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn orders(&self) -> Vec<CheckoutOrder> {
        self.orders.read().await.clone()
    }
}

#[async_trait]
impl CheckoutWidget for InMemoryCheckout {
    async fn checkout(&self, order: &CheckoutOrder) -> Result<CheckoutMessage, CheckoutError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.orders.write().await.push(order.clone());
        let reply = self.reply.read().await.clone();
        Ok(reply.unwrap_or_else(|| CheckoutMessage::Success {
            order_id: format!("SANDBOX-{n:06}"),
        }))
    }
}

/// In-memory providers seeded with a small demo data set.
pub struct Sandbox {
    pub ledger: Arc<InMemoryLedger>,
    pub backend: Arc<InMemoryBackend>,
    pub checkout: Arc<InMemoryCheckout>,
}

impl Sandbox {
    /// One registered vehicle `ABC-123` owing 30, 100 points, a saved card
    /// and eight slots with #3 taken by someone else.
    pub async fn seeded() -> Self {
        let ledger = InMemoryLedger::new();
        ledger
            .register_owned("ABC-123", "Sandbox Driver", Decimal::from(30))
            .await;

        let backend = InMemoryBackend::new();
        backend.set_points(Decimal::from(100)).await;
        backend.add_card("card_sandbox", "4242", 12, 2030).await;
        backend
            .set_slots(
                (1..=8)
                    .map(|id| match id {
                        3 => Slot {
                            id,
                            status: SlotStatus::Booked,
                            plate: Some("XYZ-999".to_string()),
                        },
                        _ => Slot {
                            id,
                            status: SlotStatus::Free,
                            plate: None,
                        },
                    })
                    .collect(),
            )
            .await;

        Self {
            ledger: Arc::new(ledger),
            backend: Arc::new(backend),
            checkout: Arc::new(InMemoryCheckout::new()),
        }
    }
}
