use super::read_model::ReadThrough;
use super::refresh::{ReadModel, RefreshHub, RefreshSignal};
use crate::domain::card::SavedCard;
use crate::domain::checkout::{CheckoutMessage, CheckoutOrder};
use crate::domain::money::{Amount, PointsBalance};
use crate::domain::payment::{AttemptState, PaymentMethod, PaymentOutcome, PaymentRequest};
use crate::domain::ports::{
    CardCharge, CheckoutWidgetArc, LedgerGatewayArc, PaymentBackendArc, PointsPayment,
};
use crate::error::{LedgerError, PaymentError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Per-user knobs the orchestrator needs beyond the request itself.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorSettings {
    /// Backend identity for card and points operations.
    pub user_id: String,
    /// Charged by card and PayPal when the request carries no amount.
    pub default_fee: Amount,
    /// Currency of the hosted checkout.
    pub currency: String,
}

/// Drives one payment attempt at a time through the rail the user picked.
///
/// Local pre-conditions (blank vehicle, missing amount, no saved card, an
/// attempt already in flight) are rejected as errors before any provider
/// sees the request. Anything a provider answered becomes a terminal
/// [`PaymentOutcome`]. Successful attempts invalidate the cached points and
/// cards and broadcast a [`RefreshSignal`].
pub struct PaymentOrchestrator {
    ledger: LedgerGatewayArc,
    backend: PaymentBackendArc,
    checkout: CheckoutWidgetArc,
    settings: OrchestratorSettings,
    refresh: RefreshHub,
    in_flight: AtomicBool,
    points: ReadThrough<PointsBalance>,
    cards: ReadThrough<Vec<SavedCard>>,
}

/// Clears the in-flight flag however the attempt ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl PaymentOrchestrator {
    /// Creates a new `PaymentOrchestrator`.
    ///
    /// # Arguments
    ///
    /// * `ledger` - The on-chain fee contract, used by the crypto rail.
    /// * `backend` - The REST backend, used by the card and points rails.
    /// * `checkout` - The hosted checkout, used by the PayPal rail.
    /// * `settings` - User id, default fee and checkout currency.
    /// * `refresh` - Where refresh signals are published.
    pub fn new(
        ledger: LedgerGatewayArc,
        backend: PaymentBackendArc,
        checkout: CheckoutWidgetArc,
        settings: OrchestratorSettings,
        refresh: RefreshHub,
    ) -> Self {
        Self {
            ledger,
            backend,
            checkout,
            settings,
            refresh,
            in_flight: AtomicBool::new(false),
            points: ReadThrough::new(),
            cards: ReadThrough::new(),
        }
    }

    pub fn attempt_state(&self) -> AttemptState {
        if self.in_flight.load(Ordering::Acquire) {
            AttemptState::AwaitingProviderResponse
        } else {
            AttemptState::Idle
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RefreshSignal> {
        self.refresh.subscribe()
    }

    /// Runs a single payment attempt to a terminal outcome.
    pub async fn submit_payment(&self, request: PaymentRequest) -> Result<PaymentOutcome> {
        let vehicle = request.vehicle()?.to_string();
        if request.method == PaymentMethod::Points && request.amount.is_none() {
            return Err(PaymentError::Validation(
                "Please enter the number of points to pay.".to_string(),
            ));
        }

        let _guard = self.begin_attempt()?;
        info!(vehicle = %vehicle, method = %request.method, "payment attempt started");

        let outcome = match request.method {
            PaymentMethod::Cash => self.pay_cash(&vehicle),
            PaymentMethod::Card => self.pay_card(&vehicle, request.amount).await?,
            PaymentMethod::Crypto => self.pay_crypto(&vehicle).await,
            PaymentMethod::PayPal => self.pay_paypal(&vehicle, request.amount).await,
            PaymentMethod::Points => {
                let amount = request.amount.ok_or_else(|| {
                    PaymentError::Validation("Please enter the number of points to pay.".into())
                })?;
                self.pay_points(&vehicle, amount).await
            }
        };

        if outcome.is_success() {
            self.points.invalidate().await;
            self.cards.invalidate().await;
            self.refresh.notify(RefreshSignal::after_payment());
            info!(vehicle = %vehicle, method = %request.method, reference = ?outcome.reference, "payment succeeded");
        } else {
            warn!(vehicle = %vehicle, method = %request.method, status = %outcome.status, "{}", outcome.message);
        }

        Ok(outcome)
    }

    /// Current points balance, fetched from the backend on first use.
    pub async fn points_balance(&self) -> Result<PointsBalance> {
        let balance = self
            .points
            .get_or_fetch(|| self.backend.points_balance(&self.settings.user_id))
            .await?;
        Ok(balance)
    }

    /// Buys more points. The cached balance is dropped so the next read
    /// reflects what the backend holds.
    pub async fn top_up_points(&self, amount: Option<Amount>) -> Result<PointsBalance> {
        let amount = amount.ok_or_else(|| {
            PaymentError::Validation("Please enter the number of points to add.".to_string())
        })?;

        let result = self
            .backend
            .top_up_points(&self.settings.user_id, amount)
            .await;
        self.points.invalidate().await;
        let balance = result?;

        info!(amount = %amount, balance = %balance, "points topped up");
        self.refresh.notify(RefreshSignal::new(&[ReadModel::Points]));
        Ok(balance)
    }

    /// Cards on file, fetched from the backend on first use.
    pub async fn saved_cards(&self) -> Result<Vec<SavedCard>> {
        let cards = self
            .cards
            .get_or_fetch(|| self.backend.saved_cards(&self.settings.user_id))
            .await?;
        Ok(cards)
    }

    fn begin_attempt(&self) -> Result<InFlightGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| PaymentError::Busy)?;
        Ok(InFlightGuard(&self.in_flight))
    }

    fn pay_cash(&self, vehicle: &str) -> PaymentOutcome {
        PaymentOutcome::succeeded(None, format!("Pay the fee for {vehicle} in cash at the gate."))
    }

    async fn pay_card(&self, vehicle: &str, amount: Option<Amount>) -> Result<PaymentOutcome> {
        let cards = match self.saved_cards().await {
            Ok(cards) => cards,
            Err(err) => return Ok(PaymentOutcome::failed(err.to_string())),
        };
        let card = cards.first().ok_or_else(|| {
            PaymentError::NoResource("No saved card on file. Add a card first.".to_string())
        })?;

        let charge = CardCharge {
            user_id: self.settings.user_id.clone(),
            vehicle_id: vehicle.to_string(),
            amount: amount.unwrap_or(self.settings.default_fee),
            card_id: card.id.clone(),
        };

        Ok(match self.backend.charge_card(&charge).await {
            Ok(ack) => PaymentOutcome::succeeded(
                None,
                ack.message
                    .unwrap_or_else(|| format!("Charged {} to card {card}.", charge.amount)),
            ),
            Err(err) => PaymentOutcome::failed(err.message()),
        })
    }

    async fn pay_crypto(&self, vehicle: &str) -> PaymentOutcome {
        match self.ledger.pay_fee(vehicle).await {
            Ok(hash) => {
                let message = format!("Fee paid! Tx: {hash}");
                PaymentOutcome::succeeded(Some(hash), message)
            }
            Err(LedgerError::UserRejected) => {
                PaymentOutcome::user_cancelled(LedgerError::UserRejected.to_string())
            }
            Err(err) => PaymentOutcome::failed(format!("Error: {err}")),
        }
    }

    async fn pay_paypal(&self, vehicle: &str, amount: Option<Amount>) -> PaymentOutcome {
        let order = CheckoutOrder {
            vehicle_id: vehicle.to_string(),
            amount: amount.unwrap_or(self.settings.default_fee),
            currency: self.settings.currency.clone(),
        };

        match self.checkout.checkout(&order).await {
            Ok(CheckoutMessage::Success { order_id }) => {
                let message = format!("PayPal Success! OrderID: {order_id}");
                PaymentOutcome::succeeded(Some(order_id), message)
            }
            Ok(CheckoutMessage::Cancel) => {
                PaymentOutcome::user_cancelled("PayPal payment cancelled.")
            }
            Ok(CheckoutMessage::Error { error }) => {
                PaymentOutcome::failed(format!("PayPal error: {error}"))
            }
            Err(err) => PaymentOutcome::failed(err.to_string()),
        }
    }

    async fn pay_points(&self, vehicle: &str, amount: Amount) -> PaymentOutcome {
        let payment = PointsPayment {
            user_id: self.settings.user_id.clone(),
            vehicle_id: vehicle.to_string(),
            amount,
        };

        match self.backend.pay_points(&payment).await {
            Ok(ack) => PaymentOutcome::succeeded(
                None,
                ack.message
                    .unwrap_or_else(|| format!("Paid {amount} points for {vehicle}.")),
            ),
            Err(err) => PaymentOutcome::failed(err.message()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::PaymentStatus;
    use crate::error::BackendError;
    use crate::infrastructure::in_memory::{InMemoryBackend, InMemoryCheckout, InMemoryLedger};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    struct Fixture {
        ledger: Arc<InMemoryLedger>,
        backend: Arc<InMemoryBackend>,
        checkout: Arc<InMemoryCheckout>,
        orchestrator: Arc<PaymentOrchestrator>,
    }

    fn fixture() -> Fixture {
        let ledger = Arc::new(InMemoryLedger::new());
        let backend = Arc::new(InMemoryBackend::new());
        let checkout = Arc::new(InMemoryCheckout::new());
        let orchestrator = Arc::new(PaymentOrchestrator::new(
            ledger.clone(),
            backend.clone(),
            checkout.clone(),
            OrchestratorSettings {
                user_id: "user-1".to_string(),
                default_fee: Amount::new(dec!(200)).unwrap(),
                currency: "USD".to_string(),
            },
            RefreshHub::new(),
        ));
        Fixture {
            ledger,
            backend,
            checkout,
            orchestrator,
        }
    }

    fn amount(value: rust_decimal::Decimal) -> Amount {
        Amount::new(value).unwrap()
    }

    #[tokio::test]
    async fn test_cash_succeeds_without_provider_calls() {
        let f = fixture();
        let mut signals = f.orchestrator.subscribe();
        let outcome = f
            .orchestrator
            .submit_payment(PaymentRequest::new("ABC-123", PaymentMethod::Cash))
            .await
            .unwrap();

        assert_eq!(outcome.status, PaymentStatus::Succeeded);
        assert!(outcome.reference.is_none());
        assert!(f.backend.calls().await.is_empty());
        assert_eq!(f.ledger.pay_fee_calls(), 0);
        assert_eq!(f.checkout.calls(), 0);
        assert!(signals.try_recv().unwrap().covers(ReadModel::Vehicles));
    }

    #[tokio::test]
    async fn test_blank_vehicle_never_reaches_a_provider() {
        let f = fixture();
        for method in PaymentMethod::ALL {
            let request = PaymentRequest::new("  ", method).with_amount(amount(dec!(5)));
            let result = f.orchestrator.submit_payment(request).await;
            assert!(matches!(result, Err(PaymentError::Validation(_))), "{method}");
        }
        assert!(f.backend.calls().await.is_empty());
        assert_eq!(f.ledger.pay_fee_calls(), 0);
        assert_eq!(f.checkout.calls(), 0);
        assert_eq!(f.orchestrator.attempt_state(), AttemptState::Idle);
    }

    #[tokio::test]
    async fn test_crypto_user_rejection_is_cancelled_not_failed() {
        let f = fixture();
        f.ledger.register_owned("ABC-123", "Mike", dec!(20)).await;
        f.ledger.fail_next_payment(LedgerError::UserRejected).await;

        let outcome = f
            .orchestrator
            .submit_payment(PaymentRequest::new("ABC-123", PaymentMethod::Crypto))
            .await
            .unwrap();

        assert_eq!(outcome.status, PaymentStatus::UserCancelled);
        assert_eq!(outcome.message, "Transaction rejected by user.");
    }

    #[tokio::test]
    async fn test_crypto_other_error_is_failed_with_provider_message() {
        let f = fixture();
        f.ledger
            .fail_next_payment(LedgerError::Rpc {
                code: -32000,
                message: "insufficient funds for gas".to_string(),
            })
            .await;

        let outcome = f
            .orchestrator
            .submit_payment(PaymentRequest::new("ABC-123", PaymentMethod::Crypto))
            .await
            .unwrap();

        assert_eq!(outcome.status, PaymentStatus::Failed);
        assert!(outcome.message.contains("insufficient funds for gas"));
    }

    #[tokio::test]
    async fn test_crypto_success_carries_hash_and_refreshes() {
        let f = fixture();
        f.ledger.register_owned("ABC-123", "Mike", dec!(20)).await;
        let mut signals = f.orchestrator.subscribe();

        let outcome = f
            .orchestrator
            .submit_payment(PaymentRequest::new("ABC-123", PaymentMethod::Crypto))
            .await
            .unwrap();

        assert!(outcome.is_success());
        let hash = outcome.reference.unwrap();
        assert!(hash.starts_with("0x"));
        assert!(outcome.message.contains(&hash));

        let signal = signals.try_recv().unwrap();
        assert!(signal.covers(ReadModel::Vehicles));
        assert!(signal.covers(ReadModel::Points));
        assert!(signal.covers(ReadModel::Cards));
    }

    #[tokio::test]
    async fn test_card_without_saved_card_never_charges() {
        let f = fixture();
        let result = f
            .orchestrator
            .submit_payment(PaymentRequest::new("ABC-123", PaymentMethod::Card))
            .await;

        assert!(matches!(result, Err(PaymentError::NoResource(_))));
        assert!(!f.backend.calls().await.contains(&"POST /pay/card".to_string()));
        assert_eq!(f.orchestrator.attempt_state(), AttemptState::Idle);
    }

    #[tokio::test]
    async fn test_card_charges_first_saved_card_with_default_fee() {
        let f = fixture();
        f.backend.add_card("card_1", "4242", 7, 2027).await;
        let mut signals = f.orchestrator.subscribe();

        let outcome = f
            .orchestrator
            .submit_payment(PaymentRequest::new("ABC-123", PaymentMethod::Card))
            .await
            .unwrap();

        assert!(outcome.is_success());
        assert!(signals.try_recv().unwrap().covers(ReadModel::Cards));
        let charges = f.backend.card_charges().await;
        assert_eq!(charges.len(), 1);
        assert_eq!(charges[0].card_id, "card_1");
        assert_eq!(charges[0].amount.value(), dec!(200));
        assert_eq!(charges[0].user_id, "user-1");
    }

    #[tokio::test]
    async fn test_card_backend_rejection_is_failed_with_backend_message() {
        let f = fixture();
        f.backend.add_card("card_1", "4242", 7, 2027).await;
        f.backend
            .fail_next(BackendError::Status {
                status: 402,
                message: "Card declined".to_string(),
            })
            .await;

        let outcome = f
            .orchestrator
            .submit_payment(PaymentRequest::new("ABC-123", PaymentMethod::Card))
            .await
            .unwrap();

        assert_eq!(outcome.status, PaymentStatus::Failed);
        assert_eq!(outcome.message, "Card declined");
    }

    #[tokio::test]
    async fn test_paypal_terminal_messages() {
        let f = fixture();
        let mut signals = f.orchestrator.subscribe();

        f.checkout
            .reply_with(CheckoutMessage::Success {
                order_id: "ORDER-1".to_string(),
            })
            .await;
        let outcome = f
            .orchestrator
            .submit_payment(PaymentRequest::new("ABC-123", PaymentMethod::PayPal))
            .await
            .unwrap();
        assert!(outcome.is_success());
        assert_eq!(outcome.reference.as_deref(), Some("ORDER-1"));
        assert!(signals.try_recv().unwrap().covers(ReadModel::Vehicles));

        f.checkout.reply_with(CheckoutMessage::Cancel).await;
        let outcome = f
            .orchestrator
            .submit_payment(PaymentRequest::new("ABC-123", PaymentMethod::PayPal))
            .await
            .unwrap();
        assert_eq!(outcome.status, PaymentStatus::UserCancelled);

        f.checkout
            .reply_with(CheckoutMessage::Error {
                error: "popup closed".to_string(),
            })
            .await;
        let outcome = f
            .orchestrator
            .submit_payment(PaymentRequest::new("ABC-123", PaymentMethod::PayPal))
            .await
            .unwrap();
        assert_eq!(outcome.status, PaymentStatus::Failed);
        assert_eq!(outcome.message, "PayPal error: popup closed");
        assert!(signals.try_recv().is_err());

        let orders = f.checkout.orders().await;
        assert_eq!(orders.len(), 3);
        assert_eq!(orders[0].currency, "USD");
        assert_eq!(orders[0].amount.value(), dec!(200));
    }

    #[tokio::test]
    async fn test_points_requires_amount() {
        let f = fixture();
        let result = f
            .orchestrator
            .submit_payment(PaymentRequest::new("ABC-123", PaymentMethod::Points))
            .await;
        assert!(matches!(result, Err(PaymentError::Validation(_))));
        assert!(f.backend.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_points_rejected_leaves_balance_unchanged() {
        let f = fixture();
        f.backend.set_points(dec!(30)).await;
        assert_eq!(
            f.orchestrator.points_balance().await.unwrap().amount(),
            dec!(30)
        );

        let outcome = f
            .orchestrator
            .submit_payment(
                PaymentRequest::new("ABC-123", PaymentMethod::Points).with_amount(amount(dec!(50))),
            )
            .await
            .unwrap();

        assert_eq!(outcome.status, PaymentStatus::Failed);
        assert_eq!(
            f.orchestrator.points_balance().await.unwrap().amount(),
            dec!(30)
        );
    }

    #[tokio::test]
    async fn test_top_up_then_pay_with_points() {
        let f = fixture();
        f.backend.set_points(dec!(30)).await;

        assert!(matches!(
            f.orchestrator.top_up_points(None).await,
            Err(PaymentError::Validation(_))
        ));

        let balance = f
            .orchestrator
            .top_up_points(Some(amount(dec!(40))))
            .await
            .unwrap();
        assert_eq!(balance.amount(), dec!(70));
        assert_eq!(
            f.orchestrator.points_balance().await.unwrap().amount(),
            dec!(70)
        );

        let mut signals = f.orchestrator.subscribe();
        let outcome = f
            .orchestrator
            .submit_payment(
                PaymentRequest::new("ABC-123", PaymentMethod::Points).with_amount(amount(dec!(50))),
            )
            .await
            .unwrap();
        assert!(outcome.is_success());
        assert!(signals.try_recv().unwrap().covers(ReadModel::Points));
        assert_eq!(
            f.orchestrator.points_balance().await.unwrap().amount(),
            dec!(20)
        );
    }

    #[tokio::test]
    async fn test_resubmission_while_awaiting_is_rejected() {
        let f = fixture();
        f.backend.set_points(dec!(30)).await;
        f.ledger.register_owned("ABC-123", "Mike", dec!(20)).await;
        f.ledger.hold_payments();

        let orchestrator = f.orchestrator.clone();
        let first = tokio::spawn(async move {
            orchestrator
                .submit_payment(PaymentRequest::new("ABC-123", PaymentMethod::Crypto))
                .await
        });

        while f.orchestrator.attempt_state() != AttemptState::AwaitingProviderResponse {
            tokio::task::yield_now().await;
        }

        let second = f
            .orchestrator
            .submit_payment(PaymentRequest::new("ABC-123", PaymentMethod::Crypto))
            .await;
        assert!(matches!(second, Err(PaymentError::Busy)));

        // Read-only views stay available during the attempt.
        assert_eq!(
            f.orchestrator.points_balance().await.unwrap().amount(),
            dec!(30)
        );

        f.ledger.release_payments();
        let outcome = first.await.unwrap().unwrap();
        assert!(outcome.is_success());
        assert_eq!(f.ledger.pay_fee_calls(), 1);
        assert_eq!(f.orchestrator.attempt_state(), AttemptState::Idle);
    }

    #[tokio::test]
    async fn test_failed_attempt_returns_to_idle_and_allows_retry() {
        let f = fixture();
        f.ledger.register_owned("ABC-123", "Mike", dec!(20)).await;
        f.ledger
            .fail_next_payment(LedgerError::Transport("connection reset".to_string()))
            .await;

        let first = f
            .orchestrator
            .submit_payment(PaymentRequest::new("ABC-123", PaymentMethod::Crypto))
            .await
            .unwrap();
        assert_eq!(first.status, PaymentStatus::Failed);
        assert_eq!(f.orchestrator.attempt_state(), AttemptState::Idle);

        let second = f
            .orchestrator
            .submit_payment(PaymentRequest::new("ABC-123", PaymentMethod::Crypto))
            .await
            .unwrap();
        assert!(second.is_success());
    }

    #[tokio::test]
    async fn test_failed_attempt_emits_no_refresh() {
        let f = fixture();
        let mut signals = f.orchestrator.subscribe();
        f.checkout.reply_with(CheckoutMessage::Cancel).await;

        f.orchestrator
            .submit_payment(PaymentRequest::new("ABC-123", PaymentMethod::PayPal))
            .await
            .unwrap();

        assert!(signals.try_recv().is_err());
    }
}
