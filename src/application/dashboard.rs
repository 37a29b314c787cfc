use super::refresh::{ReadModel, RefreshHub, RefreshSignal};
use crate::domain::payment::PaymentOutcome;
use crate::domain::ports::LedgerGatewayArc;
use crate::domain::vehicle::{PaymentRecord, Registration, VehicleInfo};
use crate::error::{LedgerError, PaymentError, Result};
use tracing::{info, warn};

/// Vehicle registration plus the per-account views read from the contract.
pub struct VehicleDashboard {
    ledger: LedgerGatewayArc,
    refresh: RefreshHub,
}

impl VehicleDashboard {
    pub fn new(ledger: LedgerGatewayArc, refresh: RefreshHub) -> Self {
        Self { ledger, refresh }
    }

    /// The wallet account all views are scoped to.
    pub async fn account(&self) -> Result<String> {
        self.ledger.connected_account().await?.ok_or_else(|| {
            PaymentError::NoResource("Please connect your wallet.".to_string())
        })
    }

    /// Registers a vehicle under the connected account.
    ///
    /// Signing is left to the wallet, so a refusal there comes back as a
    /// `UserCancelled` outcome rather than an error.
    pub async fn register_vehicle(
        &self,
        vehicle_number: &str,
        user_name: &str,
    ) -> Result<PaymentOutcome> {
        let registration = Registration::normalized(vehicle_number, user_name).ok_or_else(|| {
            PaymentError::Validation("Please enter both vehicle number and user name.".to_string())
        })?;

        let outcome = match self.ledger.register_vehicle(&registration).await {
            Ok(hash) => {
                info!(vehicle = %registration.vehicle_number, tx = %hash, "vehicle registered");
                self.refresh.notify(RefreshSignal::new(&[ReadModel::Vehicles]));
                let message = format!("Vehicle registered successfully! Tx Hash: {hash}");
                PaymentOutcome::succeeded(Some(hash), message)
            }
            Err(LedgerError::UserRejected) => {
                PaymentOutcome::user_cancelled(LedgerError::UserRejected.to_string())
            }
            Err(err) => {
                warn!(vehicle = %registration.vehicle_number, "registration failed: {err}");
                PaymentOutcome::failed(format!("Error: {err}"))
            }
        };
        Ok(outcome)
    }

    pub async fn vehicles(&self) -> Result<Vec<VehicleInfo>> {
        let account = self.account().await?;
        Ok(self.ledger.vehicles(&account).await?)
    }

    /// Plates of the connected account's vehicles.
    pub async fn plates(&self) -> Result<Vec<String>> {
        Ok(self
            .vehicles()
            .await?
            .into_iter()
            .map(|v| v.vehicle_number)
            .collect())
    }

    /// Settled payments of the connected account, most recent first.
    pub async fn payment_history(&self) -> Result<Vec<PaymentRecord>> {
        let account = self.account().await?;
        let mut history = self.ledger.payment_history(&account).await?;
        history.sort_by(|a, b| b.paid_at.cmp(&a.paid_at));
        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::PaymentStatus;
    use crate::domain::ports::LedgerGateway;
    use crate::infrastructure::in_memory::InMemoryLedger;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_register_requires_both_fields() {
        let ledger = Arc::new(InMemoryLedger::new());
        let dashboard = VehicleDashboard::new(ledger, RefreshHub::new());
        let result = dashboard.register_vehicle("ABC-123", "  ").await;
        assert!(matches!(result, Err(PaymentError::Validation(_))));
    }

    #[tokio::test]
    async fn test_register_then_list() {
        let ledger = Arc::new(InMemoryLedger::new());
        let hub = RefreshHub::new();
        let mut signals = hub.subscribe();
        let dashboard = VehicleDashboard::new(ledger, hub);

        let outcome = dashboard.register_vehicle("ABC-123", "Mike").await.unwrap();
        assert!(outcome.is_success());
        assert!(signals.try_recv().unwrap().covers(ReadModel::Vehicles));

        let vehicles = dashboard.vehicles().await.unwrap();
        assert_eq!(vehicles.len(), 1);
        assert_eq!(vehicles[0].user_name, "Mike");
        assert_eq!(dashboard.plates().await.unwrap(), vec!["ABC-123".to_string()]);
    }

    #[tokio::test]
    async fn test_register_rejected_by_wallet() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.fail_next_payment(LedgerError::UserRejected).await;
        let dashboard = VehicleDashboard::new(ledger, RefreshHub::new());

        let outcome = dashboard.register_vehicle("ABC-123", "Mike").await.unwrap();
        assert_eq!(outcome.status, PaymentStatus::UserCancelled);
        assert_eq!(outcome.message, "Transaction rejected by user.");
    }

    #[tokio::test]
    async fn test_views_need_a_connected_wallet() {
        let ledger = Arc::new(InMemoryLedger::disconnected());
        let dashboard = VehicleDashboard::new(ledger, RefreshHub::new());
        assert!(matches!(
            dashboard.vehicles().await,
            Err(PaymentError::NoResource(_))
        ));
        assert!(matches!(
            dashboard.payment_history().await,
            Err(PaymentError::NoResource(_))
        ));
    }

    #[tokio::test]
    async fn test_history_lists_paid_fees() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.register_owned("ABC-123", "Mike", dec!(40)).await;
        ledger.pay_fee("ABC-123").await.unwrap();
        let dashboard = VehicleDashboard::new(ledger, RefreshHub::new());

        let history = dashboard.payment_history().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].amount_paid, dec!(40));
    }
}
