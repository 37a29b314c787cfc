use super::dashboard::VehicleDashboard;
use super::refresh::{ReadModel, RefreshHub, RefreshSignal};
use crate::domain::ports::PaymentBackendArc;
use crate::domain::slot::{Slot, SlotView};
use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

/// Booking and clearing of parking slots for the connected account.
///
/// Only plates registered to the account may be parked, and only slots
/// holding one of those plates may be cleared.
pub struct SlotBoard {
    backend: PaymentBackendArc,
    dashboard: Arc<VehicleDashboard>,
    refresh: RefreshHub,
    rate_per_hour: Decimal,
}

impl SlotBoard {
    pub fn new(
        backend: PaymentBackendArc,
        dashboard: Arc<VehicleDashboard>,
        refresh: RefreshHub,
        rate_per_hour: Decimal,
    ) -> Self {
        Self {
            backend,
            dashboard,
            refresh,
            rate_per_hour,
        }
    }

    pub async fn slots(&self) -> Result<Vec<Slot>> {
        let mut slots = self.backend.slots().await?;
        slots.sort_by_key(|s| s.id);
        Ok(slots)
    }

    /// Every slot paired with how it looks to the connected account.
    pub async fn overview(&self) -> Result<Vec<(Slot, SlotView)>> {
        let plates = self.dashboard.plates().await?;
        Ok(self
            .slots()
            .await?
            .into_iter()
            .map(|slot| {
                let view = slot.view(&plates);
                (slot, view)
            })
            .collect())
    }

    pub async fn book_slot(&self, slot_id: u32, plate: &str) -> Result<()> {
        let plate = plate.trim();
        if plate.is_empty() {
            return Err(PaymentError::Validation(
                "Select one of your vehicles.".to_string(),
            ));
        }
        let plates = self.dashboard.plates().await?;
        if !plates.iter().any(|p| p == plate) {
            return Err(PaymentError::Validation(format!(
                "{plate} is not one of your registered vehicles."
            )));
        }

        let slot = self.find(slot_id).await?;
        if !slot.is_free() {
            return Err(PaymentError::Validation(format!(
                "Slot #{slot_id} is not free."
            )));
        }

        self.backend.book_slot(slot_id, plate).await?;
        info!(slot = slot_id, plate = %plate, "slot booked");
        self.notify();
        Ok(())
    }

    pub async fn clear_slot(&self, slot_id: u32) -> Result<()> {
        let plates = self.dashboard.plates().await?;
        let slot = self.find(slot_id).await?;
        if !matches!(slot.view(&plates), SlotView::Mine(_)) {
            return Err(PaymentError::Validation(format!(
                "Slot #{slot_id} is not occupied by one of your vehicles."
            )));
        }

        self.backend.clear_slot(slot_id, self.rate_per_hour).await?;
        info!(slot = slot_id, rate = %self.rate_per_hour, "slot cleared");
        self.notify();
        Ok(())
    }

    async fn find(&self, slot_id: u32) -> Result<Slot> {
        self.backend
            .slots()
            .await?
            .into_iter()
            .find(|s| s.id == slot_id)
            .ok_or_else(|| PaymentError::NoResource(format!("Slot #{slot_id} does not exist.")))
    }

    fn notify(&self) {
        // Clearing bills the parked hours to the vehicle, so its fee changes too.
        self.refresh
            .notify(RefreshSignal::new(&[ReadModel::Slots, ReadModel::Vehicles]));
    }
}
