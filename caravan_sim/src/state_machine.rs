use std::sync::Arc;

use caravan_core::shipment::{ParseStatusError, Shipment, ShipmentId, ShipmentStatus};
use caravan_core::store::{ShipmentStore, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransitionError {
    #[error(transparent)]
    UnknownStatus(#[from] ParseStatusError),

    #[error("invalid transition from {from} to {to}")]
    Validation {
        from: ShipmentStatus,
        to: ShipmentStatus,
    },

    #[error("shipment {0:?} is already completed")]
    Conflict(ShipmentId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Validates and persists shipment status transitions. Every successful
/// transition results in one status write and, through the store
/// contract, one appended history record; on any error the in-memory
/// shipment is left untouched.
pub struct ShipmentStateMachine<S> {
    store: Arc<S>,
}

impl<S: ShipmentStore> ShipmentStateMachine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn transition(
        &self,
        shipment: &mut Shipment,
        next: ShipmentStatus,
        distance_delta_km: f64,
        time_delta_hours: f64,
    ) -> Result<(), TransitionError> {
        if shipment.status.is_terminal() {
            return Err(TransitionError::Conflict(shipment.id));
        }
        if !shipment.status.can_transition_to(next) {
            return Err(TransitionError::Validation {
                from: shipment.status,
                to: next,
            });
        }

        let total_distance_km = shipment.total_distance_km + distance_delta_km;
        let total_time_hours = shipment.total_time_hours + time_delta_hours;

        self.store
            .update_progress(shipment.id, next, total_distance_km, total_time_hours)
            .await?;

        shipment.status = next;
        shipment.total_distance_km = total_distance_km;
        shipment.total_time_hours = total_time_hours;
        Ok(())
    }

    /// Front door for callers holding a status name rather than the enum.
    pub async fn transition_named(
        &self,
        shipment: &mut Shipment,
        status: &str,
        distance_delta_km: f64,
        time_delta_hours: f64,
    ) -> Result<(), TransitionError> {
        let next: ShipmentStatus = status.parse()?;
        self.transition(shipment, next, distance_delta_km, time_delta_hours)
            .await
    }
}
