use std::future::Future;

use thiserror::Error;

use crate::shipment::{HistoryEntry, NewShipment, Shipment, ShipmentFilter, ShipmentId, ShipmentStatus};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("shipment not found: {0:?}")]
    NotFound(ShipmentId),

    #[error("persistence failure: {0}")]
    Backend(#[from] anyhow::Error),
}

/// Persistence seam, consumed here and implemented by the surrounding
/// application.
pub trait ShipmentStore: Send + Sync {
    fn query(
        &self,
        filter: &ShipmentFilter,
    ) -> impl Future<Output = Result<Vec<Shipment>, StoreError>> + Send;

    /// Creates the shipment Pending with zeroed totals.
    fn create(&self, shipment: NewShipment)
    -> impl Future<Output = Result<Shipment, StoreError>> + Send;

    fn get(&self, id: ShipmentId) -> impl Future<Output = Result<Shipment, StoreError>> + Send;

    /// Persists status and cumulative totals. Implementations must append
    /// exactly one matching history record in the same write; callers rely
    /// on there being no partial writes.
    fn update_progress(
        &self,
        id: ShipmentId,
        status: ShipmentStatus,
        total_distance_km: f64,
        total_time_hours: f64,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// History entries ordered by time ascending.
    fn history(
        &self,
        id: ShipmentId,
    ) -> impl Future<Output = Result<Vec<HistoryEntry>, StoreError>> + Send;
}
