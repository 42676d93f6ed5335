use std::future::Future;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use caravan_core::directions::{DirectionsError, DirectionsProvider};
use caravan_core::geofence::GeofenceIndex;
use caravan_core::geopoint::GeoPoint;
use caravan_core::shipment::{
    HistoryEntry, NewShipment, Shipment, ShipmentFilter, ShipmentId, ShipmentStatus, VehicleId,
    WarehouseId,
};
use caravan_core::store::{ShipmentStore, StoreError};
use fxhash::FxHashMap;
use jiff::Timestamp;
use parking_lot::Mutex;

/// Rectangle covering all of Vietnam with generous margins.
pub fn vietnam_geofence() -> GeofenceIndex {
    GeofenceIndex::from_geojson(
        r#"{
            "type": "Polygon",
            "coordinates": [[[102, 8], [110, 8], [110, 24], [102, 24], [102, 8]]]
        }"#,
    )
    .expect("test boundary must parse")
}

pub fn new_shipment_between(origin: GeoPoint, dest: GeoPoint, vehicle: i64) -> NewShipment {
    NewShipment {
        origin_warehouse: WarehouseId(1),
        dest_warehouse: WarehouseId(2),
        vehicle: VehicleId(vehicle),
        origin,
        dest,
        weight_kg: 1500.0,
        scheduled_at: "2025-06-01T08:00:00Z".parse().unwrap(),
    }
}

/// Scripted routing provider: fails a fixed number of times, then returns
/// a canned path. `hanging()` never resolves, for run-in-progress tests.
pub struct MockDirections {
    path: Vec<GeoPoint>,
    failures_left: AtomicUsize,
    calls: AtomicUsize,
    hang: bool,
}

impl MockDirections {
    pub fn succeeding(path: Vec<GeoPoint>) -> Self {
        Self::failing_then(0, path)
    }

    pub fn failing_then(failures: usize, path: Vec<GeoPoint>) -> Self {
        Self {
            path,
            failures_left: AtomicUsize::new(failures),
            calls: AtomicUsize::new(0),
            hang: false,
        }
    }

    pub fn hanging() -> Self {
        Self {
            path: Vec::new(),
            failures_left: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            hang: true,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DirectionsProvider for MockDirections {
    fn directions(
        &self,
        _origin: GeoPoint,
        _dest: GeoPoint,
    ) -> impl Future<Output = Result<Vec<GeoPoint>, DirectionsError>> + Send {
        async move {
            if self.hang {
                std::future::pending::<()>().await;
            }

            self.calls.fetch_add(1, Ordering::SeqCst);

            let should_fail = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if should_fail {
                return Err(DirectionsError::Api {
                    status: 502,
                    message: String::from("bad gateway"),
                });
            }

            Ok(self.path.clone())
        }
    }
}

/// In-memory stand-in for the persistence service. `update_progress`
/// appends the matching history entry under the same lock, mirroring the
/// no-partial-writes contract.
#[derive(Default)]
pub struct MemoryStore {
    shipments: Mutex<FxHashMap<ShipmentId, Shipment>>,
    history: Mutex<FxHashMap<ShipmentId, Vec<HistoryEntry>>>,
    next_id: AtomicI64,
    failing_update: Mutex<Option<ShipmentId>>,
    updates: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a pre-existing row, e.g. an already-Completed shipment.
    pub fn insert(&self, shipment: Shipment) {
        self.shipments.lock().insert(shipment.id, shipment);
    }

    /// All `update_progress` calls for this shipment will fail.
    pub fn fail_updates_for(&self, id: ShipmentId) {
        *self.failing_update.lock() = Some(id);
    }

    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

impl ShipmentStore for MemoryStore {
    fn query(
        &self,
        filter: &ShipmentFilter,
    ) -> impl Future<Output = Result<Vec<Shipment>, StoreError>> + Send {
        let filter = filter.clone();
        async move {
            let mut shipments: Vec<Shipment> = self
                .shipments
                .lock()
                .values()
                .filter(|s| filter.from.is_none_or(|from| s.scheduled_at >= from))
                .filter(|s| filter.to.is_none_or(|to| s.scheduled_at <= to))
                .filter(|s| filter.vehicle.is_none_or(|v| s.vehicle == v))
                .filter(|s| filter.dest_warehouse.is_none_or(|w| s.dest_warehouse == w))
                .cloned()
                .collect();
            shipments.sort_by_key(|s| s.scheduled_at);
            Ok(shipments)
        }
    }

    fn create(
        &self,
        shipment: NewShipment,
    ) -> impl Future<Output = Result<Shipment, StoreError>> + Send {
        async move {
            let id = ShipmentId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
            let shipment = Shipment {
                id,
                origin_warehouse: shipment.origin_warehouse,
                dest_warehouse: shipment.dest_warehouse,
                vehicle: shipment.vehicle,
                origin: shipment.origin,
                dest: shipment.dest,
                weight_kg: shipment.weight_kg,
                scheduled_at: shipment.scheduled_at,
                status: ShipmentStatus::Pending,
                total_distance_km: 0.0,
                total_time_hours: 0.0,
            };
            self.shipments.lock().insert(id, shipment.clone());
            Ok(shipment)
        }
    }

    fn get(&self, id: ShipmentId) -> impl Future<Output = Result<Shipment, StoreError>> + Send {
        async move {
            self.shipments
                .lock()
                .get(&id)
                .cloned()
                .ok_or(StoreError::NotFound(id))
        }
    }

    fn update_progress(
        &self,
        id: ShipmentId,
        status: ShipmentStatus,
        total_distance_km: f64,
        total_time_hours: f64,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        async move {
            if *self.failing_update.lock() == Some(id) {
                return Err(StoreError::Backend(anyhow::anyhow!(
                    "injected persistence failure"
                )));
            }

            let mut shipments = self.shipments.lock();
            let shipment = shipments.get_mut(&id).ok_or(StoreError::NotFound(id))?;
            shipment.status = status;
            shipment.total_distance_km = total_distance_km;
            shipment.total_time_hours = total_time_hours;

            self.history.lock().entry(id).or_default().push(HistoryEntry {
                status,
                total_distance_km,
                total_time_hours,
                recorded_at: Timestamp::now(),
            });
            self.updates.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn history(
        &self,
        id: ShipmentId,
    ) -> impl Future<Output = Result<Vec<HistoryEntry>, StoreError>> + Send {
        async move { Ok(self.history.lock().get(&id).cloned().unwrap_or_default()) }
    }
}
