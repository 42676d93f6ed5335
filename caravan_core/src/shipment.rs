use std::fmt;
use std::str::FromStr;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geopoint::GeoPoint;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShipmentId(pub i64);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VehicleId(pub i64);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WarehouseId(pub i64);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShipmentStatus {
    Pending,
    Moving,
    Completed,
}

impl ShipmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ShipmentStatus::Completed)
    }

    /// Transitions are monotonic with no skipping: Pending -> Moving ->
    /// Completed.
    pub fn can_transition_to(&self, next: ShipmentStatus) -> bool {
        matches!(
            (self, next),
            (ShipmentStatus::Pending, ShipmentStatus::Moving)
                | (ShipmentStatus::Moving, ShipmentStatus::Completed)
        )
    }
}

impl fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                ShipmentStatus::Pending => "Pending",
                ShipmentStatus::Moving => "Moving",
                ShipmentStatus::Completed => "Completed",
            }
        )
    }
}

#[derive(Debug, Error)]
#[error("unrecognized shipment status: {0}")]
pub struct ParseStatusError(pub String);

impl FromStr for ShipmentStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(ShipmentStatus::Pending),
            "Moving" => Ok(ShipmentStatus::Moving),
            "Completed" => Ok(ShipmentStatus::Completed),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shipment {
    pub id: ShipmentId,
    pub origin_warehouse: WarehouseId,
    pub dest_warehouse: WarehouseId,
    pub vehicle: VehicleId,
    pub origin: GeoPoint,
    pub dest: GeoPoint,
    pub weight_kg: f64,
    pub scheduled_at: Timestamp,
    pub status: ShipmentStatus,
    pub total_distance_km: f64,
    pub total_time_hours: f64,
}

/// Creation input; the store assigns the id and starts the shipment
/// Pending with zeroed totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewShipment {
    pub origin_warehouse: WarehouseId,
    pub dest_warehouse: WarehouseId,
    pub vehicle: VehicleId,
    pub origin: GeoPoint,
    pub dest: GeoPoint,
    pub weight_kg: f64,
    pub scheduled_at: Timestamp,
}

/// Append-only trail entry recorded alongside every status write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub status: ShipmentStatus,
    pub total_distance_km: f64,
    pub total_time_hours: f64,
    pub recorded_at: Timestamp,
}

#[derive(Debug, Clone, Default)]
pub struct ShipmentFilter {
    pub from: Option<Timestamp>,
    pub to: Option<Timestamp>,
    pub vehicle: Option<VehicleId>,
    pub dest_warehouse: Option<WarehouseId>,
}
