use rand::Rng;

use crate::geopoint::GeoPoint;

pub const MIN_SPEED_KMH: f64 = 30.0;
pub const MAX_SPEED_KMH: f64 = 60.0;

/// One simulated travel hop between two consecutive route points.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Hop {
    pub distance_km: f64,
    pub speed_kmh: f64,
    pub time_hours: f64,
}

/// The speed stands in for vehicle telemetry and is drawn uniformly from
/// [30, 60) km/h; pass a seeded rng for deterministic sequences.
pub fn simulate_hop<R: Rng>(from: &GeoPoint, to: &GeoPoint, rng: &mut R) -> Hop {
    let distance_km = from.haversine_km(to);
    let speed_kmh = rng.random_range(MIN_SPEED_KMH..MAX_SPEED_KMH);

    Hop {
        distance_km,
        speed_kmh,
        time_hours: distance_km / speed_kmh,
    }
}
