use geojson::{GeoJson, Geometry, Value};
use thiserror::Error;
use tracing::debug;

use crate::geopoint::GeoPoint;

/// Added to the edge's vertical span so horizontal edges never divide by zero.
const EDGE_EPSILON: f64 = 1e-7;

#[derive(Debug, Error)]
pub enum GeofenceError {
    #[error("invalid boundary GeoJSON: {0}")]
    Parse(#[from] geojson::Error),

    #[error("unsupported boundary geometry: {0}")]
    UnsupportedGeometry(&'static str),

    #[error("boundary contains no polygons")]
    EmptyBoundary,
}

/// One boundary polygon: an exterior ring minus its interior holes.
#[derive(Debug, Clone)]
pub struct GeofencePolygon {
    exterior: Vec<GeoPoint>,
    interiors: Vec<Vec<GeoPoint>>,
}

impl GeofencePolygon {
    pub fn exterior(&self) -> &[GeoPoint] {
        &self.exterior
    }

    fn contains(&self, lat: f64, lng: f64) -> bool {
        ring_contains(&self.exterior, lat, lng)
            && !self
                .interiors
                .iter()
                .any(|ring| ring_contains(ring, lat, lng))
    }
}

/// Boundary region for point-containment queries. Queries made before
/// [`GeofenceIndex::load`] completes resolve as "not contained".
#[derive(Debug, Default)]
pub struct GeofenceIndex {
    polygons: Vec<GeofencePolygon>,
    ready: bool,
}

impl GeofenceIndex {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_geojson(boundary: &str) -> Result<Self, GeofenceError> {
        let mut index = Self::empty();
        index.load(boundary)?;
        Ok(index)
    }

    /// Parses a FeatureCollection, Feature or bare geometry of type Polygon
    /// or MultiPolygon and marks the index ready.
    pub fn load(&mut self, boundary: &str) -> Result<(), GeofenceError> {
        let geojson: GeoJson = boundary.parse()?;

        let mut polygons = Vec::new();
        match geojson {
            GeoJson::FeatureCollection(collection) => {
                for feature in collection.features {
                    if let Some(geometry) = feature.geometry {
                        extract_polygons(&geometry, &mut polygons)?;
                    }
                }
            }
            GeoJson::Feature(feature) => {
                if let Some(geometry) = feature.geometry {
                    extract_polygons(&geometry, &mut polygons)?;
                }
            }
            GeoJson::Geometry(geometry) => extract_polygons(&geometry, &mut polygons)?,
        }

        if polygons.is_empty() {
            return Err(GeofenceError::EmptyBoundary);
        }

        debug!("loaded boundary with {} polygons", polygons.len());

        self.polygons = polygons;
        self.ready = true;
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn polygons(&self) -> &[GeofencePolygon] {
        &self.polygons
    }

    /// Ray-casting containment against every polygon. Fails closed: always
    /// false before the boundary is loaded.
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        if !self.ready {
            return false;
        }

        self.polygons.iter().any(|polygon| polygon.contains(lat, lng))
    }

    pub fn contains_point(&self, point: &GeoPoint) -> bool {
        self.contains(point.lat, point.lng)
    }
}

fn extract_polygons(
    geometry: &Geometry,
    polygons: &mut Vec<GeofencePolygon>,
) -> Result<(), GeofenceError> {
    match &geometry.value {
        Value::Polygon(rings) => polygons.push(polygon_from_rings(rings)),
        Value::MultiPolygon(multi) => {
            for rings in multi {
                polygons.push(polygon_from_rings(rings));
            }
        }
        Value::GeometryCollection(geometries) => {
            for geometry in geometries {
                extract_polygons(geometry, polygons)?;
            }
        }
        other => return Err(GeofenceError::UnsupportedGeometry(other.type_name())),
    }

    Ok(())
}

/// GeoJSON rings are (lon, lat); the first ring is the exterior, the rest
/// are holes.
fn polygon_from_rings(rings: &[Vec<Vec<f64>>]) -> GeofencePolygon {
    let mut rings = rings.iter().map(|ring| ring_points(ring));

    GeofencePolygon {
        exterior: rings.next().unwrap_or_default(),
        interiors: rings.collect(),
    }
}

fn ring_points(ring: &[Vec<f64>]) -> Vec<GeoPoint> {
    ring.iter()
        .filter(|position| position.len() >= 2)
        .map(|position| GeoPoint::new(position[1], position[0]))
        .collect()
}

/// Crossing-number test: odd number of edge crossings on the point's
/// horizontal ray means the point is inside the ring.
fn ring_contains(ring: &[GeoPoint], lat: f64, lng: f64) -> bool {
    if ring.is_empty() {
        return false;
    }

    let (x, y) = (lng, lat);
    let mut inside = false;
    let mut j = ring.len() - 1;

    for i in 0..ring.len() {
        let (xi, yi) = (ring[i].lng, ring[i].lat);
        let (xj, yj) = (ring[j].lng, ring[j].lat);

        let crosses =
            ((yi > y) != (yj > y)) && x < (xj - xi) * (y - yi) / (yj - yi + EDGE_EPSILON) + xi;
        if crosses {
            inside = !inside;
        }

        j = i;
    }

    inside
}
