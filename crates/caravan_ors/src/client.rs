use std::future::Future;

use caravan_core::directions::{DirectionsError, DirectionsProvider};
use caravan_core::geopoint::GeoPoint;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Provider axis order: (lon, lat).
pub type OrsCoordinate = [f64; 2];

pub const ORS_DIRECTIONS_API_URL: &str =
    "https://api.openrouteservice.org/v2/directions/driving-car/geojson";

/// Laos and Cambodia; combined with `avoid_borders: all` this keeps the
/// returned path inside the national boundary.
pub const DEFAULT_AVOID_COUNTRIES: [u32; 2] = [11, 193];

#[derive(Debug, Error)]
pub enum OrsError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("response contains no route feature")]
    EmptyRoute,
}

#[derive(Debug, Clone, Serialize)]
pub struct DirectionsRequestBody {
    /// Exactly two coordinates in (lon, lat) order.
    pub coordinates: Vec<OrsCoordinate>,

    /// Routing preference, e.g. "recommended"
    pub preference: String,

    /// Ask the provider for a simplified geometry
    pub geometry_simplify: bool,

    pub options: DirectionsRequestOptions,
}

#[derive(Debug, Clone, Serialize)]
pub struct DirectionsRequestOptions {
    pub avoid_borders: String,
    pub avoid_countries: Vec<u32>,
}

#[derive(Deserialize)]
struct DirectionsResponse {
    features: Vec<DirectionsFeature>,
}

#[derive(Deserialize)]
struct DirectionsFeature {
    geometry: DirectionsGeometry,
}

#[derive(Deserialize)]
struct DirectionsGeometry {
    coordinates: Vec<OrsCoordinate>,
}

pub struct OrsClientParams {
    pub api_key: String,
    pub base_url: String,
    pub avoid_countries: Vec<u32>,
}

impl OrsClientParams {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: ORS_DIRECTIONS_API_URL.to_string(),
            avoid_countries: DEFAULT_AVOID_COUNTRIES.to_vec(),
        }
    }
}

pub struct OrsClient {
    params: OrsClientParams,
    client: reqwest::Client,
}

impl OrsClient {
    pub fn new(params: OrsClientParams) -> Self {
        Self {
            params,
            client: reqwest::Client::new(),
        }
    }

    pub async fn fetch_directions(
        &self,
        origin: GeoPoint,
        dest: GeoPoint,
    ) -> Result<Vec<GeoPoint>, OrsError> {
        let body = DirectionsRequestBody {
            coordinates: vec![(&origin).into(), (&dest).into()],
            preference: String::from("recommended"),
            geometry_simplify: true,
            options: DirectionsRequestOptions {
                avoid_borders: String::from("all"),
                avoid_countries: self.params.avoid_countries.clone(),
            },
        };

        debug!("OrsClient: requesting directions");

        let response = self
            .client
            .post(&self.params.base_url)
            .header("Authorization", &self.params.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(OrsError::Api { status, message });
        }

        let directions: DirectionsResponse = response.json().await?;
        let feature = directions.features.first().ok_or(OrsError::EmptyRoute)?;

        Ok(path_from_coordinates(&feature.geometry.coordinates))
    }
}

/// Convert the provider's (lon, lat) coordinate list back to (lat, lng).
fn path_from_coordinates(coordinates: &[OrsCoordinate]) -> Vec<GeoPoint> {
    coordinates
        .iter()
        .map(|coordinate| GeoPoint::new(coordinate[1], coordinate[0]))
        .collect()
}

impl DirectionsProvider for OrsClient {
    fn directions(
        &self,
        origin: GeoPoint,
        dest: GeoPoint,
    ) -> impl Future<Output = Result<Vec<GeoPoint>, DirectionsError>> + Send {
        async move {
            self.fetch_directions(origin, dest)
                .await
                .map_err(|err| match err {
                    OrsError::Api { status, message } => DirectionsError::Api { status, message },
                    OrsError::EmptyRoute => DirectionsError::EmptyRoute,
                    OrsError::Request(err) => DirectionsError::Transport(err.to_string()),
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_matches_provider_wire_contract() {
        let body = DirectionsRequestBody {
            coordinates: vec![[106.70, 10.77], [105.85, 21.02]],
            preference: String::from("recommended"),
            geometry_simplify: true,
            options: DirectionsRequestOptions {
                avoid_borders: String::from("all"),
                avoid_countries: DEFAULT_AVOID_COUNTRIES.to_vec(),
            },
        };

        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "coordinates": [[106.70, 10.77], [105.85, 21.02]],
                "preference": "recommended",
                "geometry_simplify": true,
                "options": {
                    "avoid_borders": "all",
                    "avoid_countries": [11, 193]
                }
            })
        );
    }

    #[test]
    fn coordinates_are_sent_in_lon_lat_order() {
        let origin = GeoPoint::new(10.77, 106.70);
        let coordinate: OrsCoordinate = (&origin).into();
        assert_eq!(coordinate, [106.70, 10.77]);
    }

    #[test]
    fn response_path_converts_back_to_lat_lng() {
        let response: DirectionsResponse = serde_json::from_str(
            r#"{
                "type": "FeatureCollection",
                "features": [{
                    "type": "Feature",
                    "geometry": {
                        "type": "LineString",
                        "coordinates": [[106.70, 10.77], [106.2, 16.0], [105.85, 21.02]]
                    }
                }]
            }"#,
        )
        .unwrap();

        let path = path_from_coordinates(&response.features[0].geometry.coordinates);
        assert_eq!(path.len(), 3);
        assert_eq!(path[0], GeoPoint::new(10.77, 106.70));
        assert_eq!(path[2], GeoPoint::new(21.02, 105.85));
    }

    #[test]
    fn empty_feature_list_is_an_empty_route() {
        let response: DirectionsResponse =
            serde_json::from_str(r#"{ "type": "FeatureCollection", "features": [] }"#).unwrap();
        assert!(response.features.is_empty());
    }
}
