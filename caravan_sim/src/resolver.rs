use std::sync::Arc;
use std::time::Duration;

use caravan_core::directions::{DirectionsError, DirectionsProvider};
use caravan_core::geofence::GeofenceIndex;
use caravan_core::geopoint::GeoPoint;
use thiserror::Error;
use tracing::{debug, warn};

/// Bounded retry with doubling delay between attempts.
#[derive(Debug, Copy, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("routing provider unavailable after {attempts} attempts")]
    Unavailable {
        attempts: u32,
        #[source]
        source: DirectionsError,
    },
}

/// Resolves a driving path between two points, constrained to the
/// geofence. Endpoints outside the boundary short-circuit to a straight
/// line without touching the provider.
pub struct RouteResolver<P> {
    geofence: Arc<GeofenceIndex>,
    provider: P,
    retry: RetryPolicy,
}

impl<P: DirectionsProvider> RouteResolver<P> {
    pub fn new(geofence: Arc<GeofenceIndex>, provider: P, retry: RetryPolicy) -> Self {
        Self {
            geofence,
            provider,
            retry,
        }
    }

    pub fn geofence(&self) -> &GeofenceIndex {
        &self.geofence
    }

    /// The returned path always has at least two points.
    pub async fn resolve(
        &self,
        origin: GeoPoint,
        dest: GeoPoint,
    ) -> Result<Vec<GeoPoint>, RouteError> {
        if !self.geofence.contains_point(&origin) || !self.geofence.contains_point(&dest) {
            debug!("endpoint outside boundary, falling back to straight line");
            return Ok(vec![origin, dest]);
        }

        let path = self.fetch_with_retry(origin, dest).await?;

        // Clip the provider path to the boundary. Endpoints are not exempt;
        // the fallback below keeps the result valid if the clip drops them.
        let clipped: Vec<GeoPoint> = path
            .into_iter()
            .filter(|point| self.geofence.contains_point(point))
            .collect();

        if clipped.len() < 2 {
            debug!("clipped path too short, falling back to straight line");
            return Ok(vec![origin, dest]);
        }

        Ok(clipped)
    }

    async fn fetch_with_retry(
        &self,
        origin: GeoPoint,
        dest: GeoPoint,
    ) -> Result<Vec<GeoPoint>, RouteError> {
        let mut delay = self.retry.initial_delay;
        let mut attempt = 1;

        loop {
            match self.provider.directions(origin, dest).await {
                Ok(path) => return Ok(path),
                Err(source) if attempt >= self.retry.max_attempts => {
                    return Err(RouteError::Unavailable {
                        attempts: attempt,
                        source,
                    });
                }
                Err(err) => {
                    warn!(
                        "directions request failed (attempt {attempt}/{}): {err}",
                        self.retry.max_attempts
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
            }
        }
    }
}
