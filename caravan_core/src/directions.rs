use std::future::Future;

use thiserror::Error;

use crate::geopoint::GeoPoint;

#[derive(Debug, Error)]
pub enum DirectionsError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("provider returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("provider response contains no route geometry")]
    EmptyRoute,
}

/// External routing provider returning a driving path between two points,
/// in (lat, lng) order.
pub trait DirectionsProvider: Send + Sync {
    fn directions(
        &self,
        origin: GeoPoint,
        dest: GeoPoint,
    ) -> impl Future<Output = Result<Vec<GeoPoint>, DirectionsError>> + Send;
}
