pub mod directions;
pub mod geofence;
pub mod geopoint;
pub mod kinematics;
pub mod shipment;
pub mod store;
