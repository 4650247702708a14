use super::domain::GeoPoint;

/// Injected distance capability; geocoding lives outside the engine.
pub trait DistanceEstimator: Send + Sync {
    fn distance_km(&self, from: GeoPoint, to: GeoPoint) -> f64;
}

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance between two coordinates.
#[derive(Debug, Default, Clone, Copy)]
pub struct GreatCircleDistance;

impl DistanceEstimator for GreatCircleDistance {
    fn distance_km(&self, from: GeoPoint, to: GeoPoint) -> f64 {
        let lat1 = from.lat.to_radians();
        let lat2 = to.lat.to_radians();
        let dlat = (to.lat - from.lat).to_radians();
        let dlon = (to.lon - from.lon).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_KM * c
    }
}
