//! Utility functions for the matchmaking core

use crate::types::GeoPoint;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new unique pair ID
pub fn generate_pair_id() -> Uuid {
    Uuid::new_v4()
}

/// Generate a new unique lock token
pub fn generate_lock_token() -> Uuid {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Great-circle distance between two points in kilometers (haversine)
pub fn distance_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;

    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Absolute age difference in years, when both ages are known
pub fn age_difference(age_a: Option<u32>, age_b: Option<u32>) -> Option<u32> {
    match (age_a, age_b) {
        (Some(a), Some(b)) => Some(a.abs_diff(b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_unique_ids() {
        let id1 = generate_pair_id();
        let id2 = generate_pair_id();
        assert_ne!(id1, id2);

        let token1 = generate_lock_token();
        let token2 = generate_lock_token();
        assert_ne!(token1, token2);
    }

    #[test]
    fn test_distance_km() {
        let moscow = GeoPoint {
            latitude: 55.7558,
            longitude: 37.6173,
        };
        let spb = GeoPoint {
            latitude: 59.9311,
            longitude: 30.3609,
        };

        let d = distance_km(&moscow, &spb);
        // Roughly 630 km apart
        assert!(d > 600.0 && d < 660.0);

        assert!(distance_km(&moscow, &moscow) < 1e-6);
    }

    #[test]
    fn test_age_difference() {
        assert_eq!(age_difference(Some(25), Some(30)), Some(5));
        assert_eq!(age_difference(Some(30), Some(25)), Some(5));
        assert_eq!(age_difference(None, Some(25)), None);
        assert_eq!(age_difference(Some(25), None), None);
    }
}
