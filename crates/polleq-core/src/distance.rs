//! Great-circle distance and the log transform applied to distances.

/// Mean earth radius in meters (IUGG).
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Distances are floored to this value before taking the log so zero-length
/// trips stay finite.
pub const LOG_DISTANCE_FLOOR_M: f64 = 0.001;

/// Haversine distance in meters between two (lat, lon) points given in degrees.
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();
    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

/// Natural log of a distance, with zeros (and anything below the floor) raised to
/// [`LOG_DISTANCE_FLOOR_M`].
pub fn log_distance(distance_m: f64) -> f64 {
    distance_m.max(LOG_DISTANCE_FLOOR_M).ln()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_zero_for_same_point() {
        assert_eq!(haversine_m(33.7, -84.4, 33.7, -84.4), 0.0);
    }

    #[test]
    fn haversine_one_degree_of_latitude() {
        // one degree of arc is R * pi / 180
        let d = haversine_m(0.0, 0.0, 1.0, 0.0);
        let expected = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;
        assert!((d - expected).abs() < 1e-6, "{d} vs {expected}");
    }

    #[test]
    fn haversine_is_symmetric() {
        let a = haversine_m(33.75, -84.39, 33.45, -84.15);
        let b = haversine_m(33.45, -84.15, 33.75, -84.39);
        assert!((a - b).abs() < 1e-9);
        assert!(a > 30_000.0 && a < 50_000.0);
    }

    #[test]
    fn log_distance_floors_zero() {
        assert_eq!(log_distance(0.0), LOG_DISTANCE_FLOOR_M.ln());
        assert!((log_distance(1000.0).exp() - 1000.0).abs() < 1e-9);
    }
}
