//! # Geographic Utilities
//!
//! Core geographic computation utilities shared by the region engine and the
//! track analysis half of the crate.
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_km`] | Great-circle distance between two GPS points |
//! | [`polyline_length_km`] | Total length of a GPS track in kilometers |
//! | [`bearing_degrees`] | Initial bearing from one coordinate to another |
//! | [`turn_angle`] | Absolute change between two bearings |
//! | [`point_to_segment_distance_sq`] | Planar squared distance from a point to a segment |
//! | [`km_to_degrees`] | Flat-earth kilometer to degree conversion |
//!
//! ## Example
//!
//! ```rust
//! use patrol_geofence::{GeoPoint, geo_utils};
//!
//! let london = GeoPoint::new(51.5074, -0.1278);
//! let paris = GeoPoint::new(48.8566, 2.3522);
//!
//! let dist = geo_utils::haversine_km(&london, &paris);
//! assert!((dist - 343.5).abs() < 17.0);
//! ```
//!
//! ## Algorithm Notes
//!
//! Distances use the haversine formula on a sphere of radius
//! [`EARTH_RADIUS_KM`]. Buffer distances around region boundaries are converted
//! with the constant [`KM_PER_DEGREE`], which is accurate near the equator and
//! increasingly generous in longitude toward the poles. Protected areas handled
//! here sit well inside ±60° latitude.

use geo::Coord;

use crate::GeoPoint;

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Approximate kilometers per degree of latitude (and of longitude at the equator).
pub const KM_PER_DEGREE: f64 = 111.0;

// =============================================================================
// Distance Functions
// =============================================================================

/// Great-circle distance in kilometers between two coordinates.
///
/// # Example
///
/// ```rust
/// use patrol_geofence::geo_utils::haversine_km_coords;
///
/// let d = haversine_km_coords(-1.2921, 36.8219, -1.2931, 36.8229);
/// assert!(d > 0.1 && d < 0.2);
/// ```
#[inline]
pub fn haversine_km_coords(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Great-circle distance in kilometers between two GPS points.
#[inline]
pub fn haversine_km(p1: &GeoPoint, p2: &GeoPoint) -> f64 {
    haversine_km_coords(p1.latitude, p1.longitude, p2.latitude, p2.longitude)
}

/// Total length of a polyline in kilometers.
///
/// Sums the haversine distance between consecutive points. Empty or
/// single-point tracks return 0.0.
pub fn polyline_length_km(points: &[GeoPoint]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    points
        .windows(2)
        .map(|w| haversine_km(&w[0], &w[1]))
        .sum()
}

// =============================================================================
// Bearings
// =============================================================================

/// Initial bearing in degrees from the first coordinate to the second,
/// normalized to `[0, 360)`.
pub fn bearing_degrees(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let y = delta_lon.sin() * lat2_rad.cos();
    let x = lat1_rad.cos() * lat2_rad.sin() - lat1_rad.sin() * lat2_rad.cos() * delta_lon.cos();

    let bearing = y.atan2(x).to_degrees().rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if bearing >= 360.0 {
        0.0
    } else {
        bearing
    }
}

/// Absolute turn between two bearings, wrapped to at most 180°.
#[inline]
pub fn turn_angle(from: f64, to: f64) -> f64 {
    let change = (to - from).abs();
    if change > 180.0 {
        360.0 - change
    } else {
        change
    }
}

// =============================================================================
// Planar helpers (degree space)
// =============================================================================

/// Convert kilometers to degrees with the flat-earth [`KM_PER_DEGREE`] constant.
#[inline]
pub fn km_to_degrees(km: f64) -> f64 {
    km / KM_PER_DEGREE
}

/// Squared planar distance from `p` to the segment `a`–`b`.
///
/// The closest point is found by projecting onto the segment's line and
/// clamping the parameter to `[0, 1]`. A zero-length segment degrades to the
/// point-to-point distance.
pub fn point_to_segment_distance_sq(p: Coord<f64>, a: Coord<f64>, b: Coord<f64>) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;

    if dx == 0.0 && dy == 0.0 {
        return (p.x - a.x).powi(2) + (p.y - a.y).powi(2);
    }

    let t = ((p.x - a.x) * dx + (p.y - a.y) * dy) / (dx * dx + dy * dy);
    let t = t.clamp(0.0, 1.0);

    let closest_x = a.x + t * dx;
    let closest_y = a.y + t * dy;

    (p.x - closest_x).powi(2) + (p.y - closest_y).powi(2)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    #[test]
    fn test_haversine_same_point() {
        let p = GeoPoint::new(51.5074, -0.1278);
        assert_eq!(haversine_km(&p, &p), 0.0);
    }

    #[test]
    fn test_haversine_london_paris() {
        let london = GeoPoint::new(51.5074, -0.1278);
        let paris = GeoPoint::new(48.8566, 2.3522);
        let dist = haversine_km(&london, &paris);
        // ~344 km, within 5%
        assert!(approx_eq(dist, 344.0, 344.0 * 0.05));
    }

    #[test]
    fn test_haversine_symmetric() {
        let pairs = [
            ((-1.2921, 36.8219), (-2.3333, 34.8333)),
            ((51.5074, -0.1278), (40.7128, -74.0060)),
            ((-33.8688, 151.2093), (35.6762, 139.6503)),
        ];
        for ((lat1, lon1), (lat2, lon2)) in pairs {
            let ab = haversine_km_coords(lat1, lon1, lat2, lon2);
            let ba = haversine_km_coords(lat2, lon2, lat1, lon1);
            assert!(approx_eq(ab, ba, 1e-9));
        }
    }

    #[test]
    fn test_haversine_one_degree_latitude() {
        let d = haversine_km_coords(0.0, 0.0, 1.0, 0.0);
        assert!(approx_eq(d, 111.19, 0.1));
    }

    #[test]
    fn test_polyline_length() {
        assert_eq!(polyline_length_km(&[]), 0.0);
        assert_eq!(polyline_length_km(&[GeoPoint::new(0.0, 0.0)]), 0.0);

        let track = vec![
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(0.0, 1.0),
            GeoPoint::new(0.0, 2.0),
        ];
        let length = polyline_length_km(&track);
        assert!(approx_eq(length, 2.0 * 111.19, 0.5));
    }

    #[test]
    fn test_bearing_cardinal_directions() {
        assert!(approx_eq(bearing_degrees(0.0, 0.0, 1.0, 0.0), 0.0, 1e-6));
        assert!(approx_eq(bearing_degrees(0.0, 0.0, 0.0, 1.0), 90.0, 1e-6));
        assert!(approx_eq(bearing_degrees(0.0, 0.0, -1.0, 0.0), 180.0, 1e-6));
        assert!(approx_eq(bearing_degrees(0.0, 0.0, 0.0, -1.0), 270.0, 1e-6));
    }

    #[test]
    fn test_bearing_range() {
        for (lat2, lon2) in [(0.5, -0.5), (-0.5, -0.5), (-0.5, 0.5), (0.5, 0.5)] {
            let b = bearing_degrees(0.0, 0.0, lat2, lon2);
            assert!((0.0..360.0).contains(&b));
        }
    }

    #[test]
    fn test_turn_angle_wraps() {
        assert_eq!(turn_angle(10.0, 350.0), 20.0);
        assert_eq!(turn_angle(350.0, 10.0), 20.0);
        assert_eq!(turn_angle(0.0, 180.0), 180.0);
        assert_eq!(turn_angle(90.0, 135.0), 45.0);
    }

    #[test]
    fn test_point_to_segment() {
        let a = Coord { x: 0.0, y: 0.0 };
        let b = Coord { x: 2.0, y: 0.0 };

        // Perpendicular projection inside the segment
        let d = point_to_segment_distance_sq(Coord { x: 1.0, y: 1.0 }, a, b);
        assert!(approx_eq(d, 1.0, 1e-12));

        // Beyond the end clamps to the endpoint
        let d = point_to_segment_distance_sq(Coord { x: 3.0, y: 0.0 }, a, b);
        assert!(approx_eq(d, 1.0, 1e-12));

        // Zero-length segment
        let d = point_to_segment_distance_sq(Coord { x: 3.0, y: 4.0 }, a, a);
        assert!(approx_eq(d, 25.0, 1e-12));
    }

    #[test]
    fn test_km_to_degrees() {
        assert!(approx_eq(km_to_degrees(111.0), 1.0, 1e-12));
        assert!(approx_eq(km_to_degrees(5.0), 0.045045, 1e-6));
    }
}
