//! # Geographic Utilities
//!
//! Distance and bounding-box helpers shared by clustering and ranking.
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`distance_km`] | Great-circle distance between two lat/lng pairs, in kilometres |
//! | [`haversine_km`] | Same, for two [`GpsPoint`]s |
//! | [`km_to_degrees`] | Arc length in kilometres to degrees of latitude |
//! | [`bounds_around`] | Bounding rectangle enclosing every point within a radius |
//!
//! ## Example
//!
//! ```rust
//! use catrees::geo_utils;
//!
//! // Los Angeles to San Francisco
//! let d = geo_utils::distance_km(34.0522, -118.2437, 37.7749, -122.4194);
//! assert!((d - 559.0).abs() < 5.0);
//! ```
//!
//! ## Algorithm Notes
//!
//! ### Haversine Formula
//!
//! Distances are computed on a spherical Earth of radius 6371 km. Over the
//! distances a tree hunt cares about (a few hundred kilometres at most) the
//! spherical error is well under 0.5%.
//!
//! Reference: [Haversine formula (Wikipedia)](https://en.wikipedia.org/wiki/Haversine_formula)
//!
//! ### Radius Bounding Box
//!
//! [`bounds_around`] uses the exact spherical bound on longitude spread,
//! `asin(sin(d / R) / cos(lat))`, so every point within the radius falls
//! inside the rectangle. Near the poles, or when the box would cross the
//! antimeridian, longitude is widened to the full [-180, 180] range.

use geo::{coord, Rect};

use crate::GpsPoint;

/// Mean Earth radius used for all distance calculations.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

// =============================================================================
// Distance Functions
// =============================================================================

/// Great-circle distance in kilometres between `(lat1, lng1)` and `(lat2, lng2)`.
///
/// Inputs are not validated. The result is non-negative, symmetric in its
/// two points, and exactly `0.0` when both points are identical.
///
/// # Example
///
/// ```rust
/// use catrees::geo_utils::distance_km;
///
/// assert_eq!(distance_km(34.0, -118.0, 34.0, -118.0), 0.0);
/// assert!(distance_km(34.0, -118.0, 35.0, -118.0) > 111.0);
/// ```
#[inline]
pub fn distance_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lng2 - lng1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    // Rounding can push `a` a hair past 1.0 for antipodal points
    let c = 2.0 * a.min(1.0).sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Great-circle distance in kilometres between two GPS points.
#[inline]
pub fn haversine_km(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    distance_km(p1.latitude, p1.longitude, p2.latitude, p2.longitude)
}

/// Convert an arc length in kilometres to degrees of latitude.
#[inline]
pub fn km_to_degrees(km: f64) -> f64 {
    (km / EARTH_RADIUS_KM).to_degrees()
}

// =============================================================================
// Bounding Box Functions
// =============================================================================

/// Rectangle (x = longitude, y = latitude) containing every point within
/// `radius_km` of `center`.
///
/// The rectangle is a pre-filter: callers still need an exact distance
/// check on whatever falls inside it.
pub fn bounds_around(center: &GpsPoint, radius_km: f64) -> Rect<f64> {
    let delta = radius_km / EARTH_RADIUS_KM;
    let lat_span = delta.to_degrees();

    let min_lat = (center.latitude - lat_span).max(-90.0);
    let max_lat = (center.latitude + lat_span).min(90.0);

    let cos_lat = center.latitude.to_radians().cos();
    let sin_delta = delta.sin();

    let (min_lng, max_lng) = if min_lat <= -90.0 || max_lat >= 90.0 || sin_delta >= cos_lat {
        (-180.0, 180.0)
    } else {
        let lng_span = (sin_delta / cos_lat).asin().to_degrees();
        let lo = center.longitude - lng_span;
        let hi = center.longitude + lng_span;
        if lo < -180.0 || hi > 180.0 {
            (-180.0, 180.0)
        } else {
            (lo, hi)
        }
    };

    Rect::new(
        coord! { x: min_lng, y: min_lat },
        coord! { x: max_lng, y: max_lat },
    )
}

// =============================================================================
// Unit Tests
// =============================================================================
