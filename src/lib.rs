//! # catrees
//!
//! Locate and track California native tree species from crowd-sourced
//! (iNaturalist) observations.
//!
//! This library provides:
//! - Grid clustering of observations into location hotspots
//! - Per-species aggregation across paged observation results
//! - Life-list matching with subspecies to binomial fallback
//! - Distance ranking and radius search from a reference point
//!
//! ## Features
//!
//! - **`parallel`** - Parallel distance ranking with rayon
//! - **`serde`** - `Serialize`/`Deserialize` on result types
//! - **`http`** - iNaturalist HTTP client with paged fetching
//! - **`cli`** - The `catrees` command-line binary
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use catrees::{cluster, rank, GpsPoint, Observation};
//!
//! let observations = vec![
//!     Observation::new("Quercus agrifolia", GpsPoint::new(34.00, -118.00), "2023-01-01"),
//!     Observation::new("Quercus agrifolia", GpsPoint::new(34.01, -118.01), "2023-06-01"),
//! ];
//!
//! let clusters = cluster(&observations, 0.1).unwrap();
//! assert_eq!(clusters.len(), 1);
//! assert_eq!(clusters[0].count, 2);
//! assert_eq!(clusters[0].last_seen, "2023-06-01");
//!
//! let ranked = rank(&observations, 34.0, -118.0);
//! assert_eq!(ranked[0].distance_km, 0.0);
//! ```

pub mod error;
pub use error::{CatreesError, Result};

pub mod geo_utils;

// Grid clustering of observations into hotspots
pub mod clustering;
pub use clustering::{cluster, cluster_with_config, Cluster, ClusterConfig};

// Per-species aggregation across pages
pub mod aggregation;
pub use aggregation::{aggregate, SpeciesAggregator, SpeciesSummary};

// Life-list matching
pub mod seen;
pub use seen::{binomial, is_seen, record_seen, SeenSet};

// Distance ranking and radius search
pub mod ranking;
pub use ranking::{rank, RankedObservation, SpatialIndex};
#[cfg(feature = "parallel")]
pub use ranking::rank_parallel;

// Page iteration for paged observation sources
pub mod paging;
pub use paging::PageCursor;

// HTTP module for observation fetching
#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::{InatClient, InatConfig, NearbyQuery, Taxon};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use catrees::GpsPoint;
/// let point = GpsPoint::new(34.0522, -118.2437); // Los Angeles
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

impl From<GpsPoint> for geo::Point<f64> {
    fn from(p: GpsPoint) -> Self {
        geo::Point::new(p.longitude, p.latitude)
    }
}

/// A single reported sighting of a taxon.
///
/// Records come from an observation source already parsed. A record whose
/// coordinates could not be parsed carries `location: None`; components that
/// need coordinates skip it.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Observation {
    /// Scientific name as reported (any case)
    pub taxon_name: String,
    /// Preferred common name, when the source has one
    pub common_name: Option<String>,
    /// Where the observation was made
    pub location: Option<GpsPoint>,
    /// ISO date (`YYYY-MM-DD`), empty when unknown
    pub observed_on: String,
    /// Free-text place description
    pub place_guess: Option<String>,
}

impl Observation {
    /// Create an observation with a location and date and no names beyond the taxon.
    pub fn new(taxon_name: &str, location: GpsPoint, observed_on: &str) -> Self {
        Self {
            taxon_name: taxon_name.to_string(),
            common_name: None,
            location: Some(location),
            observed_on: observed_on.to_string(),
            place_guess: None,
        }
    }

    /// Set the common name.
    pub fn with_common_name(mut self, common_name: &str) -> Self {
        self.common_name = Some(common_name.to_string());
        self
    }

    /// Set the place description.
    pub fn with_place_guess(mut self, place_guess: &str) -> Self {
        self.place_guess = Some(place_guess.to_string());
        self
    }

    /// The location, if present and within coordinate bounds.
    pub fn valid_location(&self) -> Option<GpsPoint> {
        self.location.filter(GpsPoint::is_valid)
    }
}

/// One place a species was seen, kept on its [`SpeciesSummary`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ObservedLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub observed_on: String,
    pub place_guess: Option<String>,
}

// ============================================================================
// Tests
// ============================================================================
