//! # Distance Ranking
//!
//! Orders observations of a species by distance from a reference point.
//!
//! - [`rank`] sorts a whole batch, nearest first.
//! - [`rank_parallel`] (feature `parallel`) computes distances with rayon;
//!   the output is identical to [`rank`].
//! - [`SpatialIndex`] keeps observations in an R-tree for repeated
//!   "what's within N km of here" queries.
//!
//! Sorting is stable: observations at equal distance keep their input order.

use log::debug;
use rstar::{RTree, RTreeObject, AABB};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::{CatreesError, Result};
use crate::geo_utils::{bounds_around, distance_km};
use crate::{GpsPoint, Observation};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An observation paired with its distance from the query point
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RankedObservation {
    pub distance_km: f64,
    pub observation: Observation,
}

/// Rank observations by great-circle distance from `(from_lat, from_lng)`.
///
/// Observations without a usable location are left out. Empty input gives
/// empty output.
///
/// # Example
///
/// ```rust
/// use catrees::{rank, GpsPoint, Observation};
///
/// let observations = vec![
///     Observation::new("Pinus coulteri", GpsPoint::new(35.0, -119.0), ""),
///     Observation::new("Pinus coulteri", GpsPoint::new(34.0, -118.0), ""),
/// ];
///
/// let ranked = rank(&observations, 34.0, -118.0);
/// assert_eq!(ranked[0].observation.location, Some(GpsPoint::new(34.0, -118.0)));
/// ```
pub fn rank(observations: &[Observation], from_lat: f64, from_lng: f64) -> Vec<RankedObservation> {
    let mut ranked: Vec<RankedObservation> = observations
        .iter()
        .filter_map(|obs| measure(obs, from_lat, from_lng))
        .collect();

    sort_by_distance(&mut ranked);
    debug!("[rank] {} of {} observations ranked", ranked.len(), observations.len());
    ranked
}

/// Parallel version of [`rank`] for large observation sets.
#[cfg(feature = "parallel")]
pub fn rank_parallel(observations: &[Observation], from_lat: f64, from_lng: f64) -> Vec<RankedObservation> {
    // par_iter + collect preserves input order, so the stable sort below
    // breaks ties exactly like `rank`
    let mut ranked: Vec<RankedObservation> = observations
        .par_iter()
        .filter_map(|obs| measure(obs, from_lat, from_lng))
        .collect();

    sort_by_distance(&mut ranked);
    ranked
}

fn measure(obs: &Observation, from_lat: f64, from_lng: f64) -> Option<RankedObservation> {
    let point = obs.valid_location()?;
    Some(RankedObservation {
        distance_km: distance_km(from_lat, from_lng, point.latitude, point.longitude),
        observation: obs.clone(),
    })
}

fn sort_by_distance(ranked: &mut [RankedObservation]) {
    ranked.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
}

// =============================================================================
// R-tree Index for Radius Queries
// =============================================================================

/// An observation position with its index into the owning vector
#[derive(Debug, Clone, Copy)]
struct IndexedObservation {
    idx: usize,
    lng: f64,
    lat: f64,
}

impl RTreeObject for IndexedObservation {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.lng, self.lat])
    }
}

/// Observations indexed by position for radius queries.
///
/// # Example
///
/// ```rust
/// use catrees::{GpsPoint, Observation, SpatialIndex};
///
/// let index = SpatialIndex::new(vec![
///     Observation::new("Cupressus macrocarpa", GpsPoint::new(36.56, -121.95), ""),
///     Observation::new("Cupressus macrocarpa", GpsPoint::new(38.30, -123.05), ""),
/// ]);
///
/// let near_monterey = index.within_radius(36.6, -121.9, 25.0).unwrap();
/// assert_eq!(near_monterey.len(), 1);
/// ```
pub struct SpatialIndex {
    observations: Vec<Observation>,
    tree: RTree<IndexedObservation>,
}

impl SpatialIndex {
    /// Build an index; observations without a usable location are dropped.
    pub fn new(observations: Vec<Observation>) -> Self {
        let observations: Vec<Observation> = observations
            .into_iter()
            .filter(|o| o.valid_location().is_some())
            .collect();

        let entries: Vec<IndexedObservation> = observations
            .iter()
            .enumerate()
            .filter_map(|(idx, o)| {
                let (lng, lat) = geo::Point::from(o.valid_location()?).x_y();
                Some(IndexedObservation { idx, lng, lat })
            })
            .collect();

        Self {
            observations,
            tree: RTree::bulk_load(entries),
        }
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Observations within `radius_km` of `(lat, lng)`, nearest first.
    ///
    /// Ties keep the order the observations were given to [`SpatialIndex::new`].
    ///
    /// # Errors
    ///
    /// [`CatreesError::InvalidArgument`] for a negative or non-finite radius.
    pub fn within_radius(&self, lat: f64, lng: f64, radius_km: f64) -> Result<Vec<RankedObservation>> {
        if !radius_km.is_finite() || radius_km < 0.0 {
            return Err(CatreesError::invalid(format!(
                "radius_km must be a non-negative number, got {}",
                radius_km
            )));
        }

        let rect = bounds_around(&GpsPoint::new(lat, lng), radius_km);
        let envelope = AABB::from_corners(
            [rect.min().x, rect.min().y],
            [rect.max().x, rect.max().y],
        );

        let mut candidates: Vec<usize> = self
            .tree
            .locate_in_envelope(&envelope)
            .map(|entry| entry.idx)
            .collect();
        candidates.sort_unstable();

        let mut ranked: Vec<RankedObservation> = candidates
            .into_iter()
            .filter_map(|idx| measure(&self.observations[idx], lat, lng))
            .filter(|r| r.distance_km <= radius_km)
            .collect();

        sort_by_distance(&mut ranked);
        debug!(
            "[SpatialIndex] {} within {}km of ({}, {})",
            ranked.len(),
            radius_km,
            lat,
            lng
        );
        Ok(ranked)
    }
}
