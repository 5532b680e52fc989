//! Grid clustering of observations into location hotspots.
//!
//! Snaps each observation to a fixed-size degree grid and summarizes every
//! non-empty cell:
//! - Observation count (for ranking hotspots)
//! - Mean position of the member observations (for display and distance)
//! - Most recent sighting date and its place name
//!
//! A 0.1° cell is roughly 11 km north-south, which groups sightings from the
//! same canyon or grove while keeping separate ranges apart.

use std::cmp::Reverse;
use std::collections::HashMap;

use log::debug;

use crate::error::{CatreesError, Result};
use crate::geo_utils::distance_km;
use crate::{GpsPoint, Observation};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for grid clustering
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClusterConfig {
    /// Grid cell size in degrees (default: 0.1)
    pub grid_size_degrees: f64,
    /// Optional reference point; when set each cluster carries its distance from it
    pub origin: Option<GpsPoint>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            grid_size_degrees: 0.1,
            origin: None,
        }
    }
}

/// A grid cell summarizing every observation that snapped into it
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Cluster {
    /// Grid indices (lat, lng); the snapped coordinate is `index * grid_size`
    pub cell_key: (i64, i64),
    /// Number of observations in the cell (always >= 1)
    pub count: u32,
    /// Mean latitude of member observations
    pub center_lat: f64,
    /// Mean longitude of member observations
    pub center_lng: f64,
    /// Latest non-empty `observed_on` (ISO dates compare lexicographically)
    pub last_seen: String,
    /// Place name of the most recent observation
    pub place_guess: String,
    /// Distance from the configured origin to the cell center
    pub distance_km: Option<f64>,
}

// Internal cell data during construction
#[derive(Debug)]
struct CellBuilder {
    key: (i64, i64),
    count: u32,
    lat_sum: f64,
    lng_sum: f64,
    last_seen: String,
    place_guess: String,
}

impl CellBuilder {
    fn new(key: (i64, i64), obs: &Observation) -> Self {
        Self {
            key,
            count: 0,
            lat_sum: 0.0,
            lng_sum: 0.0,
            last_seen: obs.observed_on.clone(),
            place_guess: obs.place_guess.clone().unwrap_or_default(),
        }
    }

    fn add(&mut self, point: GpsPoint, obs: &Observation) {
        self.count += 1;
        self.lat_sum += point.latitude;
        self.lng_sum += point.longitude;

        // Empty dates never displace a recorded sighting
        if !obs.observed_on.is_empty() && obs.observed_on > self.last_seen {
            self.last_seen = obs.observed_on.clone();
            self.place_guess = obs.place_guess.clone().unwrap_or_default();
        }
    }
}

/// Cluster grid builder
///
/// Cells live in a vector in first-encounter order; the map only resolves a
/// cell key to its slot. Sorting the vector stably by count then keeps
/// equal-count cells in the order they were first seen.
struct ClusterGrid {
    grid_size: f64,
    slots: HashMap<(i64, i64), usize>,
    cells: Vec<CellBuilder>,
    skipped: usize,
}

impl ClusterGrid {
    fn new(grid_size: f64) -> Self {
        Self {
            grid_size,
            slots: HashMap::new(),
            cells: Vec::new(),
            skipped: 0,
        }
    }

    /// Convert lat/lng to grid indices (round half to even)
    fn to_grid_coords(&self, point: &GpsPoint) -> (i64, i64) {
        let row = (point.latitude / self.grid_size).round_ties_even() as i64;
        let col = (point.longitude / self.grid_size).round_ties_even() as i64;
        (row, col)
    }

    fn add_observation(&mut self, obs: &Observation) {
        let Some(point) = obs.valid_location() else {
            self.skipped += 1;
            return;
        };

        let key = self.to_grid_coords(&point);
        let slot = match self.slots.get(&key) {
            Some(&slot) => slot,
            None => {
                self.cells.push(CellBuilder::new(key, obs));
                self.slots.insert(key, self.cells.len() - 1);
                self.cells.len() - 1
            }
        };
        self.cells[slot].add(point, obs);
    }

    fn build(self, origin: Option<&GpsPoint>) -> Vec<Cluster> {
        if self.skipped > 0 {
            debug!("[ClusterGrid] Skipped {} observations without a usable location", self.skipped);
        }

        let mut clusters: Vec<Cluster> = self
            .cells
            .into_iter()
            .map(|cell| {
                let n = cell.count as f64;
                let center_lat = cell.lat_sum / n;
                let center_lng = cell.lng_sum / n;
                Cluster {
                    cell_key: cell.key,
                    count: cell.count,
                    center_lat,
                    center_lng,
                    last_seen: cell.last_seen,
                    place_guess: cell.place_guess,
                    distance_km: origin
                        .map(|o| distance_km(o.latitude, o.longitude, center_lat, center_lng)),
                }
            })
            .collect();

        clusters.sort_by_key(|c| Reverse(c.count));
        clusters
    }
}

/// Cluster observations into grid cells of `grid_size_degrees`.
///
/// Returns one [`Cluster`] per non-empty cell, most observations first.
/// Observations without a usable location are skipped.
///
/// # Errors
///
/// [`CatreesError::InvalidArgument`] when `grid_size_degrees` is not a
/// positive finite number, or is so small (below roughly 2e-17) that
/// `180 / grid_size_degrees` no longer fits in an `i64` cell index.
pub fn cluster(observations: &[Observation], grid_size_degrees: f64) -> Result<Vec<Cluster>> {
    cluster_with_config(
        observations,
        &ClusterConfig {
            grid_size_degrees,
            ..ClusterConfig::default()
        },
    )
}

/// Cluster observations using a full [`ClusterConfig`].
pub fn cluster_with_config(observations: &[Observation], config: &ClusterConfig) -> Result<Vec<Cluster>> {
    let grid_size = config.grid_size_degrees;
    if !grid_size.is_finite() || grid_size <= 0.0 {
        return Err(CatreesError::invalid(format!(
            "grid_size_degrees must be a positive number, got {}",
            grid_size
        )));
    }
    // Cell indices reach 180 / grid_size and must fit in an i64 key
    if 180.0 / grid_size >= i64::MAX as f64 {
        return Err(CatreesError::invalid(format!(
            "grid_size_degrees {} is too fine for integer cell keys",
            grid_size
        )));
    }

    let mut grid = ClusterGrid::new(grid_size);
    for obs in observations {
        grid.add_observation(obs);
    }

    let clusters = grid.build(config.origin.as_ref());
    debug!(
        "[cluster] {} observations -> {} clusters ({}° grid)",
        observations.len(),
        clusters.len(),
        grid_size
    );
    Ok(clusters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn obs(lat: f64, lng: f64, observed_on: &str, place: &str) -> Observation {
        Observation::new("Quercus agrifolia", GpsPoint::new(lat, lng), observed_on)
            .with_place_guess(place)
    }

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    #[test]
    fn test_empty_input() {
        let clusters = cluster(&[], 0.1).unwrap();
        assert!(clusters.is_empty());
    }

    #[test]
    fn test_zero_grid_size_rejected() {
        let err = cluster(&[obs(34.0, -118.0, "", "")], 0.0).unwrap_err();
        assert!(matches!(err, CatreesError::InvalidArgument(_)));
    }

    #[test]
    fn test_negative_and_nan_grid_size_rejected() {
        assert!(matches!(cluster(&[], -0.1), Err(CatreesError::InvalidArgument(_))));
        assert!(matches!(cluster(&[], f64::NAN), Err(CatreesError::InvalidArgument(_))));
        assert!(matches!(cluster(&[], f64::INFINITY), Err(CatreesError::InvalidArgument(_))));
    }

    #[test]
    fn test_grid_too_fine_for_cell_keys_rejected() {
        let observations = [obs(34.0, -118.0, "", ""), obs(35.0, -119.0, "", "")];
        assert!(matches!(cluster(&observations, 1e-18), Err(CatreesError::InvalidArgument(_))));
        assert!(matches!(cluster(&observations, f64::MIN_POSITIVE), Err(CatreesError::InvalidArgument(_))));

        // Fine but representable grids keep distinct cells apart
        let clusters = cluster(&observations, 1e-15).unwrap();
        assert_eq!(clusters.len(), 2);
        assert_ne!(clusters[0].cell_key, clusters[1].cell_key);
    }

    #[test]
    fn test_two_nearby_observations_share_cluster() {
        let observations = vec![
            obs(34.0, -118.0, "2023-01-01", "Griffith Park"),
            obs(34.01, -118.01, "2023-06-01", "Los Feliz"),
        ];
        let clusters = cluster(&observations, 0.1).unwrap();

        assert_eq!(clusters.len(), 1);
        let c = &clusters[0];
        assert_eq!(c.count, 2);
        assert_eq!(c.last_seen, "2023-06-01");
        assert_eq!(c.place_guess, "Los Feliz");
        assert!(approx_eq(c.center_lat, 34.005, 1e-9));
        assert!(approx_eq(c.center_lng, -118.005, 1e-9));
        assert_eq!(c.cell_key, (340, -1180));
        assert_eq!(c.distance_km, None);
    }

    #[test]
    fn test_sorted_by_count_with_stable_ties() {
        let observations = vec![
            obs(36.0, -121.0, "", "Big Sur"),
            obs(34.0, -118.0, "", "LA"),
            obs(38.0, -122.0, "", "Napa"),
            obs(34.0, -118.0, "", "LA"),
        ];
        let clusters = cluster(&observations, 0.1).unwrap();

        assert_eq!(clusters.len(), 3);
        assert_eq!(clusters[0].place_guess, "LA");
        assert_eq!(clusters[0].count, 2);
        // Equal counts keep the order cells were first seen
        assert_eq!(clusters[1].place_guess, "Big Sur");
        assert_eq!(clusters[2].place_guess, "Napa");
    }

    #[test]
    fn test_empty_date_never_overwrites() {
        let observations = vec![
            obs(34.0, -118.0, "2022-05-01", "Dated"),
            obs(34.0, -118.0, "", "Undated"),
        ];
        let clusters = cluster(&observations, 0.1).unwrap();
        assert_eq!(clusters[0].last_seen, "2022-05-01");
        assert_eq!(clusters[0].place_guess, "Dated");
    }

    #[test]
    fn test_undated_first_observation_is_default() {
        let observations = vec![obs(34.0, -118.0, "", "Undated")];
        let clusters = cluster(&observations, 0.1).unwrap();
        assert_eq!(clusters[0].last_seen, "");
        assert_eq!(clusters[0].place_guess, "Undated");

        // A later dated sighting takes over
        let observations = vec![
            obs(34.0, -118.0, "", "Undated"),
            obs(34.0, -118.0, "2021-03-04", "Dated"),
        ];
        let clusters = cluster(&observations, 0.1).unwrap();
        assert_eq!(clusters[0].last_seen, "2021-03-04");
        assert_eq!(clusters[0].place_guess, "Dated");
    }

    #[test]
    fn test_equal_dates_keep_first_place() {
        let observations = vec![
            obs(34.0, -118.0, "2023-01-01", "First"),
            obs(34.0, -118.0, "2023-01-01", "Second"),
        ];
        let clusters = cluster(&observations, 0.1).unwrap();
        assert_eq!(clusters[0].place_guess, "First");
    }

    #[test]
    fn test_missing_location_skipped() {
        let mut no_loc = obs(34.0, -118.0, "2023-01-01", "Nowhere");
        no_loc.location = None;
        let observations = vec![no_loc, obs(91.0, 0.0, "", ""), obs(34.0, -118.0, "", "Here")];

        let clusters = cluster(&observations, 0.1).unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].count, 1);
    }

    #[test]
    fn test_origin_distance_annotation() {
        let config = ClusterConfig {
            grid_size_degrees: 0.1,
            origin: Some(GpsPoint::new(34.0, -118.0)),
        };
        let observations = vec![obs(34.0, -118.0, "", ""), obs(35.0, -118.0, "", "")];
        let clusters = cluster_with_config(&observations, &config).unwrap();

        let near = clusters.iter().find(|c| c.cell_key == (340, -1180)).unwrap();
        let far = clusters.iter().find(|c| c.cell_key == (350, -1180)).unwrap();
        assert_eq!(near.distance_km, Some(0.0));
        assert!(approx_eq(far.distance_km.unwrap(), 111.195, 0.01));
    }

    #[test]
    fn test_half_cell_rounds_to_even() {
        // 0.25 / 0.5 = 0.5 exactly, which rounds to 0; 0.75 / 0.5 = 1.5 rounds to 2
        let observations = vec![obs(0.25, 0.0, "", ""), obs(0.75, 0.0, "", "")];
        let clusters = cluster(&observations, 0.5).unwrap();
        let keys: Vec<_> = clusters.iter().map(|c| c.cell_key).collect();
        assert_eq!(keys, vec![(0, 0), (2, 0)]);
    }

    proptest! {
        #[test]
        fn prop_counts_sum_to_located_observations(
            points in proptest::collection::vec((32.0f64..42.0, -124.0f64..-114.0), 0..200),
            grid in 0.01f64..1.0,
        ) {
            let observations: Vec<Observation> = points
                .iter()
                .map(|&(lat, lng)| obs(lat, lng, "", ""))
                .collect();
            let clusters = cluster(&observations, grid).unwrap();

            let total: u32 = clusters.iter().map(|c| c.count).sum();
            prop_assert_eq!(total as usize, observations.len());
            prop_assert!(clusters.iter().all(|c| c.count >= 1));
            prop_assert!(clusters.windows(2).all(|w| w[0].count >= w[1].count));
        }

        #[test]
        fn prop_same_cell_center_is_mean(
            offsets in proptest::collection::vec((-0.04f64..0.04, -0.04f64..0.04), 1..50),
        ) {
            let observations: Vec<Observation> = offsets
                .iter()
                .map(|&(dlat, dlng)| obs(36.0 + dlat, -120.0 + dlng, "", ""))
                .collect();
            let clusters = cluster(&observations, 0.1).unwrap();

            prop_assert_eq!(clusters.len(), 1);
            let n = observations.len() as f64;
            let mean_lat = offsets.iter().map(|o| 36.0 + o.0).sum::<f64>() / n;
            let mean_lng = offsets.iter().map(|o| -120.0 + o.1).sum::<f64>() / n;
            prop_assert!(approx_eq(clusters[0].center_lat, mean_lat, 1e-9));
            prop_assert!(approx_eq(clusters[0].center_lng, mean_lng, 1e-9));
        }
    }
}
