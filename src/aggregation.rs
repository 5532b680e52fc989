//! Per-species aggregation of observation records.
//!
//! Observation sources return results in fixed-size pages. A
//! [`SpeciesAggregator`] accumulates any number of pages into one summary
//! row per taxon, keyed by the lowercased scientific name, and is finalized
//! once the source runs dry.

use std::cmp::Reverse;
use std::collections::HashMap;

use log::debug;

use crate::{Observation, ObservedLocation};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Everything seen of one taxon across all aggregated pages
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpeciesSummary {
    /// Lowercased scientific name (the aggregation key)
    pub scientific_name: String,
    /// Scientific name as last reported by the source
    pub display_scientific_name: String,
    /// Common name as last reported by the source (empty when missing)
    pub common_name: String,
    /// Number of observation records for this taxon
    pub count: u32,
    /// Every located sighting, in encounter order
    pub locations: Vec<ObservedLocation>,
}

impl SpeciesSummary {
    fn new(key: String) -> Self {
        Self {
            scientific_name: key,
            display_scientific_name: String::new(),
            common_name: String::new(),
            count: 0,
            locations: Vec::new(),
        }
    }
}

/// Streaming accumulator for [`SpeciesSummary`] rows.
///
/// # Example
///
/// ```rust
/// use catrees::{GpsPoint, Observation, SpeciesAggregator};
///
/// let page1 = vec![Observation::new("Quercus lobata", GpsPoint::new(38.5, -121.7), "2024-04-02")];
/// let page2 = vec![
///     Observation::new("Quercus lobata", GpsPoint::new(38.6, -121.8), "2024-05-10")
///         .with_common_name("Valley Oak"),
/// ];
///
/// let mut aggregator = SpeciesAggregator::new();
/// aggregator.aggregate_page(&page1);
/// aggregator.aggregate_page(&page2);
///
/// let summaries = aggregator.finish();
/// assert_eq!(summaries.len(), 1);
/// assert_eq!(summaries[0].count, 2);
/// assert_eq!(summaries[0].common_name, "Valley Oak");
/// ```
#[derive(Debug, Default)]
pub struct SpeciesAggregator {
    /// lowercased name -> index into `entries`
    index: HashMap<String, usize>,
    /// Summaries in first-encounter order
    entries: Vec<SpeciesSummary>,
    records: usize,
    skipped: usize,
}

impl SpeciesAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one page of observations into the running summaries.
    ///
    /// Records with an empty taxon name are skipped. Names are last-write-wins,
    /// so a later page can fill in a common name an earlier one lacked.
    pub fn aggregate_page(&mut self, page: &[Observation]) {
        for obs in page {
            self.add(obs);
        }
        debug!(
            "[SpeciesAggregator] page of {} -> {} species from {} records",
            page.len(),
            self.entries.len(),
            self.records
        );
    }

    fn add(&mut self, obs: &Observation) {
        let key = obs.taxon_name.to_lowercase();
        if key.is_empty() {
            self.skipped += 1;
            return;
        }

        let entry = self.entry_mut(key);
        entry.count += 1;
        entry.display_scientific_name = obs.taxon_name.clone();
        entry.common_name = obs.common_name.clone().unwrap_or_default();

        if let Some(point) = obs.valid_location() {
            entry.locations.push(ObservedLocation {
                latitude: point.latitude,
                longitude: point.longitude,
                observed_on: obs.observed_on.clone(),
                place_guess: obs.place_guess.clone(),
            });
        }
        self.records += 1;
    }

    /// Get the summary for `key`, inserting an empty one on first sight.
    fn entry_mut(&mut self, key: String) -> &mut SpeciesSummary {
        let entries = &mut self.entries;
        let slot = *self.index.entry(key).or_insert_with_key(|k| {
            entries.push(SpeciesSummary::new(k.clone()));
            entries.len() - 1
        });
        &mut self.entries[slot]
    }

    /// Number of distinct taxa seen so far.
    pub fn species_count(&self) -> usize {
        self.entries.len()
    }

    /// Number of records that contributed to a summary.
    pub fn record_count(&self) -> usize {
        self.records
    }

    /// Number of records skipped for lacking a taxon name.
    pub fn skipped_count(&self) -> usize {
        self.skipped
    }

    /// Finalize into summaries, most observed first.
    ///
    /// Taxa with equal counts keep the order in which they were first seen.
    pub fn finish(self) -> Vec<SpeciesSummary> {
        if self.skipped > 0 {
            debug!("[SpeciesAggregator] Skipped {} records without a taxon name", self.skipped);
        }
        let mut summaries = self.entries;
        summaries.sort_by_key(|s| Reverse(s.count));
        summaries
    }
}

/// Aggregate a single, already-assembled batch of observations.
pub fn aggregate(observations: &[Observation]) -> Vec<SpeciesSummary> {
    let mut aggregator = SpeciesAggregator::new();
    aggregator.aggregate_page(observations);
    aggregator.finish()
}
