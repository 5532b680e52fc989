//! HTTP client for the iNaturalist observation API.
//!
//! This module fetches research-grade observations and feeds them to the
//! aggregation layer:
//! - Sequential paging (page N+1 only after page N came back full)
//! - Streaming species aggregation across pages
//! - Life-list download for seen-species filtering
//! - Taxon resolution with bounded concurrency
//!
//! Failed requests are reported, not retried.

use std::future::Future;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt, TryStreamExt};
use log::{debug, info, warn};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{CatreesError, Result};
use crate::paging::PageCursor;
use crate::{GpsPoint, Observation, SeenSet, SpeciesAggregator, SpeciesSummary};

const DEFAULT_BASE_URL: &str = "https://api.inaturalist.org/v1";
const BASE_URL_ENV: &str = "CATREES_INAT_URL";

/// iNaturalist place id for California
pub const CA_PLACE_ID: u64 = 14;

// The API caps per_page at 200
const DEFAULT_PER_PAGE: u32 = 200;
const RESOLVE_CONCURRENCY: usize = 4;

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InatConfig {
    /// API root, without trailing slash (default: https://api.inaturalist.org/v1)
    pub base_url: String,
    /// Results per page (default: 200)
    pub per_page: u32,
    /// Place filter for per-species fetches (default: 14, California)
    pub place_id: u64,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for InatConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            per_page: DEFAULT_PER_PAGE,
            place_id: CA_PLACE_ID,
            timeout_secs: 30,
            user_agent: format!("catrees/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl InatConfig {
    /// Defaults, with `CATREES_INAT_URL` overriding the API root when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            if !url.trim().is_empty() {
                config.base_url = url.trim().trim_end_matches('/').to_string();
            }
        }
        config
    }
}

/// Parameters for a "what grows near here" query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearbyQuery {
    pub lat: f64,
    pub lng: f64,
    /// Search radius in km (default: 10)
    pub radius_km: f64,
    /// Restrict to these taxa; empty means all plants
    pub taxon_ids: Vec<u64>,
    /// Page limit (default: 3)
    pub max_pages: u32,
}

impl NearbyQuery {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self {
            lat,
            lng,
            radius_km: 10.0,
            taxon_ids: Vec::new(),
            max_pages: 3,
        }
    }
}

/// A resolved iNaturalist taxon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Taxon {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub preferred_common_name: Option<String>,
}

/// API response envelope
#[derive(Debug, Deserialize)]
struct ApiPage<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

/// API observation record (only the fields we read)
#[derive(Debug, Deserialize)]
struct ApiObservation {
    taxon: Option<ApiTaxon>,
    location: Option<ApiLocation>,
    observed_on: Option<String>,
    place_guess: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiTaxon {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    preferred_common_name: Option<String>,
}

/// `location` arrives as "lat,lng" text or as a [lat, lng] pair
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApiLocation {
    Text(String),
    Pair(Vec<serde_json::Value>),
}

impl ApiLocation {
    fn parse(&self) -> Option<GpsPoint> {
        match self {
            ApiLocation::Text(text) => parse_location(text),
            ApiLocation::Pair(values) => {
                let [lat, lng] = values.as_slice() else {
                    return None;
                };
                Some(GpsPoint::new(json_f64(lat)?, json_f64(lng)?))
            }
        }
    }
}

fn json_f64(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl ApiObservation {
    fn into_observation(self) -> Observation {
        let location = self.location.as_ref().and_then(ApiLocation::parse);
        let (taxon_name, common_name) = match self.taxon {
            Some(t) => (t.name.unwrap_or_default(), t.preferred_common_name),
            None => (String::new(), None),
        };
        Observation {
            taxon_name,
            common_name,
            location,
            observed_on: normalize_observed_on(self.observed_on.as_deref()),
            place_guess: self.place_guess,
        }
    }
}

/// Parse a `"lat,lng"` location string.
///
/// Returns `None` unless there are exactly two comma-separated numbers.
/// Range checks are left to [`GpsPoint::is_valid`].
pub fn parse_location(text: &str) -> Option<GpsPoint> {
    let mut parts = text.split(',');
    let lat = parts.next()?.trim().parse().ok()?;
    let lng = parts.next()?.trim().parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(GpsPoint::new(lat, lng))
}

/// Reduce an `observed_on` value to its `YYYY-MM-DD` part; missing → empty.
pub fn normalize_observed_on(raw: Option<&str>) -> String {
    raw.map(|s| s.trim().chars().take(10).collect())
        .unwrap_or_default()
}

/// iNaturalist API client
pub struct InatClient {
    client: Client,
    config: InatConfig,
}

impl InatClient {
    /// Create a new client with the given configuration
    pub fn new(config: InatConfig) -> Result<Self> {
        // Validated up front so a bad page size fails before any request
        PageCursor::new(config.per_page, None)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &InatConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn get_page<T: DeserializeOwned>(&self, path: &str, params: &[(&str, String)]) -> Result<Vec<T>> {
        let url = self.url(path);
        let req_start = Instant::now();

        let response = self.client.get(&url).query(params).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!("[InatClient] {} returned HTTP {}", url, status);
            return Err(CatreesError::Api {
                status: status.as_u16(),
                url,
            });
        }

        let page: ApiPage<T> = response.json().await?;
        debug!(
            "[InatClient] GET {} -> {} results in {:?}",
            path,
            page.results.len(),
            req_start.elapsed()
        );
        Ok(page.results)
    }

    /// Walk observation pages, handing each converted page to `on_page`.
    async fn for_each_observation_page<F>(
        &self,
        params: Vec<(&str, String)>,
        max_pages: Option<u32>,
        mut on_page: F,
    ) -> Result<PageCursor>
    where
        F: FnMut(Vec<Observation>),
    {
        let mut cursor = PageCursor::new(self.config.per_page, max_pages)?;

        while let Some(page) = cursor.next_page() {
            let mut page_params = params.clone();
            page_params.push(("per_page", self.config.per_page.to_string()));
            page_params.push(("page", page.to_string()));

            let results: Vec<ApiObservation> = self.get_page("observations", &page_params).await?;
            cursor.record(results.len());
            on_page(results.into_iter().map(ApiObservation::into_observation).collect());
        }

        Ok(cursor)
    }

    /// Research-grade observations near a point, aggregated per species.
    pub async fn fetch_nearby_species(&self, query: &NearbyQuery) -> Result<Vec<SpeciesSummary>> {
        let start = Instant::now();
        let mut params = vec![
            ("lat", query.lat.to_string()),
            ("lng", query.lng.to_string()),
            ("radius", query.radius_km.to_string()),
            ("quality_grade", "research".to_string()),
        ];
        if query.taxon_ids.is_empty() {
            params.push(("iconic_taxa", "Plantae".to_string()));
        } else {
            params.push(("taxon_id", join_ids(&query.taxon_ids)));
        }

        let mut aggregator = SpeciesAggregator::new();
        let cursor = self
            .for_each_observation_page(params, Some(query.max_pages), |page| aggregator.aggregate_page(&page))
            .await?;

        info!(
            "[InatClient] nearby ({}, {}) r={}km: {} species from {} records over {} pages in {:?}",
            query.lat,
            query.lng,
            query.radius_km,
            aggregator.species_count(),
            cursor.records_fetched(),
            cursor.pages_fetched(),
            start.elapsed()
        );
        Ok(aggregator.finish())
    }

    /// Every species a user has research-grade observations of.
    pub async fn fetch_life_list(&self, user_login: &str) -> Result<SeenSet> {
        let params = vec![
            ("user_login", user_login.to_string()),
            ("quality_grade", "research".to_string()),
        ];

        let mut seen = SeenSet::new();
        let cursor = self
            .for_each_observation_page(params, None, |page| {
                seen.extend(page.into_iter().map(|o| o.taxon_name));
            })
            .await?;

        info!(
            "[InatClient] life list for '{}': {} species over {} pages",
            user_login,
            seen.len(),
            cursor.pages_fetched()
        );
        Ok(seen)
    }

    /// Best species/subspecies match for a name, if any.
    pub async fn resolve_taxon(&self, name: &str) -> Result<Option<Taxon>> {
        let params = [("q", name.to_string()), ("rank", "species,subspecies".to_string())];
        let results: Vec<Taxon> = self.get_page("taxa", &params).await?;
        let taxon = results.into_iter().next();
        match &taxon {
            Some(t) => debug!("[InatClient] resolved '{}' -> {} ({})", name, t.id, t.name),
            None => debug!("[InatClient] no taxon for '{}'", name),
        }
        Ok(taxon)
    }

    /// Resolve many names, a few requests at a time. Output follows input order.
    pub async fn resolve_taxa(&self, names: &[String]) -> Result<Vec<(String, Option<Taxon>)>> {
        stream::iter(names)
            .map(|name| async move { Ok::<_, CatreesError>((name.clone(), self.resolve_taxon(name).await?)) })
            .buffered(RESOLVE_CONCURRENCY)
            .try_collect()
            .await
    }

    /// Located research-grade observations of one taxon within the configured place.
    pub async fn fetch_species_observations(&self, taxon_id: u64, max_pages: u32) -> Result<Vec<Observation>> {
        let params = vec![
            ("taxon_id", taxon_id.to_string()),
            ("place_id", self.config.place_id.to_string()),
            ("quality_grade", "research".to_string()),
        ];

        let mut observations = Vec::new();
        let mut unlocated = 0usize;
        let cursor = self
            .for_each_observation_page(params, Some(max_pages), |page| {
                for obs in page {
                    if obs.valid_location().is_some() {
                        observations.push(obs);
                    } else {
                        unlocated += 1;
                    }
                }
            })
            .await?;

        if unlocated > 0 {
            debug!("[InatClient] dropped {} observations without a location", unlocated);
        }
        info!(
            "[InatClient] taxon {}: {} located observations over {} pages",
            taxon_id,
            observations.len(),
            cursor.pages_fetched()
        );
        Ok(observations)
    }
}

fn join_ids(ids: &[u64]) -> String {
    ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(",")
}

/// Run a client future to completion on a private current-thread runtime.
///
/// For synchronous callers; do not call from inside an async context.
pub fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let rt = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    Ok(rt.block_on(future))
}

/// Synchronous wrapper around [`InatClient::fetch_nearby_species`].
pub fn fetch_nearby_species_sync(config: InatConfig, query: &NearbyQuery) -> Result<Vec<SpeciesSummary>> {
    let client = InatClient::new(config)?;
    block_on(client.fetch_nearby_species(query))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_location_text() {
        assert_eq!(parse_location("34.05,-118.25"), Some(GpsPoint::new(34.05, -118.25)));
        assert_eq!(parse_location(" 34.05 , -118.25 "), Some(GpsPoint::new(34.05, -118.25)));
        assert_eq!(parse_location("34.05"), None);
        assert_eq!(parse_location("34.05,-118.25,10"), None);
        assert_eq!(parse_location("north,west"), None);
        assert_eq!(parse_location(""), None);
    }

    #[test]
    fn test_normalize_observed_on() {
        assert_eq!(normalize_observed_on(Some("2023-06-01")), "2023-06-01");
        assert_eq!(normalize_observed_on(Some("2023-06-01T10:15:00-07:00")), "2023-06-01");
        assert_eq!(normalize_observed_on(None), "");
    }

    #[test]
    fn test_api_observation_conversion() {
        let raw = serde_json::json!({
            "results": [
                {
                    "taxon": {"id": 47850, "name": "Quercus agrifolia", "preferred_common_name": "Coast Live Oak"},
                    "location": "34.1,-118.3",
                    "observed_on": "2023-02-11",
                    "place_guess": "Griffith Park"
                },
                {
                    "taxon": {"id": 47850, "name": "Quercus agrifolia"},
                    "location": [34.2, "-118.4"],
                    "observed_on": null,
                    "place_guess": null
                },
                {
                    "taxon": null,
                    "location": "garbage"
                }
            ]
        });

        let page: ApiPage<ApiObservation> = serde_json::from_value(raw).unwrap();
        let observations: Vec<Observation> = page.results.into_iter().map(ApiObservation::into_observation).collect();

        assert_eq!(observations[0].taxon_name, "Quercus agrifolia");
        assert_eq!(observations[0].common_name.as_deref(), Some("Coast Live Oak"));
        assert_eq!(observations[0].location, Some(GpsPoint::new(34.1, -118.3)));
        assert_eq!(observations[0].place_guess.as_deref(), Some("Griffith Park"));

        assert_eq!(observations[1].common_name, None);
        assert_eq!(observations[1].location, Some(GpsPoint::new(34.2, -118.4)));
        assert_eq!(observations[1].observed_on, "");

        assert_eq!(observations[2].taxon_name, "");
        assert_eq!(observations[2].location, None);
    }

    #[test]
    fn test_missing_results_is_empty_page() {
        let page: ApiPage<Taxon> = serde_json::from_value(serde_json::json!({"total_results": 0})).unwrap();
        assert!(page.results.is_empty());
    }

    #[test]
    fn test_join_ids() {
        assert_eq!(join_ids(&[47850, 54773]), "47850,54773");
        assert_eq!(join_ids(&[]), "");
    }

    #[test]
    fn test_nearby_query_defaults() {
        let q = NearbyQuery::new(37.8, -122.2);
        assert_eq!(q.radius_km, 10.0);
        assert_eq!(q.max_pages, 3);
        assert!(q.taxon_ids.is_empty());
    }

    #[test]
    fn test_zero_per_page_rejected() {
        let config = InatConfig {
            per_page: 0,
            ..InatConfig::default()
        };
        assert!(matches!(InatClient::new(config), Err(CatreesError::InvalidArgument(_))));
    }

    #[test]
    fn test_url_join() {
        let client = InatClient::new(InatConfig {
            base_url: "http://localhost:1234/v1/".to_string(),
            ..InatConfig::default()
        })
        .unwrap();
        assert_eq!(client.url("observations"), "http://localhost:1234/v1/observations");
    }
}
