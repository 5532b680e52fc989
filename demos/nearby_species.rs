//! Fetch plants observed near Berkeley and print the most observed species.
//!
//! Run with: cargo run --example nearby_species --features http

use catrees::http::fetch_nearby_species_sync;
use catrees::{InatConfig, NearbyQuery};

fn main() {
    env_logger::try_init().ok();

    let mut query = NearbyQuery::new(37.8716, -122.2727);
    query.radius_km = 5.0;
    query.max_pages = 1;

    match fetch_nearby_species_sync(InatConfig::from_env(), &query) {
        Ok(species) => {
            println!("{} species within {}km\n", species.len(), query.radius_km);
            for s in species.iter().take(15) {
                println!("  {:>4}  {:<32} {}", s.count, s.common_name, s.display_scientific_name);
            }
        }
        Err(e) => eprintln!("fetch failed: {}", e),
    }
}
