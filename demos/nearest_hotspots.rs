//! Cluster and rank a handful of oak sightings around Los Angeles.
//!
//! Run with: cargo run --example nearest_hotspots

use catrees::{cluster_with_config, rank, ClusterConfig, GpsPoint, Observation, SeenSet};

fn main() {
    let sightings = vec![
        Observation::new("Quercus agrifolia", GpsPoint::new(34.1184, -118.3004), "2023-01-14")
            .with_place_guess("Griffith Park"),
        Observation::new("Quercus agrifolia", GpsPoint::new(34.1365, -118.2942), "2023-05-02")
            .with_place_guess("Griffith Park, north"),
        Observation::new("Quercus agrifolia", GpsPoint::new(34.0961, -118.7086), "2022-11-20")
            .with_place_guess("Malibu Creek State Park"),
        Observation::new("Quercus agrifolia", GpsPoint::new(34.2037, -118.1690), "2023-03-09")
            .with_place_guess("Arroyo Seco"),
        Observation::new("Quercus agrifolia", GpsPoint::new(34.1004, -118.7203), "")
            .with_place_guess("Malibu Creek, undated"),
    ];

    let home = GpsPoint::new(34.0522, -118.2437);
    let config = ClusterConfig {
        grid_size_degrees: 0.1,
        origin: Some(home),
    };

    println!("Hotspots (0.1° grid):\n");
    match cluster_with_config(&sightings, &config) {
        Ok(clusters) => {
            for (i, c) in clusters.iter().enumerate() {
                println!(
                    "  {}. {:<28} {} obs, last seen {:<10} ({:.1} km)",
                    i + 1,
                    c.place_guess,
                    c.count,
                    c.last_seen,
                    c.distance_km.unwrap_or_default()
                );
            }
        }
        Err(e) => eprintln!("clustering failed: {}", e),
    }

    println!("\nNearest sightings to downtown LA:\n");
    for r in rank(&sightings, home.latitude, home.longitude).iter().take(3) {
        println!(
            "  {:>6.1} km  {}",
            r.distance_km,
            r.observation.place_guess.as_deref().unwrap_or("")
        );
    }

    let seen = SeenSet::from_names(["quercus agrifolia"]);
    println!(
        "\nAlready seen 'Quercus agrifolia var. oxyadenia'? {}",
        seen.contains_taxon("Quercus agrifolia var. oxyadenia")
    );
}
