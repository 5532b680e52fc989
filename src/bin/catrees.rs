//! catrees: find California native trees on iNaturalist.
//!
//! Run with: cargo run --features cli -- nearby --lat 34.1 --lng -118.3

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use log::{info, LevelFilter};
use tabled::builder::Builder;
use tabled::settings::Style;

use catrees::{
    cluster_with_config, record_seen, Cluster, ClusterConfig, GpsPoint, InatClient, InatConfig,
    NearbyQuery, RankedObservation, SeenSet, SpatialIndex, SpeciesSummary, Taxon,
};

#[derive(Parser)]
#[command(name = "catrees")]
#[command(about = "California native tree finder", long_about = None)]
struct Cli {
    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// iNaturalist API root
    #[arg(long, env = "CATREES_INAT_URL", global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Find native trees observed near a location
    Nearby {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
        /// Search radius in km
        #[arg(long, default_value_t = 10.0)]
        radius: f64,
        /// Restrict to these iNaturalist taxon ids (repeatable)
        #[arg(long = "taxon-id")]
        taxon_ids: Vec<u64>,
        /// iNaturalist username whose life list is excluded
        #[arg(long, conflicts_with = "seen_file")]
        user: Option<String>,
        /// File of already-seen scientific names, one per line
        #[arg(long, value_name = "FILE")]
        seen_file: Option<PathBuf>,
        #[arg(long, default_value_t = 3)]
        max_pages: u32,
    },
    /// Show where a species is observed in California
    Find {
        name: String,
        /// Cluster cell size in degrees
        #[arg(long, default_value_t = 0.1)]
        grid_size: f64,
        /// Annotate clusters with distance from this latitude
        #[arg(long, requires = "from_lng", allow_hyphen_values = true)]
        from_lat: Option<f64>,
        #[arg(long, requires = "from_lat", allow_hyphen_values = true)]
        from_lng: Option<f64>,
        /// Number of clusters to show
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long, default_value_t = 5)]
        max_pages: u32,
    },
    /// List the closest observations of a species to a point
    Nearest {
        name: String,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
        /// Only show observations within this many km
        #[arg(long)]
        radius: Option<f64>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long, default_value_t = 5)]
        max_pages: u32,
    },
    /// Resolve species names to iNaturalist taxon ids
    Resolve {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Record a personal sighting in a seen file
    Observe {
        name: String,
        /// File of already-seen scientific names (created if missing)
        #[arg(long, value_name = "FILE")]
        seen_file: PathBuf,
        /// Store the name as typed instead of resolving it on iNaturalist
        #[arg(long)]
        as_is: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_env("RUST_LOG")
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> catrees::Result<()> {
    let mut config = InatConfig::from_env();
    if let Some(url) = cli.api_url {
        config.base_url = url.trim_end_matches('/').to_string();
    }
    let client = InatClient::new(config)?;

    match cli.command {
        Command::Nearby { lat, lng, radius, taxon_ids, user, seen_file, max_pages } => {
            println!("Searching for native trees within {}km of ({}, {})...", radius, lat, lng);

            let query = NearbyQuery { lat, lng, radius_km: radius, taxon_ids, max_pages };
            let species = client.fetch_nearby_species(&query).await?;

            let seen = match (user, seen_file) {
                (Some(user), _) => {
                    println!("Fetching life list for iNaturalist user '{}'...", user);
                    client.fetch_life_list(&user).await?
                }
                (None, Some(path)) => SeenSet::from_lines(&std::fs::read_to_string(path)?),
                (None, None) => SeenSet::new(),
            };
            info!("{} species already seen", seen.len());

            show_nearby_results(&seen.filter_unseen(species));
        }
        Command::Find { name, grid_size, from_lat, from_lng, limit, max_pages } => {
            let Some(taxon) = client.resolve_taxon(&name).await? else {
                println!("Could not find '{}' on iNaturalist.", name);
                return Ok(());
            };
            let display_name = display_name(&taxon);
            println!("Fetching observations for {} in California...", display_name);

            let observations = client.fetch_species_observations(taxon.id, max_pages).await?;
            let config = ClusterConfig {
                grid_size_degrees: grid_size,
                origin: from_lat.zip(from_lng).map(|(lat, lng)| GpsPoint::new(lat, lng)),
            };
            let clusters = cluster_with_config(&observations, &config)?;
            show_clusters(&clusters, &display_name, limit);
        }
        Command::Nearest { name, lat, lng, radius, limit, max_pages } => {
            let Some(taxon) = client.resolve_taxon(&name).await? else {
                println!("Could not find '{}' on iNaturalist.", name);
                return Ok(());
            };
            let display_name = display_name(&taxon);

            let observations = client.fetch_species_observations(taxon.id, max_pages).await?;
            let ranked = match radius {
                Some(radius) => SpatialIndex::new(observations).within_radius(lat, lng, radius)?,
                None => catrees::rank(&observations, lat, lng),
            };
            show_nearest(&ranked, &display_name, limit);
        }
        Command::Resolve { names } => {
            let resolved = client.resolve_taxa(&names).await?;
            let mut found = 0;
            for (name, taxon) in &resolved {
                match taxon {
                    Some(t) => {
                        println!("  {} -> taxon_id={} ({})", name, t.id, t.name);
                        found += 1;
                    }
                    None => println!("  {} -> NOT FOUND", name),
                }
            }
            println!("\nResolved {}/{} species.", found, resolved.len());
        }
        Command::Observe { name, seen_file, as_is } => {
            let (stored, label) = if as_is {
                (name.clone(), name)
            } else {
                let Some(taxon) = client.resolve_taxon(&name).await? else {
                    println!("Could not find '{}' on iNaturalist.", name);
                    return Ok(());
                };
                let label = display_name(&taxon);
                (taxon.name, label)
            };

            if record_seen(&seen_file, &stored)? {
                println!("Recorded observation of {} in {}", label, seen_file.display());
            } else {
                println!("{} is already in {}", label, seen_file.display());
            }
        }
    }

    Ok(())
}

fn display_name(taxon: &Taxon) -> String {
    match taxon.preferred_common_name.as_deref() {
        Some(common) if !common.is_empty() => format!("{} ({})", common, taxon.name),
        _ => taxon.name.clone(),
    }
}

// ============================================================================
// Output
// ============================================================================

/// Render rows as a text table with the headers ruled off from the body.
fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut builder = Builder::default();
    builder.push_record(headers.iter().copied());
    for row in rows {
        builder.push_record(row.iter().cloned());
    }
    builder.build().with(Style::psql()).to_string()
}

fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    println!("{}", render_table(headers, rows));
}

fn show_nearby_results(species: &[SpeciesSummary]) {
    if species.is_empty() {
        println!("No CA native trees found in this area (that you haven't seen).");
        return;
    }

    let rows: Vec<Vec<String>> = species
        .iter()
        .map(|s| vec![s.common_name.clone(), s.display_scientific_name.clone(), s.count.to_string()])
        .collect();
    print_table(&["Common Name", "Scientific Name", "Observations"], &rows);
    println!("\n{} species", species.len());
}

fn show_clusters(clusters: &[Cluster], species_name: &str, limit: usize) {
    if clusters.is_empty() {
        println!("No observations found for {} in California.", species_name);
        return;
    }

    println!("\nTop locations for {} in California:\n", species_name);
    let with_distance = clusters.iter().any(|c| c.distance_km.is_some());
    let rows: Vec<Vec<String>> = clusters
        .iter()
        .take(limit)
        .enumerate()
        .map(|(i, c)| {
            let location = if c.place_guess.is_empty() {
                format!("{:.2}, {:.2}", c.center_lat, c.center_lng)
            } else {
                c.place_guess.clone()
            };
            let mut row = vec![(i + 1).to_string(), location, c.count.to_string(), c.last_seen.clone()];
            if with_distance {
                row.push(c.distance_km.map(|d| format!("{:.1}", d)).unwrap_or_default());
            }
            row
        })
        .collect();

    let mut headers = vec!["#", "Location", "Observations", "Last Seen"];
    if with_distance {
        headers.push("Km");
    }
    print_table(&headers, &rows);

    let total: u32 = clusters.iter().map(|c| c.count).sum();
    println!("\n{} total observations across {} locations", total, clusters.len());
}

fn show_nearest(ranked: &[RankedObservation], species_name: &str, limit: usize) {
    if ranked.is_empty() {
        println!("No located observations found for {}.", species_name);
        return;
    }

    println!("\nClosest observations of {}:\n", species_name);
    let rows: Vec<Vec<String>> = ranked
        .iter()
        .take(limit)
        .enumerate()
        .map(|(i, r)| {
            let obs = &r.observation;
            let location = match (&obs.place_guess, obs.location) {
                (Some(place), _) if !place.is_empty() => place.clone(),
                (_, Some(p)) => format!("{:.4}, {:.4}", p.latitude, p.longitude),
                _ => String::new(),
            };
            vec![(i + 1).to_string(), format!("{:.1}", r.distance_km), location, obs.observed_on.clone()]
        })
        .collect();
    print_table(&["#", "Km", "Location", "Observed"], &rows);
}
