#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI for the flood-risk pipeline.
//!
//! Imports raw CSV exports into the store, recomputes the derived feature
//! tables, and merges them onto the labeled training and test events.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use flood_risk_database::{import, paths, store};
use flood_risk_pipeline::MergeJob;

#[derive(Parser)]
#[command(name = "flood_risk_pipeline", about = "Flood-risk feature pipeline")]
struct Cli {
    /// Path to the `DuckDB` store (defaults to `$FLOOD_RISK_DB` or
    /// `<data>/flood_data.duckdb`)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct RunDate {
    /// Date stamped on derived rows (defaults to today)
    #[arg(long)]
    computed_date: Option<NaiveDate>,
}

impl RunDate {
    fn resolve(&self) -> NaiveDate {
        self.computed_date
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }
}

#[derive(Args)]
struct LandUseDir {
    /// Directory holding `<state>_landuse_cleaned_valid.geojson` files
    #[arg(long)]
    landuse_dir: Option<PathBuf>,
}

impl LandUseDir {
    fn resolve(&self) -> PathBuf {
        self.landuse_dir.clone().unwrap_or_else(paths::data_dir)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Replace the raw weather table from a CSV export
    ImportWeather {
        /// CSV with `city,timestamp,temperature,humidity,precipitation`
        csv: PathBuf,
    },
    /// Replace the raw satellite metadata table from a CSV export
    ImportSentinel {
        /// CSV with `image_id,date,region`
        csv: PathBuf,
    },
    /// Recompute windowed weather features
    WeatherFeatures {
        #[command(flatten)]
        run_date: RunDate,
    },
    /// Recompute weekly satellite image counts
    SentinelFeatures {
        #[command(flatten)]
        run_date: RunDate,
    },
    /// Recompute land-use areas per state
    LanduseFeatures {
        #[command(flatten)]
        landuse_dir: LandUseDir,
    },
    /// Merge feature tables onto the labeled train and test events
    Merge,
    /// Run all feature steps, then merge
    All {
        #[command(flatten)]
        run_date: RunDate,
        #[command(flatten)]
        landuse_dir: LandUseDir,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let db_path = cli.db.unwrap_or_else(paths::store_db_path);
    log::info!("Using store at {}", db_path.display());
    let conn = store::open(&db_path)?;

    match cli.command {
        Commands::ImportWeather { csv } => {
            import::import_weather_file(&conn, &csv)?;
        }
        Commands::ImportSentinel { csv } => {
            import::import_sentinel_file(&conn, &csv)?;
        }
        Commands::WeatherFeatures { run_date } => {
            flood_risk_pipeline::weather_features(&conn, Some(run_date.resolve()))?;
        }
        Commands::SentinelFeatures { run_date } => {
            flood_risk_pipeline::sentinel_features(&conn, Some(run_date.resolve()))?;
        }
        Commands::LanduseFeatures { landuse_dir } => {
            flood_risk_pipeline::landuse_features(&conn, &landuse_dir.resolve())?;
        }
        Commands::Merge => {
            flood_risk_pipeline::merge(&conn, &MergeJob::defaults())?;
        }
        Commands::All {
            run_date,
            landuse_dir,
        } => {
            flood_risk_pipeline::run_all(
                &conn,
                &landuse_dir.resolve(),
                &MergeJob::defaults(),
                Some(run_date.resolve()),
            )?;
        }
    }

    Ok(())
}
