#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Batch steps of the flood-risk pipeline.
//!
//! Each step reads its inputs from the store (or the data directory),
//! recomputes its output from scratch, and replaces the previous output.
//! Steps share nothing but the store, so they can be run individually or
//! in sequence via [`run_all`].

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use duckdb::Connection;
use flood_risk_database::{DbError, paths, queries};
use flood_risk_feature_models::LocationKey;
use flood_risk_features::FeatureError;
use flood_risk_features::events::{read_events_file, write_feature_table_file};
use flood_risk_features::imagery::aggregate_imagery;
use flood_risk_features::joiner::FeatureJoiner;
use flood_risk_features::landuse::load_land_use;
use flood_risk_features::weather::aggregate_all;

/// Errors that abort a pipeline step.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Store error.
    #[error(transparent)]
    Db(#[from] DbError),

    /// Feature extraction or file artifact error.
    #[error(transparent)]
    Feature(#[from] FeatureError),
}

/// Recomputes the `weather_features` table from the raw observations.
///
/// Returns the number of windows written.
///
/// # Errors
///
/// Returns [`PipelineError`] if the store cannot be read or written. A
/// location whose aggregation fails is logged and skipped.
pub fn weather_features(
    conn: &Connection,
    computed_date: Option<NaiveDate>,
) -> Result<u64, PipelineError> {
    let observations = queries::load_observations(conn)?;
    let windows = aggregate_all(&observations, computed_date);
    Ok(queries::replace_weather_features(conn, &windows)?)
}

/// Recomputes the `sentinel_features` table from the raw image metadata.
///
/// # Errors
///
/// Returns [`PipelineError`] if the store cannot be read or written.
pub fn sentinel_features(
    conn: &Connection,
    computed_date: Option<NaiveDate>,
) -> Result<u64, PipelineError> {
    let images = queries::load_imagery(conn)?;
    let weeks = aggregate_imagery(&images, computed_date);
    Ok(queries::replace_sentinel_features(conn, &weeks)?)
}

/// Outcome of a land-use run, per state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LandUseReport {
    /// States whose areas were recomputed and written.
    pub processed: Vec<LocationKey>,
    /// States with no land-use file; their stored rows are left as they are.
    pub missing: Vec<LocationKey>,
    /// States whose file could not be read or measured.
    pub failed: Vec<LocationKey>,
}

/// Recomputes land-use areas for every covered state from the cleaned
/// `GeoJSON` files in `landuse_dir`.
///
/// Each state is handled on its own: a missing or broken file is logged
/// and the remaining states still run.
///
/// # Errors
///
/// Returns [`PipelineError`] only if the store write fails.
pub fn landuse_features(
    conn: &Connection,
    landuse_dir: &Path,
) -> Result<LandUseReport, PipelineError> {
    let mut report = LandUseReport::default();

    for &state in LocationKey::KNOWN {
        let path = paths::landuse_geojson_file(landuse_dir, state);

        match load_land_use(state, &path) {
            Ok(Some(summary)) => {
                queries::replace_land_use(conn, state, &summary.areas)?;
                report.processed.push(state);
            }
            Ok(None) => {
                log::warn!("No land-use file for {state} at {}, skipping", path.display());
                report.missing.push(state);
            }
            Err(e) => {
                log::warn!("Failed to process land use for {state}: {e}");
                report.failed.push(state);
            }
        }
    }

    log::info!(
        "Land use: {} processed, {} missing, {} failed",
        report.processed.len(),
        report.missing.len(),
        report.failed.len()
    );

    Ok(report)
}

/// One labeled event file to enrich and where to write the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeJob {
    pub input: PathBuf,
    pub output: PathBuf,
}

impl MergeJob {
    /// The training and test jobs at their canonical paths.
    #[must_use]
    pub fn defaults() -> Vec<Self> {
        vec![
            Self {
                input: paths::train_events_path(),
                output: paths::train_features_path(),
            },
            Self {
                input: paths::test_events_path(),
                output: paths::test_features_path(),
            },
        ]
    }
}

/// Outcome of a merge run, per job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Outputs written.
    pub written: Vec<PathBuf>,
    /// Inputs that do not exist; their outputs are left as they are.
    pub missing: Vec<PathBuf>,
    /// Inputs that could not be read, or whose output could not be written.
    pub failed: Vec<PathBuf>,
}

/// Joins the current feature tables onto each job's labeled events and
/// writes the results, replacing earlier outputs.
///
/// Each job is handled on its own: a missing or unreadable event file is
/// logged and the remaining jobs still run.
///
/// # Errors
///
/// Returns [`PipelineError`] only if the store cannot be read.
pub fn merge(conn: &Connection, jobs: &[MergeJob]) -> Result<MergeReport, PipelineError> {
    let land_use = queries::load_land_use(conn)?;
    let imagery = queries::load_sentinel_features(conn)?;
    let weather = queries::load_weather_features(conn)?;

    log::info!(
        "Merging with {} land-use rows, {} imagery weeks, {} weather windows",
        land_use.len(),
        imagery.len(),
        weather.len()
    );

    let joiner = FeatureJoiner::new(&land_use, &imagery, &weather);
    let mut report = MergeReport::default();

    for job in jobs {
        if !job.input.exists() {
            log::warn!("Event file {} not found, skipping", job.input.display());
            report.missing.push(job.input.clone());
            continue;
        }

        log::info!("Merging features into {}", job.input.display());
        let result = read_events_file(&job.input)
            .and_then(|events| write_feature_table_file(&job.output, &joiner.join(events)));

        match result {
            Ok(()) => report.written.push(job.output.clone()),
            Err(e) => {
                log::warn!("Failed to merge {}: {e}", job.input.display());
                report.failed.push(job.input.clone());
            }
        }
    }

    log::info!(
        "Merge: {} written, {} missing, {} failed",
        report.written.len(),
        report.missing.len(),
        report.failed.len()
    );

    Ok(report)
}

/// Runs the three feature steps followed by the merge.
///
/// # Errors
///
/// Returns the first [`PipelineError`] raised by any step.
pub fn run_all(
    conn: &Connection,
    landuse_dir: &Path,
    jobs: &[MergeJob],
    computed_date: Option<NaiveDate>,
) -> Result<(), PipelineError> {
    weather_features(conn, computed_date)?;
    sentinel_features(conn, computed_date)?;
    landuse_features(conn, landuse_dir)?;
    merge(conn, jobs)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flood_risk_database::import::{import_sentinel, import_weather};
    use flood_risk_database::store::open_in_memory;

    const WEATHER_CSV: &str = "city,timestamp,temperature,humidity,precipitation\n\
        lagos,2024-01-01 00:00:00,20,50,0\n\
        lagos,2024-01-03 00:00:00,20,50,2\n\
        lagos,2024-01-05 00:00:00,20,50,4\n\
        lagos,2024-01-09 00:00:00,20,50,6\n\
        rivers,2024-01-01 00:00:00,30,90,10\n";

    const SENTINEL_CSV: &str = "image_id,date,region\n\
        a,2024-01-02,lagos\n\
        b,2024-01-03,lagos\n\
        b,2024-01-03,lagos\n\
        c,2024-01-10,rivers\n";

    const EVENTS_CSV: &str = "date,location,severity,country\n\
        2024-01-04,Lagos,High,NG\n\
        2024-01-08,Lagos,,NG\n\
        2024-02-01,Benue,Low,\n\
        unknown,Rivers,Moderate,NG\n";

    fn pinned() -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(2025, 6, 1)
    }

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(uuid::Uuid::new_v4().to_string());
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn seeded_store() -> Connection {
        let conn = open_in_memory().unwrap();
        import_weather(&conn, WEATHER_CSV.as_bytes()).unwrap();
        import_sentinel(&conn, SENTINEL_CSV.as_bytes()).unwrap();
        conn
    }

    fn write_lagos_landuse(dir: &Path) {
        let document = r#"{
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": { "landuse": "residential" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[3.40, 6.50], [3.41, 6.50], [3.41, 6.51], [3.40, 6.51], [3.40, 6.50]]]
                }
            }]
        }"#;
        std::fs::write(
            paths::landuse_geojson_file(dir, LocationKey::Lagos),
            document,
        )
        .unwrap();
    }

    #[test]
    fn weather_step_matches_worked_example() {
        let conn = seeded_store();

        let written = weather_features(&conn, pinned()).unwrap();
        let windows = queries::load_weather_features(&conn).unwrap();

        assert_eq!(written, 3);
        let lagos: Vec<_> = windows
            .iter()
            .filter(|w| w.location == LocationKey::Lagos)
            .collect();
        assert_eq!(lagos.len(), 2);
        assert_eq!(lagos[0].values.avg_precipitation_7d, Some(2.0));
        assert_eq!(lagos[0].values.avg_humidity_7d, Some(50.0));
        assert_eq!(lagos[1].window_start, NaiveDate::from_ymd_opt(2024, 1, 8).unwrap());
        assert_eq!(lagos[1].values.avg_precipitation_7d, Some(6.0));
        assert_eq!(lagos[1].computed_date, pinned());
    }

    #[test]
    fn sentinel_step_counts_distinct_images() {
        let conn = seeded_store();

        assert_eq!(sentinel_features(&conn, pinned()).unwrap(), 2);

        let weeks = queries::load_sentinel_features(&conn).unwrap();
        let lagos = weeks.iter().find(|w| w.region == LocationKey::Lagos).unwrap();
        assert_eq!(lagos.image_count, 2);
    }

    #[test]
    fn landuse_step_isolates_states() {
        let conn = open_in_memory().unwrap();
        let dir = temp_dir();
        write_lagos_landuse(&dir);
        std::fs::write(
            paths::landuse_geojson_file(&dir, LocationKey::Rivers),
            "{ broken",
        )
        .unwrap();

        let report = landuse_features(&conn, &dir).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        assert_eq!(report.processed, vec![LocationKey::Lagos]);
        assert_eq!(report.failed, vec![LocationKey::Rivers]);
        assert_eq!(report.missing, vec![LocationKey::Benue, LocationKey::Bayelsa]);
        assert_eq!(queries::load_land_use(&conn).unwrap().len(), 1);
    }

    #[test]
    fn run_all_writes_enriched_events() {
        let conn = seeded_store();
        let dir = temp_dir();
        write_lagos_landuse(&dir);
        let input = dir.join("train_data.csv");
        std::fs::write(&input, EVENTS_CSV).unwrap();
        let jobs = vec![
            MergeJob {
                input: input.clone(),
                output: dir.join("train_data_with_features.csv"),
            },
            MergeJob {
                input: dir.join("test_data.csv"),
                output: dir.join("test_data_with_features.csv"),
            },
        ];

        run_all(&conn, &dir, &jobs, pinned()).unwrap();
        let output = std::fs::read_to_string(&jobs[0].output).unwrap();

        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(
            lines[0],
            "date,location,severity,country,area_residential,\
             images_2024-01-01,images_2024-01-08,\
             avg_precipitation_7d,avg_temperature_7d,avg_humidity_7d,avg_precipitation_30d"
        );
        assert_eq!(lines.len(), 5);
        assert!(lines[1].starts_with("2024-01-04,lagos,High,NG,"));
        assert!(lines[1].ends_with(",2,0,2,20,50,3"), "{}", lines[1]);
        // 2024-01-08 is itself a window start
        assert!(lines[2].ends_with(",2,0,6,20,50,6"), "{}", lines[2]);
        // no land use, no images, no weather for benue
        assert_eq!(lines[3], "2024-02-01,benue,Low,0,0,0,0,,,,");
        // undated event takes the rivers means
        assert!(lines[4].starts_with(",rivers,Medium,NG,0,0,1,10,30,90,10"), "{}", lines[4]);
        assert!(!jobs[1].output.exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn bad_event_file_does_not_stop_other_jobs() {
        let conn = seeded_store();
        let dir = temp_dir();
        let train = dir.join("train_data.csv");
        let test = dir.join("test_data.csv");
        let unlabeled = dir.join("unlabeled.csv");
        std::fs::write(&train, "foo,bar\n1,2\n").unwrap();
        std::fs::write(&test, "date,location,severity\n2024-01-01,lagos,High\n").unwrap();
        std::fs::write(&unlabeled, "date,location\n2024-01-01,lagos\n").unwrap();
        let jobs = vec![
            MergeJob {
                input: train.clone(),
                output: dir.join("train_data_with_features.csv"),
            },
            MergeJob {
                input: unlabeled.clone(),
                output: dir.join("unlabeled_with_features.csv"),
            },
            MergeJob {
                input: test,
                output: dir.join("test_data_with_features.csv"),
            },
            MergeJob {
                input: dir.join("absent.csv"),
                output: dir.join("absent_with_features.csv"),
            },
        ];

        let report = merge(&conn, &jobs).unwrap();

        assert_eq!(report.written, vec![jobs[2].output.clone()]);
        assert_eq!(report.failed, vec![train, unlabeled]);
        assert_eq!(report.missing, vec![jobs[3].input.clone()]);
        assert!(jobs[2].output.exists());
        assert!(!jobs[0].output.exists());
        assert!(!jobs[1].output.exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn rerun_is_byte_identical() {
        let conn = seeded_store();
        let dir = temp_dir();
        let input = dir.join("events.csv");
        std::fs::write(&input, EVENTS_CSV).unwrap();
        let jobs = vec![MergeJob {
            input,
            output: dir.join("out.csv"),
        }];

        run_all(&conn, &dir, &jobs, pinned()).unwrap();
        let first = std::fs::read(&jobs[0].output).unwrap();
        run_all(&conn, &dir, &jobs, pinned()).unwrap();
        let second = std::fs::read(&jobs[0].output).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        assert_eq!(first, second);
    }
}
