//! Labeled event CSV input and feature table CSV output.
//!
//! Event files carry at least a `date` and a location column. Any further
//! columns are passed through in order, except join-key artifacts and
//! feature columns from an earlier merge, which are dropped so a rerun
//! replaces them instead of duplicating them.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use flood_risk_feature_models::{
    FeatureTable, LabeledEvent, LabeledEventTable, LocationKey, Severity, WeatherColumn,
};

use crate::FeatureError;
use crate::parsing::{format_date, parse_date};

/// Join-key columns left behind by earlier merges.
pub const ARTIFACT_COLUMNS: &[&str] = &[
    "city",
    "city_x",
    "city_y",
    "state",
    "region",
    "window_start_date",
    "closest_weather_date",
];

const DATE_COLUMN: &str = "date";
const SEVERITY_COLUMN: &str = "severity";

/// Columns accepted as the event location, in order of preference.
const LOCATION_COLUMNS: &[&str] = &["location", "state", "city"];

/// Value written for an empty passthrough cell.
const EMPTY_PASSTHROUGH: &str = "0";

fn is_derived_column(name: &str) -> bool {
    name.starts_with("area_")
        || name.starts_with("images_")
        || WeatherColumn::ALL.iter().any(|c| c.name() == name)
}

fn is_reserved_column(name: &str) -> bool {
    name == DATE_COLUMN
        || name == SEVERITY_COLUMN
        || LOCATION_COLUMNS.contains(&name)
        || ARTIFACT_COLUMNS.contains(&name)
        || is_derived_column(name)
}

/// Reads a labeled event table from CSV.
///
/// Rows that cannot be decoded are counted, logged, and skipped. A date
/// that does not parse is kept as `None`.
///
/// # Errors
///
/// Returns [`FeatureError::MissingColumn`] if there is no `date`,
/// location, or `severity` column, or [`FeatureError::Csv`] if the header
/// cannot be read.
pub fn read_events<R: Read>(reader: R) -> Result<LabeledEventTable, FeatureError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = reader.headers()?.clone();

    let position = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));

    let date_idx = position(DATE_COLUMN).ok_or_else(|| FeatureError::MissingColumn {
        column: DATE_COLUMN.to_string(),
    })?;
    let location_idx = LOCATION_COLUMNS
        .iter()
        .find_map(|&c| position(c))
        .ok_or_else(|| FeatureError::MissingColumn {
            column: LOCATION_COLUMNS[0].to_string(),
        })?;
    let severity_idx = position(SEVERITY_COLUMN).ok_or_else(|| FeatureError::MissingColumn {
        column: SEVERITY_COLUMN.to_string(),
    })?;

    let extra_idx: Vec<usize> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| !is_reserved_column(&h.to_lowercase()))
        .map(|(i, _)| i)
        .collect();
    let dropped_columns: Vec<&str> = headers
        .iter()
        .enumerate()
        .filter(|(i, h)| {
            *i != date_idx
                && *i != location_idx
                && *i != severity_idx
                && is_reserved_column(&h.to_lowercase())
        })
        .map(|(_, h)| h)
        .collect();
    if !dropped_columns.is_empty() {
        log::debug!("Discarding input columns: {}", dropped_columns.join(", "));
    }

    let mut events = Vec::new();
    let mut malformed = 0usize;
    let mut undated = 0usize;
    let mut unknown = 0usize;

    for result in reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                log::debug!("Skipping malformed event row: {e}");
                malformed += 1;
                continue;
            }
        };

        let cell = |i: usize| record.get(i).unwrap_or_default();

        let date = parse_date(cell(date_idx));
        if date.is_none() {
            undated += 1;
        }
        let location = LocationKey::normalize(cell(location_idx));
        if !location.is_known() {
            unknown += 1;
        }

        events.push(LabeledEvent {
            date,
            location,
            severity: Severity::normalize(cell(severity_idx)),
            extra: extra_idx
                .iter()
                .map(|&i| match cell(i) {
                    "" => EMPTY_PASSTHROUGH.to_string(),
                    value => value.to_string(),
                })
                .collect(),
        });
    }

    if malformed > 0 {
        log::warn!("Skipped {malformed} malformed event rows");
    }
    if undated > 0 {
        log::warn!("{undated} events have an unparseable date and will use location means");
    }
    if unknown > 0 {
        log::warn!("{unknown} events have an unrecognised location");
    }

    Ok(LabeledEventTable {
        extra_columns: extra_idx
            .iter()
            .map(|&i| headers.get(i).unwrap_or_default().to_string())
            .collect(),
        events,
    })
}

/// Reads a labeled event table from the CSV file at `path`.
///
/// # Errors
///
/// Returns [`FeatureError`] if the file cannot be opened or lacks a
/// required column.
pub fn read_events_file(path: &Path) -> Result<LabeledEventTable, FeatureError> {
    let file = std::fs::File::open(path)?;
    read_events(file)
}

/// Writes a feature table as CSV. Undefined weather values become empty
/// cells.
///
/// # Errors
///
/// Returns [`FeatureError::Csv`] if a record cannot be written.
pub fn write_feature_table<W: Write>(writer: W, table: &FeatureTable) -> Result<(), FeatureError> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(table.header())?;

    for row in &table.rows {
        let mut record: Vec<String> = Vec::with_capacity(
            3 + row.event.extra.len() + row.land_use.len() + row.imagery.len() + 4,
        );
        record.push(row.event.date.map(format_date).unwrap_or_default());
        record.push(row.event.location.to_string());
        record.push(row.event.severity.to_string());
        record.extend(row.event.extra.iter().cloned());
        record.extend(row.land_use.iter().map(ToString::to_string));
        record.extend(row.imagery.iter().map(ToString::to_string));
        record.extend(
            WeatherColumn::ALL
                .iter()
                .map(|c| row.weather.get(*c).map(|v| v.to_string()).unwrap_or_default()),
        );
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

/// Writes a feature table to `path`, replacing any existing file.
///
/// The table is written to a sibling `.tmp` file first and renamed over
/// `path` once complete, so a failed write leaves the previous file intact.
///
/// # Errors
///
/// Returns [`FeatureError`] if the file cannot be created or written.
pub fn write_feature_table_file(path: &Path, table: &FeatureTable) -> Result<(), FeatureError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = temp_path(path);
    let result = std::fs::File::create(&tmp_path)
        .map_err(FeatureError::from)
        .and_then(|file| write_feature_table(file, table))
        .and_then(|()| std::fs::rename(&tmp_path, path).map_err(FeatureError::from));

    if let Err(e) = result {
        if let Err(cleanup) = std::fs::remove_file(&tmp_path) {
            log::debug!("Could not remove {}: {cleanup}", tmp_path.display());
        }
        return Err(e);
    }

    log::info!("Wrote {} rows to {}", table.rows.len(), path.display());
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use flood_risk_feature_models::{FeatureRow, WeatherValues};

    #[test]
    fn reads_events_with_passthrough_columns() {
        let csv = "date,location,severity,country,notes\n\
                   2012-09-15,Lagos,High,NG,\n\
                   2013-01-02,port harcourt,Moderate,NG,coastal\n";

        let table = read_events(csv.as_bytes()).unwrap();

        assert_eq!(table.extra_columns, vec!["country", "notes"]);
        assert_eq!(table.events.len(), 2);
        assert_eq!(table.events[0].date, NaiveDate::from_ymd_opt(2012, 9, 15));
        assert_eq!(table.events[0].extra, vec!["NG", "0"]);
        assert_eq!(table.events[1].location, LocationKey::Rivers);
        assert_eq!(table.events[1].severity, Severity::Medium);
    }

    #[test]
    fn drops_artifact_and_derived_columns() {
        let csv = "date,location,severity,city_x,window_start_date,area_farmland,images_2025-06-02,avg_humidity_7d,country\n\
                   2012-09-15,lagos,Low,lagos,2012-09-10,1.0,3,80,NG\n";

        let table = read_events(csv.as_bytes()).unwrap();

        assert_eq!(table.extra_columns, vec!["country"]);
        assert_eq!(table.events[0].extra, vec!["NG"]);
    }

    #[test]
    fn falls_back_to_state_column_for_location() {
        let csv = "date,state,severity\n2012-09-15,Bayelsa State,Low\n";

        let table = read_events(csv.as_bytes()).unwrap();

        assert_eq!(table.events[0].location, LocationKey::Bayelsa);
        assert_eq!(table.events[0].severity, Severity::Low);
        assert!(table.extra_columns.is_empty());
    }

    #[test]
    fn keeps_undated_events_and_skips_malformed_rows() {
        let csv = "date,location,severity\n\
                   someday,lagos,High\n\
                   2012-09-15,lagos\n\
                   2012-09-16,benue,Low\n";

        let table = read_events(csv.as_bytes()).unwrap();

        assert_eq!(table.events.len(), 2);
        assert_eq!(table.events[0].date, None);
        assert_eq!(table.events[1].location, LocationKey::Benue);
    }

    #[test]
    fn requires_date_and_location_columns() {
        assert!(matches!(
            read_events("location\nlagos\n".as_bytes()),
            Err(FeatureError::MissingColumn { column }) if column == "date"
        ));
        assert!(matches!(
            read_events("date\n2012-09-15\n".as_bytes()),
            Err(FeatureError::MissingColumn { column }) if column == "location"
        ));
    }

    #[test]
    fn missing_severity_column_is_an_error() {
        assert!(matches!(
            read_events("date,location\n2012-09-15,lagos\n".as_bytes()),
            Err(FeatureError::MissingColumn { column }) if column == "severity"
        ));
    }

    #[test]
    fn writes_feature_table_with_empty_undefined_weather() {
        let table = FeatureTable {
            extra_columns: vec!["country".to_string()],
            land_use_columns: vec!["area_farmland".to_string()],
            imagery_columns: vec!["images_2025-06-02".to_string()],
            rows: vec![FeatureRow {
                event: LabeledEvent {
                    date: NaiveDate::from_ymd_opt(2025, 6, 3),
                    location: LocationKey::Lagos,
                    severity: Severity::NoFlood,
                    extra: vec!["NG".to_string()],
                },
                land_use: vec![1500.5],
                imagery: vec![2],
                weather: WeatherValues {
                    avg_precipitation_7d: Some(2.0),
                    avg_temperature_7d: Some(27.5),
                    avg_humidity_7d: Some(80.0),
                    avg_precipitation_30d: None,
                },
            }],
        };

        let mut out = Vec::new();
        write_feature_table(&mut out, &table).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(
            text,
            "date,location,severity,country,area_farmland,images_2025-06-02,\
             avg_precipitation_7d,avg_temperature_7d,avg_humidity_7d,avg_precipitation_30d\n\
             2025-06-03,lagos,No Flood,NG,1500.5,2,2,27.5,80,\n"
        );
    }

    #[test]
    fn rewritten_output_reads_back_as_events() {
        let path = std::env::temp_dir().join(format!("{}.csv", uuid::Uuid::new_v4()));
        let table = FeatureTable {
            extra_columns: Vec::new(),
            land_use_columns: vec!["area_forest".to_string()],
            imagery_columns: Vec::new(),
            rows: vec![FeatureRow {
                event: LabeledEvent {
                    date: NaiveDate::from_ymd_opt(2024, 1, 8),
                    location: LocationKey::Rivers,
                    severity: Severity::High,
                    extra: Vec::new(),
                },
                land_use: vec![10.0],
                imagery: Vec::new(),
                weather: WeatherValues::default(),
            }],
        };

        write_feature_table_file(&path, &table).unwrap();
        let events = read_events_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert!(events.extra_columns.is_empty());
        assert_eq!(events.events[0].location, LocationKey::Rivers);
        assert_eq!(events.events[0].severity, Severity::High);
    }

    #[test]
    fn failed_write_keeps_previous_file() {
        let dir = std::env::temp_dir().join(uuid::Uuid::new_v4().to_string());
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("train_data_with_features.csv");
        std::fs::write(&path, "previous\n").unwrap();
        // a directory in the way of the temp file makes the write fail
        std::fs::create_dir(temp_path(&path)).unwrap();
        let table = FeatureTable {
            extra_columns: Vec::new(),
            land_use_columns: Vec::new(),
            imagery_columns: Vec::new(),
            rows: Vec::new(),
        };

        assert!(write_feature_table_file(&path, &table).is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "previous\n");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn write_replaces_file_without_leaving_temp() {
        let dir = std::env::temp_dir().join(uuid::Uuid::new_v4().to_string());
        let path = dir.join("out.csv");
        let table = FeatureTable {
            extra_columns: Vec::new(),
            land_use_columns: Vec::new(),
            imagery_columns: Vec::new(),
            rows: Vec::new(),
        };

        write_feature_table_file(&path, &table).unwrap();
        write_feature_table_file(&path, &table).unwrap();

        assert!(path.exists());
        assert!(!temp_path(&path).exists());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
