//! Raw table import from CSV exports.
//!
//! Both imports replace the whole raw table. Rows with an unrecognised
//! location, an unparseable timestamp, or a non-numeric reading are dropped
//! and counted; empty readings are stored as `NULL`.

use std::io::Read;
use std::path::Path;

use duckdb::Connection;
use flood_risk_feature_models::LocationKey;
use flood_risk_features::parsing::{
    parse_epoch_millis_or_timestamp, parse_optional_f64, parse_timestamp,
};

use crate::DbError;
use crate::store::{SENTINEL_METADATA_TABLE, WEATHER_TABLE, in_transaction};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Row counts from a single import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Rows written to the table.
    pub inserted: u64,
    /// Rows that could not be decoded at all.
    pub malformed: usize,
    /// Rows whose location is not one of the covered states.
    pub unknown_location: usize,
    /// Rows whose timestamp could not be parsed.
    pub bad_timestamp: usize,
    /// Rows with a reading that is neither empty nor a finite number.
    pub bad_value: usize,
}

impl ImportSummary {
    /// Total rows dropped for any reason.
    #[must_use]
    pub const fn dropped(&self) -> usize {
        self.malformed + self.unknown_location + self.bad_timestamp + self.bad_value
    }

    fn log(&self, table: &str) {
        log::info!("Imported {} rows into {table}", self.inserted);
        if self.malformed > 0 {
            log::warn!("{table}: skipped {} malformed rows", self.malformed);
        }
        if self.unknown_location > 0 {
            log::warn!(
                "{table}: dropped {} rows with an unrecognised location",
                self.unknown_location
            );
        }
        if self.bad_timestamp > 0 {
            log::warn!(
                "{table}: dropped {} rows with an unparseable timestamp",
                self.bad_timestamp
            );
        }
        if self.bad_value > 0 {
            log::warn!(
                "{table}: dropped {} rows with a non-numeric reading",
                self.bad_value
            );
        }
    }
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Result<usize, DbError> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
        .ok_or_else(|| DbError::Conversion {
            message: format!("missing required column: {name}"),
        })
}

struct WeatherRow {
    city: LocationKey,
    timestamp: String,
    temperature: Option<f64>,
    humidity: Option<f64>,
    precipitation: Option<f64>,
}

/// Replaces the `weather` table with the rows of a CSV export.
///
/// Expected columns: `city`, `timestamp`, `temperature`, `humidity`,
/// `precipitation`.
///
/// # Errors
///
/// Returns [`DbError`] if a required column is missing or the store write
/// fails.
pub fn import_weather<R: Read>(conn: &Connection, reader: R) -> Result<ImportSummary, DbError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = reader.headers()?.clone();

    let city_idx = column_index(&headers, "city")?;
    let timestamp_idx = column_index(&headers, "timestamp")?;
    let temperature_idx = column_index(&headers, "temperature")?;
    let humidity_idx = column_index(&headers, "humidity")?;
    let precipitation_idx = column_index(&headers, "precipitation")?;

    let mut summary = ImportSummary::default();
    let mut rows = Vec::new();

    for result in reader.records() {
        let Ok(record) = result else {
            summary.malformed += 1;
            continue;
        };
        let cell = |i: usize| record.get(i).unwrap_or_default();

        let city = LocationKey::normalize(cell(city_idx));
        if !city.is_known() {
            summary.unknown_location += 1;
            continue;
        }

        let Some(timestamp) = parse_timestamp(cell(timestamp_idx)) else {
            summary.bad_timestamp += 1;
            continue;
        };

        let (Ok(temperature), Ok(humidity), Ok(precipitation)) = (
            parse_optional_f64(cell(temperature_idx)),
            parse_optional_f64(cell(humidity_idx)),
            parse_optional_f64(cell(precipitation_idx)),
        ) else {
            summary.bad_value += 1;
            continue;
        };

        rows.push(WeatherRow {
            city,
            timestamp: timestamp.format(TIMESTAMP_FORMAT).to_string(),
            temperature,
            humidity,
            precipitation,
        });
    }

    summary.inserted = in_transaction(conn, |conn| {
        conn.execute(&format!("DELETE FROM {WEATHER_TABLE}"), [])?;

        let mut stmt = conn.prepare(&format!(
            "INSERT INTO {WEATHER_TABLE} (city, \"timestamp\", temperature, humidity, precipitation)
             VALUES (?, CAST(? AS TIMESTAMP), ?, ?, ?)"
        ))?;
        let mut total = 0u64;
        for row in &rows {
            let inserted = stmt.execute(duckdb::params![
                row.city.as_ref(),
                row.timestamp,
                row.temperature,
                row.humidity,
                row.precipitation,
            ])?;
            total += u64::try_from(inserted).unwrap_or(0);
        }
        Ok(total)
    })?;

    summary.log(WEATHER_TABLE);
    Ok(summary)
}

/// Replaces the `weather` table from the CSV file at `path`.
///
/// # Errors
///
/// Returns [`DbError`] if the file cannot be read or the import fails.
pub fn import_weather_file(conn: &Connection, path: &Path) -> Result<ImportSummary, DbError> {
    log::info!("Importing weather observations from {}", path.display());
    import_weather(conn, std::fs::File::open(path)?)
}

/// Replaces the `sentinel_metadata` table with the rows of a CSV export.
///
/// Expected columns: `image_id`, `date` (epoch milliseconds or an ISO
/// timestamp), `region`.
///
/// # Errors
///
/// Returns [`DbError`] if a required column is missing or the store write
/// fails.
pub fn import_sentinel<R: Read>(conn: &Connection, reader: R) -> Result<ImportSummary, DbError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = reader.headers()?.clone();

    let id_idx = column_index(&headers, "image_id")?;
    let date_idx = column_index(&headers, "date")?;
    let region_idx = column_index(&headers, "region")?;

    let mut summary = ImportSummary::default();
    let mut rows: Vec<(String, String, LocationKey)> = Vec::new();

    for result in reader.records() {
        let Ok(record) = result else {
            summary.malformed += 1;
            continue;
        };
        let cell = |i: usize| record.get(i).unwrap_or_default();

        let image_id = cell(id_idx);
        if image_id.is_empty() {
            summary.malformed += 1;
            continue;
        }

        let region = LocationKey::normalize(cell(region_idx));
        if !region.is_known() {
            summary.unknown_location += 1;
            continue;
        }

        let Some(captured_at) = parse_epoch_millis_or_timestamp(cell(date_idx)) else {
            summary.bad_timestamp += 1;
            continue;
        };

        rows.push((
            image_id.to_string(),
            captured_at.format(TIMESTAMP_FORMAT).to_string(),
            region,
        ));
    }

    summary.inserted = in_transaction(conn, |conn| {
        conn.execute(&format!("DELETE FROM {SENTINEL_METADATA_TABLE}"), [])?;

        let mut stmt = conn.prepare(&format!(
            "INSERT INTO {SENTINEL_METADATA_TABLE} (image_id, \"date\", region)
             VALUES (?, CAST(? AS TIMESTAMP), ?)"
        ))?;
        let mut total = 0u64;
        for (image_id, date, region) in &rows {
            let inserted = stmt.execute(duckdb::params![image_id, date, region.as_ref()])?;
            total += u64::try_from(inserted).unwrap_or(0);
        }
        Ok(total)
    })?;

    summary.log(SENTINEL_METADATA_TABLE);
    Ok(summary)
}

/// Replaces the `sentinel_metadata` table from the CSV file at `path`.
///
/// # Errors
///
/// Returns [`DbError`] if the file cannot be read or the import fails.
pub fn import_sentinel_file(conn: &Connection, path: &Path) -> Result<ImportSummary, DbError> {
    log::info!("Importing satellite metadata from {}", path.display());
    import_sentinel(conn, std::fs::File::open(path)?)
}
