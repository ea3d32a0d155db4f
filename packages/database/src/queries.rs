//! Full-table reads and replace-mode writes for every store table.
//!
//! Reads never push filters down: each loader returns the whole table and
//! the caller decides what to keep. Rows that do not convert (unknown
//! location, unparseable date) are skipped and counted.

use chrono::NaiveDate;
use duckdb::Connection;
use flood_risk_feature_models::{
    ImageryRecord, ImageryWeekFeature, LandUseArea, LocationKey, ObservationRecord, WeatherValues,
    WeatherWindowFeature,
};
use flood_risk_features::parsing::{format_date, parse_date, parse_timestamp};

use crate::DbError;
use crate::store::{
    SENTINEL_FEATURES_TABLE, SENTINEL_METADATA_TABLE, SOCIOECONOMIC_TABLE, WEATHER_FEATURES_TABLE,
    WEATHER_TABLE, in_transaction,
};

fn warn_skipped(table: &str, skipped: usize) {
    if skipped > 0 {
        log::warn!("{table}: skipped {skipped} rows that could not be converted");
    }
}

fn known_location(raw: &str) -> Option<LocationKey> {
    Some(LocationKey::normalize(raw)).filter(|l| l.is_known())
}

fn format_optional_date(date: Option<NaiveDate>) -> Option<String> {
    date.map(format_date)
}

/// Loads every weather observation, ordered by location and timestamp.
///
/// Missing readings are replaced with `0.0` so that a record still counts
/// towards its window.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn load_observations(conn: &Connection) -> Result<Vec<ObservationRecord>, DbError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT city, \"timestamp\"::TEXT, temperature, humidity, precipitation
         FROM {WEATHER_TABLE}
         ORDER BY city, \"timestamp\""
    ))?;
    let mut rows = stmt.query([])?;

    let mut records = Vec::new();
    let mut skipped = 0usize;
    let mut filled = 0usize;

    while let Some(row) = rows.next()? {
        let city: String = row.get(0)?;
        let timestamp: String = row.get(1)?;
        let readings: [Option<f64>; 3] = [row.get(2)?, row.get(3)?, row.get(4)?];

        let (Some(location), Some(timestamp)) = (known_location(&city), parse_timestamp(&timestamp))
        else {
            skipped += 1;
            continue;
        };

        filled += readings.iter().filter(|r| r.is_none()).count();
        let [temperature, humidity, precipitation] = readings.map(|r| r.unwrap_or(0.0));

        records.push(ObservationRecord {
            location,
            timestamp,
            temperature,
            humidity,
            precipitation,
        });
    }

    warn_skipped(WEATHER_TABLE, skipped);
    if filled > 0 {
        log::info!("Filled {filled} missing weather readings with 0");
    }
    log::info!("Loaded {} weather observations", records.len());

    Ok(records)
}

/// Loads all satellite image metadata in insertion order.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn load_imagery(conn: &Connection) -> Result<Vec<ImageryRecord>, DbError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT image_id, \"date\"::TEXT, region FROM {SENTINEL_METADATA_TABLE} ORDER BY rowid"
    ))?;
    let mut rows = stmt.query([])?;

    let mut records = Vec::new();
    let mut skipped = 0usize;

    while let Some(row) = rows.next()? {
        let image_id: String = row.get(0)?;
        let date: String = row.get(1)?;
        let region: String = row.get(2)?;

        let (Some(region), Some(captured_at)) = (known_location(&region), parse_timestamp(&date))
        else {
            skipped += 1;
            continue;
        };

        records.push(ImageryRecord {
            image_id,
            captured_at,
            region,
        });
    }

    warn_skipped(SENTINEL_METADATA_TABLE, skipped);
    log::info!("Loaded {} satellite image records", records.len());

    Ok(records)
}

/// Replaces the `weather_features` table.
///
/// Returns the number of rows written.
///
/// # Errors
///
/// Returns [`DbError`] if any write fails; the previous contents are kept
/// in that case.
pub fn replace_weather_features(
    conn: &Connection,
    features: &[WeatherWindowFeature],
) -> Result<u64, DbError> {
    in_transaction(conn, |conn| {
        conn.execute(&format!("DELETE FROM {WEATHER_FEATURES_TABLE}"), [])?;

        let mut stmt = conn.prepare(&format!(
            "INSERT INTO {WEATHER_FEATURES_TABLE} (
                city, window_start_date,
                avg_precipitation_7d, avg_temperature_7d, avg_humidity_7d, avg_precipitation_30d,
                computed_date
            ) VALUES (?, CAST(? AS DATE), ?, ?, ?, ?, CAST(? AS DATE))"
        ))?;

        let mut total = 0u64;
        for feature in features {
            let rows = stmt.execute(duckdb::params![
                feature.location.as_ref(),
                format_date(feature.window_start),
                feature.values.avg_precipitation_7d,
                feature.values.avg_temperature_7d,
                feature.values.avg_humidity_7d,
                feature.values.avg_precipitation_30d,
                format_optional_date(feature.computed_date),
            ])?;
            total += u64::try_from(rows).unwrap_or(0);
        }

        log::info!("Wrote {total} rows to {WEATHER_FEATURES_TABLE}");
        Ok(total)
    })
}

/// Loads the `weather_features` table, ordered by location and window.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn load_weather_features(conn: &Connection) -> Result<Vec<WeatherWindowFeature>, DbError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT city, window_start_date::TEXT,
                avg_precipitation_7d, avg_temperature_7d, avg_humidity_7d, avg_precipitation_30d,
                computed_date::TEXT
         FROM {WEATHER_FEATURES_TABLE}
         ORDER BY city, window_start_date"
    ))?;
    let mut rows = stmt.query([])?;

    let mut features = Vec::new();
    let mut skipped = 0usize;

    while let Some(row) = rows.next()? {
        let city: String = row.get(0)?;
        let window_start: String = row.get(1)?;
        let computed_date: Option<String> = row.get(6)?;

        let (Some(location), Some(window_start)) =
            (known_location(&city), parse_date(&window_start))
        else {
            skipped += 1;
            continue;
        };

        features.push(WeatherWindowFeature {
            location,
            window_start,
            values: WeatherValues {
                avg_precipitation_7d: row.get(2)?,
                avg_temperature_7d: row.get(3)?,
                avg_humidity_7d: row.get(4)?,
                avg_precipitation_30d: row.get(5)?,
            },
            computed_date: computed_date.as_deref().and_then(parse_date),
        });
    }

    warn_skipped(WEATHER_FEATURES_TABLE, skipped);

    Ok(features)
}

/// Replaces the `sentinel_features` table.
///
/// # Errors
///
/// Returns [`DbError`] if any write fails.
pub fn replace_sentinel_features(
    conn: &Connection,
    features: &[ImageryWeekFeature],
) -> Result<u64, DbError> {
    in_transaction(conn, |conn| {
        conn.execute(&format!("DELETE FROM {SENTINEL_FEATURES_TABLE}"), [])?;

        let mut stmt = conn.prepare(&format!(
            "INSERT INTO {SENTINEL_FEATURES_TABLE} (region, week_start_date, image_count, computed_date)
             VALUES (?, CAST(? AS DATE), ?, CAST(? AS DATE))"
        ))?;

        let mut total = 0u64;
        for feature in features {
            let image_count = i64::try_from(feature.image_count).map_err(|e| DbError::Conversion {
                message: format!("image count {} out of range: {e}", feature.image_count),
            })?;
            let rows = stmt.execute(duckdb::params![
                feature.region.as_ref(),
                format_date(feature.week_start),
                image_count,
                format_optional_date(feature.computed_date),
            ])?;
            total += u64::try_from(rows).unwrap_or(0);
        }

        log::info!("Wrote {total} rows to {SENTINEL_FEATURES_TABLE}");
        Ok(total)
    })
}

/// Loads the `sentinel_features` table, ordered by region and week.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn load_sentinel_features(conn: &Connection) -> Result<Vec<ImageryWeekFeature>, DbError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT region, week_start_date::TEXT, image_count, computed_date::TEXT
         FROM {SENTINEL_FEATURES_TABLE}
         ORDER BY region, week_start_date"
    ))?;
    let mut rows = stmt.query([])?;

    let mut features = Vec::new();
    let mut skipped = 0usize;

    while let Some(row) = rows.next()? {
        let region: String = row.get(0)?;
        let week_start: String = row.get(1)?;
        let image_count: i64 = row.get(2)?;
        let computed_date: Option<String> = row.get(3)?;

        let (Some(region), Some(week_start), Ok(image_count)) = (
            known_location(&region),
            parse_date(&week_start),
            u64::try_from(image_count),
        ) else {
            skipped += 1;
            continue;
        };

        features.push(ImageryWeekFeature {
            region,
            week_start,
            image_count,
            computed_date: computed_date.as_deref().and_then(parse_date),
        });
    }

    warn_skipped(SENTINEL_FEATURES_TABLE, skipped);

    Ok(features)
}

/// Replaces one state's rows in the `socioeconomic` table, leaving other
/// states untouched.
///
/// # Errors
///
/// Returns [`DbError`] if any write fails.
pub fn replace_land_use(
    conn: &Connection,
    state: LocationKey,
    areas: &[LandUseArea],
) -> Result<u64, DbError> {
    in_transaction(conn, |conn| {
        conn.execute(
            &format!("DELETE FROM {SOCIOECONOMIC_TABLE} WHERE location = ?"),
            [state.as_ref()],
        )?;

        let mut stmt = conn.prepare(&format!(
            "INSERT INTO {SOCIOECONOMIC_TABLE} (location, landuse_type, area_sqm) VALUES (?, ?, ?)"
        ))?;

        let mut total = 0u64;
        for area in areas.iter().filter(|a| a.state == state) {
            let rows = stmt.execute(duckdb::params![
                state.as_ref(),
                area.landuse_type,
                area.area_sqm,
            ])?;
            total += u64::try_from(rows).unwrap_or(0);
        }

        log::info!("Wrote {total} land-use rows for {state}");
        Ok(total)
    })
}

/// Loads the `socioeconomic` table, ordered by state and category.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn load_land_use(conn: &Connection) -> Result<Vec<LandUseArea>, DbError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT location, landuse_type, area_sqm
         FROM {SOCIOECONOMIC_TABLE}
         ORDER BY location, landuse_type"
    ))?;
    let mut rows = stmt.query([])?;

    let mut areas = Vec::new();
    let mut skipped = 0usize;

    while let Some(row) = rows.next()? {
        let location: String = row.get(0)?;
        let Some(state) = known_location(&location) else {
            skipped += 1;
            continue;
        };

        areas.push(LandUseArea {
            state,
            landuse_type: row.get(1)?,
            area_sqm: row.get(2)?,
        });
    }

    warn_skipped(SOCIOECONOMIC_TABLE, skipped);

    Ok(areas)
}
