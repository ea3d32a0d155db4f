//! Opening the store and creating its schema.
//!
//! Dates are `DATE` columns and timestamps `TIMESTAMP` columns. Values are
//! bound as ISO text and read back through a `::TEXT` cast, so no `DuckDB`
//! chrono integration is needed.

use std::path::Path;

use duckdb::Connection;

use crate::DbError;

/// Raw weather observations, one row per reading.
pub const WEATHER_TABLE: &str = "weather";
/// Raw satellite image metadata.
pub const SENTINEL_METADATA_TABLE: &str = "sentinel_metadata";
/// Windowed weather aggregates.
pub const WEATHER_FEATURES_TABLE: &str = "weather_features";
/// Weekly image counts.
pub const SENTINEL_FEATURES_TABLE: &str = "sentinel_features";
/// Land-use areas per state.
pub const SOCIOECONOMIC_TABLE: &str = "socioeconomic";

/// Opens (or creates) the store and ensures the schema exists.
///
/// # Errors
///
/// Returns [`DbError`] if the connection or schema creation fails.
pub fn open(path: &Path) -> Result<Connection, DbError> {
    if let Some(parent) = path.parent() {
        crate::paths::ensure_dir(parent)?;
    }

    let conn = Connection::open(path)?;
    create_schema(&conn)?;

    log::debug!("Opened store at {}", path.display());

    Ok(conn)
}

/// Opens the store at the default path.
///
/// # Errors
///
/// Returns [`DbError`] if the connection or schema creation fails.
pub fn open_default() -> Result<Connection, DbError> {
    open(&crate::paths::store_db_path())
}

/// Opens an existing store for reading only.
///
/// Several read-only connections may share a file, but none can coexist
/// with a writer.
///
/// # Errors
///
/// Returns [`DbError`] if the file is missing or cannot be opened.
pub fn open_read_only(path: &Path) -> Result<Connection, DbError> {
    let conn = Connection::open_with_flags(
        path,
        duckdb::Config::default().access_mode(duckdb::AccessMode::ReadOnly)?,
    )?;

    log::debug!("Opened store read-only at {}", path.display());

    Ok(conn)
}

/// Opens an in-memory store with the schema created.
///
/// # Errors
///
/// Returns [`DbError`] if the connection or schema creation fails.
pub fn open_in_memory() -> Result<Connection, DbError> {
    let conn = Connection::open_in_memory()?;
    create_schema(&conn)?;
    Ok(conn)
}

fn create_schema(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS weather (
            city TEXT NOT NULL,
            \"timestamp\" TIMESTAMP NOT NULL,
            temperature DOUBLE,
            humidity DOUBLE,
            precipitation DOUBLE
        );

        CREATE TABLE IF NOT EXISTS sentinel_metadata (
            image_id TEXT NOT NULL,
            \"date\" TIMESTAMP NOT NULL,
            region TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS weather_features (
            city TEXT NOT NULL,
            window_start_date DATE NOT NULL,
            avg_precipitation_7d DOUBLE,
            avg_temperature_7d DOUBLE,
            avg_humidity_7d DOUBLE,
            avg_precipitation_30d DOUBLE,
            computed_date DATE
        );

        CREATE TABLE IF NOT EXISTS sentinel_features (
            region TEXT NOT NULL,
            week_start_date DATE NOT NULL,
            image_count BIGINT NOT NULL,
            computed_date DATE
        );

        CREATE TABLE IF NOT EXISTS socioeconomic (
            location TEXT NOT NULL,
            landuse_type TEXT NOT NULL,
            area_sqm DOUBLE NOT NULL
        );",
    )?;

    Ok(())
}

/// Returns the number of rows in `table`.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn row_count(conn: &Connection, table: &str) -> Result<u64, DbError> {
    let count: i64 = conn
        .prepare(&format!("SELECT COUNT(*) FROM {table}"))?
        .query_row([], |row| row.get(0))?;
    u64::try_from(count).map_err(|e| DbError::Conversion {
        message: format!("negative row count for {table}: {e}"),
    })
}

/// Runs `f` inside a transaction, committing on success and rolling back
/// on error.
///
/// # Errors
///
/// Returns whatever `f` returns, or [`DbError`] if the transaction cannot
/// be started or committed.
pub fn in_transaction<T>(
    conn: &Connection,
    f: impl FnOnce(&Connection) -> Result<T, DbError>,
) -> Result<T, DbError> {
    conn.execute_batch("BEGIN TRANSACTION;")?;
    match f(conn) {
        Ok(value) => {
            conn.execute_batch("COMMIT;")?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = conn.execute_batch("ROLLBACK;") {
                log::error!("Rollback failed: {rollback}");
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_every_table() {
        let conn = open_in_memory().unwrap();
        for table in [
            WEATHER_TABLE,
            SENTINEL_METADATA_TABLE,
            WEATHER_FEATURES_TABLE,
            SENTINEL_FEATURES_TABLE,
            SOCIOECONOMIC_TABLE,
        ] {
            assert_eq!(row_count(&conn, table).unwrap(), 0, "{table}");
        }
    }

    #[test]
    fn reopening_keeps_data() {
        let path = std::env::temp_dir()
            .join(uuid::Uuid::new_v4().to_string())
            .join("flood_data.duckdb");

        {
            let conn = open(&path).unwrap();
            conn.execute(
                "INSERT INTO socioeconomic VALUES (?, ?, ?)",
                duckdb::params!["lagos", "residential", 10.0],
            )
            .unwrap();
        }
        let conn = open_read_only(&path).unwrap();
        assert_eq!(row_count(&conn, SOCIOECONOMIC_TABLE).unwrap(), 1);
        drop(conn);

        std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }

    #[test]
    fn failed_transaction_rolls_back() {
        let conn = open_in_memory().unwrap();
        let result: Result<(), DbError> = in_transaction(&conn, |conn| {
            conn.execute(
                "INSERT INTO socioeconomic VALUES (?, ?, ?)",
                duckdb::params!["lagos", "residential", 10.0],
            )?;
            Err(DbError::Conversion {
                message: "boom".to_string(),
            })
        });

        assert!(result.is_err());
        assert_eq!(row_count(&conn, SOCIOECONOMIC_TABLE).unwrap(), 0);
    }
}
