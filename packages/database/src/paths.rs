#![allow(clippy::module_name_repetitions)]
//! Canonical file paths for the data directory.
//!
//! Everything lives under the data directory: `$FLOOD_RISK_DATA_DIR` when
//! set, otherwise the project root's `data/` directory.

use std::path::{Path, PathBuf};

use flood_risk_feature_models::LocationKey;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "FLOOD_RISK_DATA_DIR";

/// Environment variable overriding the store path.
pub const DB_PATH_ENV: &str = "FLOOD_RISK_DB";

/// Returns the workspace root directory.
///
/// Resolved at compile time from `CARGO_MANIFEST_DIR`.
///
/// # Panics
///
/// Panics if the project root cannot be resolved.
#[must_use]
pub fn project_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .expect("Failed to find project root from CARGO_MANIFEST_DIR")
        .to_path_buf()
}

/// Returns the data directory.
#[must_use]
pub fn data_dir() -> PathBuf {
    std::env::var_os(DATA_DIR_ENV)
        .filter(|v| !v.is_empty())
        .map_or_else(|| project_root().join("data"), PathBuf::from)
}

/// Returns the path of the `DuckDB` store file.
#[must_use]
pub fn store_db_path() -> PathBuf {
    std::env::var_os(DB_PATH_ENV)
        .filter(|v| !v.is_empty())
        .map_or_else(|| data_dir().join("flood_data.duckdb"), PathBuf::from)
}

/// Returns the cleaned land-use `GeoJSON` file for `state` inside `dir`.
#[must_use]
pub fn landuse_geojson_file(dir: &Path, state: LocationKey) -> PathBuf {
    dir.join(format!("{state}_landuse_cleaned_valid.geojson"))
}

/// Returns the cleaned land-use `GeoJSON` file for `state` in the data
/// directory.
#[must_use]
pub fn landuse_geojson_path(state: LocationKey) -> PathBuf {
    landuse_geojson_file(&data_dir(), state)
}

/// Returns the labeled training events file.
#[must_use]
pub fn train_events_path() -> PathBuf {
    data_dir().join("train_data.csv")
}

/// Returns the labeled test events file.
#[must_use]
pub fn test_events_path() -> PathBuf {
    data_dir().join("test_data.csv")
}

/// Returns the merged training features file.
#[must_use]
pub fn train_features_path() -> PathBuf {
    data_dir().join("train_data_with_features.csv")
}

/// Returns the merged test features file.
#[must_use]
pub fn test_features_path() -> PathBuf {
    data_dir().join("test_data_with_features.csv")
}

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.as_os_str().is_empty() && !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
