#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Tabular store for the flood-risk pipeline.
//!
//! A single `DuckDB` file holds the raw `weather` and `sentinel_metadata`
//! tables plus the three derived feature tables. Derived tables are always
//! written with replace semantics so a rerun never appends.

pub mod import;
pub mod paths;
pub mod queries;
pub mod store;

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// `DuckDB` error.
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV decoding error while importing a raw table.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}
