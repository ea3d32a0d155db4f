#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Feature extraction and merging for the flood-risk dataset.
//!
//! The aggregators ([`weather`], [`imagery`], [`landuse`]) turn raw records
//! into per-location feature tables. The [`joiner`] attaches those tables to
//! labeled events, using the [`matcher`] to pick the temporally closest
//! weather window and the [`fallback`] resolver to impute per-location means
//! where no window matches.
//!
//! Every function here is a pure transformation of its inputs; reading and
//! writing the store is left to `flood_risk_database`.

pub mod events;
pub mod fallback;
pub mod imagery;
pub mod joiner;
pub mod landuse;
pub mod matcher;
pub mod parsing;
pub mod projection;
pub mod weather;

use chrono::NaiveDateTime;
use flood_risk_feature_models::LocationKey;

/// Errors that can occur while extracting or merging features.
#[derive(Debug, thiserror::Error)]
pub enum FeatureError {
    /// I/O error reading or writing a file artifact.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV encoding or decoding error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The land-use document is not valid `GeoJSON`.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// The land-use document parsed but is not a `FeatureCollection`.
    #[error("Expected a GeoJSON FeatureCollection")]
    NotFeatureCollection,

    /// A required CSV column is absent.
    #[error("Missing required column: {column}")]
    MissingColumn {
        /// Name of the missing column.
        column: String,
    },

    /// An observation carries a non-finite sensor value.
    #[error("Non-finite observation for {location} at {timestamp}")]
    NonFiniteObservation {
        location: LocationKey,
        timestamp: NaiveDateTime,
    },

    /// Window arithmetic ran past the representable date range.
    #[error("Date overflow while stepping windows for {location}")]
    DateOverflow { location: LocationKey },

    /// Coordinates cannot be placed in a UTM zone.
    #[error("Cannot project coordinates ({lon}, {lat})")]
    Projection { lon: f64, lat: f64 },
}
