#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API response types for the flood-risk server.
//!
//! Each feature table is served as an array of records whose field names
//! are the store's column names. These types are separate from the feature
//! models so the API contract can evolve independently.

use chrono::NaiveDate;
use flood_risk_feature_models::{
    ImageryWeekFeature, LandUseArea, LocationKey, WeatherWindowFeature,
};
use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiHealth {
    /// Always `healthy` when the server is answering.
    pub status: String,
}

impl Default for ApiHealth {
    fn default() -> Self {
        Self {
            status: "healthy".to_string(),
        }
    }
}

/// A row of the `socioeconomic` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiSocioeconomic {
    pub location: LocationKey,
    pub landuse_type: String,
    pub area_sqm: f64,
}

impl From<LandUseArea> for ApiSocioeconomic {
    fn from(row: LandUseArea) -> Self {
        Self {
            location: row.state,
            landuse_type: row.landuse_type,
            area_sqm: row.area_sqm,
        }
    }
}

/// A row of the `sentinel_features` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiSentinelFeature {
    pub region: LocationKey,
    /// Monday of the ISO week (`YYYY-MM-DD`).
    pub week_start_date: NaiveDate,
    pub image_count: u64,
    pub computed_date: Option<NaiveDate>,
}

impl From<ImageryWeekFeature> for ApiSentinelFeature {
    fn from(row: ImageryWeekFeature) -> Self {
        Self {
            region: row.region,
            week_start_date: row.week_start,
            image_count: row.image_count,
            computed_date: row.computed_date,
        }
    }
}

/// A row of the `weather_features` table. Undefined averages are `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiWeatherFeature {
    pub city: LocationKey,
    pub window_start_date: NaiveDate,
    pub avg_precipitation_7d: Option<f64>,
    pub avg_temperature_7d: Option<f64>,
    pub avg_humidity_7d: Option<f64>,
    pub avg_precipitation_30d: Option<f64>,
    pub computed_date: Option<NaiveDate>,
}

impl From<WeatherWindowFeature> for ApiWeatherFeature {
    fn from(row: WeatherWindowFeature) -> Self {
        Self {
            city: row.location,
            window_start_date: row.window_start,
            avg_precipitation_7d: row.values.avg_precipitation_7d,
            avg_temperature_7d: row.values.avg_temperature_7d,
            avg_humidity_7d: row.values.avg_humidity_7d,
            avg_precipitation_30d: row.values.avg_precipitation_30d,
            computed_date: row.computed_date,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flood_risk_feature_models::WeatherValues;

    #[test]
    fn health_serializes_as_status() {
        assert_eq!(
            serde_json::to_value(ApiHealth::default()).unwrap(),
            serde_json::json!({ "status": "healthy" })
        );
    }

    #[test]
    fn weather_feature_uses_column_names() {
        let row = ApiWeatherFeature::from(WeatherWindowFeature {
            location: LocationKey::Rivers,
            window_start: NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(),
            values: WeatherValues {
                avg_precipitation_7d: Some(6.0),
                ..WeatherValues::default()
            },
            computed_date: None,
        });

        assert_eq!(
            serde_json::to_value(row).unwrap(),
            serde_json::json!({
                "city": "rivers",
                "window_start_date": "2024-01-08",
                "avg_precipitation_7d": 6.0,
                "avg_temperature_7d": null,
                "avg_humidity_7d": null,
                "avg_precipitation_30d": null,
                "computed_date": null,
            })
        );
    }
}
