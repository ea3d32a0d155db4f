#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared types for the flood-risk dataset.
//!
//! Every table in the pipeline is keyed by a [`LocationKey`]: one of the four
//! Nigerian states the dataset covers. Raw records ([`ObservationRecord`],
//! [`ImageryRecord`]) are aggregated into feature tables
//! ([`WeatherWindowFeature`], [`ImageryWeekFeature`], [`LandUseArea`]) which
//! are then joined onto [`LabeledEvent`]s to produce a [`FeatureTable`].

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// A state the dataset covers, used as the join key across every table.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LocationKey {
    /// Lagos State
    Lagos,
    /// Rivers State (Port Harcourt)
    Rivers,
    /// Benue State (Makurdi)
    Benue,
    /// Bayelsa State (Yenagoa)
    Bayelsa,
    /// Sentinel for names that match none of the covered states.
    Unknown,
}

impl LocationKey {
    /// The four covered states, in a stable order.
    pub const KNOWN: &[Self] = &[Self::Lagos, Self::Rivers, Self::Benue, Self::Bayelsa];

    /// Normalizes a free-form state, region, or city name.
    ///
    /// Matching is case-insensitive, ignores surrounding and repeated
    /// whitespace and a trailing `state` suffix, and maps the state capitals
    /// used by the weather sources onto their state. Anything else becomes
    /// [`LocationKey::Unknown`].
    #[must_use]
    pub fn normalize(raw: &str) -> Self {
        let lowered = raw
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        let name = lowered.strip_suffix(" state").unwrap_or(&lowered);

        match name {
            "lagos" | "ikeja" => Self::Lagos,
            "rivers" | "port harcourt" => Self::Rivers,
            "benue" | "makurdi" => Self::Benue,
            "bayelsa" | "yenagoa" => Self::Bayelsa,
            _ => Self::Unknown,
        }
    }

    /// Whether this is one of the covered states.
    #[must_use]
    pub const fn is_known(self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// Flood severity label attached to a historical event window.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum Severity {
    /// No flood was recorded for the window.
    #[serde(rename = "No Flood")]
    #[strum(serialize = "No Flood")]
    NoFlood,
    /// Low severity flood.
    Low,
    /// Medium (moderate) severity flood.
    Medium,
    /// High severity flood.
    High,
    /// A label that could not be mapped.
    Unknown,
}

impl Severity {
    /// Maps the labels used by the flood archives onto a [`Severity`].
    ///
    /// An empty label means no flood was recorded. The Dartmouth archive's
    /// numeric codes (`1.0`, `1.5`, `2.0`) and the `Moderate` label used by
    /// GFM are folded into the common scale.
    #[must_use]
    pub fn normalize(raw: &str) -> Self {
        let label = raw.trim();
        if label.is_empty() {
            return Self::NoFlood;
        }

        match label.to_lowercase().as_str() {
            "no flood" => Self::NoFlood,
            "low" | "1" | "1.0" => Self::Low,
            "medium" | "moderate" | "1.5" => Self::Medium,
            "high" | "2" | "2.0" => Self::High,
            _ => Self::Unknown,
        }
    }
}

/// A single weather observation for a location.
///
/// Sensor fields are already zero-filled: a missing reading still counts
/// towards the window's record count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationRecord {
    pub location: LocationKey,
    pub timestamp: NaiveDateTime,
    pub temperature: f64,
    pub humidity: f64,
    pub precipitation: f64,
}

/// Raw satellite image metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageryRecord {
    /// Unique identifier of the image in the source catalogue.
    pub image_id: String,
    pub captured_at: NaiveDateTime,
    pub region: LocationKey,
}

/// One of the four weather aggregate columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WeatherColumn {
    AvgPrecipitation7d,
    AvgTemperature7d,
    AvgHumidity7d,
    AvgPrecipitation30d,
}

impl WeatherColumn {
    /// All columns in output order.
    pub const ALL: [Self; 4] = [
        Self::AvgPrecipitation7d,
        Self::AvgTemperature7d,
        Self::AvgHumidity7d,
        Self::AvgPrecipitation30d,
    ];

    /// The column name used in the store and in CSV headers.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::AvgPrecipitation7d => "avg_precipitation_7d",
            Self::AvgTemperature7d => "avg_temperature_7d",
            Self::AvgHumidity7d => "avg_humidity_7d",
            Self::AvgPrecipitation30d => "avg_precipitation_30d",
        }
    }
}

/// The four weather aggregates. `None` means the value is undefined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherValues {
    pub avg_precipitation_7d: Option<f64>,
    pub avg_temperature_7d: Option<f64>,
    pub avg_humidity_7d: Option<f64>,
    pub avg_precipitation_30d: Option<f64>,
}

impl WeatherValues {
    #[must_use]
    pub const fn get(&self, column: WeatherColumn) -> Option<f64> {
        match column {
            WeatherColumn::AvgPrecipitation7d => self.avg_precipitation_7d,
            WeatherColumn::AvgTemperature7d => self.avg_temperature_7d,
            WeatherColumn::AvgHumidity7d => self.avg_humidity_7d,
            WeatherColumn::AvgPrecipitation30d => self.avg_precipitation_30d,
        }
    }

    pub const fn set(&mut self, column: WeatherColumn, value: Option<f64>) {
        match column {
            WeatherColumn::AvgPrecipitation7d => self.avg_precipitation_7d = value,
            WeatherColumn::AvgTemperature7d => self.avg_temperature_7d = value,
            WeatherColumn::AvgHumidity7d => self.avg_humidity_7d = value,
            WeatherColumn::AvgPrecipitation30d => self.avg_precipitation_30d = value,
        }
    }
}

/// Weather aggregates for one location and one 7-day-aligned window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherWindowFeature {
    pub location: LocationKey,
    pub window_start: NaiveDate,
    pub values: WeatherValues,
    /// Run date that produced the row; absent for rows populated externally.
    pub computed_date: Option<NaiveDate>,
}

/// Number of distinct images captured over a region in one ISO week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageryWeekFeature {
    pub region: LocationKey,
    /// Monday of the ISO week.
    pub week_start: NaiveDate,
    pub image_count: u64,
    pub computed_date: Option<NaiveDate>,
}

/// Total projected area of one land-use category within a state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandUseArea {
    pub state: LocationKey,
    pub landuse_type: String,
    /// Area in square metres, measured in a local UTM projection.
    pub area_sqm: f64,
}

/// A historical flood-or-no-flood observation window, the join target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledEvent {
    /// `None` when the source date could not be parsed.
    pub date: Option<NaiveDate>,
    pub location: LocationKey,
    pub severity: Severity,
    /// Passthrough cells, aligned with [`LabeledEventTable::extra_columns`].
    pub extra: Vec<String>,
}

/// Labeled events plus the names of their passthrough columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabeledEventTable {
    pub extra_columns: Vec<String>,
    pub events: Vec<LabeledEvent>,
}

/// A labeled event with every feature column attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub event: LabeledEvent,
    /// Areas aligned with [`FeatureTable::land_use_columns`].
    pub land_use: Vec<f64>,
    /// Image counts aligned with [`FeatureTable::imagery_columns`].
    pub imagery: Vec<u64>,
    pub weather: WeatherValues,
}

/// The flat output of a merge run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    pub extra_columns: Vec<String>,
    pub land_use_columns: Vec<String>,
    pub imagery_columns: Vec<String>,
    pub rows: Vec<FeatureRow>,
}

impl FeatureTable {
    /// The full header row, in output column order.
    #[must_use]
    pub fn header(&self) -> Vec<String> {
        ["date", "location", "severity"]
            .into_iter()
            .map(str::to_string)
            .chain(self.extra_columns.iter().cloned())
            .chain(self.land_use_columns.iter().cloned())
            .chain(self.imagery_columns.iter().cloned())
            .chain(WeatherColumn::ALL.iter().map(|c| c.name().to_string()))
            .collect()
    }
}

/// Column name for a land-use category, e.g. `Nature Reserve` →
/// `area_nature_reserve`.
#[must_use]
pub fn land_use_column_name(landuse_type: &str) -> String {
    format!("area_{}", landuse_type.to_lowercase().replace(' ', "_"))
}

/// Column name for an imagery week, e.g. `images_2025-06-02`.
#[must_use]
pub fn imagery_column_name(week_start: NaiveDate) -> String {
    format!("images_{}", week_start.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_state_names_and_capitals() {
        assert_eq!(LocationKey::normalize("Lagos"), LocationKey::Lagos);
        assert_eq!(LocationKey::normalize("  RIVERS state "), LocationKey::Rivers);
        assert_eq!(LocationKey::normalize("Port  Harcourt"), LocationKey::Rivers);
        assert_eq!(LocationKey::normalize("Makurdi"), LocationKey::Benue);
        assert_eq!(LocationKey::normalize("Yenagoa"), LocationKey::Bayelsa);
    }

    #[test]
    fn unmatched_location_is_unknown() {
        assert_eq!(LocationKey::normalize("Kano"), LocationKey::Unknown);
        assert_eq!(LocationKey::normalize(""), LocationKey::Unknown);
        assert!(!LocationKey::Unknown.is_known());
    }

    #[test]
    fn location_display_is_lowercase() {
        assert_eq!(LocationKey::Bayelsa.to_string(), "bayelsa");
        assert_eq!("benue".parse::<LocationKey>().ok(), Some(LocationKey::Benue));
    }

    #[test]
    fn normalizes_severity_labels() {
        assert_eq!(Severity::normalize(""), Severity::NoFlood);
        assert_eq!(Severity::normalize("No Flood"), Severity::NoFlood);
        assert_eq!(Severity::normalize("Moderate"), Severity::Medium);
        assert_eq!(Severity::normalize("1.0"), Severity::Low);
        assert_eq!(Severity::normalize("2.0"), Severity::High);
        assert_eq!(Severity::normalize("extreme"), Severity::Unknown);
        assert_eq!(Severity::NoFlood.to_string(), "No Flood");
    }

    #[test]
    fn weather_values_get_and_set() {
        let mut values = WeatherValues::default();
        values.set(WeatherColumn::AvgHumidity7d, Some(50.0));
        assert_eq!(values.get(WeatherColumn::AvgHumidity7d), Some(50.0));
        assert_eq!(values.get(WeatherColumn::AvgTemperature7d), None);
    }

    #[test]
    fn builds_pivot_column_names() {
        assert_eq!(land_use_column_name("Nature Reserve"), "area_nature_reserve");
        let week = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        assert_eq!(imagery_column_name(week), "images_2025-06-02");
    }

    #[test]
    fn header_orders_columns() {
        let table = FeatureTable {
            extra_columns: vec!["country".to_string()],
            land_use_columns: vec!["area_farmland".to_string()],
            imagery_columns: vec!["images_2025-06-02".to_string()],
            rows: Vec::new(),
        };
        assert_eq!(
            table.header(),
            vec![
                "date",
                "location",
                "severity",
                "country",
                "area_farmland",
                "images_2025-06-02",
                "avg_precipitation_7d",
                "avg_temperature_7d",
                "avg_humidity_7d",
                "avg_precipitation_30d",
            ]
        );
    }
}
