//! Attaches land-use, imagery, and weather features to labeled events.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use flood_risk_feature_models::{
    FeatureRow, FeatureTable, ImageryWeekFeature, LabeledEvent, LabeledEventTable, LandUseArea,
    LocationKey, WeatherColumn, WeatherValues, WeatherWindowFeature, imagery_column_name,
    land_use_column_name,
};

use crate::fallback::FallbackResolver;
use crate::matcher::WeatherIndex;

/// Land-use areas pivoted to one column per category.
///
/// Categories whose column names collide (e.g. `Farmland` and `farmland`)
/// and duplicate `(state, landuse_type)` rows are summed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LandUsePivot {
    columns: Vec<String>,
    areas: BTreeMap<LocationKey, BTreeMap<String, f64>>,
}

impl LandUsePivot {
    #[must_use]
    pub fn new(rows: &[LandUseArea]) -> Self {
        let mut columns = BTreeSet::new();
        let mut areas: BTreeMap<LocationKey, BTreeMap<String, f64>> = BTreeMap::new();

        for row in rows {
            let column = land_use_column_name(&row.landuse_type);
            *areas
                .entry(row.state)
                .or_default()
                .entry(column.clone())
                .or_default() += row.area_sqm;
            columns.insert(column);
        }

        Self {
            columns: columns.into_iter().collect(),
            areas,
        }
    }

    /// Column names, sorted.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// One value per column for `location`; absent combinations are 0.
    #[must_use]
    pub fn row(&self, location: LocationKey) -> Vec<f64> {
        let areas = self.areas.get(&location);
        self.columns
            .iter()
            .map(|c| areas.and_then(|a| a.get(c)).copied().unwrap_or(0.0))
            .collect()
    }
}

/// Weekly image counts pivoted to one column per week.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageryPivot {
    weeks: Vec<NaiveDate>,
    counts: BTreeMap<LocationKey, BTreeMap<NaiveDate, u64>>,
}

impl ImageryPivot {
    #[must_use]
    pub fn new(rows: &[ImageryWeekFeature]) -> Self {
        let mut weeks = BTreeSet::new();
        let mut counts: BTreeMap<LocationKey, BTreeMap<NaiveDate, u64>> = BTreeMap::new();

        for row in rows {
            *counts
                .entry(row.region)
                .or_default()
                .entry(row.week_start)
                .or_default() += row.image_count;
            weeks.insert(row.week_start);
        }

        Self {
            weeks: weeks.into_iter().collect(),
            counts,
        }
    }

    /// Column names in ascending week order.
    #[must_use]
    pub fn columns(&self) -> Vec<String> {
        self.weeks.iter().copied().map(imagery_column_name).collect()
    }

    /// One count per week for `location`; absent combinations are 0.
    #[must_use]
    pub fn row(&self, location: LocationKey) -> Vec<u64> {
        let counts = self.counts.get(&location);
        self.weeks
            .iter()
            .map(|w| counts.and_then(|c| c.get(w)).copied().unwrap_or(0))
            .collect()
    }
}

/// Weather-column provenance totals for one join, used for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinStats {
    /// Events that found a nearest weather window.
    pub matched: usize,
    /// Events with no window for their location or no usable date.
    pub unmatched: usize,
    /// Weather cells filled with a per-location mean.
    pub filled: usize,
    /// Weather cells still undefined after fallback.
    pub undefined: usize,
}

/// Joins the three feature tables onto labeled events.
///
/// Built once per run from the current store contents; [`Self::join`] can
/// then be applied to any number of event tables.
#[derive(Debug, Clone, Default)]
pub struct FeatureJoiner {
    land_use: LandUsePivot,
    imagery: ImageryPivot,
    weather: WeatherIndex,
    fallback: FallbackResolver,
}

impl FeatureJoiner {
    #[must_use]
    pub fn new(
        land_use: &[LandUseArea],
        imagery: &[ImageryWeekFeature],
        weather: &[WeatherWindowFeature],
    ) -> Self {
        Self {
            land_use: LandUsePivot::new(land_use),
            imagery: ImageryPivot::new(imagery),
            weather: WeatherIndex::new(weather),
            fallback: FallbackResolver::from_windows(weather),
        }
    }

    /// Produces one [`FeatureRow`] per event, in input order.
    #[must_use]
    pub fn join(&self, table: LabeledEventTable) -> FeatureTable {
        self.join_with_stats(table).0
    }

    /// Like [`Self::join`], also returning how the weather columns were
    /// filled.
    #[must_use]
    pub fn join_with_stats(&self, table: LabeledEventTable) -> (FeatureTable, JoinStats) {
        let mut stats = JoinStats::default();

        let rows = table
            .events
            .into_iter()
            .map(|event| {
                let weather = self.weather_for(&event, &mut stats);
                FeatureRow {
                    land_use: self.land_use.row(event.location),
                    imagery: self.imagery.row(event.location),
                    weather,
                    event,
                }
            })
            .collect::<Vec<_>>();

        log::info!(
            "Joined {} events: {} matched a weather window, {} did not",
            rows.len(),
            stats.matched,
            stats.unmatched
        );
        if stats.filled > 0 {
            log::info!("Filled {} weather values from location means", stats.filled);
        }
        if stats.undefined > 0 {
            log::warn!(
                "{} weather values remain undefined (locations without weather data)",
                stats.undefined
            );
        }

        let table = FeatureTable {
            extra_columns: table.extra_columns,
            land_use_columns: self.land_use.columns().to_vec(),
            imagery_columns: self.imagery.columns(),
            rows,
        };

        (table, stats)
    }

    fn weather_for(&self, event: &LabeledEvent, stats: &mut JoinStats) -> WeatherValues {
        let matched = event
            .date
            .and_then(|date| self.weather.nearest(event.location, date));

        let mut values = if let Some(window) = matched {
            stats.matched += 1;
            window.values
        } else {
            stats.unmatched += 1;
            WeatherValues::default()
        };

        stats.filled += self.fallback.fill(event.location, &mut values);
        stats.undefined += WeatherColumn::ALL
            .iter()
            .filter(|c| values.get(**c).is_none())
            .count();

        values
    }
}
