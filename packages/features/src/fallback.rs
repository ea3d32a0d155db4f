//! Per-location mean imputation for weather columns.
//!
//! This is the only place undefined weather values are substituted. Means
//! are computed once per run from the weather window table.

use std::collections::BTreeMap;

use flood_risk_feature_models::{
    LocationKey, WeatherColumn, WeatherValues, WeatherWindowFeature,
};

/// Lookup of `(location, column) -> mean`, ignoring undefined values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FallbackResolver {
    means: BTreeMap<LocationKey, WeatherValues>,
}

impl FallbackResolver {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_windows(windows: &[WeatherWindowFeature]) -> Self {
        let mut sums: BTreeMap<LocationKey, [(f64, usize); 4]> = BTreeMap::new();

        for window in windows {
            let entry = sums.entry(window.location).or_default();
            for (i, column) in WeatherColumn::ALL.iter().enumerate() {
                if let Some(value) = window.values.get(*column) {
                    entry[i].0 += value;
                    entry[i].1 += 1;
                }
            }
        }

        let means = sums
            .into_iter()
            .map(|(location, columns)| {
                let mut values = WeatherValues::default();
                for (column, (sum, count)) in WeatherColumn::ALL.iter().zip(columns) {
                    values.set(*column, (count > 0).then(|| sum / count as f64));
                }
                (location, values)
            })
            .collect();

        Self { means }
    }

    /// The mean of `column` for `location`, or `None` if the location has no
    /// defined values for it.
    #[must_use]
    pub fn mean(&self, location: LocationKey, column: WeatherColumn) -> Option<f64> {
        self.means.get(&location).and_then(|v| v.get(column))
    }

    /// Replaces every undefined value in `values` with the location's mean.
    ///
    /// Returns how many values were filled. Values for which the location
    /// has no mean stay undefined.
    pub fn fill(&self, location: LocationKey, values: &mut WeatherValues) -> usize {
        let mut filled = 0;
        for column in WeatherColumn::ALL {
            if values.get(column).is_none()
                && let Some(mean) = self.mean(location, column)
            {
                values.set(column, Some(mean));
                filled += 1;
            }
        }
        filled
    }
}
