//! Nearest-date matching of events to weather windows.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use flood_risk_feature_models::{LocationKey, WeatherWindowFeature};

/// Returns the window whose start is closest to `target`.
///
/// `windows` must be sorted by `window_start`. On a tie the earlier window
/// wins, since the first minimum is kept.
#[must_use]
pub fn nearest_window(
    windows: &[WeatherWindowFeature],
    target: NaiveDate,
) -> Option<&WeatherWindowFeature> {
    let mut best: Option<(i64, &WeatherWindowFeature)> = None;

    for window in windows {
        let distance = (window.window_start - target).num_days().abs();
        match best {
            Some((best_distance, _)) if distance >= best_distance => {}
            _ => best = Some((distance, window)),
        }
    }

    best.map(|(_, window)| window)
}

/// Weather windows grouped by location and sorted by start date.
#[derive(Debug, Clone, Default)]
pub struct WeatherIndex {
    by_location: BTreeMap<LocationKey, Vec<WeatherWindowFeature>>,
}

impl WeatherIndex {
    #[must_use]
    pub fn new(windows: &[WeatherWindowFeature]) -> Self {
        let mut by_location: BTreeMap<LocationKey, Vec<WeatherWindowFeature>> = BTreeMap::new();
        for window in windows {
            by_location
                .entry(window.location)
                .or_default()
                .push(window.clone());
        }
        for location_windows in by_location.values_mut() {
            location_windows.sort_by_key(|w| w.window_start);
        }
        Self { by_location }
    }

    /// All windows for `location`, oldest first.
    #[must_use]
    pub fn windows_for(&self, location: LocationKey) -> &[WeatherWindowFeature] {
        self.by_location.get(&location).map_or(&[], Vec::as_slice)
    }

    /// The window for `location` closest to `target`, or `None` if the
    /// location has no windows.
    #[must_use]
    pub fn nearest(
        &self,
        location: LocationKey,
        target: NaiveDate,
    ) -> Option<&WeatherWindowFeature> {
        let found = nearest_window(self.windows_for(location), target);
        if let Some(window) = found {
            log::debug!(
                "Closest window for {target} in {location}: {} ({} days)",
                window.window_start,
                (window.window_start - target).num_days().abs()
            );
        } else {
            log::debug!("No weather windows for {location}");
        }
        found
    }
}
