//! Rolling-window weather aggregation.
//!
//! Windows are anchored at midnight of a location's earliest observation and
//! step forward 7 days at a time until they pass the day of its latest
//! observation. Each window yields 7-day averages and a 30-day precipitation
//! average measured from the same start, so consecutive 30-day aggregates
//! overlap. Windows with no observations are skipped without shifting the
//! cadence.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use flood_risk_feature_models::{LocationKey, ObservationRecord, WeatherValues, WeatherWindowFeature};

use crate::FeatureError;

/// Distance between consecutive window starts.
pub const WINDOW_STEP_DAYS: u64 = 7;

/// Length of the short window.
pub const SHORT_WINDOW_DAYS: i64 = 7;

/// Length of the long precipitation window.
pub const LONG_WINDOW_DAYS: i64 = 30;

/// Computes the weather windows for a single location.
///
/// Records may arrive in any order. Records for other locations must already
/// have been filtered out.
///
/// # Errors
///
/// Returns [`FeatureError::NonFiniteObservation`] if any record carries a
/// NaN or infinite sensor value, and [`FeatureError::DateOverflow`] if the
/// window arithmetic leaves the representable date range.
pub fn aggregate_location(
    location: LocationKey,
    records: &[ObservationRecord],
    computed_date: Option<NaiveDate>,
) -> Result<Vec<WeatherWindowFeature>, FeatureError> {
    if let Some(bad) = records.iter().find(|r| {
        !(r.temperature.is_finite() && r.humidity.is_finite() && r.precipitation.is_finite())
    }) {
        return Err(FeatureError::NonFiniteObservation {
            location,
            timestamp: bad.timestamp,
        });
    }

    let mut sorted: Vec<&ObservationRecord> = records.iter().collect();
    sorted.sort_by_key(|r| r.timestamp);

    let (Some(first), Some(last)) = (sorted.first(), sorted.last()) else {
        return Ok(Vec::new());
    };
    let end = last.timestamp.date();
    let mut start = first.timestamp.date();

    let overflow = || FeatureError::DateOverflow { location };
    let mut windows = Vec::new();

    while start <= end {
        let start_ts = start.and_time(NaiveTime::MIN);
        let short_end = start_ts
            .checked_add_signed(TimeDelta::days(SHORT_WINDOW_DAYS))
            .ok_or_else(overflow)?;
        let long_end = start_ts
            .checked_add_signed(TimeDelta::days(LONG_WINDOW_DAYS))
            .ok_or_else(overflow)?;

        let week = between(&sorted, start_ts, short_end);
        if week.is_empty() {
            log::warn!("Skipping empty 7-day window for {location} at {start}");
        } else {
            let month = between(&sorted, start_ts, long_end);
            windows.push(WeatherWindowFeature {
                location,
                window_start: start,
                values: WeatherValues {
                    avg_precipitation_7d: Some(mean(week, |r| r.precipitation)),
                    avg_temperature_7d: Some(mean(week, |r| r.temperature)),
                    avg_humidity_7d: Some(mean(week, |r| r.humidity).round()),
                    avg_precipitation_30d: Some(mean(month, |r| r.precipitation)),
                },
                computed_date,
            });
        }

        start = start
            .checked_add_days(Days::new(WINDOW_STEP_DAYS))
            .ok_or_else(overflow)?;
    }

    Ok(windows)
}

/// Computes weather windows for every location present in `records`.
///
/// A failure for one location is logged and that location is skipped; the
/// others are still aggregated. Records keyed to
/// [`LocationKey::Unknown`] are ignored. Output is ordered by location, then
/// window start.
#[must_use]
pub fn aggregate_all(
    records: &[ObservationRecord],
    computed_date: Option<NaiveDate>,
) -> Vec<WeatherWindowFeature> {
    let mut by_location: BTreeMap<LocationKey, Vec<ObservationRecord>> = BTreeMap::new();
    for record in records {
        by_location
            .entry(record.location)
            .or_default()
            .push(record.clone());
    }

    if let Some(unknown) = by_location.remove(&LocationKey::Unknown) {
        log::warn!(
            "Ignoring {} observations with an unknown location",
            unknown.len()
        );
    }

    let mut windows = Vec::new();
    for (location, location_records) in &by_location {
        match aggregate_location(*location, location_records, computed_date) {
            Ok(location_windows) => {
                log::info!(
                    "Computed {} weather windows for {location} from {} observations",
                    location_windows.len(),
                    location_records.len()
                );
                windows.extend(location_windows);
            }
            Err(e) => log::error!("Weather aggregation failed for {location}: {e}"),
        }
    }

    windows
}

/// Records with `from <= timestamp < to`, given records sorted by timestamp.
fn between<'a>(
    sorted: &'a [&'a ObservationRecord],
    from: NaiveDateTime,
    to: NaiveDateTime,
) -> &'a [&'a ObservationRecord] {
    let lo = sorted.partition_point(|r| r.timestamp < from);
    let hi = sorted.partition_point(|r| r.timestamp < to);
    &sorted[lo..hi.max(lo)]
}

#[allow(clippy::cast_precision_loss)]
fn mean(records: &[&ObservationRecord], field: impl Fn(&ObservationRecord) -> f64) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    records.iter().map(|r| field(r)).sum::<f64>() / records.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn obs(location: LocationKey, day: u32, hour: u32, precipitation: f64) -> ObservationRecord {
        ObservationRecord {
            location,
            timestamp: date(2024, 1, day).and_hms_opt(hour, 0, 0).unwrap(),
            temperature: 20.0,
            humidity: 50.0,
            precipitation,
        }
    }

    #[test]
    fn aggregates_seven_and_thirty_day_windows() {
        let records = vec![
            obs(LocationKey::Lagos, 1, 6, 0.0),
            obs(LocationKey::Lagos, 3, 12, 2.0),
            obs(LocationKey::Lagos, 5, 18, 4.0),
            obs(LocationKey::Lagos, 9, 9, 6.0),
        ];

        let windows = aggregate_location(LocationKey::Lagos, &records, None).unwrap();

        assert_eq!(windows.len(), 2);

        let first = &windows[0];
        assert_eq!(first.window_start, date(2024, 1, 1));
        assert_eq!(first.values.avg_precipitation_7d, Some(2.0));
        assert_eq!(first.values.avg_temperature_7d, Some(20.0));
        assert_eq!(first.values.avg_humidity_7d, Some(50.0));
        assert_eq!(first.values.avg_precipitation_30d, Some(3.0));

        let second = &windows[1];
        assert_eq!(second.window_start, date(2024, 1, 8));
        assert_eq!(second.values.avg_precipitation_7d, Some(6.0));
        assert_eq!(second.values.avg_temperature_7d, Some(20.0));
        assert_eq!(second.values.avg_humidity_7d, Some(50.0));
        assert_eq!(second.values.avg_precipitation_30d, Some(6.0));
    }

    #[test]
    fn skips_empty_windows_without_shifting_cadence() {
        let records = vec![
            obs(LocationKey::Benue, 1, 0, 1.0),
            obs(LocationKey::Benue, 20, 0, 3.0),
        ];

        let windows = aggregate_location(LocationKey::Benue, &records, None).unwrap();
        let starts: Vec<NaiveDate> = windows.iter().map(|w| w.window_start).collect();

        assert_eq!(starts, vec![date(2024, 1, 1), date(2024, 1, 15)]);
    }

    #[test]
    fn window_starts_increase_in_multiples_of_seven_days() {
        let records: Vec<ObservationRecord> = [1, 2, 4, 11, 12, 25, 29, 30, 31]
            .into_iter()
            .map(|d| obs(LocationKey::Rivers, d, 3, f64::from(d)))
            .collect();

        let windows = aggregate_location(LocationKey::Rivers, &records, None).unwrap();

        for pair in windows.windows(2) {
            let gap = (pair[1].window_start - pair[0].window_start).num_days();
            assert!(gap > 0);
            assert_eq!(gap % 7, 0);
        }
    }

    #[test]
    fn thirty_day_window_overlaps_following_windows() {
        let records = vec![
            obs(LocationKey::Lagos, 1, 0, 10.0),
            obs(LocationKey::Lagos, 8, 0, 20.0),
            obs(LocationKey::Lagos, 15, 0, 30.0),
        ];

        let windows = aggregate_location(LocationKey::Lagos, &records, None).unwrap();

        assert_eq!(windows[0].values.avg_precipitation_30d, Some(20.0));
        assert_eq!(windows[1].values.avg_precipitation_30d, Some(25.0));
        assert_eq!(windows[2].values.avg_precipitation_30d, Some(30.0));
    }

    #[test]
    fn humidity_rounds_to_nearest_integer() {
        let mut records = vec![
            obs(LocationKey::Lagos, 1, 0, 0.0),
            obs(LocationKey::Lagos, 2, 0, 0.0),
        ];
        records[0].humidity = 70.0;
        records[1].humidity = 71.4;

        let windows = aggregate_location(LocationKey::Lagos, &records, None).unwrap();

        assert_eq!(windows[0].values.avg_humidity_7d, Some(71.0));
    }

    #[test]
    fn unordered_input_gives_same_windows() {
        let ordered = vec![
            obs(LocationKey::Lagos, 1, 0, 1.0),
            obs(LocationKey::Lagos, 4, 0, 2.0),
            obs(LocationKey::Lagos, 10, 0, 3.0),
        ];
        let mut shuffled = ordered.clone();
        shuffled.reverse();

        assert_eq!(
            aggregate_location(LocationKey::Lagos, &ordered, None).unwrap(),
            aggregate_location(LocationKey::Lagos, &shuffled, None).unwrap()
        );
    }

    #[test]
    fn repeated_runs_are_identical() {
        let records = vec![
            obs(LocationKey::Lagos, 1, 0, 1.5),
            obs(LocationKey::Rivers, 2, 0, 2.5),
            obs(LocationKey::Lagos, 12, 0, 3.5),
        ];
        let run_date = Some(date(2025, 6, 2));

        assert_eq!(aggregate_all(&records, run_date), aggregate_all(&records, run_date));
    }

    #[test]
    fn one_bad_location_does_not_abort_others() {
        let mut bad = obs(LocationKey::Lagos, 1, 0, 1.0);
        bad.temperature = f64::NAN;
        let records = vec![bad, obs(LocationKey::Rivers, 1, 0, 4.0)];

        let windows = aggregate_all(&records, None);

        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].location, LocationKey::Rivers);
    }

    #[test]
    fn ignores_unknown_locations() {
        let records = vec![obs(LocationKey::Unknown, 1, 0, 1.0)];
        assert!(aggregate_all(&records, None).is_empty());
    }

    #[test]
    fn empty_input_yields_no_windows() {
        assert!(aggregate_location(LocationKey::Lagos, &[], None).unwrap().is_empty());
    }
}
