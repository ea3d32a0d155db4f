//! Weekly satellite imagery counts.

use std::collections::{BTreeMap, HashSet};

use chrono::{Datelike as _, Days, NaiveDate};
use flood_risk_feature_models::{ImageryRecord, ImageryWeekFeature, LocationKey};

/// Returns the Monday that starts the ISO week containing `date`.
#[must_use]
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let offset = u64::from(date.weekday().num_days_from_monday());
    date.checked_sub_days(Days::new(offset)).unwrap_or(date)
}

/// Removes records whose `image_id` was already seen, keeping the first
/// occurrence.
#[must_use]
pub fn dedupe_images(records: &[ImageryRecord]) -> Vec<&ImageryRecord> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter(|r| seen.insert(r.image_id.as_str()))
        .collect()
}

/// Counts distinct images per region and ISO week.
///
/// Output is ordered by region, then week.
#[must_use]
pub fn aggregate_imagery(
    records: &[ImageryRecord],
    computed_date: Option<NaiveDate>,
) -> Vec<ImageryWeekFeature> {
    let unique = dedupe_images(records);
    if unique.len() < records.len() {
        log::info!(
            "Deduplicated imagery metadata: {} -> {} records ({} duplicates removed)",
            records.len(),
            unique.len(),
            records.len() - unique.len(),
        );
    }

    let mut counts: BTreeMap<(LocationKey, NaiveDate), u64> = BTreeMap::new();
    let mut unknown = 0usize;

    for record in unique {
        if !record.region.is_known() {
            unknown += 1;
            continue;
        }
        *counts
            .entry((record.region, week_start(record.captured_at.date())))
            .or_default() += 1;
    }

    if unknown > 0 {
        log::warn!("Ignoring {unknown} images with an unknown region");
    }

    counts
        .into_iter()
        .map(|((region, week_start), image_count)| ImageryWeekFeature {
            region,
            week_start,
            image_count,
            computed_date,
        })
        .collect()
}
