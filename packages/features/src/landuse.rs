//! Land-use area aggregation from `GeoJSON` polygons.
//!
//! Each feature must carry a `landuse` string property and a polygonal
//! geometry. Everything else is counted and dropped. Areas are summed per
//! land-use category after projecting into the state's UTM zone.

use std::collections::BTreeMap;
use std::path::Path;

use flood_risk_feature_models::{LandUseArea, LocationKey};
use geo::{Area as _, Coord, Geometry, MapCoords as _, MultiPolygon, Rect};
use geojson::GeoJson;

use crate::FeatureError;
use crate::projection::UtmZone;

/// Name of the feature property holding the land-use category.
pub const LANDUSE_PROPERTY: &str = "landuse";

/// Result of aggregating one state's land-use document.
#[derive(Debug, Clone, PartialEq)]
pub struct LandUseSummary {
    /// One row per land-use category, ordered by category.
    pub areas: Vec<LandUseArea>,
    /// Number of features that contributed an area.
    pub used: usize,
    /// Number of features dropped as malformed.
    pub dropped: usize,
    /// The zone areas were measured in, if any feature was usable.
    pub zone: Option<UtmZone>,
}

/// Aggregates land-use areas for `state` from a `GeoJSON` document.
///
/// # Errors
///
/// Returns [`FeatureError::GeoJson`] if the document does not parse,
/// [`FeatureError::NotFeatureCollection`] if it is not a feature collection,
/// or [`FeatureError::Projection`] if the polygons cannot be placed in a UTM
/// zone.
pub fn compute_land_use(
    state: LocationKey,
    document: &str,
) -> Result<LandUseSummary, FeatureError> {
    let GeoJson::FeatureCollection(collection) = document.parse::<GeoJson>()? else {
        return Err(FeatureError::NotFeatureCollection);
    };

    let mut polygons: Vec<(String, MultiPolygon<f64>)> = Vec::new();
    let mut dropped = 0usize;

    for feature in collection.features {
        let landuse = feature
            .property(LANDUSE_PROPERTY)
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let polygon = feature
            .geometry
            .and_then(|g| Geometry::<f64>::try_from(g).ok())
            .and_then(into_multi_polygon);

        match (landuse, polygon) {
            (Some(landuse), Some(polygon)) => polygons.push((landuse, polygon)),
            _ => dropped += 1,
        }
    }

    if dropped > 0 {
        log::warn!("Dropped {dropped} malformed land-use features for {state}");
    }

    let Some(bounds) = combined_bounds(polygons.iter().map(|(_, p)| p)) else {
        log::warn!("No usable land-use polygons for {state}");
        return Ok(LandUseSummary {
            areas: Vec::new(),
            used: 0,
            dropped,
            zone: None,
        });
    };

    let centre = bounds.center();
    let zone = UtmZone::estimate(centre.x, centre.y)?;
    log::info!(
        "Measuring {} land-use polygons for {state} in EPSG:{}",
        polygons.len(),
        zone.epsg()
    );

    let mut totals: BTreeMap<String, f64> = BTreeMap::new();
    for (landuse, polygon) in &polygons {
        let projected = polygon.map_coords(|c| {
            let (x, y) = zone.project(c.x, c.y);
            Coord { x, y }
        });
        *totals.entry(landuse.clone()).or_default() += projected.unsigned_area();
    }

    Ok(LandUseSummary {
        areas: totals
            .into_iter()
            .map(|(landuse_type, area_sqm)| LandUseArea {
                state,
                landuse_type,
                area_sqm,
            })
            .collect(),
        used: polygons.len(),
        dropped,
        zone: Some(zone),
    })
}

/// Reads and aggregates the land-use document at `path`.
///
/// Returns `Ok(None)` when the file does not exist so the caller can skip
/// the state.
///
/// # Errors
///
/// Returns [`FeatureError`] if the file cannot be read or aggregated.
pub fn load_land_use(
    state: LocationKey,
    path: &Path,
) -> Result<Option<LandUseSummary>, FeatureError> {
    if !path.exists() {
        return Ok(None);
    }
    let document = std::fs::read_to_string(path)?;
    compute_land_use(state, &document).map(Some)
}

fn into_multi_polygon(geometry: Geometry<f64>) -> Option<MultiPolygon<f64>> {
    let polygon = match geometry {
        Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
        Geometry::MultiPolygon(mp) => mp,
        Geometry::GeometryCollection(gc) => MultiPolygon::new(
            gc.0.into_iter()
                .filter_map(into_multi_polygon)
                .flat_map(|mp| mp.0)
                .collect(),
        ),
        _ => return None,
    };
    (!polygon.0.is_empty()).then_some(polygon)
}

fn combined_bounds<'a>(polygons: impl Iterator<Item = &'a MultiPolygon<f64>>) -> Option<Rect<f64>> {
    polygons
        .filter_map(geo::BoundingRect::bounding_rect)
        .reduce(|acc, r| {
            Rect::new(
                Coord {
                    x: acc.min().x.min(r.min().x),
                    y: acc.min().y.min(r.min().y),
                },
                Coord {
                    x: acc.max().x.max(r.max().x),
                    y: acc.max().y.max(r.max().y),
                },
            )
        })
}
