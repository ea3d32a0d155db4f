//! HTTP handler functions for the flood-risk API.

use actix_web::{HttpResponse, web};
use duckdb::Connection;
use flood_risk_database::{DbError, paths, queries};
use flood_risk_feature_models::LocationKey;
use flood_risk_server_models::{
    ApiHealth, ApiSentinelFeature, ApiSocioeconomic, ApiWeatherFeature,
};
use geojson::GeoJson;
use serde::Serialize;

use crate::AppState;

fn error_response(mut builder: actix_web::HttpResponseBuilder, message: &str) -> HttpResponse {
    builder.json(serde_json::json!({ "error": message }))
}

/// Loads a whole table and serializes it as an array of API records.
fn table_response<T, A>(
    state: &AppState,
    table: &str,
    load: impl FnOnce(&Connection) -> Result<Vec<T>, DbError>,
) -> HttpResponse
where
    A: From<T> + Serialize,
{
    let Ok(conn) = state.store.lock() else {
        log::error!("Store mutex poisoned while reading {table}");
        return error_response(
            HttpResponse::InternalServerError(),
            &format!("Failed to query {table}"),
        );
    };

    match load(&conn) {
        Ok(rows) => {
            let records: Vec<A> = rows.into_iter().map(A::from).collect();
            HttpResponse::Ok().json(records)
        }
        Err(e) => {
            log::error!("Failed to query {table}: {e}");
            error_response(
                HttpResponse::InternalServerError(),
                &format!("Failed to query {table}"),
            )
        }
    }
}

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth::default())
}

/// `GET /api/socioeconomic`
///
/// Land-use areas per state and category.
pub async fn socioeconomic(state: web::Data<AppState>) -> HttpResponse {
    table_response::<_, ApiSocioeconomic>(&state, "socioeconomic", queries::load_land_use)
}

/// `GET /api/sentinel_features`
///
/// Weekly satellite image counts per region.
pub async fn sentinel_features(state: web::Data<AppState>) -> HttpResponse {
    table_response::<_, ApiSentinelFeature>(
        &state,
        "sentinel_features",
        queries::load_sentinel_features,
    )
}

/// `GET /api/weather_features`
///
/// Windowed weather aggregates per location.
pub async fn weather_features(state: web::Data<AppState>) -> HttpResponse {
    table_response::<_, ApiWeatherFeature>(
        &state,
        "weather_features",
        queries::load_weather_features,
    )
}

/// `GET /api/landuse/{state}`
///
/// The cleaned land-use polygons of one state as a `GeoJSON`
/// `FeatureCollection`. 404 when the state is not covered or its file is
/// absent, 400 when the file is not a valid feature collection.
pub async fn landuse(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let name = path.into_inner();
    let location = LocationKey::normalize(&name);
    if !location.is_known() {
        return error_response(HttpResponse::NotFound(), &format!("Unknown state: {name}"));
    }

    let file = paths::landuse_geojson_file(&state.landuse_dir, location);
    let document = match std::fs::read_to_string(&file) {
        Ok(document) => document,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::warn!("Land-use file not found: {}", file.display());
            return error_response(
                HttpResponse::NotFound(),
                &format!("Land-use data not found for {location}"),
            );
        }
        Err(e) => {
            log::error!("Failed to read {}: {e}", file.display());
            return error_response(
                HttpResponse::InternalServerError(),
                &format!("Failed to read land-use data for {location}"),
            );
        }
    };

    match document.parse::<GeoJson>() {
        Ok(GeoJson::FeatureCollection(collection)) => HttpResponse::Ok().json(collection),
        Ok(_) => error_response(
            HttpResponse::BadRequest(),
            &format!("Land-use data for {location} is not a FeatureCollection"),
        ),
        Err(e) => {
            log::error!("Invalid GeoJSON in {}: {e}", file.display());
            error_response(
                HttpResponse::BadRequest(),
                &format!("Invalid land-use data for {location}"),
            )
        }
    }
}
