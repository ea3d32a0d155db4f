#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the flood-risk dataset.
//!
//! Serves the three derived feature tables as JSON arrays of records and
//! the cleaned land-use polygons of each state as `GeoJSON`. Every endpoint
//! is read-only and queries the store on each request.

mod handlers;

use std::path::PathBuf;
use std::sync::Mutex;

use actix_cors::Cors;
use actix_web::{App, HttpServer, Scope, middleware, web};
use flood_risk_database::{paths, store};

/// Shared application state.
pub struct AppState {
    /// Read-only store connection.
    /// `duckdb::Connection` is `Send` but not `Sync`, so a `Mutex` is needed.
    pub store: Mutex<duckdb::Connection>,
    /// Directory holding the cleaned land-use `GeoJSON` files.
    pub landuse_dir: PathBuf,
}

/// Server settings, read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
    /// The only origin allowed by CORS.
    pub cors_origin: String,
    pub db_path: PathBuf,
    pub landuse_dir: PathBuf,
}

impl ServerConfig {
    /// Reads `BIND_ADDR`, `PORT`, and `CORS_ORIGIN`, falling back to
    /// defaults. Store and data paths follow [`flood_risk_database::paths`].
    #[must_use]
    pub fn from_env() -> Self {
        let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(5000);
        let cors_origin =
            std::env::var("CORS_ORIGIN").unwrap_or_else(|_| "http://localhost:5173".to_string());

        Self {
            bind_addr,
            port,
            cors_origin,
            db_path: paths::store_db_path(),
            landuse_dir: paths::data_dir(),
        }
    }
}

/// The `/api` scope with every route registered.
#[must_use]
pub fn api_scope() -> Scope {
    web::scope("/api")
        .route("/health", web::get().to(handlers::health))
        .route("/socioeconomic", web::get().to(handlers::socioeconomic))
        .route("/sentinel_features", web::get().to(handlers::sentinel_features))
        .route("/weather_features", web::get().to(handlers::weather_features))
        .route("/landuse/{state}", web::get().to(handlers::landuse))
}

/// Starts the flood-risk API server.
///
/// Opens the store read-only and serves until shut down. This is a regular
/// async function; the caller provides the runtime (e.g. via
/// `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if the store cannot be opened, or the
/// HTTP server fails to bind or encounters a runtime error.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let config = ServerConfig::from_env();

    log::info!("Opening store at {}...", config.db_path.display());
    let conn = store::open_read_only(&config.db_path).map_err(std::io::Error::other)?;

    let state = web::Data::new(AppState {
        store: Mutex::new(conn),
        landuse_dir: config.landuse_dir.clone(),
    });

    log::info!(
        "Starting server on {}:{} (CORS origin {})",
        config.bind_addr,
        config.port,
        config.cors_origin
    );

    let cors_origin = config.cors_origin.clone();

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&cors_origin)
            .allowed_methods(vec!["GET"])
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .service(api_scope())
    })
    .bind((config.bind_addr, config.port))?
    .run()
    .await
}
