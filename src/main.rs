//! Lecturas Backend
//!
//! REST backend for RFID vehicle reads, incident reports and users, persisted in a
//! single JSON document.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod models;
mod uploads;

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use db::{IdPolicy, RecordStore, Repository};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Lecturas Backend");
    tracing::info!("Document path: {:?}", config.db_path);
    tracing::info!("Uploads directory: {:?}", config.uploads_dir);
    tracing::info!("Bind address: {}", config.bind_addr);

    // Open the document store
    db::init_store(&config.db_path).await?;
    let store = RecordStore::open(&config.db_path, id_policies(&config)).await?;
    tracing::info!("Opened document store at {:?}", store.path());
    let repo = Arc::new(Repository::new(store, config.bcrypt_cost));

    let collections = repo
        .store()
        .read(|doc| doc.collection_names().map(str::to_string).collect::<Vec<_>>())
        .await;
    tracing::info!("Loaded collections: {:?}", collections);

    // Create application state
    let state = AppState {
        repo,
        config: Arc::new(config.clone()),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Identifier policy per collection: UUIDs unless configured as sequential.
pub fn id_policies(config: &Config) -> HashMap<db::Collection, IdPolicy> {
    config
        .sequential_ids
        .iter()
        .map(|collection| {
            tracing::info!("Collection {} uses sequential ids", collection);
            (*collection, IdPolicy::Sequential)
        })
        .collect()
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let upload_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);

    // API routes
    let api_routes = Router::new()
        // Users
        .route("/usuarios", get(api::list_users).post(api::create_user))
        .route("/usuarios/cambiar-contrasena", put(api::change_password))
        .route(
            "/usuarios/{id}",
            get(api::get_user)
                .put(api::update_user)
                .delete(api::delete_user),
        )
        .route("/check-email", get(api::check_email))
        .route("/request-password-reset", post(api::request_password_reset))
        // RFID reads
        .route(
            "/lecturas",
            get(api::list_readings).post(api::create_reading),
        )
        // Reports
        .route(
            "/reportes",
            get(api::list_reports)
                .post(api::create_report)
                .layer(upload_limit),
        )
        // Vehicle registry
        .route("/rfid", get(api::get_vehicle))
        .route("/rfid/estado", put(api::update_vehicle_status));

    // Health check
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
