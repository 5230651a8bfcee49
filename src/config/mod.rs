//! Configuration module for the lecturas backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::db::Collection;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the JSON document file
    pub db_path: PathBuf,
    /// Directory where report photos are written
    pub uploads_dir: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// bcrypt cost used when hashing credentials
    pub bcrypt_cost: u32,
    /// Maximum request body size accepted by the report upload route
    pub max_upload_bytes: usize,
    /// Collections that keep integer ids instead of UUIDs
    pub sequential_ids: Vec<Collection>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let db_path = env::var("RFID_DB_PATH")
            .unwrap_or_else(|_| "./data/db.json".to_string())
            .into();

        let uploads_dir = env::var("RFID_UPLOADS_DIR")
            .unwrap_or_else(|_| "./uploads".to_string())
            .into();

        let bind_addr = env::var("RFID_BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3001".to_string())
            .parse()
            .expect("Invalid RFID_BIND_ADDR format");

        let log_level = env::var("RFID_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let bcrypt_cost = env::var("RFID_BCRYPT_COST")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(bcrypt::DEFAULT_COST);

        let max_upload_mb: usize = env::var("RFID_MAX_UPLOAD_MB")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);

        let sequential_ids = env::var("RFID_SEQUENTIAL_IDS")
            .map(|v| parse_collections(&v))
            .unwrap_or_default();

        Self {
            db_path,
            uploads_dir,
            bind_addr,
            log_level,
            bcrypt_cost,
            max_upload_bytes: max_upload_mb * 1024 * 1024,
            sequential_ids,
        }
    }
}

/// Parse a comma-separated list of collection names, skipping unknown names.
fn parse_collections(value: &str) -> Vec<Collection> {
    value
        .split(',')
        .filter_map(|name| Collection::from_name(name.trim()))
        .collect()
}
