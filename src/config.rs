//! Configuration Module
//!
//! Handles loading and managing service configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::images::ImageOptions;
use crate::inventory::STORE_NAME;

/// Service configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite URL of the record store
    pub database_url: String,
    /// HTTP server port
    pub server_port: u16,
    /// Origin static assets are fetched from when not cached
    pub asset_origin: String,
    /// Cache generation number, region is named `inventory-cache-v<N>`
    pub cache_version: u32,
    /// Directory holding persisted cache regions, None = memory only
    pub cache_dir: Option<PathBuf>,
    /// Image ingestion settings
    pub image: ImageOptions,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `DATABASE_URL` - Record store URL (default: sqlite://inventoryDB.sqlite)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `ASSET_ORIGIN` - Upstream for static assets (default: http://127.0.0.1:8080)
    /// - `CACHE_VERSION` - Cache generation (default: 1)
    /// - `CACHE_DIR` - Directory for persisted cache regions (default: unset)
    /// - `IMAGE_MAX_WIDTH` / `IMAGE_MAX_HEIGHT` - Bounding box (default: 200)
    /// - `IMAGE_QUALITY` - JPEG quality 1-100 (default: 80)
    /// - `IMAGE_RESIZE` - Set to false to embed uploads unresized (default: true)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            asset_origin: env::var("ASSET_ORIGIN").unwrap_or(defaults.asset_origin),
            cache_version: parse_var("CACHE_VERSION").unwrap_or(defaults.cache_version),
            cache_dir: env::var("CACHE_DIR").ok().map(PathBuf::from),
            image: ImageOptions {
                max_width: parse_var("IMAGE_MAX_WIDTH").unwrap_or(defaults.image.max_width),
                max_height: parse_var("IMAGE_MAX_HEIGHT").unwrap_or(defaults.image.max_height),
                quality: parse_var::<u8>("IMAGE_QUALITY")
                    .map(|q| q.clamp(1, 100))
                    .unwrap_or(defaults.image.quality),
                resize: parse_var("IMAGE_RESIZE").unwrap_or(defaults.image.resize),
            },
        }
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: format!("sqlite://{}.sqlite", STORE_NAME),
            server_port: 3000,
            asset_origin: "http://127.0.0.1:8080".to_string(),
            cache_version: 1,
            cache_dir: None,
            image: ImageOptions::default(),
        }
    }
}
