//! Offline Inventory - an inventory manager that keeps working offline
//!
//! Stores records in SQLite, shrinks uploaded images into embedded data URLs,
//! moves records in and out as JSON, and serves static assets through a
//! versioned cache that falls back gracefully when the network is gone.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod images;
pub mod inventory;
pub mod models;
pub mod tasks;
pub mod transfer;

pub use api::{create_router, AppState};
pub use config::Config;
pub use error::{InventoryError, Result};
pub use tasks::spawn_cache_worker;
