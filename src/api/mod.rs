//! API Module
//!
//! HTTP handlers and routing for the inventory REST API.
//!
//! # Endpoints
//! - `/api/items` - Record list, search and submit form
//! - `/api/items/:id` - Single record fetch and delete
//! - `/api/export`, `/api/import` - Bulk transfer
//! - `/api/events` - Change notifications
//! - `/api/cache/stats` - Cache statistics
//! - `/health` - Health check endpoint
//! - fallback - Static assets served through the cache worker

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
