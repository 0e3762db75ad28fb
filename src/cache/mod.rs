//! Cache Module
//!
//! Offline cache controller: versioned regions of static assets answered
//! cache-first, refreshed from the network and evicted a generation at a
//! time.

mod controller;
mod entry;
pub(crate) mod fetcher;
mod stats;
mod store;


// Re-export public types
pub use controller::{CacheController, ControllerState, Generation};
pub use entry::{AssetRequest, CachedResponse, Destination, RequestKey};
pub use fetcher::{Fetcher, HttpFetcher};
pub use stats::CacheStats;
pub use store::{CacheRegion, CacheStorage, PendingPut};

// == Public Constants ==
/// Prefix of every region name; the generation number follows
pub const CACHE_PREFIX: &str = "inventory-cache-v";

/// Page served when a document request cannot be answered
pub const ROOT_DOCUMENT: &str = "index.html";

/// Static assets installed with every generation
pub const DEFAULT_MANIFEST: &[&str] = &[
    "index.html",
    "style.css",
    "app.js",
    "manifest.json",
    "icons/icon-192.png",
    "icons/icon-512.png",
];
