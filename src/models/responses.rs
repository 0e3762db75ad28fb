//! Response DTOs for the inventory API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::CacheStats;

/// Response body for the submit form (POST /api/items)
#[derive(Debug, Clone, Serialize)]
pub struct SubmitResponse {
    /// Success message
    pub message: String,
    /// Id of the created or updated record
    pub id: i64,
    /// True when a new record was created
    pub created: bool,
}

impl SubmitResponse {
    pub fn created(id: i64) -> Self {
        Self {
            message: format!("Record {} created", id),
            id,
            created: true,
        }
    }

    pub fn updated(id: i64) -> Self {
        Self {
            message: format!("Record {} updated", id),
            id,
            created: false,
        }
    }
}

/// Response body for DELETE /api/items/:id
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    pub message: String,
    pub id: i64,
    /// False when there was nothing to delete
    pub removed: bool,
}

impl DeleteResponse {
    pub fn new(id: i64, removed: bool) -> Self {
        Self {
            message: format!("Record {} deleted", id),
            id,
            removed,
        }
    }
}

/// Response body for POST /api/import
#[derive(Debug, Clone, Serialize)]
pub struct ImportResponse {
    pub message: String,
    pub imported: usize,
    pub ids: Vec<i64>,
}

impl ImportResponse {
    pub fn new(ids: Vec<i64>) -> Self {
        Self {
            message: format!("Imported {} records", ids.len()),
            imported: ids.len(),
            ids,
        }
    }
}

/// Response body for GET /api/cache/stats
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatsResponse {
    pub hits: u64,
    pub misses: u64,
    pub stored: u64,
    pub fallbacks: u64,
    pub evicted_regions: u64,
    /// Entries in the active region
    pub total_entries: usize,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl From<CacheStats> for CacheStatsResponse {
    fn from(stats: CacheStats) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            hits: stats.hits,
            misses: stats.misses,
            stored: stats.stored,
            fallbacks: stats.fallbacks,
            evicted_regions: stats.evicted_regions,
            total_entries: stats.total_entries,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
    /// Number of stored records
    pub records: i64,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy(records: i64) -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            records,
        }
    }
}
