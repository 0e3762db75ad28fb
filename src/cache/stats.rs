//! Cache Statistics Module
//!
//! Tracks how intercepted requests were answered.

use serde::Serialize;

// == Cache Stats ==
/// Tracks cache controller metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Requests answered from the active region
    pub hits: u64,
    /// Requests with no entry in the active region
    pub misses: u64,
    /// Responses copied into the active region after a network fetch
    pub stored: u64,
    /// Degraded responses served after a network failure
    pub fallbacks: u64,
    /// Regions deleted on activation
    pub evicted_regions: u64,
    /// Entries in the active region
    pub total_entries: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_store(&mut self) {
        self.stored += 1;
    }

    pub fn record_fallback(&mut self) {
        self.fallbacks += 1;
    }

    pub fn record_evictions(&mut self, count: usize) {
        self.evicted_regions += count as u64;
    }

    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }
}
