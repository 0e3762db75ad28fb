//! Inventory Module
//!
//! Persistent, transactional store of inventory records.

mod record;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use record::{matches_filter, Record, RecordFields};
pub use store::{RecordStore, StoreConnector};

// == Public Constants ==
/// Name of the record store
pub const STORE_NAME: &str = "inventoryDB";

/// Schema version recorded in the database
pub const SCHEMA_VERSION: i64 = 1;
