//! Request and Response models for the inventory API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{parse_price, ListQuery, SubmitForm};
pub use responses::{
    CacheStatsResponse, DeleteResponse, HealthResponse, ImportResponse, SubmitResponse,
};
