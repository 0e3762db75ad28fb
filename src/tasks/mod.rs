//! Background Tasks Module
//!
//! Contains the tasks that run alongside the HTTP server.
//!
//! # Tasks
//! - Cache worker: owns the cache controller and answers intercepted fetches

mod cache_worker;

pub use cache_worker::{spawn_cache_worker, CacheCommand, CacheWorker};
