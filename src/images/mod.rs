//! Image Ingestion Module
//!
//! Downsizes picked images and re-encodes them as embeddable data URLs
//! before they are stored on a record.

mod pipeline;

pub use pipeline::{embed_original, fit_within, ingest, ingest_file, resize_to_data_url};

/// JPEG quality used when re-encoding (0.8)
pub const DEFAULT_QUALITY: u8 = 80;

/// Default bounding box for stored pictures
pub const DEFAULT_MAX_DIMENSION: u32 = 200;

/// Settings for the ingestion pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageOptions {
    pub max_width: u32,
    pub max_height: u32,
    /// JPEG quality, 1-100
    pub quality: u8,
    /// When false, uploads are embedded as-is without decoding
    pub resize: bool,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_DIMENSION,
            max_height: DEFAULT_MAX_DIMENSION,
            quality: DEFAULT_QUALITY,
            resize: true,
        }
    }
}
