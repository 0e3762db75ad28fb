//! Image Pipeline
//!
//! Decode, downsample and re-encode. Decoding is CPU-bound so the async
//! entry points hand the work to the blocking pool.

use std::io::Cursor;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use tracing::debug;

use crate::error::{InventoryError, Result};
use crate::images::ImageOptions;

const JPEG_MIME: &str = "image/jpeg";
const FALLBACK_MIME: &str = "application/octet-stream";

// == Scaling ==
/// Computes the dimensions of a `width`x`height` image scaled to fit within
/// `max_width`x`max_height`.
///
/// A single ratio is applied to both sides so the aspect is preserved.
/// Images already inside the bounds are returned unchanged; nothing is ever
/// scaled up.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }

    let ratio = f64::min(
        max_width as f64 / width as f64,
        max_height as f64 / height as f64,
    );

    let scaled = |side: u32, bound: u32| -> u32 {
        let value = (side as f64 * ratio).round() as u32;
        value.clamp(1, bound.max(1))
    };

    (scaled(width, max_width), scaled(height, max_height))
}

// == Resize ==
/// Decodes `bytes`, fits them inside the bounds of `options` and returns a
/// JPEG data URL.
///
/// Fails with `Decode` when the bytes are not a supported image.
pub fn resize_to_data_url(bytes: &[u8], options: &ImageOptions) -> Result<String> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| InventoryError::Decode(e.to_string()))?;

    let (width, height) = (img.width(), img.height());
    let (target_width, target_height) =
        fit_within(width, height, options.max_width, options.max_height);

    let img = if (target_width, target_height) == (width, height) {
        img
    } else {
        img.resize_exact(target_width, target_height, FilterType::Triangle)
    };

    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());

    let mut encoded = Vec::new();
    let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut encoded), options.quality);
    rgb.write_with_encoder(encoder)
        .map_err(|e| InventoryError::Internal(format!("JPEG encoding failed: {}", e)))?;

    debug!(
        "Resized image {}x{} -> {}x{} ({} bytes in, {} bytes out)",
        width,
        height,
        target_width,
        target_height,
        bytes.len(),
        encoded.len()
    );

    Ok(data_url(JPEG_MIME, &encoded))
}

// == Degraded Mode ==
/// Embeds the original bytes unresized, tagged with the mime type guessed
/// from their magic bytes.
pub fn embed_original(bytes: &[u8]) -> String {
    let mime = image::guess_format(bytes)
        .map(|format| format.to_mime_type())
        .unwrap_or(FALLBACK_MIME);
    data_url(mime, bytes)
}

fn data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

// == Async Entry Points ==
/// Runs the pipeline over in-memory bytes on the blocking pool.
pub async fn ingest(bytes: Vec<u8>, options: ImageOptions) -> Result<String> {
    if !options.resize {
        return Ok(embed_original(&bytes));
    }

    tokio::task::spawn_blocking(move || resize_to_data_url(&bytes, &options))
        .await
        .map_err(|e| InventoryError::Internal(format!("Image task failed: {}", e)))?
}

/// Reads `path` and runs the pipeline over its contents.
///
/// Fails with `Read` when the file cannot be read.
pub async fn ingest_file(path: impl AsRef<Path>, options: ImageOptions) -> Result<String> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| InventoryError::Read(format!("{}: {}", path.display(), e)))?;

    ingest(bytes, options).await
}
