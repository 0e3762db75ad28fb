//! Bulk Transfer Module
//!
//! Exports the whole record store as a JSON interchange document and imports
//! such documents back as new records.

mod document;

pub use document::{
    export, export_to_file, import, import_from_file, parse_document, ImportSummary,
};

/// File name offered when the export is downloaded
pub const EXPORT_FILE_NAME: &str = "inventory.json";
