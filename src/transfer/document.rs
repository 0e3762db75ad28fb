//! Interchange Document
//!
//! A pretty-printed JSON array of `{ id, name, price, image? }`. Ids are
//! written on export and discarded on import so imported entries always
//! become new records.

use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{InventoryError, Result};
use crate::inventory::{RecordFields, RecordStore};

/// Outcome of a successful import.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportSummary {
    /// Number of records inserted
    pub imported: usize,
    /// Ids assigned to the inserted records, in document order
    pub ids: Vec<i64>,
}

// == Export ==
/// Serializes every stored record, ids included, with 2-space indentation.
pub async fn export(store: &RecordStore) -> Result<String> {
    let records = store.list("").await?;
    let document = serde_json::to_string_pretty(&records)
        .map_err(|e| InventoryError::Internal(format!("Export serialization failed: {}", e)))?;

    info!("Exported {} records", records.len());
    Ok(document)
}

/// Writes the export document to `path`.
pub async fn export_to_file(store: &RecordStore, path: impl AsRef<Path>) -> Result<usize> {
    let document = export(store).await?;
    tokio::fs::write(path.as_ref(), &document)
        .await
        .map_err(|e| InventoryError::Storage(format!("{}: {}", path.as_ref().display(), e)))?;
    Ok(document.len())
}

// == Parse ==
/// Parses an interchange document into record fields.
///
/// Every entry must be an object. Any `id` is removed before the entry is
/// interpreted. The whole document is validated before anything is
/// returned, so one bad entry rejects the document.
pub fn parse_document(document: &str) -> Result<Vec<RecordFields>> {
    let entries: Vec<Value> = serde_json::from_str(document)?;

    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            let mut object = match entry {
                Value::Object(object) => object,
                other => {
                    return Err(InventoryError::MalformedDocument(format!(
                        "entry {} is not an object: {}",
                        index, other
                    )))
                }
            };

            object.remove("id");

            let fields: RecordFields = serde_json::from_value(Value::Object(object))
                .map_err(|e| InventoryError::MalformedDocument(format!("entry {}: {}", index, e)))?;
            fields
                .validate()
                .map_err(|e| InventoryError::MalformedDocument(format!("entry {}: {}", index, e)))?;
            Ok(fields)
        })
        .collect()
}

// == Import ==
/// Inserts every entry of `document` as a new record.
///
/// Parsing happens up front; a malformed document inserts nothing. Each
/// insert is its own transaction.
pub async fn import(store: &RecordStore, document: &str) -> Result<ImportSummary> {
    let entries = match parse_document(document) {
        Ok(entries) => entries,
        Err(err) => {
            warn!("Import rejected: {}", err);
            return Err(err);
        }
    };

    let mut ids = Vec::with_capacity(entries.len());
    for fields in entries {
        ids.push(store.create(fields).await?);
    }

    info!("Imported {} records", ids.len());
    Ok(ImportSummary {
        imported: ids.len(),
        ids,
    })
}

/// Reads `path` and imports its contents.
pub async fn import_from_file(store: &RecordStore, path: impl AsRef<Path>) -> Result<ImportSummary> {
    let path = path.as_ref();
    let document = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| InventoryError::Read(format!("{}: {}", path.display(), e)))?;

    import(store, &document).await
}
