//! Request DTOs for the inventory API
//!
//! Defines the structure of incoming HTTP requests.

use axum::extract::Multipart;
use serde::Deserialize;

use crate::error::{InventoryError, Result};

/// Query string of `GET /api/items`
///
/// # Fields
/// - `q`: Optional search text, matched case-insensitively against names
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub q: Option<String>,
}

impl ListQuery {
    pub fn filter(&self) -> &str {
        self.q.as_deref().unwrap_or("")
    }
}

/// Parsed body of the submit form (`POST /api/items`)
///
/// # Fields
/// - `name`: Record name
/// - `price`: Parsed price
/// - `image`: Raw bytes of the picked file, if any
/// - `edit_id`: Present when the submit edits an existing record
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitForm {
    pub name: String,
    pub price: f64,
    pub image: Option<Vec<u8>>,
    pub edit_id: Option<i64>,
}

impl SubmitForm {
    /// Reads the multipart fields `name`, `price`, `image` and `edit_id`.
    ///
    /// A failing upload stream is a `Read` error; missing or unparsable
    /// fields are `InvalidRequest`. An empty file part counts as no image.
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self> {
        let mut name = None;
        let mut price = None;
        let mut image = None;
        let mut edit_id = None;

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| InventoryError::Read(e.to_string()))?
        {
            let field_name = field.name().unwrap_or_default().to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| InventoryError::Read(format!("{}: {}", field_name, e)))?;

            match field_name.as_str() {
                "name" => name = Some(String::from_utf8_lossy(&data).trim().to_string()),
                "price" => price = Some(String::from_utf8_lossy(&data).to_string()),
                "image" if !data.is_empty() => image = Some(data.to_vec()),
                "edit_id" => edit_id = parse_edit_id(&String::from_utf8_lossy(&data))?,
                _ => {}
            }
        }

        let name = name
            .filter(|name| !name.is_empty())
            .ok_or_else(|| InventoryError::InvalidRequest("Name is required".to_string()))?;
        let price = parse_price(price.as_deref().unwrap_or(""))?;

        Ok(Self {
            name,
            price,
            image,
            edit_id,
        })
    }
}

/// Parses a price field. Blank, non-numeric, negative and non-finite values
/// are rejected.
pub fn parse_price(raw: &str) -> Result<f64> {
    let price: f64 = raw
        .trim()
        .parse()
        .map_err(|_| InventoryError::InvalidRequest(format!("Invalid price: '{}'", raw)))?;

    if !price.is_finite() || price < 0.0 {
        return Err(InventoryError::InvalidRequest(format!(
            "Price must be a finite number >= 0, got {}",
            raw
        )));
    }
    Ok(price)
}

/// Blank means "not editing".
fn parse_edit_id(raw: &str) -> Result<Option<i64>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse()
        .map(Some)
        .map_err(|_| InventoryError::InvalidRequest(format!("Invalid edit id: '{}'", raw)))
}
