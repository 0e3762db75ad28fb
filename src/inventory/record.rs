//! Inventory Record Module
//!
//! Defines the stored record and the field set supplied when writing one.

use serde::{Deserialize, Serialize};

use crate::error::{InventoryError, Result};

// == Record ==
/// A stored inventory entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Store-assigned identifier, never changes
    pub id: i64,
    pub name: String,
    pub price: f64,
    /// Embedded data URL, absent when the record has no picture
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

// == Record Fields ==
/// Everything but the id: what `create` inserts and `update` applies.
///
/// On update a `None` image keeps the stored picture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordFields {
    pub name: String,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl RecordFields {
    pub fn new(name: impl Into<String>, price: f64, image: Option<String>) -> Self {
        Self {
            name: name.into(),
            price,
            image,
        }
    }

    /// Rejects prices that are negative, NaN or infinite.
    pub fn validate(&self) -> Result<()> {
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(InventoryError::InvalidRequest(format!(
                "Price must be a finite number >= 0, got {}",
                self.price
            )));
        }
        Ok(())
    }
}

impl From<Record> for RecordFields {
    fn from(record: Record) -> Self {
        Self {
            name: record.name,
            price: record.price,
            image: record.image,
        }
    }
}

// == Search ==
/// Case-insensitive substring match of `filter` against `name`.
///
/// An empty filter matches every name.
pub fn matches_filter(name: &str, filter: &str) -> bool {
    filter.is_empty() || name.to_lowercase().contains(&filter.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_zero_price() {
        assert!(RecordFields::new("Free sample", 0.0, None).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_negative_price() {
        let result = RecordFields::new("Refund", -1.0, None).validate();
        assert!(matches!(result, Err(InventoryError::InvalidRequest(_))));
    }

    #[test]
    fn test_validate_rejects_nan() {
        assert!(RecordFields::new("Broken", f64::NAN, None).validate().is_err());
        assert!(RecordFields::new("Broken", f64::INFINITY, None).validate().is_err());
    }

    #[test]
    fn test_matches_filter_ignores_case() {
        assert!(matches_filter("Blue Widget", "widget"));
        assert!(matches_filter("blue widget", "WIDGET"));
        assert!(!matches_filter("Gadget", "widget"));
    }

    #[test]
    fn test_empty_filter_matches_all() {
        assert!(matches_filter("anything", ""));
    }

    #[test]
    fn test_record_without_image_omits_field() {
        let record = Record {
            id: 1,
            name: "Widget".to_string(),
            price: 9.99,
            image: None,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("image"));
    }
}
