//! Accessors for opaque upstream listing items.
//!
//! Items are forwarded untouched; the relay only ever reads two fields.

use serde::Deserialize;
use serde_json::Value;

/// Field carrying the unique, monotonically newer identifier of an item.
pub const ITEM_ID_FIELD: &str = "MESSAGE_ID";

/// Field carrying the creation timestamp of an item.
pub const CREATED_AT_FIELD: &str = "CREATE_DATE";

/// Identifier of an item, if present.
#[must_use]
pub fn item_id(item: &Value) -> Option<&Value> {
    item.get(ITEM_ID_FIELD)
}

/// Creation timestamp of an item, if present and non-empty.
#[must_use]
pub fn created_at(item: &Value) -> Option<&str> {
    item.get(CREATED_AT_FIELD)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Listing envelope returned by the monitor REST API.
///
/// `{ "data": { "contents": [ ... ] } }`; any missing level reads as empty.
#[derive(Debug, Default, Deserialize)]
pub struct ListingResponse {
    #[serde(default)]
    data: Option<ListingData>,
}

#[derive(Debug, Default, Deserialize)]
struct ListingData {
    #[serde(default)]
    contents: Option<Vec<Value>>,
}

impl ListingResponse {
    /// Consume the envelope, yielding the items newest-first.
    #[must_use]
    pub fn into_items(self) -> Vec<Value> {
        self.data.and_then(|d| d.contents).unwrap_or_default()
    }
}
