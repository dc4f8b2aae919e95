//! Core data models used throughout item-rag.
//!
//! [`Item`] is the client payload, [`ItemInDb`] is what the store returns and
//! what clients see. [`RetrievedDocument`] only lives for the duration of one
//! query-to-report request.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum length of an item identifier.
pub const MAX_ID_LEN: usize = 64;

/// Product-like record as submitted by clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    pub description: String,
    pub price: f64,
}

/// A stored item together with its identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemInDb {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: f64,
}

impl ItemInDb {
    pub fn new(id: impl Into<String>, item: Item) -> Self {
        Self {
            id: id.into(),
            name: item.name,
            description: item.description,
            price: item.price,
        }
    }
}

/// Text fields that support substring search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemField {
    Name,
    Description,
}

impl ItemField {
    /// Column / attribute name for this field.
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemField::Name => "name",
            ItemField::Description => "description",
        }
    }

    pub fn value<'a>(&self, item: &'a ItemInDb) -> &'a str {
        match self {
            ItemField::Name => &item.name,
            ItemField::Description => &item.description,
        }
    }
}

/// A record's description text tagged with its identifier, as fed to the
/// retrieval index.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedDocument {
    pub id: String,
    pub content: String,
}

impl From<&ItemInDb> for RetrievedDocument {
    fn from(item: &ItemInDb) -> Self {
        Self {
            id: item.id.clone(),
            content: item.description.clone(),
        }
    }
}

/// Generates a fresh identifier: 32 lowercase hex characters.
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Returns true when `id` is 1..=64 characters of `[A-Za-z0-9_-]`.
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}
