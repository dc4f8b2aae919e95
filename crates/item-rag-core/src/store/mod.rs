//! Storage abstraction for items.
//!
//! The [`ItemStore`] trait defines every persistence operation the HTTP layer
//! and the query pipeline need, so backends (SQLite, in-memory) can be swapped
//! and injected.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Item, ItemField, ItemInDb};

/// Failure modes of an [`ItemStore`] operation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record has the requested identifier.
    #[error("item not found: {0}")]
    NotFound(String),
    /// An insert used an identifier that already exists.
    #[error("item already exists: {0}")]
    Duplicate(String),
    /// Transport or database failure. Never retried.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Literal substring test shared by every backend, so case folding is the
/// same Unicode lowercasing whichever store answers the query.
#[derive(Debug, Clone)]
pub struct SubstringMatch {
    needle: String,
    case_insensitive: bool,
}

impl SubstringMatch {
    pub fn new(pattern: &str, case_insensitive: bool) -> Self {
        let needle = if case_insensitive {
            pattern.to_lowercase()
        } else {
            pattern.to_string()
        };
        Self {
            needle,
            case_insensitive,
        }
    }

    pub fn is_match(&self, value: &str) -> bool {
        if self.case_insensitive {
            value.to_lowercase().contains(&self.needle)
        } else {
            value.contains(&self.needle)
        }
    }
}

/// Abstract item storage backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`find_all`](ItemStore::find_all) | List items in insertion order |
/// | [`find_by_id`](ItemStore::find_by_id) | Fetch one item |
/// | [`find_by_substring`](ItemStore::find_by_substring) | Literal substring match on a text field |
/// | [`insert`](ItemStore::insert) | Create an item, optionally with a caller-chosen id |
/// | [`replace`](ItemStore::replace) | Full replacement of an existing item |
/// | [`delete_by_id`](ItemStore::delete_by_id) | Remove an item, returning what it was |
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Items in insertion order, at most `limit`.
    async fn find_all(&self, limit: usize) -> StoreResult<Vec<ItemInDb>>;

    async fn find_by_id(&self, id: &str) -> StoreResult<ItemInDb>;

    /// Items whose `field` contains `pattern` as a literal substring, in
    /// insertion order, at most `limit`.
    async fn find_by_substring(
        &self,
        field: ItemField,
        pattern: &str,
        case_insensitive: bool,
        limit: usize,
    ) -> StoreResult<Vec<ItemInDb>>;

    /// Stores `item` under `id`, or under a generated id when `id` is `None`.
    ///
    /// Fails with [`StoreError::Duplicate`] if the id is taken.
    async fn insert(&self, item: &Item, id: Option<&str>) -> StoreResult<ItemInDb>;

    /// Replaces every field of an existing item. Never creates a record.
    async fn replace(&self, id: &str, item: &Item) -> StoreResult<ItemInDb>;

    /// Deletes an item and returns its former representation.
    async fn delete_by_id(&self, id: &str) -> StoreResult<ItemInDb>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substring_match_folds_unicode_case() {
        let m = SubstringMatch::new("ÉCLAIR", true);
        assert!(m.is_match("fresh éclair pastry"));
        assert!(!SubstringMatch::new("ÉCLAIR", false).is_match("fresh éclair pastry"));
        assert!(SubstringMatch::new("a.b", true).is_match("x A.B y"));
        assert!(!SubstringMatch::new("a.b", true).is_match("axb"));
    }
}
