//! In-memory [`ItemStore`] implementation for tests and embedding.
//!
//! Items live in a `Vec` behind `std::sync::RwLock`, which keeps insertion
//! order for listing and search.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::models::{generate_id, Item, ItemField, ItemInDb};

use super::{ItemStore, StoreError, StoreResult, SubstringMatch};

/// In-memory item store.
pub struct InMemoryItemStore {
    items: RwLock<Vec<ItemInDb>>,
}

impl InMemoryItemStore {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.read().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Vec<ItemInDb>>> {
        self.items
            .read()
            .map_err(|_| StoreError::Unavailable("item store lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Vec<ItemInDb>>> {
        self.items
            .write()
            .map_err(|_| StoreError::Unavailable("item store lock poisoned".to_string()))
    }
}

impl Default for InMemoryItemStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ItemStore for InMemoryItemStore {
    async fn find_all(&self, limit: usize) -> StoreResult<Vec<ItemInDb>> {
        Ok(self.read()?.iter().take(limit).cloned().collect())
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<ItemInDb> {
        self.read()?
            .iter()
            .find(|i| i.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn find_by_substring(
        &self,
        field: ItemField,
        pattern: &str,
        case_insensitive: bool,
        limit: usize,
    ) -> StoreResult<Vec<ItemInDb>> {
        let matcher = SubstringMatch::new(pattern, case_insensitive);
        let items = self.read()?;
        Ok(items
            .iter()
            .filter(|i| matcher.is_match(field.value(i)))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn insert(&self, item: &Item, id: Option<&str>) -> StoreResult<ItemInDb> {
        let id = id.map(str::to_string).unwrap_or_else(generate_id);
        let mut items = self.write()?;
        if items.iter().any(|i| i.id == id) {
            return Err(StoreError::Duplicate(id));
        }
        let stored = ItemInDb::new(id, item.clone());
        items.push(stored.clone());
        Ok(stored)
    }

    async fn replace(&self, id: &str, item: &Item) -> StoreResult<ItemInDb> {
        let mut items = self.write()?;
        let slot = items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        *slot = ItemInDb::new(id, item.clone());
        Ok(slot.clone())
    }

    async fn delete_by_id(&self, id: &str) -> StoreResult<ItemInDb> {
        let mut items = self.write()?;
        let pos = items
            .iter()
            .position(|i| i.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        Ok(items.remove(pos))
    }
}
