//! Item storage behind the `/items` routes.
//!
//! Items are free-form JSON. Only objects carrying an integer `id` field can be addressed
//! individually; everything else is still stored and listed.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

/// A stored item, exactly as posted.
pub type Item = Value;

/// Store handle shared by the item routes.
pub type SharedItemStore = Arc<dyn ItemStore>;

/// Errors returned by [`ItemStore`] implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("item store lock poisoned: {0}")]
    LockPoisoned(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Returns every item in insertion order.
    async fn list(&self) -> Result<Vec<Item>>;

    /// Returns the first item whose `id` equals `id`.
    async fn get(&self, id: i64) -> Result<Option<Item>>;

    /// Appends an item and returns it.
    async fn insert(&self, item: Item) -> Result<Item>;

    /// Shallow-merges `patch` into the first item with `id` and returns the result.
    async fn put(&self, id: i64, patch: Map<String, Value>) -> Result<Option<Item>>;

    /// Removes every item with `id`, returning how many were removed.
    async fn delete(&self, id: i64) -> Result<usize>;
}

/// Returns the integer `id` of an item, if it has one.
pub fn item_id(item: &Item) -> Option<i64> {
    item.get("id").and_then(Value::as_i64)
}

/// In-memory storage; contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryItemStore {
    items: RwLock<Vec<Item>>,
}

impl MemoryItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a new empty store in a [`SharedItemStore`].
    pub fn shared() -> SharedItemStore {
        Arc::new(Self::new())
    }
}

fn poisoned<E: std::fmt::Display>(err: E) -> StoreError {
    StoreError::LockPoisoned(err.to_string())
}

#[async_trait]
impl ItemStore for MemoryItemStore {
    async fn list(&self) -> Result<Vec<Item>> {
        let guard = self.items.read().map_err(poisoned)?;
        Ok(guard.clone())
    }

    async fn get(&self, id: i64) -> Result<Option<Item>> {
        let guard = self.items.read().map_err(poisoned)?;
        Ok(guard.iter().find(|item| item_id(item) == Some(id)).cloned())
    }

    async fn insert(&self, item: Item) -> Result<Item> {
        let mut guard = self.items.write().map_err(poisoned)?;
        guard.push(item.clone());
        tracing::info!(id = ?item_id(&item), total = guard.len(), "item created");
        Ok(item)
    }

    async fn put(&self, id: i64, patch: Map<String, Value>) -> Result<Option<Item>> {
        let mut guard = self.items.write().map_err(poisoned)?;
        let Some(item) = guard.iter_mut().find(|item| item_id(item) == Some(id)) else {
            return Ok(None);
        };

        // item_id only matches objects
        if let Value::Object(fields) = item {
            fields.extend(patch);
        }
        tracing::info!(id, "item updated");
        Ok(Some(item.clone()))
    }

    async fn delete(&self, id: i64) -> Result<usize> {
        let mut guard = self.items.write().map_err(poisoned)?;
        let before = guard.len();
        guard.retain(|item| item_id(item) != Some(id));
        let removed = before - guard.len();
        tracing::info!(id, removed, "items deleted");
        Ok(removed)
    }
}
