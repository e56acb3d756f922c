//! In-memory item storage.
//!
//! Items are keyed by a `u64` id handed out by a generator that only ever
//! increments, so ids are never reused after deletion. Because ids grow
//! monotonically, ascending key order in the `BTreeMap` is also insertion
//! order, which is the order `list` returns.
//!
//! The store itself is not synchronized; [`AppState`](crate::state::AppState)
//! wraps it in a `RwLock` so that id assignment and insertion happen under a
//! single write guard.

mod params;

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::models::Item;

pub use params::{DEFAULT_LIST_LIMIT, ListParams};

/// Message returned to clients for unknown item ids.
const ITEM_NOT_FOUND: &str = "Item not found";

/// Owner of all item records.
#[derive(Debug)]
pub struct ItemStore {
    items: BTreeMap<u64, Item>,
    next_id: u64,
}

impl ItemStore {
    /// Create an empty store whose first item gets id 1.
    pub fn new() -> Self {
        Self {
            items: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Insert a new item under the next id and return it.
    pub fn create(&mut self, name: String, description: String) -> Item {
        let id = self.next_id;
        self.next_id += 1;

        let item = Item {
            id,
            name,
            description,
        };
        self.items.insert(id, item.clone());
        item
    }

    /// Return the `[offset, offset + limit)` slice of items in insertion order.
    ///
    /// An offset past the end yields an empty page.
    pub fn list(&self, params: ListParams) -> Vec<Item> {
        self.items
            .values()
            .skip(params.offset)
            .take(params.limit)
            .cloned()
            .collect()
    }

    /// Look up a single item.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no item has this id.
    pub fn get(&self, id: u64) -> AppResult<Item> {
        self.items.get(&id).cloned().ok_or_else(|| not_found(id))
    }

    /// Replace every mutable field of an existing item. The id never changes.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no item has this id.
    pub fn update(&mut self, id: u64, name: String, description: String) -> AppResult<Item> {
        let item = self.items.get_mut(&id).ok_or_else(|| not_found(id))?;
        item.name = name;
        item.description = description;
        Ok(item.clone())
    }

    /// Remove an item.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no item has this id.
    pub fn delete(&mut self, id: u64) -> AppResult<()> {
        self.items
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found(id))
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the store holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Default for ItemStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert a client-supplied id into a store key.
///
/// Ids are assigned from 1 upwards, so zero and negative ids can never exist
/// and are reported as missing rather than malformed.
pub fn item_key(raw: i64) -> AppResult<u64> {
    match u64::try_from(raw) {
        Ok(id) if id > 0 => Ok(id),
        _ => {
            debug!(item_id = raw, "Item id outside the assigned range");
            Err(AppError::NotFound(ITEM_NOT_FOUND.to_string()))
        }
    }
}

fn not_found(id: u64) -> AppError {
    debug!(item_id = id, "Item lookup missed");
    AppError::NotFound(ITEM_NOT_FOUND.to_string())
}
