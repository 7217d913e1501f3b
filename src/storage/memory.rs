//! In-process storage backend.

use async_trait::async_trait;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde_json::{Map, Value};
use tracing::trace;

use crate::error::Result;

use super::Storage;

// ============================================================================
// MemoryStorage
// ============================================================================

/// Storage held in memory for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RwLock<FxHashMap<String, Value>>,
}

impl MemoryStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored keys.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Returns `true` if nothing is stored.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.items.read().get(key).cloned())
    }

    async fn set(&self, items: Map<String, Value>) -> Result<()> {
        let mut guard = self.items.write();
        for (key, value) in items {
            trace!(key = %key, "Storage set");
            guard.insert(key, value);
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.items.write().remove(key);
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
