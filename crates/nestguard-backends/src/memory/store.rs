//! Map-backed backing store.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::StoreError;
use crate::traits::BackingStore;

/// Backing store holding entities in a sorted map.
///
/// Used by the server binary (seeded from a JSON file) and by tests.
#[derive(Debug)]
pub struct InMemoryStore<V> {
    rows: RwLock<BTreeMap<String, V>>,
}

impl<V> InMemoryStore<V> {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
        }
    }

    /// Inserts or replaces an entity. Returns the previous value.
    pub fn insert(&self, id: impl Into<String>, value: V) -> Option<V> {
        self.rows.write().insert(id.into(), value)
    }

    /// Removes an entity. Returns the removed value.
    pub fn remove(&self, id: &str) -> Option<V> {
        self.rows.write().remove(id)
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

impl<V> Default for InMemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V, K> FromIterator<(K, V)> for InMemoryStore<V>
where
    K: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            rows: RwLock::new(iter.into_iter().map(|(k, v)| (k.into(), v)).collect()),
        }
    }
}

#[async_trait]
impl<V> BackingStore<V> for InMemoryStore<V>
where
    V: Clone + Send + Sync,
{
    async fn fetch_by_id(&self, id: &str) -> Result<Option<V>, StoreError> {
        Ok(self.rows.read().get(id).cloned())
    }

    async fn list_all_keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.rows.read().keys().cloned().collect())
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}
