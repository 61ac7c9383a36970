//! In-memory result cache.

use crate::link::Operation;
use rustc_hash::FxHashMap;
use std::sync::{Arc, RwLock};

/// Normalized identity of an operation.
///
/// Two operations share a key when their names match, their query text is
/// equal after collapsing whitespace, and their variables serialize to the
/// same canonical JSON.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn from_operation(operation: &Operation) -> Self {
        let query = operation.query.split_whitespace().collect::<Vec<_>>().join(" ");
        let variables = operation
            .variables
            .as_ref()
            .filter(|v| !v.is_null())
            .map(|v| v.to_string())
            .unwrap_or_default();
        let name = operation.operation_name.as_deref().unwrap_or("");
        Self(format!("{}|{}|{}", name, query, variables))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Thread-safe store of operation results, shared by clones.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCache {
    entries: Arc<RwLock<FxHashMap<CacheKey, serde_json::Value>>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self, key: &CacheKey) -> Option<serde_json::Value> {
        self.entries.read().ok()?.get(key).cloned()
    }

    pub fn write(&self, key: CacheKey, data: serde_json::Value) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(key, data);
        }
    }

    /// Removes one entry, returning it.
    pub fn evict(&self, key: &CacheKey) -> Option<serde_json::Value> {
        self.entries.write().ok()?.remove(key)
    }

    /// Removes every entry.
    pub fn reset(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
