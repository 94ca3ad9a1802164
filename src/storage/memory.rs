//! In-memory metadata store. No durability; handy for tests and for
//! running the scheduler without persistence.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::MetadataStore;

/// Process-local [`MetadataStore`] backed by a `HashMap`.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

#[async_trait]
impl MetadataStore for MemoryStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Value>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> anyhow::Result<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn clear(&self) -> anyhow::Result<()> {
        self.entries.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();

        assert_eq!(store.get("k").await.unwrap(), None);
        store.set("k", json!({"v": 1})).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!({"v": 1})));

        store.remove("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_clear_drops_everything() {
        let store = MemoryStore::new();
        store.set("a", json!(1)).await.unwrap();
        store.set("b", json!(2)).await.unwrap();

        store.clear().await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);
        assert_eq!(store.get("b").await.unwrap(), None);
    }
}
