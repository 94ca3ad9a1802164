//! JSON-document-on-disk metadata store.
//!
//! The whole store is one pretty-printed JSON object; every write
//! rewrites the document through a sibling `.tmp` file and renames it
//! into place so a crash mid-write never leaves a torn document.

use async_trait::async_trait;
use log::debug;
use serde_json::{Map, Value};
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::sync::Mutex;

use super::MetadataStore;

/// File-backed [`MetadataStore`] holding one JSON object.
pub struct JsonFileStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles on the document.
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileStore {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn read_document(&self) -> anyhow::Result<Map<String, Value>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_document(&self, document: &Map<String, Value>) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(document)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!("Wrote metadata document to {}", self.path.display());
        Ok(())
    }
}

#[async_trait]
impl MetadataStore for JsonFileStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Value>> {
        let document = self.read_document().await?;
        Ok(document.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.read_document().await?;
        document.insert(key.to_string(), value);
        self.write_document(&document).await
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.read_document().await?;
        if document.remove(key).is_some() {
            self.write_document(&document).await?;
        }
        Ok(())
    }

    async fn clear(&self) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock().await;
        self.write_document(&Map::new()).await
    }
}
