//! # Metadata Store
//!
//! Abstract key-value persistence for announcement records. The core
//! serializes `Vec<ScheduledAnnouncement>` to a JSON value itself and
//! stores it under a single well-known key; implementations only move
//! opaque JSON documents around. No transactions.
//!
//! Two implementations ship with the crate: [`JsonFileStore`] (one JSON
//! document on disk, atomic rename on write) and [`MemoryStore`]
//! (process-local, used in tests and as a null store).
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Atomic tempfile-rename writes in JsonFileStore
//! - 1.0.0: Initial trait with file and memory implementations

pub mod json_file;
pub mod memory;

use async_trait::async_trait;
use serde_json::Value;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

/// Store key under which the announcement list is persisted.
pub const ANNOUNCEMENTS_KEY: &str = "announcements";

/// Key-value persistence collaborator.
///
/// Implementations surface their own failure causes through
/// `anyhow::Result`; the core decides per call site whether a failure
/// propagates (writes) or degrades to "no data" (reads).
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Fetch the value stored under `key`, if any.
    async fn get(&self, key: &str) -> anyhow::Result<Option<Value>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: Value) -> anyhow::Result<()>;

    /// Remove the value stored under `key`. Removing a missing key is
    /// not an error.
    async fn remove(&self, key: &str) -> anyhow::Result<()>;

    /// Remove every stored value.
    async fn clear(&self) -> anyhow::Result<()>;
}
