use anyhow::Result;
use async_trait::async_trait;
use shared_types::{ConfigurationRecord, HistoryEntry};

/// Durable home of configuration documents and their history.
///
/// Writes replace whole documents; merging happens in the caller.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, name: &str) -> Result<Option<ConfigurationRecord>>;

    async fn get_all(&self) -> Result<Vec<ConfigurationRecord>>;

    async fn set(&self, record: &ConfigurationRecord) -> Result<()>;

    /// Deleting a missing document is not an error
    async fn delete(&self, name: &str) -> Result<()>;

    async fn exists(&self, name: &str) -> Result<bool>;

    /// Stores `entry` under `history/v{entry.version}` of the named document
    async fn append_history(&self, name: &str, entry: &HistoryEntry) -> Result<()>;

    /// History entries ordered by ascending version
    async fn list_history(&self, name: &str) -> Result<Vec<HistoryEntry>>;

    async fn get_history(&self, name: &str, version: u64) -> Result<Option<HistoryEntry>>;
}
