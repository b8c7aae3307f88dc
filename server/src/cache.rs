use anyhow::Result;
use shared_types::{ConfigurationPatch, ConfigurationRecord};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

use crate::clock::Clock;
use crate::repository::ConfigRepository;

pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

#[derive(Default)]
struct CacheState {
    entries: BTreeMap<String, ConfigurationRecord>,
    refreshed_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Whole-table read-through cache of every configuration.
///
/// Any stale or empty read reloads the full set from the repository. Writes
/// that go through the cache invalidate it, so the next read always sees
/// them. Reloads are not coordinated with invalidations; a reload that
/// started before a write may repopulate the old data until the next TTL
/// expiry or write.
pub struct ConfigCache {
    repository: Arc<ConfigRepository>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    state: RwLock<CacheState>,
}

impl ConfigCache {
    pub fn new(repository: Arc<ConfigRepository>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            repository,
            clock,
            ttl,
            state: RwLock::new(CacheState::default()),
        }
    }

    fn is_fresh(&self, state: &CacheState) -> bool {
        if state.entries.is_empty() {
            return false;
        }

        match state.refreshed_at {
            // A clock that went backwards counts as fresh
            Some(refreshed_at) => (self.clock.now() - refreshed_at)
                .to_std()
                .map_or(true, |elapsed| elapsed < self.ttl),
            None => false,
        }
    }

    async fn reload(&self) -> Result<BTreeMap<String, ConfigurationRecord>> {
        let entries: BTreeMap<_, _> = self
            .repository
            .get_all()
            .await?
            .into_iter()
            .map(|record| (record.id.clone(), record))
            .collect();

        let mut state = self.state.write().await;
        state.entries = entries.clone();
        state.refreshed_at = Some(self.clock.now());
        debug!(count = entries.len(), "Configuration cache reloaded");

        Ok(entries)
    }

    /// Every configuration, ordered by name
    pub async fn get_all(&self) -> Result<Vec<ConfigurationRecord>> {
        {
            let state = self.state.read().await;
            if self.is_fresh(&state) {
                return Ok(state.entries.values().cloned().collect());
            }
        }

        Ok(self.reload().await?.into_values().collect())
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Option<ConfigurationRecord>> {
        {
            let state = self.state.read().await;
            if self.is_fresh(&state) {
                return Ok(state.entries.get(name).cloned());
            }
        }

        Ok(self.reload().await?.remove(name))
    }

    pub async fn invalidate(&self) {
        let mut state = self.state.write().await;
        state.entries.clear();
        state.refreshed_at = None;
        debug!("Configuration cache invalidated");
    }

    pub async fn set(
        &self,
        name: &str,
        patch: ConfigurationPatch,
        writer_id: &str,
    ) -> Result<ConfigurationRecord> {
        let record = self.repository.set(name, patch, writer_id).await?;
        self.invalidate().await;
        Ok(record)
    }

    pub async fn delete(&self, name: &str) -> Result<bool> {
        let deleted = self.repository.delete(name).await?;
        if deleted {
            self.invalidate().await;
        }
        Ok(deleted)
    }
}
