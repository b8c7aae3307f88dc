use anyhow::Result;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use crate::ConfigClient;

struct CachedView {
    values: Arc<Map<String, Value>>,
    fetched_at: Instant,
}

/// Keeps the resolved view of each country for `ttl` before refetching
pub struct CachedConfigClient {
    client: ConfigClient,
    ttl: Duration,
    cache: RwLock<HashMap<Option<String>, CachedView>>,
}

impl CachedConfigClient {
    pub fn new(client: ConfigClient, ttl: Duration) -> Self {
        Self {
            client,
            ttl,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// The resolved name to value map for `country`
    pub async fn resolved(&self, country: Option<&str>) -> Result<Arc<Map<String, Value>>> {
        let key = country.map(str::to_string);

        {
            let cache = self.cache.read().await;
            if let Some(view) = cache.get(&key) {
                if view.fetched_at.elapsed() < self.ttl {
                    return Ok(view.values.clone());
                }
            }
        }

        debug!(country = ?country, "Fetching resolved configuration");
        let values = Arc::new(self.client.resolved(country).await?);

        self.cache.write().await.insert(
            key,
            CachedView {
                values: values.clone(),
                fetched_at: Instant::now(),
            },
        );

        Ok(values)
    }

    /// One resolved value, `None` when the name is unknown
    pub async fn get(&self, name: &str, country: Option<&str>) -> Result<Option<Value>> {
        Ok(self.resolved(country).await?.get(name).cloned())
    }

    pub async fn clear_cache(&self) {
        self.cache.write().await.clear();
    }

    pub async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }
}
