use std::sync::Arc;
use std::time::Duration;

use crate::auth::Authenticator;
use crate::cache::ConfigCache;
use crate::clock::Clock;
use crate::repository::ConfigRepository;
use crate::storage::DocumentStore;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<ConfigCache>,
    pub repository: Arc<ConfigRepository>,
    pub auth: Arc<Authenticator>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
        cache_ttl: Duration,
        auth: Authenticator,
    ) -> Self {
        let repository = Arc::new(ConfigRepository::new(store, clock.clone()));
        let cache = Arc::new(ConfigCache::new(repository.clone(), clock, cache_ttl));

        Self {
            cache,
            repository,
            auth: Arc::new(auth),
        }
    }
}
