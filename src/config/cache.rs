use super::ModelConfiguration;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

struct CacheEntry {
    config: Arc<ModelConfiguration>,
    stored_at: Instant,
}

/// Name-keyed cache of remotely resolved configurations.
///
/// Entries are immutable once stored and expire after the cache TTL; an
/// expired entry is evicted on lookup and never returned.
pub struct ConfigCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl ConfigCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, name: &str) -> Option<Arc<ModelConfiguration>> {
        let Ok(mut entries) = self.entries.lock() else {
            log::warn!("Configuration cache lock poisoned; treating as miss");
            return None;
        };
        let expired = match entries.get(name) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => {
                return Some(entry.config.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            log::debug!("Configuration cache entry for '{}' expired", name);
            entries.remove(name);
        }
        None
    }

    pub fn insert(&self, name: &str, config: Arc<ModelConfiguration>) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                name.to_string(),
                CacheEntry {
                    config,
                    stored_at: Instant::now(),
                },
            );
        }
    }

    pub fn invalidate(&self, name: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(name);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::ConfigCache;
    use crate::config::ModelConfiguration;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = ConfigCache::new(Duration::from_secs(60));
        cache.insert("runner", Arc::new(ModelConfiguration::generated_default("runner")));

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(cache.get("runner").is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get("runner").is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn lookups_are_keyed_by_name() {
        let cache = ConfigCache::new(Duration::from_secs(60));
        cache.insert("a", Arc::new(ModelConfiguration::generated_default("a")));
        assert!(cache.get("b").is_none());
        assert_eq!(cache.get("a").unwrap().name, "a");
        cache.invalidate("a");
        assert!(cache.get("a").is_none());
    }
}
