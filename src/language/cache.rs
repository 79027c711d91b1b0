//! Time-bounded cache for language detections and translations.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use tokio::time::Instant;

/// Default entry lifetime (5 minutes)
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Key for cached language lookups: `(source, target, text)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub source: String,
    pub target: String,
    pub text: String,
}

impl CacheKey {
    pub fn new(source: &str, target: &str, text: &str) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            text: text.to_string(),
        }
    }
}

struct Entry<V> {
    value: V,
    cached_at: Instant,
}

pub struct TtlCache<K, V> {
    entries: HashMap<K, Entry<V>>,
    ttl: Duration,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    /// Get a cached value if still valid.
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries
            .get(key)
            .filter(|entry| entry.cached_at.elapsed() < self.ttl)
            .map(|entry| entry.value.clone())
    }

    /// Store `value`, evicting expired entries first so the map only holds
    /// live lookups.
    pub fn insert(&mut self, key: K, value: V) {
        self.purge_expired();
        self.entries.insert(
            key,
            Entry {
                value,
                cached_at: Instant::now(),
            },
        );
    }

    /// Drop expired entries.
    fn purge_expired(&mut self) {
        let ttl = self.ttl;
        self.entries.retain(|_, entry| entry.cached_at.elapsed() < ttl);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Eq + Hash, V: Clone> Default for TtlCache<K, V> {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
