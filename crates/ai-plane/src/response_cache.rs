//! C5 — model-response cache: TTL expiry plus least-used (with oldest
//! timestamp as tiebreaker) eviction, keyed by the `(system, user)`
//! prompt pair.

use ai_plane_core::cache_stats::CacheStats;
use ai_plane_core::observability::metrics;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

fn cache_key(system: &str, user: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(system.as_bytes());
    hasher.update(b"|");
    hasher.update(user.as_bytes());
    hex::encode(hasher.finalize())
}

struct Entry {
    body: String,
    model: String,
    inserted_at: Instant,
    ttl: Duration,
    access_count: u64,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.inserted_at) > self.ttl
    }
}

struct Counters {
    hits: u64,
    misses: u64,
}

pub struct ResponseCache {
    capacity: usize,
    default_ttl: Duration,
    entries: RwLock<HashMap<String, Entry>>,
    counters: RwLock<Counters>,
}

pub struct Hit {
    pub body: String,
    pub model: String,
}

impl ResponseCache {
    pub fn new(capacity: usize, default_ttl: Duration) -> Self {
        Self {
            capacity,
            default_ttl,
            entries: RwLock::new(HashMap::new()),
            counters: RwLock::new(Counters { hits: 0, misses: 0 }),
        }
    }

    /// A single exclusive lock covers the whole hit path: check expiry,
    /// bump the access count, and clone the body out. No read lock is
    /// ever promoted to a write lock, so there is no upgrade race.
    pub fn get(&self, system: &str, user: &str) -> Option<Hit> {
        let key = cache_key(system, user);
        let now = Instant::now();
        let mut entries = self.entries.write().expect("response cache mutex poisoned");

        let expired = match entries.get(&key) {
            Some(entry) => entry.is_expired(now),
            None => {
                self.record_miss();
                return None;
            }
        };

        if expired {
            entries.remove(&key);
            self.record_miss();
            return None;
        }

        let entry = entries.get_mut(&key).expect("checked above");
        entry.access_count += 1;
        let hit = Hit {
            body: entry.body.clone(),
            model: entry.model.clone(),
        };
        drop(entries);
        let mut counters = self.counters.write().expect("response cache counters poisoned");
        counters.hits += 1;
        metrics().response_cache_hits_total.add(1, &[]);
        Some(hit)
    }

    fn record_miss(&self) {
        let mut counters = self.counters.write().expect("response cache counters poisoned");
        counters.misses += 1;
        metrics().response_cache_misses_total.add(1, &[]);
    }

    pub fn set(&self, system: &str, user: &str, body: String, model: String) {
        self.set_with_ttl(system, user, body, model, self.default_ttl);
    }

    pub fn set_with_ttl(
        &self,
        system: &str,
        user: &str,
        body: String,
        model: String,
        ttl: Duration,
    ) {
        let key = cache_key(system, user);
        let mut entries = self.entries.write().expect("response cache mutex poisoned");

        if !entries.contains_key(&key) && entries.len() >= self.capacity && self.capacity > 0 {
            if let Some(evict_key) = entries
                .iter()
                .min_by(|(_, a), (_, b)| {
                    a.access_count
                        .cmp(&b.access_count)
                        .then(a.inserted_at.cmp(&b.inserted_at))
                })
                .map(|(k, _)| k.clone())
            {
                entries.remove(&evict_key);
            }
        }

        entries.insert(
            key,
            Entry {
                body,
                model,
                inserted_at: Instant::now(),
                ttl,
                access_count: 1,
            },
        );
    }

    /// Remove every expired entry in one pass.
    pub fn cleanup(&self) {
        let now = Instant::now();
        let mut entries = self.entries.write().expect("response cache mutex poisoned");
        entries.retain(|_, entry| !entry.is_expired(now));
    }

    pub fn clear(&self) {
        self.entries.write().expect("response cache mutex poisoned").clear();
        let mut counters = self.counters.write().expect("response cache counters poisoned");
        counters.hits = 0;
        counters.misses = 0;
    }

    pub fn stats(&self) -> CacheStats {
        let counters = self.counters.read().expect("response cache counters poisoned");
        CacheStats::from_counts(counters.hits + counters.misses, counters.hits)
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("response cache mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_then_miss_tracks_stats() {
        let cache = ResponseCache::new(10, Duration::from_secs(60));
        cache.set("sys", "user", "body".into(), "model-a".into());
        assert!(cache.get("sys", "user").is_some());
        assert!(cache.get("sys", "other").is_none());
        let stats = cache.stats();
        assert_eq!(stats.hit_count, 1);
        assert_eq!(stats.miss_count, 1);
    }

    #[test]
    fn expired_entry_is_evicted_on_read() {
        let cache = ResponseCache::new(10, Duration::from_millis(1));
        cache.set("sys", "user", "body".into(), "model-a".into());
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("sys", "user").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn eviction_prefers_lowest_access_count_then_oldest_timestamp() {
        let cache = ResponseCache::new(2, Duration::from_secs(3600));
        cache.set("sys", "a", "a-body".into(), "model".into());
        cache.set("sys", "b", "b-body".into(), "model".into());
        // bump "a"'s access count above "b"'s
        cache.get("sys", "a");
        cache.get("sys", "a");
        cache.set("sys", "c", "c-body".into(), "model".into());
        assert!(cache.get("sys", "a").is_some());
        assert!(cache.get("sys", "b").is_none());
        assert!(cache.get("sys", "c").is_some());
    }

    #[test]
    fn updating_an_existing_key_resets_access_count() {
        let cache = ResponseCache::new(10, Duration::from_secs(60));
        cache.set("sys", "user", "v1".into(), "model".into());
        cache.get("sys", "user");
        cache.get("sys", "user");
        cache.set("sys", "user", "v2".into(), "model".into());
        let hit = cache.get("sys", "user").unwrap();
        assert_eq!(hit.body, "v2");
    }
}
