//! C1 — embedding cache: deduplicate embedding calls by content fingerprint
//! with bounded FIFO eviction.

use ai_plane_core::cache_stats::CacheStats;
use anyhow::Result;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

fn fingerprint(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.trim().as_bytes());
    hex::encode(hasher.finalize())
}

struct Inner {
    entries: HashMap<String, Vec<f32>>,
    insertion_order: VecDeque<String>,
}

/// Thread-safe, bounded FIFO embedding cache. A non-positive capacity
/// makes every operation a passthrough to the downstream embedder.
pub struct EmbeddingCache {
    capacity: i64,
    inner: Mutex<Inner>,
    hits: AtomicU64,
    accesses: AtomicU64,
}

impl EmbeddingCache {
    pub fn new(capacity: i64) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                insertion_order: VecDeque::new(),
            }),
            hits: AtomicU64::new(0),
            accesses: AtomicU64::new(0),
        }
    }

    fn passthrough(&self) -> bool {
        self.capacity <= 0
    }

    /// Look up a single vector by its source text, without touching the
    /// downstream embedder.
    pub fn lookup(&self, text: &str) -> Option<Vec<f32>> {
        if self.passthrough() {
            return None;
        }
        self.accesses.fetch_add(1, Ordering::Relaxed);
        let key = fingerprint(text);
        let inner = self.inner.lock().expect("embedding cache mutex poisoned");
        let hit = inner.entries.get(&key).cloned();
        if hit.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        hit
    }

    fn insert(&self, text: &str, vector: Vec<f32>) {
        if self.passthrough() {
            return;
        }
        let key = fingerprint(text);
        let mut inner = self.inner.lock().expect("embedding cache mutex poisoned");
        if !inner.entries.contains_key(&key) {
            inner.insertion_order.push_back(key.clone());
            while inner.entries.len() >= self.capacity.max(0) as usize
                && !inner.insertion_order.is_empty()
            {
                if let Some(oldest) = inner.insertion_order.pop_front() {
                    inner.entries.remove(&oldest);
                } else {
                    break;
                }
            }
        }
        inner.entries.insert(key, vector);
    }

    /// Embed a batch of texts, filling cache misses via `embed_fn` and
    /// writing results back in the caller's original order.
    pub async fn embed<F, Fut>(&self, texts: &[String], embed_fn: F) -> Result<Vec<Vec<f32>>>
    where
        F: FnOnce(Vec<String>) -> Fut,
        Fut: Future<Output = Result<Vec<Vec<f32>>>>,
    {
        if self.passthrough() {
            return embed_fn(texts.to_vec()).await;
        }

        let mut results: Vec<Option<Vec<f32>>> = Vec::with_capacity(texts.len());
        let mut miss_indices = Vec::new();
        let mut miss_texts = Vec::new();

        for text in texts {
            match self.lookup(text) {
                Some(vector) => results.push(Some(vector)),
                None => {
                    results.push(None);
                    miss_indices.push(results.len() - 1);
                    miss_texts.push(text.clone());
                }
            }
        }

        if !miss_texts.is_empty() {
            let fetched = embed_fn(miss_texts.clone()).await?;
            for (offset, vector) in fetched.into_iter().enumerate() {
                let idx = miss_indices[offset];
                self.insert(&texts[idx], vector.clone());
                results[idx] = Some(vector);
            }
        }

        Ok(results.into_iter().map(|v| v.expect("every index filled")).collect())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats::from_counts(
            self.accesses.load(Ordering::Relaxed),
            self.hits.load(Ordering::Relaxed),
        )
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("embedding cache mutex poisoned").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_embed(texts: Vec<String>) -> Vec<Vec<f32>> {
        texts.iter().map(|t| vec![t.len() as f32]).collect()
    }

    #[tokio::test]
    async fn determinism_ignores_surrounding_whitespace() {
        let cache = EmbeddingCache::new(10);
        let a = cache
            .embed(&["hello".to_string()], |t| async move { Ok(fake_embed(t)) })
            .await
            .unwrap();
        let b = cache
            .embed(&["  hello  ".to_string()], |t| async move { Ok(fake_embed(t)) })
            .await
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn fifo_eviction_keeps_most_recent() {
        let cache = EmbeddingCache::new(2);
        for t in ["a", "b", "c"] {
            cache
                .embed(&[t.to_string()], |texts| async move { Ok(fake_embed(texts)) })
                .await
                .unwrap();
        }
        assert_eq!(cache.len(), 2);
        assert!(cache.lookup("a").is_none());
        assert!(cache.lookup("b").is_some());
        assert!(cache.lookup("c").is_some());
    }

    #[tokio::test]
    async fn passthrough_when_capacity_non_positive() {
        let cache = EmbeddingCache::new(0);
        let result = cache
            .embed(&["x".to_string()], |texts| async move { Ok(fake_embed(texts)) })
            .await
            .unwrap();
        assert_eq!(result, vec![vec![1.0]]);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn preserves_caller_order_across_mixed_hits_and_misses() {
        let cache = EmbeddingCache::new(10);
        cache
            .embed(&["first".to_string()], |texts| async move { Ok(fake_embed(texts)) })
            .await
            .unwrap();

        let batch = vec!["first".to_string(), "second".to_string(), "third".to_string()];
        let result = cache
            .embed(&batch, |texts| async move { Ok(fake_embed(texts)) })
            .await
            .unwrap();

        assert_eq!(result[0], vec!["first".len() as f32]);
        assert_eq!(result[1], vec!["second".len() as f32]);
        assert_eq!(result[2], vec!["third".len() as f32]);
    }
}
