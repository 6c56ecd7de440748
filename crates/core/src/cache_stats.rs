//! Read-only cache statistics shared by the embedding cache and the
//! model-response cache. Each cache tracks its own atomics and builds
//! one of these as a snapshot; this type carries no interior mutability
//! of its own.

#[derive(Debug, Clone)]
pub struct CacheStats {
    pub access_count: u64,
    pub hit_count: u64,
    pub miss_count: u64,
    pub hit_rate: f64,
}

impl CacheStats {
    pub fn from_counts(access_count: u64, hit_count: u64) -> Self {
        let hit_rate = if access_count > 0 {
            (hit_count as f64 / access_count as f64) * 100.0
        } else {
            0.0
        };
        Self {
            access_count,
            hit_count,
            miss_count: access_count.saturating_sub(hit_count),
            hit_rate,
        }
    }
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cache Stats: {} accesses, {} hits, {} misses ({:.1}% hit rate)",
            self.access_count, self.hit_count, self.miss_count, self.hit_rate
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_rate_computed_from_counts() {
        let stats = CacheStats::from_counts(10, 4);
        assert_eq!(stats.miss_count, 6);
        assert!((stats.hit_rate - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_accesses_is_zero_rate() {
        let stats = CacheStats::from_counts(0, 0);
        assert_eq!(stats.hit_rate, 0.0);
    }
}
