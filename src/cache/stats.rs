//! Cache Statistics Module
//!
//! Tracks lookup hits and misses plus entries purged by expiry sweeps.

use serde::Serialize;

// == Cache Stats ==
/// Tracks cache performance metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Lookups that found a live entry
    pub hits: u64,
    /// Lookups that found nothing (absent or expired)
    pub misses: u64,
    /// Expired entries removed by `purge_expired`
    pub purged: u64,
    /// Live entries at the time of the snapshot
    pub total_entries: usize,
    /// RFC 3339 time the snapshot was taken
    pub snapshot_at: String,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Records the outcome of one lookup.
    pub fn record_lookup(&mut self, found: bool) {
        if found {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
    }

    pub fn record_purged(&mut self, count: usize) {
        self.purged += count as u64;
    }

    // == Snapshot ==
    /// Copies the counters, stamped with the live entry count and current time.
    pub fn snapshot(&self, total_entries: usize) -> CacheStats {
        CacheStats {
            total_entries,
            snapshot_at: chrono::Utc::now().to_rfc3339(),
            ..self.clone()
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = CacheStats::new();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.purged, 0);
        assert_eq!(stats.total_entries, 0);
    }

    #[test]
    fn test_hit_rate_no_requests() {
        let stats = CacheStats::new();
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let mut stats = CacheStats::new();
        stats.record_lookup(true);
        stats.record_lookup(false);
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[test]
    fn test_record_purged() {
        let mut stats = CacheStats::new();
        stats.record_purged(2);
        stats.record_purged(3);
        assert_eq!(stats.purged, 5);
    }

    #[test]
    fn test_snapshot_stamps_entries() {
        let mut stats = CacheStats::new();
        stats.record_lookup(true);
        let snap = stats.snapshot(42);
        assert_eq!(snap.total_entries, 42);
        assert_eq!(snap.hits, 1);
        assert!(!snap.snapshot_at.is_empty());
    }
}
