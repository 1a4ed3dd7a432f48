//! Region Statistics Module
//!
//! Tracks per-region read, write and lock-wait counters.

use serde::Serialize;

// == Region Stats ==
/// Tracks region activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegionStats {
    /// Reads that found a value
    pub hits: u64,
    /// Reads that found nothing
    pub misses: u64,
    /// Writes performed, committed or not
    pub puts: u64,
    /// Writes that had to wait for other transactions' markers
    pub write_waits: u64,
    /// Write tickets released by a commit
    pub committed_writes: u64,
    /// Write tickets released by a rollback
    pub rolled_back_writes: u64,
    /// Current number of entries holding a value
    pub total_entries: usize,
}

impl RegionStats {
    // == Constructor ==
    /// Creates a new RegionStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the read hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no reads have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_put(&mut self) {
        self.puts += 1;
    }

    pub fn record_write_wait(&mut self) {
        self.write_waits += 1;
    }

    pub fn record_committed_write(&mut self) {
        self.committed_writes += 1;
    }

    pub fn record_rolled_back_write(&mut self) {
        self.rolled_back_writes += 1;
    }

    /// Updates the total entries count.
    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = RegionStats::new();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.puts, 0);
        assert_eq!(stats.total_entries, 0);
    }

    #[test]
    fn test_hit_rate_no_requests() {
        let stats = RegionStats::new();
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let mut stats = RegionStats::new();
        stats.record_hit();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        assert_eq!(stats.hit_rate(), 0.75);
    }

    #[test]
    fn test_write_counters() {
        let mut stats = RegionStats::new();
        stats.record_put();
        stats.record_put();
        stats.record_write_wait();
        stats.record_committed_write();
        stats.record_rolled_back_write();

        assert_eq!(stats.puts, 2);
        assert_eq!(stats.write_waits, 1);
        assert_eq!(stats.committed_writes, 1);
        assert_eq!(stats.rolled_back_writes, 1);
    }
}
