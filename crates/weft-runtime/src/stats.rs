//! Loader counters.
//!
//! Monotone per-session counters with a serializable snapshot, split the
//! same way as a live registry and a point-in-time view.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters for one render session's loader.
#[derive(Debug, Default)]
pub struct LoaderStats {
    module_fetches: AtomicU64,
    module_cache_hits: AtomicU64,
    embedded_hits: AtomicU64,
    modules_registered: AtomicU64,
    style_fetches: AtomicU64,
    style_cache_hits: AtomicU64,
    style_fetch_failures: AtomicU64,
}

impl LoaderStats {
    pub fn record_module_fetch(&self) {
        self.module_fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_module_cache_hit(&self) {
        self.module_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_embedded_hit(&self) {
        self.embedded_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_module_registered(&self) {
        self.modules_registered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_style_fetch(&self) {
        self.style_fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_style_cache_hit(&self) {
        self.style_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_style_fetch_failure(&self) {
        self.style_fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// A point-in-time view of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            module_fetches: self.module_fetches.load(Ordering::Relaxed),
            module_cache_hits: self.module_cache_hits.load(Ordering::Relaxed),
            embedded_hits: self.embedded_hits.load(Ordering::Relaxed),
            modules_registered: self.modules_registered.load(Ordering::Relaxed),
            style_fetches: self.style_fetches.load(Ordering::Relaxed),
            style_cache_hits: self.style_cache_hits.load(Ordering::Relaxed),
            style_fetch_failures: self.style_fetch_failures.load(Ordering::Relaxed),
        }
    }
}

/// Serializable snapshot of [`LoaderStats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub module_fetches: u64,
    pub module_cache_hits: u64,
    pub embedded_hits: u64,
    pub modules_registered: u64,
    pub style_fetches: u64,
    pub style_cache_hits: u64,
    pub style_fetch_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_recorded_counts() {
        let stats = LoaderStats::default();
        stats.record_module_fetch();
        stats.record_module_fetch();
        stats.record_style_fetch();
        stats.record_style_fetch_failure();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.module_fetches, 2);
        assert_eq!(snapshot.style_fetches, 1);
        assert_eq!(snapshot.style_fetch_failures, 1);
        assert_eq!(snapshot.module_cache_hits, 0);
    }

    #[test]
    fn test_snapshot_serializes_to_json() {
        let stats = LoaderStats::default();
        stats.record_embedded_hit();

        let value = serde_json::to_value(stats.snapshot()).unwrap();
        assert_eq!(value["embedded_hits"], 1);
    }
}
