//! Per-tier counters and observability snapshots.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::config::CacheConfig;
use crate::record::Tier;

/// Live counters for one tier. Atomics so accounting is lock-free and
/// atomic with respect to concurrent operations on the same tier.
#[derive(Debug, Default)]
pub struct TierStats {
    hits: AtomicU64,
    misses: AtomicU64,
    items: AtomicU64,
    total_size_bytes: AtomicU64,
    evictions: AtomicU64,
}

impl TierStats {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_insert(&self, size_bytes: u64) {
        self.items.fetch_add(1, Ordering::Relaxed);
        self.total_size_bytes.fetch_add(size_bytes, Ordering::Relaxed);
    }

    pub fn record_removal(&self, size_bytes: u64) {
        saturating_sub(&self.items, 1);
        saturating_sub(&self.total_size_bytes, size_bytes);
    }

    pub fn record_eviction(&self, size_bytes: u64) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
        self.record_removal(size_bytes);
    }

    pub fn reset_contents(&self) {
        self.items.store(0, Ordering::Relaxed);
        self.total_size_bytes.store(0, Ordering::Relaxed);
    }

    pub fn item_count(&self) -> u64 {
        self.items.load(Ordering::Relaxed)
    }

    pub fn total_size_bytes(&self) -> u64 {
        self.total_size_bytes.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> TierStatsSnapshot {
        let hit_count = self.hits.load(Ordering::Relaxed);
        let miss_count = self.misses.load(Ordering::Relaxed);
        let lookups = hit_count + miss_count;
        TierStatsSnapshot {
            hit_count,
            miss_count,
            item_count: self.items.load(Ordering::Relaxed),
            total_size_bytes: self.total_size_bytes.load(Ordering::Relaxed),
            eviction_count: self.evictions.load(Ordering::Relaxed),
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hit_count as f64 / lookups as f64
            },
        }
    }
}

fn saturating_sub(counter: &AtomicU64, by: u64) {
    let mut cur = counter.load(Ordering::Relaxed);
    loop {
        let next = cur.saturating_sub(by);
        match counter.compare_exchange_weak(cur, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return,
            Err(actual) => cur = actual,
        }
    }
}

/// Point-in-time view of one tier's counters.
#[derive(Debug, Clone, Serialize)]
pub struct TierStatsSnapshot {
    pub hit_count: u64,
    pub miss_count: u64,
    pub item_count: u64,
    pub total_size_bytes: u64,
    pub eviction_count: u64,
    pub hit_rate: f64,
}

/// Full observability snapshot returned by `statistics()`.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatistics {
    pub tiers: HashMap<Tier, TierStatsSnapshot>,
    pub network_tier_enabled: bool,
    pub config: CacheConfig,
}
