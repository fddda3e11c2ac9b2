//! Policy-driven eviction selection.
//!
//! Selection is pure: callers pass the tier's current record set and apply
//! the returned keys themselves under the tier lock. A single batch is
//! roughly a quarter of the tier; the looping variants keep batching until
//! the constraint holds, which guards against one very large record
//! surviving a single pass.

use rand::seq::SliceRandom;

use crate::record::{CacheRecord, EvictionPolicy};

/// Select ~¼ of the records for removal, ordered by policy.
pub fn evict_batch(records: &[CacheRecord], policy: EvictionPolicy) -> Vec<String> {
    if records.is_empty() {
        return Vec::new();
    }
    let batch = records.len().div_ceil(4);
    let mut candidates: Vec<&CacheRecord> = records.iter().collect();
    match policy {
        EvictionPolicy::Lru => candidates.sort_by_key(|r| r.accessed_at),
        EvictionPolicy::Lfu => candidates.sort_by_key(|r| r.access_count),
        EvictionPolicy::Fifo => candidates.sort_by_key(|r| r.created_at),
        EvictionPolicy::Random => candidates.shuffle(&mut rand::thread_rng()),
    }
    candidates
        .into_iter()
        .take(batch)
        .map(|r| r.key.clone())
        .collect()
}

/// Batch repeatedly until total size is at or below `target_size_bytes` or
/// the set is empty. Returns all selected keys.
pub fn evict_until_size(
    records: &[CacheRecord],
    policy: EvictionPolicy,
    target_size_bytes: u64,
) -> Vec<String> {
    evict_to_fit(records, policy, usize::MAX, target_size_bytes)
}

/// Batch until at most `max_items` records totalling at most `max_size_bytes`
/// remain. One invocation satisfies both constraints.
pub fn evict_to_fit(
    records: &[CacheRecord],
    policy: EvictionPolicy,
    max_items: usize,
    max_size_bytes: u64,
) -> Vec<String> {
    let mut remaining: Vec<CacheRecord> = records.to_vec();
    let mut selected = Vec::new();
    loop {
        let total: u64 = remaining.iter().map(|r| r.size_bytes).sum();
        if remaining.is_empty() || (remaining.len() <= max_items && total <= max_size_bytes) {
            return selected;
        }
        let batch = evict_batch(&remaining, policy);
        if batch.is_empty() {
            return selected;
        }
        remaining.retain(|r| !batch.contains(&r.key));
        selected.extend(batch);
    }
}
