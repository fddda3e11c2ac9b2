//! Engine configuration.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::record::EvictionPolicy;

/// Capacity, freshness, and feature switches for one engine instance.
///
/// Byte-size limits apply to the sum of record `size_bytes` per tier; item
/// limits to the record count. Both are enforced on write, with an eviction
/// pass running first when either would be exceeded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub max_memory_items: usize,
    pub max_disk_items: usize,
    pub max_memory_size_bytes: u64,
    pub max_disk_size_bytes: u64,
    /// Applied when `put` is called without an explicit TTL.
    #[serde(with = "duration_secs")]
    pub default_ttl: Duration,
    pub default_policy: EvictionPolicy,
    pub enable_compression: bool,
    pub enable_encryption: bool,
    /// When false the disk tier runs on an in-memory database.
    pub enable_persistence: bool,
    pub enable_metrics: bool,
    pub enable_network_tier: bool,
    /// Expiry sweeper period.
    #[serde(with = "duration_secs")]
    pub cleanup_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_memory_items: 1_000,
            max_disk_items: 10_000,
            max_memory_size_bytes: 64 * 1024 * 1024,
            max_disk_size_bytes: 512 * 1024 * 1024,
            default_ttl: Duration::hours(1),
            default_policy: EvictionPolicy::Lru,
            enable_compression: false,
            enable_encryption: false,
            enable_persistence: true,
            enable_metrics: true,
            enable_network_tier: false,
            cleanup_interval: Duration::minutes(5),
        }
    }
}

impl CacheConfig {
    /// Item limit for a tier, if that tier is capacity-bounded.
    pub fn max_items(&self, tier: crate::record::Tier) -> Option<usize> {
        match tier {
            crate::record::Tier::Memory => Some(self.max_memory_items),
            crate::record::Tier::Disk => Some(self.max_disk_items),
            crate::record::Tier::Network => None,
        }
    }

    /// Byte limit for a tier, if that tier is capacity-bounded.
    pub fn max_size_bytes(&self, tier: crate::record::Tier) -> Option<u64> {
        match tier {
            crate::record::Tier::Memory => Some(self.max_memory_size_bytes),
            crate::record::Tier::Disk => Some(self.max_disk_size_bytes),
            crate::record::Tier::Network => None,
        }
    }
}

mod duration_secs {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_i64(d.num_seconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = i64::deserialize(d)?;
        Ok(Duration::seconds(secs))
    }
}
