//! Record envelope and tier/policy tags shared by every storage tier.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One storage medium with its own capacity and keyspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Memory,
    Disk,
    Network,
}

impl Tier {
    /// Fallback probe order for lookups.
    pub const FALLBACK_ORDER: [Tier; 3] = [Tier::Memory, Tier::Disk, Tier::Network];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Memory => "memory",
            Tier::Disk => "disk",
            Tier::Network => "network",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Removal ordering used when a tier exceeds its capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    #[default]
    Lru,
    Lfu,
    Fifo,
    Random,
}

impl EvictionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvictionPolicy::Lru => "lru",
            EvictionPolicy::Lfu => "lfu",
            EvictionPolicy::Fifo => "fifo",
            EvictionPolicy::Random => "random",
        }
    }
}

/// The value envelope stored in every tier.
///
/// `payload` is the encoded (post-transform) byte representation;
/// `size_bytes` is its length. A record whose `expires_at` has passed is
/// logically absent even while still physically stored: lookups delete it
/// lazily and the sweeper deletes it eagerly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRecord {
    pub key: String,
    pub payload: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub size_bytes: u64,
    /// Policy requested at insertion. Audit-only: eviction selection always
    /// uses the engine-wide default over the whole tier.
    pub policy: EvictionPolicy,
    pub metadata: HashMap<String, String>,
    pub compressed: bool,
    pub encrypted: bool,
    pub accessed_at: DateTime<Utc>,
    pub access_count: u64,
}

impl CacheRecord {
    pub fn new(
        key: impl Into<String>,
        payload: Vec<u8>,
        created_at: DateTime<Utc>,
        ttl: Duration,
        policy: EvictionPolicy,
    ) -> Self {
        let size_bytes = payload.len() as u64;
        Self {
            key: key.into(),
            payload,
            created_at,
            expires_at: created_at + ttl.max(Duration::zero()),
            size_bytes,
            policy,
            metadata: HashMap::new(),
            compressed: false,
            encrypted: false,
            accessed_at: created_at,
            access_count: 0,
        }
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Original TTL window, used to re-anchor records on warm-up.
    pub fn ttl_window(&self) -> Duration {
        self.expires_at - self.created_at
    }

    /// Mark a successful read.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.accessed_at = now;
        self.access_count = self.access_count.saturating_add(1);
    }
}
