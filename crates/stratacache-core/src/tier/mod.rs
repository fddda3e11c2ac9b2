//! Uniform async access to one storage medium.
//!
//! All tiers share one trait so the engine's fallback and promotion logic
//! is tier-agnostic. The memory tier resolves immediately; disk and network
//! are the suspension points.

mod disk;
mod memory;
mod network;

pub use disk::DiskStore;
pub use memory::MemoryStore;
pub use network::{InProcessRemote, NetworkStore, RemoteCache};

use async_trait::async_trait;

use crate::errors::CacheError;
use crate::record::{CacheRecord, Tier};

#[async_trait]
pub trait TierStore: Send + Sync {
    fn tier(&self) -> Tier;

    async fn get(&self, key: &str) -> Result<Option<CacheRecord>, CacheError>;

    /// Insert or replace. The engine does capacity checks before calling.
    async fn put(&self, record: CacheRecord) -> Result<(), CacheError>;

    async fn remove(&self, key: &str) -> Result<bool, CacheError>;

    async fn clear(&self) -> Result<(), CacheError>;

    /// Full record set, used by eviction selection and the sweeper.
    async fn records(&self) -> Result<Vec<CacheRecord>, CacheError>;

    async fn len(&self) -> Result<u64, CacheError>;
}
