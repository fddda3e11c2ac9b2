use async_trait::async_trait;

use super::TierStore;
use crate::errors::CacheError;
use crate::record::{CacheRecord, Tier};
use crate::store::PersistentStore;

/// Durable tier over a [`PersistentStore`].
///
/// The store itself is synchronous; this wrapper is the async seam the
/// engine suspends at.
pub struct DiskStore<P: PersistentStore> {
    store: P,
}

impl<P: PersistentStore> DiskStore<P> {
    pub fn new(store: P) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<P: PersistentStore> TierStore for DiskStore<P> {
    fn tier(&self) -> Tier {
        Tier::Disk
    }

    async fn get(&self, key: &str) -> Result<Option<CacheRecord>, CacheError> {
        self.store.get(key)
    }

    async fn put(&self, record: CacheRecord) -> Result<(), CacheError> {
        self.store.put(&record)
    }

    async fn remove(&self, key: &str) -> Result<bool, CacheError> {
        self.store.delete(key)
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.store.clear()
    }

    async fn records(&self) -> Result<Vec<CacheRecord>, CacheError> {
        let mut out = Vec::new();
        for key in self.store.keys()? {
            if let Some(rec) = self.store.get(&key)? {
                out.push(rec);
            }
        }
        Ok(out)
    }

    async fn len(&self) -> Result<u64, CacheError> {
        self.store.count()
    }
}
