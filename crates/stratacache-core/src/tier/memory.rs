use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::TierStore;
use crate::errors::CacheError;
use crate::record::{CacheRecord, Tier};

/// In-process map tier. Operations never block on I/O.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, CacheRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TierStore for MemoryStore {
    fn tier(&self) -> Tier {
        Tier::Memory
    }

    async fn get(&self, key: &str) -> Result<Option<CacheRecord>, CacheError> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn put(&self, record: CacheRecord) -> Result<(), CacheError> {
        self.records.write().await.insert(record.key.clone(), record);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.records.write().await.remove(key).is_some())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.records.write().await.clear();
        Ok(())
    }

    async fn records(&self) -> Result<Vec<CacheRecord>, CacheError> {
        Ok(self.records.read().await.values().cloned().collect())
    }

    async fn len(&self) -> Result<u64, CacheError> {
        Ok(self.records.read().await.len() as u64)
    }
}
