use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::TierStore;
use crate::errors::CacheError;
use crate::record::{CacheRecord, Tier};

/// Opaque remote cache honoring the record contract. The wire protocol is
/// the adapter's business.
#[async_trait]
pub trait RemoteCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<CacheRecord>, CacheError>;
    async fn put(&self, record: CacheRecord) -> Result<(), CacheError>;
    async fn remove(&self, key: &str) -> Result<bool, CacheError>;
    async fn clear(&self) -> Result<(), CacheError>;
    async fn records(&self) -> Result<Vec<CacheRecord>, CacheError>;
    async fn len(&self) -> Result<u64, CacheError>;
}

/// In-process stand-in for a remote cache. Keeps the connectivity
/// scenarios hermetically testable.
#[derive(Default)]
pub struct InProcessRemote {
    records: RwLock<HashMap<String, CacheRecord>>,
}

impl InProcessRemote {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RemoteCache for InProcessRemote {
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

/// Remote tier gated by connectivity. While disabled, reads see nothing
/// and writes are dropped; the connectivity controller flips the gate.
pub struct NetworkStore {
    remote: Arc<dyn RemoteCache>,
    enabled: AtomicBool,
}

impl NetworkStore {
    pub fn new(remote: Arc<dyn RemoteCache>, enabled: bool) -> Self {
        Self {
            remote,
            enabled: AtomicBool::new(enabled),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }
}

#[async_trait]
impl TierStore for NetworkStore {
    fn tier(&self) -> Tier {
        Tier::Network
    }

    async fn get(&self, key: &str) -> Result<Option<CacheRecord>, CacheError> {
        if !self.is_enabled() {
            return Ok(None);
        }
        self.remote.get(key).await
    }

    async fn put(&self, record: CacheRecord) -> Result<(), CacheError> {
        if !self.is_enabled() {
            return Ok(());
        }
        self.remote.put(record).await
    }

    async fn remove(&self, key: &str) -> Result<bool, CacheError> {
        if !self.is_enabled() {
            return Ok(false);
        }
        self.remote.remove(key).await
    }

    async fn clear(&self) -> Result<(), CacheError> {
        // Clearing is allowed while disabled: the offline transition flushes
        // the in-memory representation through this path.
        self.remote.clear().await
    }

    async fn records(&self) -> Result<Vec<CacheRecord>, CacheError> {
        if !self.is_enabled() {
            return Ok(Vec::new());
        }
        self.remote.records().await
    }

    async fn len(&self) -> Result<u64, CacheError> {
        if !self.is_enabled() {
            return Ok(0);
        }
        self.remote.len().await
    }
}
