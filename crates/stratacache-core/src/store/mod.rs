//! Durable key→record storage behind the disk tier.

mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use crate::errors::CacheError;
use crate::record::CacheRecord;

/// Abstract durable store consumed by the disk tier.
///
/// Implementations are synchronous; the disk tier is the suspension
/// boundary and decides how calls are scheduled.
pub trait PersistentStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<CacheRecord>, CacheError>;
    fn put(&self, record: &CacheRecord) -> Result<(), CacheError>;
    fn delete(&self, key: &str) -> Result<bool, CacheError>;
    fn clear(&self) -> Result<(), CacheError>;
    fn keys(&self) -> Result<Vec<String>, CacheError>;
    fn count(&self) -> Result<u64, CacheError>;
}
