use thiserror::Error;

use crate::record::Tier;

/// Engine-internal error taxonomy.
///
/// Public operations recover from these locally (bool/Option results); each
/// failure is also recorded on the event log for observability.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("initialization failed: {0}")]
    Initialization(String),

    #[error("serialization failed for key '{key}': {detail}")]
    Serialization { key: String, detail: String },

    #[error("storage failure on {tier} tier: {detail}")]
    Storage { tier: Tier, detail: String },

    #[error("capacity exhausted on {tier} tier: record of {size_bytes} bytes exceeds limit {limit_bytes}")]
    Capacity {
        tier: Tier,
        size_bytes: u64,
        limit_bytes: u64,
    },

    #[error("engine is not initialized")]
    NotInitialized,
}

impl CacheError {
    /// Stable kind label carried on `Error` events.
    pub fn kind(&self) -> &'static str {
        match self {
            CacheError::Initialization(_) => "initialization",
            CacheError::Serialization { .. } => "serialization",
            CacheError::Storage { .. } => "storage",
            CacheError::Capacity { .. } => "capacity",
            CacheError::NotInitialized => "not_initialized",
        }
    }
}

impl From<rusqlite::Error> for CacheError {
    fn from(e: rusqlite::Error) -> Self {
        CacheError::Storage {
            tier: Tier::Disk,
            detail: e.to_string(),
        }
    }
}
