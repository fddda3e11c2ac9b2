//! Tiered cache engine.
//!
//! Keyed values live across three tiers: a fast in-process memory tier, a
//! SQLite-backed disk tier, and an optional remote network tier gated by a
//! connectivity signal. Lookups fall back Memory → Disk → Network and
//! promote slower-tier hits back into memory; writes are capacity-checked
//! with policy-driven eviction; a periodic sweeper removes expired records
//! eagerly and lookups drop them lazily.
//!
//! ```no_run
//! use stratacache_core::{CacheConfig, TieredCache};
//!
//! # async fn demo() {
//! let cache = TieredCache::new();
//! assert!(cache.initialize(CacheConfig::default()).await);
//!
//! cache.put("greeting", &"hello").await;
//! let value: Option<String> = cache.get("greeting").await;
//! assert_eq!(value.as_deref(), Some("hello"));
//! # }
//! ```

pub mod clock;
pub mod codec;
pub mod config;
pub mod connectivity;
pub mod engine;
pub mod errors;
pub mod events;
pub mod eviction;
pub mod record;
pub mod stats;
pub mod store;
pub mod tier;

mod sweeper;

pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{Transform, TransformPipeline};
pub use config::CacheConfig;
pub use connectivity::{ConnectivityHandle, ConnectivitySignal};
pub use engine::{PutOptions, TieredCache, TieredCacheBuilder};
pub use errors::CacheError;
pub use events::{CacheEvent, CacheEventKind, EVENT_LOG_CAP};
pub use record::{CacheRecord, EvictionPolicy, Tier};
pub use stats::{CacheStatistics, TierStatsSnapshot};
pub use store::{PersistentStore, SqliteStore};
pub use tier::{InProcessRemote, RemoteCache, TierStore};
