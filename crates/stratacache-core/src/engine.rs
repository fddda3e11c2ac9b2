//! Tier manager: the engine's public surface.
//!
//! Owns the three tier stores, runs capacity checks and eviction on write,
//! fallback search and promotion on read, and feeds the statistics and
//! event log. One engine value per composition root; nothing global.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex, OnceLock};

use chrono::Duration;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::codec::{decode_value, encode_value, TransformPipeline};
use crate::config::CacheConfig;
use crate::connectivity::{run_controller, ConnectivitySignal};
use crate::errors::CacheError;
use crate::events::{event_data, CacheEvent, CacheEventKind, EventLog};
use crate::eviction::evict_to_fit;
use crate::record::{CacheRecord, EvictionPolicy, Tier};
use crate::stats::{CacheStatistics, TierStats};
use crate::store::SqliteStore;
use crate::sweeper::run_sweeper;
use crate::tier::{DiskStore, InProcessRemote, MemoryStore, NetworkStore, RemoteCache, TierStore};

/// Per-call knobs for [`TieredCache::put_with`].
#[derive(Clone, Default)]
pub struct PutOptions {
    /// Overrides the configured default TTL.
    pub ttl: Option<Duration>,
    /// Defaults to memory when `None`.
    pub tier: Option<Tier>,
    /// Audit tag stored on the record; eviction uses the engine default.
    pub policy: Option<EvictionPolicy>,
    pub metadata: HashMap<String, String>,
}

struct TierSlot {
    store: Arc<dyn TierStore>,
    stats: TierStats,
    /// Serializes compound mutations (capacity check + eviction + write,
    /// lookup write-back, sweep pass) on this tier. Never held across
    /// another tier's gate.
    gate: Mutex<()>,
}

impl TierSlot {
    fn new(store: Arc<dyn TierStore>) -> Self {
        Self {
            store,
            stats: TierStats::default(),
            gate: Mutex::new(()),
        }
    }
}

pub(crate) struct EngineCore {
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    events: Arc<EventLog>,
    memory: TierSlot,
    disk: TierSlot,
    network: TierSlot,
    network_store: Arc<NetworkStore>,
    /// A sweep in progress suppresses a newly due one.
    sweep_gate: Mutex<()>,
}

impl EngineCore {
    fn slot(&self, tier: Tier) -> &TierSlot {
        match tier {
            Tier::Memory => &self.memory,
            Tier::Disk => &self.disk,
            Tier::Network => &self.network,
        }
    }

    pub(crate) fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub(crate) fn events(&self) -> &EventLog {
        &self.events
    }

    pub(crate) fn network_store(&self) -> &NetworkStore {
        &self.network_store
    }

    fn tier_enabled(&self, tier: Tier) -> bool {
        match tier {
            Tier::Memory | Tier::Disk => true,
            Tier::Network => self.config.enable_network_tier && self.network_store.is_enabled(),
        }
    }

    /// Capacity-checked insert. Runs an eviction pass first when either the
    /// item-count or byte-size limit would be exceeded; one pass satisfies
    /// both constraints.
    async fn store_record(&self, tier: Tier, record: CacheRecord) -> Result<(), CacheError> {
        if !self.tier_enabled(tier) {
            return Err(CacheError::Storage {
                tier,
                detail: "tier is disabled".to_string(),
            });
        }
        let slot = self.slot(tier);
        let _gate = slot.gate.lock().await;

        // A record no amount of eviction can make room for is rejected
        // before anything is touched.
        let max_items = self.config.max_items(tier);
        let max_bytes = self.config.max_size_bytes(tier);
        if let Some(mb) = max_bytes {
            if record.size_bytes > mb {
                return Err(CacheError::Capacity {
                    tier,
                    size_bytes: record.size_bytes,
                    limit_bytes: mb,
                });
            }
        }
        if max_items == Some(0) {
            return Err(CacheError::Capacity {
                tier,
                size_bytes: record.size_bytes,
                limit_bytes: max_bytes.unwrap_or(0),
            });
        }

        // Replacement frees the old record's accounting first.
        if let Some(old) = slot.store.get(&record.key).await? {
            slot.store.remove(&record.key).await?;
            slot.stats.record_removal(old.size_bytes);
        }

        let over_items = max_items.is_some_and(|mi| slot.stats.item_count() + 1 > mi as u64);
        let over_bytes =
            max_bytes.is_some_and(|mb| slot.stats.total_size_bytes() + record.size_bytes > mb);
        if over_items || over_bytes {
            let current = slot.store.records().await?;
            let target_items = max_items.map_or(usize::MAX, |mi| mi - 1);
            let target_bytes = max_bytes.map_or(u64::MAX, |mb| mb - record.size_bytes);
            let evicted = evict_to_fit(
                &current,
                self.config.default_policy,
                target_items,
                target_bytes,
            );
            for key in &evicted {
                if let Some(victim) = current.iter().find(|r| &r.key == key) {
                    slot.store.remove(key).await?;
                    slot.stats.record_eviction(victim.size_bytes);
                }
            }
            debug!(tier = %tier, evicted = evicted.len(), "eviction pass before write");
        }

        let size_bytes = record.size_bytes;
        slot.store.put(record).await?;
        slot.stats.record_insert(size_bytes);
        Ok(())
    }

    /// Lookup with lazy expiry and access tracking. A hit is written back
    /// with refreshed `accessed_at`/`access_count` and counted on the tier.
    async fn lookup(&self, tier: Tier, key: &str) -> Result<Option<CacheRecord>, CacheError> {
        let slot = self.slot(tier);
        let _gate = slot.gate.lock().await;
        let Some(mut record) = slot.store.get(key).await? else {
            return Ok(None);
        };
        let now = self.clock.now();
        if record.is_expired(now) {
            slot.store.remove(key).await?;
            slot.stats.record_removal(record.size_bytes);
            debug!(key, tier = %tier, "expired record dropped on read");
            return Ok(None);
        }
        record.touch(now);
        slot.store.put(record.clone()).await?;
        slot.stats.record_hit();
        Ok(Some(record))
    }

    /// Non-mutating liveness probe.
    async fn peek(&self, tier: Tier, key: &str) -> Result<bool, CacheError> {
        match self.slot(tier).store.get(key).await? {
            Some(record) => Ok(!record.is_expired(self.clock.now())),
            None => Ok(false),
        }
    }

    async fn remove_key(&self, tier: Tier, key: &str) -> Result<bool, CacheError> {
        let slot = self.slot(tier);
        let _gate = slot.gate.lock().await;
        let Some(old) = slot.store.get(key).await? else {
            return Ok(false);
        };
        slot.store.remove(key).await?;
        slot.stats.record_removal(old.size_bytes);
        Ok(true)
    }

    async fn clear_tier(&self, tier: Tier) -> Result<(), CacheError> {
        let slot = self.slot(tier);
        let _gate = slot.gate.lock().await;
        slot.store.clear().await?;
        slot.stats.reset_contents();
        Ok(())
    }

    /// Eager expiry pass across enabled tiers. Returns total removed.
    /// A pass already in progress swallows this invocation.
    pub(crate) async fn sweep_expired(&self) -> u64 {
        let Ok(_sweeping) = self.sweep_gate.try_lock() else {
            debug!("sweep already in progress, tick skipped");
            return 0;
        };
        let mut per_tier: HashMap<String, String> = HashMap::new();
        let mut total = 0u64;
        for tier in Tier::FALLBACK_ORDER {
            if !self.tier_enabled(tier) {
                continue;
            }
            let removed = match self.sweep_tier(tier).await {
                Ok(n) => n,
                Err(e) => {
                    self.report_error(&e, None, Some(tier));
                    continue;
                }
            };
            per_tier.insert(tier.as_str().to_string(), removed.to_string());
            total += removed;
        }
        per_tier.insert("total".to_string(), total.to_string());
        self.events
            .record(self.clock.as_ref(), CacheEventKind::ExpiredCleanup, per_tier);
        total
    }

    async fn sweep_tier(&self, tier: Tier) -> Result<u64, CacheError> {
        let slot = self.slot(tier);
        let _gate = slot.gate.lock().await;
        let now = self.clock.now();
        let mut removed = 0u64;
        for record in slot.store.records().await? {
            if record.is_expired(now) {
                slot.store.remove(&record.key).await?;
                slot.stats.record_removal(record.size_bytes);
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Offline transition: drop the network tier's in-memory representation.
    pub(crate) async fn flush_network_tier(&self) {
        let slot = &self.network;
        let _gate = slot.gate.lock().await;
        if let Err(e) = slot.store.clear().await {
            self.report_error(&e, None, Some(Tier::Network));
            return;
        }
        slot.stats.reset_contents();
        debug!("network tier flushed on disconnect");
    }

    pub(crate) fn report_error(&self, err: &CacheError, key: Option<&str>, tier: Option<Tier>) {
        warn!(error = %err, "cache operation failed");
        let mut data = event_data([
            ("kind", err.kind().to_string()),
            ("message", err.to_string()),
        ]);
        if let Some(key) = key {
            data.insert("key".to_string(), key.to_string());
        }
        if let Some(tier) = tier {
            data.insert("tier".to_string(), tier.as_str().to_string());
        }
        self.events
            .record(self.clock.as_ref(), CacheEventKind::Error, data);
    }
}

/// Builder for [`TieredCache`]. Collaborators injected here; capacity and
/// policy arrive later through [`TieredCache::initialize`].
pub struct TieredCacheBuilder {
    clock: Arc<dyn Clock>,
    transforms: TransformPipeline,
    remote: Arc<dyn RemoteCache>,
    disk_path: Option<PathBuf>,
    connectivity: Option<ConnectivitySignal>,
}

impl Default for TieredCacheBuilder {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            transforms: TransformPipeline::default(),
            remote: Arc::new(InProcessRemote::new()),
            disk_path: None,
            connectivity: None,
        }
    }
}

impl TieredCacheBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn transforms(mut self, transforms: TransformPipeline) -> Self {
        self.transforms = transforms;
        self
    }

    pub fn remote(mut self, remote: Arc<dyn RemoteCache>) -> Self {
        self.remote = remote;
        self
    }

    /// File path for the disk tier's database. Without one the disk tier
    /// runs in memory even when persistence is enabled.
    pub fn disk_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.disk_path = Some(path.into());
        self
    }

    pub fn connectivity(mut self, signal: ConnectivitySignal) -> Self {
        self.connectivity = Some(signal);
        self
    }

    pub fn build(self) -> TieredCache {
        TieredCache {
            clock: self.clock,
            transforms: self.transforms,
            remote: self.remote,
            disk_path: self.disk_path,
            connectivity: self.connectivity,
            events: Arc::new(EventLog::new()),
            core: OnceLock::new(),
            tasks: StdMutex::new(Vec::new()),
        }
    }
}

/// The tiered cache engine.
///
/// Every operation other than [`initialize`](Self::initialize) fails
/// without side effects until initialization succeeds. Failures inside
/// operations are recovered locally: the result says it failed and the
/// event log carries the detail.
pub struct TieredCache {
    clock: Arc<dyn Clock>,
    transforms: TransformPipeline,
    remote: Arc<dyn RemoteCache>,
    disk_path: Option<PathBuf>,
    connectivity: Option<ConnectivitySignal>,
    events: Arc<EventLog>,
    core: OnceLock<Arc<EngineCore>>,
    tasks: StdMutex<Vec<JoinHandle<()>>>,
}

impl TieredCache {
    pub fn builder() -> TieredCacheBuilder {
        TieredCacheBuilder::default()
    }

    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Bring the engine up. Idempotent: a second call while initialized is
    /// a no-op returning `true`. On failure the engine stays uninitialized
    /// and the call is safe to retry.
    pub async fn initialize(&self, config: CacheConfig) -> bool {
        if self.core.get().is_some() {
            return true;
        }
        let core = match self.build_core(&config).await {
            Ok(core) => Arc::new(core),
            Err(e) => {
                warn!(error = %e, "initialization failed");
                self.events.record(
                    self.clock.as_ref(),
                    CacheEventKind::Error,
                    event_data([
                        ("kind", e.kind().to_string()),
                        ("message", e.to_string()),
                    ]),
                );
                return false;
            }
        };
        if self.core.set(core.clone()).is_err() {
            // Lost an initialization race; the winner's core stands.
            return true;
        }

        let period = config
            .cleanup_interval
            .to_std()
            .unwrap_or(std::time::Duration::from_secs(300));
        let mut tasks = self.tasks.lock().unwrap();
        tasks.push(tokio::spawn(run_sweeper(core.clone(), period)));
        if let Some(signal) = self.connectivity.clone() {
            tasks.push(tokio::spawn(run_controller(core.clone(), signal)));
        }

        info!(
            memory_items = config.max_memory_items,
            disk_items = config.max_disk_items,
            network = config.enable_network_tier,
            "cache engine initialized"
        );
        self.events.record(
            self.clock.as_ref(),
            CacheEventKind::Initialized,
            event_data([(
                "policy",
                config.default_policy.as_str().to_string(),
            )]),
        );
        true
    }

    async fn build_core(&self, config: &CacheConfig) -> Result<EngineCore, CacheError> {
        let sqlite = match (&self.disk_path, config.enable_persistence) {
            (Some(path), true) => SqliteStore::open(path)?,
            _ => SqliteStore::memory()?,
        };
        let disk = TierSlot::new(Arc::new(DiskStore::new(sqlite)));
        // Seed accounting from whatever survived a previous run.
        for record in disk.store.records().await? {
            disk.stats.record_insert(record.size_bytes);
        }

        let initially_online = self
            .connectivity
            .as_ref()
            .map_or(true, |signal| *signal.borrow());
        let network_store = Arc::new(NetworkStore::new(
            self.remote.clone(),
            config.enable_network_tier && initially_online,
        ));

        Ok(EngineCore {
            config: config.clone(),
            clock: self.clock.clone(),
            events: self.events.clone(),
            memory: TierSlot::new(Arc::new(MemoryStore::new())),
            disk,
            network: TierSlot::new(network_store.clone()),
            network_store,
            sweep_gate: Mutex::new(()),
        })
    }

    fn core(&self) -> Option<&Arc<EngineCore>> {
        let core = self.core.get();
        if core.is_none() {
            warn!("cache operation before initialization");
        }
        core
    }

    /// Store a value in the memory tier with the configured defaults.
    pub async fn put<T: Serialize>(&self, key: &str, value: &T) -> bool {
        self.put_with(key, value, PutOptions::default()).await
    }

    pub async fn put_with<T: Serialize>(&self, key: &str, value: &T, opts: PutOptions) -> bool {
        let Some(core) = self.core() else {
            return false;
        };
        let tier = opts.tier.unwrap_or(Tier::Memory);
        let payload = match encode_value(
            key,
            value,
            &self.transforms,
            core.config.enable_compression,
            core.config.enable_encryption,
        ) {
            Ok(payload) => payload,
            Err(e) => {
                core.report_error(&e, Some(key), Some(tier));
                return false;
            }
        };
        let mut record = CacheRecord::new(
            key,
            payload,
            self.clock.now(),
            opts.ttl.unwrap_or(core.config.default_ttl),
            opts.policy.unwrap_or(core.config.default_policy),
        )
        .with_metadata(opts.metadata);
        record.compressed = core.config.enable_compression;
        record.encrypted = core.config.enable_encryption;
        let size_bytes = record.size_bytes;

        match core.store_record(tier, record).await {
            Ok(()) => {
                debug!(key, tier = %tier, size_bytes, "stored");
                self.events.record(
                    self.clock.as_ref(),
                    CacheEventKind::Stored,
                    event_data([
                        ("key", key.to_string()),
                        ("tier", tier.as_str().to_string()),
                        ("size_bytes", size_bytes.to_string()),
                    ]),
                );
                true
            }
            Err(e) => {
                core.report_error(&e, Some(key), Some(tier));
                false
            }
        }
    }

    /// Lookup with full fallback from the memory tier.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_with(key, None, true).await
    }

    /// Lookup with an explicit preferred tier and fallback control.
    pub async fn get_with<T: DeserializeOwned>(
        &self,
        key: &str,
        preferred: Option<Tier>,
        fallback: bool,
    ) -> Option<T> {
        let record = self.get_record(key, preferred, fallback).await?;
        let core = self.core.get()?;
        match decode_value(
            key,
            record.payload,
            &self.transforms,
            record.compressed,
            record.encrypted,
        ) {
            Ok(value) => Some(value),
            Err(e) => {
                core.report_error(&e, Some(key), None);
                None
            }
        }
    }

    async fn get_record(
        &self,
        key: &str,
        preferred: Option<Tier>,
        fallback: bool,
    ) -> Option<CacheRecord> {
        let core = self.core()?;

        let mut order: Vec<Tier> = Vec::with_capacity(3);
        if let Some(tier) = preferred {
            order.push(tier);
        }
        if fallback {
            for tier in Tier::FALLBACK_ORDER {
                if !order.contains(&tier) {
                    order.push(tier);
                }
            }
        }

        for tier in order {
            if !core.tier_enabled(tier) {
                continue;
            }
            match core.lookup(tier, key).await {
                Ok(Some(record)) => {
                    debug!(key, tier = %tier, "hit");
                    if tier != Tier::Memory {
                        self.promote(core, &record).await;
                    }
                    self.events.record(
                        self.clock.as_ref(),
                        CacheEventKind::Retrieved,
                        event_data([
                            ("key", key.to_string()),
                            ("tier", tier.as_str().to_string()),
                        ]),
                    );
                    return Some(record);
                }
                Ok(None) => {}
                Err(e) => {
                    core.report_error(&e, Some(key), Some(tier));
                }
            }
        }

        // Misses are charged to the canonical default tier.
        core.slot(Tier::Memory).stats.record_miss();
        debug!(key, "miss");
        self.events.record(
            self.clock.as_ref(),
            CacheEventKind::Missed,
            event_data([("key", key.to_string())]),
        );
        None
    }

    /// Best-effort copy of a slower-tier hit into memory. A record that
    /// cannot fit even after eviction is skipped silently; the caller
    /// still gets the value from the tier it was found in.
    async fn promote(&self, core: &EngineCore, record: &CacheRecord) {
        if record.size_bytes > core.config.max_memory_size_bytes {
            debug!(key = %record.key, "promotion skipped, record exceeds memory capacity");
            return;
        }
        if let Err(e) = core.store_record(Tier::Memory, record.clone()).await {
            debug!(key = %record.key, error = %e, "promotion skipped");
        }
    }

    /// Remove from one tier, or from all tiers when `tier` is `None`.
    /// True if the key was removed from at least one tier.
    pub async fn remove(&self, key: &str, tier: Option<Tier>) -> bool {
        let Some(core) = self.core() else {
            return false;
        };
        let tiers: Vec<Tier> = match tier {
            Some(t) => vec![t],
            None => Tier::FALLBACK_ORDER.to_vec(),
        };
        let mut removed = false;
        for tier in tiers {
            match core.remove_key(tier, key).await {
                Ok(true) => removed = true,
                Ok(false) => {}
                Err(e) => core.report_error(&e, Some(key), Some(tier)),
            }
        }
        if removed {
            self.events.record(
                self.clock.as_ref(),
                CacheEventKind::Removed,
                event_data([("key", key.to_string())]),
            );
        }
        removed
    }

    /// Clear one tier or all tiers. Idempotent.
    pub async fn clear(&self, tier: Option<Tier>) -> bool {
        let Some(core) = self.core() else {
            return false;
        };
        let tiers: Vec<Tier> = match tier {
            Some(t) => vec![t],
            None => Tier::FALLBACK_ORDER.to_vec(),
        };
        let mut ok = true;
        for tier in &tiers {
            if let Err(e) = core.clear_tier(*tier).await {
                core.report_error(&e, None, Some(*tier));
                ok = false;
            }
        }
        if ok {
            self.events.record(
                self.clock.as_ref(),
                CacheEventKind::Cleared,
                event_data([(
                    "tier",
                    tier.map_or("all".to_string(), |t| t.as_str().to_string()),
                )]),
            );
        }
        ok
    }

    /// Bulk load into the memory tier. Each record keeps its original TTL
    /// window, re-anchored at the current time. Returns how many landed.
    pub async fn warm_cache(&self, records: Vec<CacheRecord>) -> usize {
        let Some(core) = self.core() else {
            return 0;
        };
        let now = self.clock.now();
        let mut warmed = 0usize;
        for mut record in records {
            let window = record.ttl_window();
            record.created_at = now;
            record.expires_at = now + window.max(Duration::zero());
            record.accessed_at = now;
            match core.store_record(Tier::Memory, record).await {
                Ok(()) => warmed += 1,
                Err(e) => core.report_error(&e, None, Some(Tier::Memory)),
            }
        }
        self.events.record(
            self.clock.as_ref(),
            CacheEventKind::Warmed,
            event_data([("count", warmed.to_string())]),
        );
        warmed
    }

    /// Liveness probe that leaves access tracking untouched.
    pub async fn contains(&self, key: &str) -> bool {
        let Some(core) = self.core() else {
            return false;
        };
        for tier in Tier::FALLBACK_ORDER {
            if !core.tier_enabled(tier) {
                continue;
            }
            if matches!(core.peek(tier, key).await, Ok(true)) {
                return true;
            }
        }
        false
    }

    /// Observability snapshot: per-tier counters, network gate, config.
    pub async fn statistics(&self) -> Option<CacheStatistics> {
        let core = self.core()?;
        let mut tiers = HashMap::new();
        for tier in Tier::FALLBACK_ORDER {
            tiers.insert(tier, core.slot(tier).stats.snapshot());
        }
        Some(CacheStatistics {
            tiers,
            network_tier_enabled: core.tier_enabled(Tier::Network),
            config: core.config.clone(),
        })
    }

    /// Run one expiry sweep now. The periodic sweeper uses the same path;
    /// overlapping invocations are suppressed.
    pub async fn sweep_now(&self) -> u64 {
        match self.core() {
            Some(core) => core.sweep_expired().await,
            None => 0,
        }
    }

    /// Retained event history, oldest first.
    pub fn events(&self) -> Vec<CacheEvent> {
        self.events.recent()
    }

    /// Live event subscription.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    /// Stop the sweeper and connectivity controller. The engine itself
    /// remains usable for direct calls.
    pub fn shutdown(&self) {
        let mut tasks = self.tasks.lock().unwrap();
        for task in tasks.drain(..) {
            task.abort();
        }
    }
}

impl Default for TieredCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TieredCache {
    fn drop(&mut self) {
        self.shutdown();
    }
}
