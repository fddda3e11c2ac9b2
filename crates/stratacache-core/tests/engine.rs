//! End-to-end engine behavior: fallback, promotion, capacity, expiry,
//! connectivity. Time is driven by a manual clock so nothing here sleeps
//! to wait for a TTL.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, TimeZone, Utc};
use stratacache_core::{
    CacheConfig, CacheEventKind, CacheRecord, Clock, ConnectivityHandle, EvictionPolicy,
    ManualClock, PutOptions, Tier, TieredCache,
};

fn test_clock() -> ManualClock {
    ManualClock::new(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn small_config() -> CacheConfig {
    CacheConfig {
        max_memory_items: 16,
        max_disk_items: 16,
        max_memory_size_bytes: 4096,
        max_disk_size_bytes: 4096,
        default_ttl: Duration::minutes(10),
        enable_network_tier: true,
        enable_persistence: false,
        ..CacheConfig::default()
    }
}

async fn engine_with(config: CacheConfig, clock: ManualClock) -> TieredCache {
    init_tracing();
    let cache = TieredCache::builder().clock(Arc::new(clock)).build();
    assert!(cache.initialize(config).await);
    cache
}

fn to_tier(tier: Tier) -> PutOptions {
    PutOptions {
        tier: Some(tier),
        ..PutOptions::default()
    }
}

#[tokio::test]
async fn round_trip_within_ttl() {
    let clock = test_clock();
    let cache = engine_with(small_config(), clock.clone()).await;

    assert!(cache.put("answer", &42u32).await);
    clock.advance(Duration::minutes(9));
    assert_eq!(cache.get::<u32>("answer").await, Some(42));
}

#[tokio::test]
async fn operations_before_initialize_fail_without_side_effects() {
    let cache = TieredCache::new();
    assert!(!cache.put("k", &1u8).await);
    assert_eq!(cache.get::<u8>("k").await, None);
    assert!(!cache.remove("k", None).await);
    assert!(!cache.clear(None).await);
    assert!(cache.statistics().await.is_none());
    assert!(cache.events().is_empty());
}

#[tokio::test]
async fn initialize_is_idempotent() {
    let clock = test_clock();
    let cache = engine_with(small_config(), clock).await;
    assert!(cache.initialize(small_config()).await);
    let initialized = cache
        .events()
        .iter()
        .filter(|e| e.kind == CacheEventKind::Initialized)
        .count();
    assert_eq!(initialized, 1);
}

#[tokio::test]
async fn failed_initialize_is_retryable() {
    let dir = tempfile::tempdir().unwrap();
    let bad_path = dir.path().join("missing").join("cache.db");
    let cache = TieredCache::builder().disk_path(bad_path).build();

    let mut persistent = small_config();
    persistent.enable_persistence = true;
    assert!(!cache.initialize(persistent).await);
    assert!(cache
        .events()
        .iter()
        .any(|e| e.kind == CacheEventKind::Error));
    assert!(!cache.put("k", &1u8).await);

    // Retry with the disk tier in memory succeeds.
    assert!(cache.initialize(small_config()).await);
    assert!(cache.put("k", &1u8).await);
}

#[tokio::test]
async fn expired_record_is_absent_lazily() {
    let clock = test_clock();
    let cache = engine_with(small_config(), clock.clone()).await;

    let opts = PutOptions {
        ttl: Some(Duration::zero()),
        ..PutOptions::default()
    };
    assert!(cache.put_with("ephemeral", &"x", opts).await);
    assert_eq!(cache.get::<String>("ephemeral").await, None);
    assert!(!cache.contains("ephemeral").await);
}

#[tokio::test]
async fn sweep_removes_expired_records_eagerly() {
    let clock = test_clock();
    let cache = engine_with(small_config(), clock.clone()).await;

    cache.put("stays", &1u8).await;
    let short = PutOptions {
        ttl: Some(Duration::seconds(30)),
        ..PutOptions::default()
    };
    cache.put_with("goes", &2u8, short.clone()).await;
    cache
        .put_with(
            "goes_disk",
            &3u8,
            PutOptions {
                tier: Some(Tier::Disk),
                ..short
            },
        )
        .await;

    clock.advance(Duration::seconds(31));
    assert_eq!(cache.sweep_now().await, 2);

    let stats = cache.statistics().await.unwrap();
    assert_eq!(stats.tiers[&Tier::Memory].item_count, 1);
    assert_eq!(stats.tiers[&Tier::Disk].item_count, 0);
    assert!(cache
        .events()
        .iter()
        .any(|e| e.kind == CacheEventKind::ExpiredCleanup));
}

#[tokio::test]
async fn eviction_keeps_item_count_within_bounds() {
    let clock = test_clock();
    let mut config = small_config();
    config.max_memory_items = 2;
    let cache = engine_with(config, clock.clone()).await;

    cache.put("a", &1u8).await;
    clock.advance(Duration::seconds(1));
    cache.put("b", &2u8).await;
    clock.advance(Duration::seconds(1));
    cache.put("c", &3u8).await;

    let stats = cache.statistics().await.unwrap();
    assert_eq!(stats.tiers[&Tier::Memory].item_count, 2);
    assert!(stats.tiers[&Tier::Memory].eviction_count >= 1);

    let mut present = 0;
    for key in ["a", "b", "c"] {
        if cache.contains(key).await {
            present += 1;
        }
    }
    assert_eq!(present, 2);
}

#[tokio::test]
async fn lru_evicts_least_recently_accessed() {
    let clock = test_clock();
    let mut config = small_config();
    config.max_memory_items = 2;
    config.default_policy = EvictionPolicy::Lru;
    let cache = engine_with(config, clock.clone()).await;

    cache.put("a", &1u8).await;
    clock.advance(Duration::seconds(1));
    cache.put("b", &2u8).await;
    clock.advance(Duration::seconds(1));
    // Touch "a" so "b" is the LRU victim.
    assert_eq!(cache.get::<u8>("a").await, Some(1));
    clock.advance(Duration::seconds(1));
    cache.put("c", &3u8).await;

    assert!(cache.contains("a").await);
    assert!(!cache.contains("b").await);
    assert!(cache.contains("c").await);
}

#[tokio::test]
async fn eviction_keeps_total_size_within_bounds() {
    let clock = test_clock();
    let mut config = small_config();
    config.max_memory_size_bytes = 64;
    let cache = engine_with(config, clock.clone()).await;

    for i in 0..10 {
        assert!(cache.put(&format!("k{i}"), &"0123456789").await);
        clock.advance(Duration::seconds(1));
    }
    let stats = cache.statistics().await.unwrap();
    assert!(stats.tiers[&Tier::Memory].total_size_bytes <= 64);
}

#[tokio::test]
async fn oversized_record_is_rejected_with_capacity_error() {
    let clock = test_clock();
    let mut config = small_config();
    config.max_memory_size_bytes = 8;
    let cache = engine_with(config, clock).await;

    assert!(!cache.put("big", &"far-too-large-for-this-tier").await);
    let err = cache
        .events()
        .into_iter()
        .find(|e| e.kind == CacheEventKind::Error)
        .expect("capacity failure event");
    assert_eq!(err.data["kind"], "capacity");
}

#[tokio::test]
async fn disk_hit_promotes_into_memory() {
    let clock = test_clock();
    let cache = engine_with(small_config(), clock.clone()).await;

    assert!(
        cache
            .put_with("cold", &"from-disk", to_tier(Tier::Disk))
            .await
    );
    assert_eq!(
        cache.get::<String>("cold").await.as_deref(),
        Some("from-disk")
    );

    // Promotion landed: a memory-only probe now finds it.
    let memory_only: Option<String> = cache.get_with("cold", Some(Tier::Memory), false).await;
    assert_eq!(memory_only.as_deref(), Some("from-disk"));
}

#[tokio::test]
async fn fallback_prefers_memory_over_disk() {
    let clock = test_clock();
    let cache = engine_with(small_config(), clock).await;

    cache
        .put_with("shared", &"disk-value", to_tier(Tier::Disk))
        .await;
    cache.put("shared", &"memory-value").await;

    assert_eq!(
        cache.get::<String>("shared").await.as_deref(),
        Some("memory-value")
    );
}

#[tokio::test]
async fn preferred_tier_without_fallback_stays_put() {
    let clock = test_clock();
    let cache = engine_with(small_config(), clock).await;

    cache.put_with("only-disk", &7u8, to_tier(Tier::Disk)).await;
    let miss: Option<u8> = cache.get_with("only-disk", Some(Tier::Memory), false).await;
    assert_eq!(miss, None);

    let hit: Option<u8> = cache.get_with("only-disk", Some(Tier::Disk), false).await;
    assert_eq!(hit, Some(7));
}

#[tokio::test]
async fn remove_spans_all_tiers_when_unscoped() {
    let clock = test_clock();
    let cache = engine_with(small_config(), clock).await;

    cache.put("k", &1u8).await;
    cache.put_with("k", &2u8, to_tier(Tier::Disk)).await;

    assert!(cache.remove("k", None).await);
    assert!(!cache.remove("k", None).await);
    assert_eq!(cache.get::<u8>("k").await, None);
}

#[tokio::test]
async fn clear_is_idempotent() {
    let clock = test_clock();
    let cache = engine_with(small_config(), clock).await;

    cache.put("k", &1u8).await;
    assert!(cache.clear(None).await);
    assert!(cache.clear(None).await);
    let stats = cache.statistics().await.unwrap();
    assert_eq!(stats.tiers[&Tier::Memory].item_count, 0);
}

#[tokio::test]
async fn warm_cache_preserves_ttl_window() {
    let clock = test_clock();
    let cache = engine_with(small_config(), clock.clone()).await;

    // Built long before warming; only the 60s window should carry over.
    let old_created = clock.now() - Duration::hours(5);
    let record = CacheRecord::new(
        "warmed",
        serde_json::to_vec(&"toasty").unwrap(),
        old_created,
        Duration::seconds(60),
        EvictionPolicy::Lru,
    );
    assert_eq!(cache.warm_cache(vec![record]).await, 1);

    clock.advance(Duration::seconds(59));
    assert_eq!(cache.get::<String>("warmed").await.as_deref(), Some("toasty"));
    clock.advance(Duration::seconds(2));
    assert_eq!(cache.get::<String>("warmed").await, None);
}

#[tokio::test]
async fn statistics_track_hits_misses_and_rate() {
    let clock = test_clock();
    let cache = engine_with(small_config(), clock).await;

    cache.put("k", &1u8).await;
    assert_eq!(cache.get::<u8>("k").await, Some(1));
    assert_eq!(cache.get::<u8>("k").await, Some(1));
    assert_eq!(cache.get::<u8>("absent").await, None);

    let stats = cache.statistics().await.unwrap();
    let memory = &stats.tiers[&Tier::Memory];
    assert_eq!(memory.hit_count, 2);
    assert_eq!(memory.miss_count, 1);
    assert!((memory.hit_rate - 2.0 / 3.0).abs() < 1e-9);
}

#[tokio::test]
async fn disk_tier_survives_engine_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.db");
    let mut config = small_config();
    config.enable_persistence = true;

    {
        let cache = TieredCache::builder()
            .clock(Arc::new(test_clock()))
            .disk_path(&path)
            .build();
        assert!(cache.initialize(config.clone()).await);
        assert!(cache.put_with("durable", &99u32, to_tier(Tier::Disk)).await);
        cache.shutdown();
    }

    let cache = TieredCache::builder()
        .clock(Arc::new(test_clock()))
        .disk_path(&path)
        .build();
    assert!(cache.initialize(config).await);
    let stats = cache.statistics().await.unwrap();
    assert_eq!(stats.tiers[&Tier::Disk].item_count, 1);
    assert_eq!(cache.get::<u32>("durable").await, Some(99));
}

#[tokio::test]
async fn offline_clears_network_tier_and_online_does_not_resurrect() {
    let clock = test_clock();
    let (handle, signal) = ConnectivityHandle::new(true);
    let cache = TieredCache::builder()
        .clock(Arc::new(clock))
        .connectivity(signal)
        .build();
    assert!(cache.initialize(small_config()).await);

    assert!(cache.put_with("n", &"remote", to_tier(Tier::Network)).await);
    let hit: Option<String> = cache.get_with("n", Some(Tier::Network), false).await;
    assert_eq!(hit.as_deref(), Some("remote"));

    handle.set_online(false);
    wait_for_network(&cache, false).await;
    let gone: Option<String> = cache.get_with("n", Some(Tier::Network), false).await;
    assert_eq!(gone, None);

    // Repeating the same signal is a no-op.
    handle.set_online(false);

    handle.set_online(true);
    wait_for_network(&cache, true).await;
    let still_gone: Option<String> = cache.get_with("n", Some(Tier::Network), false).await;
    assert_eq!(still_gone, None);
    assert!(cache
        .events()
        .iter()
        .any(|e| e.kind == CacheEventKind::Synced));
}

#[tokio::test]
async fn offline_signal_before_controller_first_poll_is_applied() {
    let (handle, signal) = ConnectivityHandle::new(true);
    let cache = TieredCache::builder()
        .clock(Arc::new(test_clock()))
        .connectivity(signal)
        .build();
    assert!(cache.initialize(small_config()).await);

    // Flip before yielding: the controller task has not polled the signal
    // yet, so it must not mistake this transition for its initial state.
    handle.set_online(false);
    wait_for_network(&cache, false).await;

    let miss: Option<String> = cache.get_with("n", Some(Tier::Network), false).await;
    assert_eq!(miss, None);
}

#[tokio::test]
async fn network_tier_disabled_by_config_is_skipped() {
    let clock = test_clock();
    let mut config = small_config();
    config.enable_network_tier = false;
    let cache = engine_with(config, clock).await;

    assert!(!cache.put_with("n", &1u8, to_tier(Tier::Network)).await);
    let miss: Option<u8> = cache.get_with("n", Some(Tier::Network), false).await;
    assert_eq!(miss, None);
}

#[tokio::test]
async fn event_feed_reports_stores_and_misses() {
    let clock = test_clock();
    let cache = engine_with(small_config(), clock).await;
    let mut rx = cache.subscribe();

    cache.put("k", &1u8).await;
    let _: Option<u8> = cache.get("nothing").await;

    let stored = rx.recv().await.unwrap();
    assert_eq!(stored.kind, CacheEventKind::Stored);
    assert_eq!(stored.data["key"], "k");
    let missed = rx.recv().await.unwrap();
    assert_eq!(missed.kind, CacheEventKind::Missed);
}

async fn wait_for_network(cache: &TieredCache, enabled: bool) {
    for _ in 0..200 {
        let state = cache
            .statistics()
            .await
            .map(|s| s.network_tier_enabled);
        if state == Some(enabled) {
            return;
        }
        tokio::time::sleep(StdDuration::from_millis(5)).await;
    }
    panic!("network tier did not become enabled={enabled} in time");
}
