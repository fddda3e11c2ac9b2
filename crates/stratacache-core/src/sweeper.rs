//! Periodic expiry sweep.
//!
//! Eager deletion of expired records across all enabled tiers. The lazy
//! path lives in the engine's lookup; this task bounds how long an expired
//! record can linger unread. Ticks that come due while a sweep is still
//! running are skipped rather than queued.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

use crate::engine::EngineCore;

pub(crate) async fn run_sweeper(core: Arc<EngineCore>, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // First tick fires immediately; consume it so the first sweep happens
    // one full period after initialization.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let removed = core.sweep_expired().await;
        debug!(removed, "expiry sweep finished");
    }
}
