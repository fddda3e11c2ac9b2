//! Bounded chronological event feed.
//!
//! Every significant operation appends a [`CacheEvent`]. The log keeps the
//! most recent [`EVENT_LOG_CAP`] entries and mirrors appends onto a
//! broadcast channel for live subscribers. Appends never block: a slow
//! subscriber lags and loses events, the engine does not wait for it.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::clock::Clock;

/// Retained history depth.
pub const EVENT_LOG_CAP: usize = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheEventKind {
    Initialized,
    Stored,
    Retrieved,
    Removed,
    Missed,
    Cleared,
    Warmed,
    ExpiredCleanup,
    Synced,
    Error,
}

impl CacheEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheEventKind::Initialized => "initialized",
            CacheEventKind::Stored => "stored",
            CacheEventKind::Retrieved => "retrieved",
            CacheEventKind::Removed => "removed",
            CacheEventKind::Missed => "missed",
            CacheEventKind::Cleared => "cleared",
            CacheEventKind::Warmed => "warmed",
            CacheEventKind::ExpiredCleanup => "expired_cleanup",
            CacheEventKind::Synced => "synced",
            CacheEventKind::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEvent {
    pub id: Uuid,
    pub kind: CacheEventKind,
    pub timestamp: DateTime<Utc>,
    /// Contextual fields: key, tier, counts, error detail.
    pub data: HashMap<String, String>,
}

pub struct EventLog {
    recent: Mutex<VecDeque<CacheEvent>>,
    tx: broadcast::Sender<CacheEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_LOG_CAP);
        Self {
            recent: Mutex::new(VecDeque::with_capacity(EVENT_LOG_CAP)),
            tx,
        }
    }

    /// Append an event; trims history to the cap afterwards.
    pub fn record(&self, clock: &dyn Clock, kind: CacheEventKind, data: HashMap<String, String>) {
        let event = CacheEvent {
            id: Uuid::new_v4(),
            kind,
            timestamp: clock.now(),
            data,
        };
        {
            let mut recent = self.recent.lock().unwrap();
            recent.push_back(event.clone());
            while recent.len() > EVENT_LOG_CAP {
                recent.pop_front();
            }
        }
        // No receivers is fine.
        let _ = self.tx.send(event);
    }

    /// Snapshot of retained history, oldest first.
    pub fn recent(&self) -> Vec<CacheEvent> {
        self.recent.lock().unwrap().iter().cloned().collect()
    }

    /// Live subscription. Lagging receivers skip ahead, they never block
    /// the writer.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Shorthand for building the `data` map.
pub fn event_data<const N: usize>(fields: [(&str, String); N]) -> HashMap<String, String> {
    fields
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}
