//! Connectivity signal and the controller that gates the network tier.
//!
//! The signal is a `watch` channel carrying the current online state. The
//! controller task reacts to transitions: going offline clears the network
//! tier's in-memory representation and disables it; coming back online
//! re-enables it and records a `Synced` event. Repeated identical signals
//! are no-ops.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::engine::EngineCore;
use crate::events::{event_data, CacheEventKind};

/// Receiver half consumed by the engine.
pub type ConnectivitySignal = watch::Receiver<bool>;

/// Sender half owned by whatever observes the real network.
pub struct ConnectivityHandle {
    tx: watch::Sender<bool>,
}

impl ConnectivityHandle {
    pub fn new(initially_online: bool) -> (Self, ConnectivitySignal) {
        let (tx, rx) = watch::channel(initially_online);
        (Self { tx }, rx)
    }

    pub fn set_online(&self, online: bool) {
        // send only fails with no receivers left; nothing to do then.
        let _ = self.tx.send(online);
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Controller loop. Runs until the sender side is dropped or the task is
/// aborted on shutdown.
pub(crate) async fn run_controller(core: Arc<EngineCore>, mut signal: ConnectivitySignal) {
    // Shadow the gate's actual state, not the signal's current value: a
    // transition fired between engine construction and this task's first
    // poll must still be applied when the pending notification resolves.
    let mut last = core.network_store().is_enabled();
    loop {
        if signal.changed().await.is_err() {
            debug!("connectivity signal closed, controller stopping");
            return;
        }
        let online = *signal.borrow_and_update();
        if online == last {
            continue;
        }
        last = online;
        apply_transition(&core, online).await;
    }
}

pub(crate) async fn apply_transition(core: &EngineCore, online: bool) {
    if online {
        info!("connectivity restored, re-enabling network tier");
        core.network_store().set_enabled(true);
        core.events().record(
            core.clock(),
            CacheEventKind::Synced,
            event_data([("tier", "network".to_string())]),
        );
    } else {
        info!("connectivity lost, flushing and disabling network tier");
        core.network_store().set_enabled(false);
        core.flush_network_tier().await;
    }
}
