//! Online/offline observable driving reconciliation and load strategy.

use std::sync::Arc;

use tokio::sync::watch;

/// Two-state connectivity signal backed by a watch channel.
///
/// The embedder feeds it from the runtime's network-reachability primitive;
/// transitions are the sole trigger for reconciler activation and controller
/// reloads. No polling.
#[derive(Clone)]
pub struct ConnectivitySignal {
    inner: Arc<watch::Sender<bool>>,
}

impl ConnectivitySignal {
    pub fn new(initially_online: bool) -> Self {
        let (tx, _rx) = watch::channel(initially_online);
        Self {
            inner: Arc::new(tx),
        }
    }

    pub fn is_online(&self) -> bool {
        *self.inner.borrow()
    }

    /// Record a transition. No-op (and no notification) when the state is
    /// unchanged.
    pub fn set_online(&self, online: bool) {
        self.inner.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
    }

    /// Force-publish the current reachability reading, notifying subscribers
    /// even when the value did not change. Reachability primitives can report
    /// a stale value before their first event fires, so embedders call this
    /// once on mount with a fresh probe result.
    pub fn refresh(&self, online: bool) {
        self.inner.send_modify(|current| *current = online);
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.inner.subscribe()
    }
}
