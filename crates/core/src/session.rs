//! Session identity: the nullable owner id scoping all records and remote
//! calls.

use std::sync::Arc;

use tokio::sync::watch;

/// Read-only view of the authenticated user, plus a transition stream.
///
/// "No identifier" means the pipeline does nothing remote and serves only
/// the anonymous local bucket; a change from null to set (or back) triggers
/// a full reload in subscribers.
#[derive(Clone)]
pub struct Session {
    inner: Arc<watch::Sender<Option<String>>>,
}

impl Session {
    pub fn anonymous() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            inner: Arc::new(tx),
        }
    }

    pub fn with_owner(owner_id: impl Into<String>) -> Self {
        let (tx, _rx) = watch::channel(Some(owner_id.into()));
        Self {
            inner: Arc::new(tx),
        }
    }

    pub fn owner_id(&self) -> Option<String> {
        self.inner.borrow().clone()
    }

    pub fn set_owner(&self, owner_id: Option<String>) {
        self.inner.send_if_modified(|current| {
            if *current == owner_id {
                false
            } else {
                *current = owner_id;
                true
            }
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.inner.subscribe()
    }
}
