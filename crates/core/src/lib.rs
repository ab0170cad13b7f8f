//! Offline-first sync pipeline for Daypack.
//!
//! The pipeline keeps one in-memory list per entity type consistent with a
//! durable local store and a remote backend: mutations apply optimistically,
//! persist locally, and either go straight to the remote (online) or land in
//! a pending-operation queue that the reconciler drains on reconnect.

pub mod connectivity;
pub mod controller;
pub mod errors;
pub mod reconciler;
pub mod records;
pub mod registry;
pub mod session;
pub mod store;

pub use connectivity::ConnectivitySignal;
pub use controller::EntityController;
pub use errors::{Error, Result};
pub use reconciler::Reconciler;
pub use records::{
    City, EntityKind, MutationKind, PendingOperation, QueueKeyPolicy, SyncRecord, Task,
    Transaction,
};
pub use registry::SyncContext;
pub use session::Session;
pub use store::{LocalStore, RemoteStore, ANONYMOUS_OWNER};

#[cfg(test)]
pub(crate) mod testing;
