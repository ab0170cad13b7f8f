//! Adapter contracts for the durable local store and the remote backend.

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::Result;
use crate::records::{EntityKind, PendingOperation};

/// Owner bucket used for rows written before any session exists.
///
/// Anonymous sessions never see another owner's rows; they only ever read
/// and write this bucket.
pub const ANONYMOUS_OWNER: &str = "local";

/// Durable on-device store: one keyed record table and one pending-operation
/// queue, both generic across entity types. Pure storage, no business logic.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// All records for one entity type and owner, oldest write first.
    async fn list_records(&self, entity: EntityKind, owner_id: &str) -> Result<Vec<Value>>;

    /// Upsert one record by key. Later writes overwrite, never duplicate.
    async fn put_record(
        &self,
        entity: EntityKind,
        owner_id: &str,
        record_id: &str,
        payload: Value,
    ) -> Result<()>;

    /// Wholesale snapshot refresh: clear the owner's rows and bulk-insert,
    /// atomically. An empty `rows` still clears.
    async fn replace_records(
        &self,
        entity: EntityKind,
        owner_id: &str,
        rows: Vec<(String, Value)>,
    ) -> Result<()>;

    async fn delete_record(&self, entity: EntityKind, owner_id: &str, record_id: &str)
        -> Result<()>;

    /// Queued operations for one entity type, in enqueue order.
    async fn list_pending(&self, entity: EntityKind) -> Result<Vec<PendingOperation>>;

    /// Upsert by (entity, op_id): re-enqueueing the same key overwrites the
    /// in-flight intent.
    async fn enqueue_pending(&self, op: PendingOperation) -> Result<()>;

    async fn remove_pending(&self, entity: EntityKind, op_id: &str) -> Result<()>;
}

/// Remote backend adapter, reachable only when online. Every operation is
/// scoped by the owning user; failures surface as a distinguishable error,
/// never as silent partial success.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn insert(&self, entity: EntityKind, owner_id: &str, payload: Value) -> Result<()>;

    async fn update(
        &self,
        entity: EntityKind,
        owner_id: &str,
        record_id: &str,
        payload: Value,
    ) -> Result<()>;

    async fn delete(&self, entity: EntityKind, owner_id: &str, record_id: &str) -> Result<()>;

    async fn list_for_owner(&self, entity: EntityKind, owner_id: &str) -> Result<Vec<Value>>;
}
