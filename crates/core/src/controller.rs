//! Generic entity controller: the single source of truth for one entity
//! type's in-memory list during a session.
//!
//! One engine serves transactions, tasks, and cities; the entity-specific
//! bits (table name, record key, queue key policy, delete protection) come
//! from [`SyncRecord`] and [`EntityKind`]. Collaborators are injected
//! explicitly so the whole write path is testable without a UI tree.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::Utc;
use log::{debug, error, warn};
use serde_json::Value;

use crate::connectivity::ConnectivitySignal;
use crate::reconciler::Reconciler;
use crate::records::{EntityKind, MutationKind, PendingOperation, QueueKeyPolicy, SyncRecord};
use crate::session::Session;
use crate::store::{LocalStore, RemoteStore, ANONYMOUS_OWNER};

pub struct EntityController<R: SyncRecord> {
    local: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteStore>,
    session: Session,
    connectivity: ConnectivitySignal,
    reconciler: Reconciler,
    records: RwLock<Vec<R>>,
    // Strictly increasing queue stamps so timestamp-keyed entries (city
    // deletes) never collide within a session.
    last_queue_millis: AtomicI64,
}

impl<R: SyncRecord> EntityController<R> {
    pub fn new(
        local: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteStore>,
        session: Session,
        connectivity: ConnectivitySignal,
    ) -> Self {
        let reconciler = Reconciler::new(local.clone(), remote.clone(), connectivity.clone());
        Self {
            local,
            remote,
            session,
            connectivity,
            reconciler,
            records: RwLock::new(Vec::new()),
            last_queue_millis: AtomicI64::new(0),
        }
    }

    /// Snapshot of the current in-memory list.
    pub fn records(&self) -> Vec<R> {
        match self.records.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Add a record. The caller assigns the id before invocation.
    ///
    /// Applies in memory first, persists locally, then either writes through
    /// to the remote (online, owner present) or enqueues the intent
    /// (offline). Failures are logged; nothing is raised to the caller.
    pub async fn create(&self, record: R) {
        let Some(payload) = self.encode(&record) else {
            return;
        };
        let record_id = record.record_id().to_string();

        self.with_records(|list| {
            // Upsert rather than blind append: city creates may legitimately
            // re-add an existing timezone (the backend upserts too).
            if let Some(existing) = list.iter_mut().find(|r| r.record_id() == record_id) {
                *existing = record.clone();
            } else {
                list.push(record.clone());
            }
        });

        let owner = self.session.owner_id();
        self.persist_local(&record_id, payload.clone(), owner.as_deref())
            .await;

        if !self.connectivity.is_online() {
            self.enqueue(MutationKind::Create, &record_id, payload, owner)
                .await;
            return;
        }
        if let Some(owner) = owner {
            if let Err(err) = self.remote.insert(R::entity(), &owner, payload).await {
                warn!(
                    "[Sync] remote insert failed for {} {}: {}",
                    R::entity().table_name(),
                    record_id,
                    err
                );
            }
        }
    }

    /// Replace the record with the same id. If no such record exists the
    /// list gains one (replace semantics, not enforced defensively).
    pub async fn update(&self, record: R) {
        let Some(payload) = self.encode(&record) else {
            return;
        };
        let record_id = record.record_id().to_string();

        self.with_records(|list| {
            if let Some(existing) = list.iter_mut().find(|r| r.record_id() == record_id) {
                *existing = record.clone();
            } else {
                list.push(record.clone());
            }
        });

        let owner = self.session.owner_id();
        self.persist_local(&record_id, payload.clone(), owner.as_deref())
            .await;

        if !self.connectivity.is_online() {
            // Keyed by record id, this overwrites a still-pending create or
            // update for the same record; only the latest state replays.
            self.enqueue(MutationKind::Update, &record_id, payload, owner)
                .await;
            return;
        }
        if let Some(owner) = owner {
            if let Err(err) = self
                .remote
                .update(R::entity(), &owner, &record_id, payload)
                .await
            {
                warn!(
                    "[Sync] remote update failed for {} {}: {}",
                    R::entity().table_name(),
                    record_id,
                    err
                );
            }
        }
    }

    /// Remove the record from the in-memory list and the local store, then
    /// delete remotely or enqueue the delete intent.
    pub async fn delete(&self, record: &R) {
        if !record.deletable() {
            warn!(
                "[Sync] refusing to delete protected {} record {}",
                R::entity().table_name(),
                record.record_id()
            );
            return;
        }
        let record_id = record.record_id().to_string();

        self.with_records(|list| list.retain(|r| r.record_id() != record_id));

        let owner = self.session.owner_id();
        let owner_key = owner.as_deref().unwrap_or(ANONYMOUS_OWNER);
        if let Err(err) = self
            .local
            .delete_record(R::entity(), owner_key, &record_id)
            .await
        {
            warn!(
                "[Sync] local delete failed for {} {}: {}",
                R::entity().table_name(),
                record_id,
                err
            );
        }

        if !self.connectivity.is_online() {
            let payload = serde_json::json!({ R::entity().key_field(): record_id });
            self.enqueue(MutationKind::Delete, &record_id, payload, owner)
                .await;
            return;
        }
        if let Some(owner) = owner {
            if let Err(err) = self.remote.delete(R::entity(), &owner, &record_id).await {
                warn!(
                    "[Sync] remote delete failed for {} {}: {}",
                    R::entity().table_name(),
                    record_id,
                    err
                );
            }
        }
    }

    /// Rebuild the in-memory list.
    ///
    /// Online: drain the pending queue first so the remote reflects all
    /// locally-queued mutations, fetch the owner's list, and overwrite the
    /// local snapshot wholesale. Offline (or when the fetch fails): serve
    /// the best-known local snapshot. Never a partial merge of both.
    pub async fn load(&self) {
        let owner = self.session.owner_id();
        let owner_key = owner.as_deref().unwrap_or(ANONYMOUS_OWNER).to_string();

        if let Some(owner) = owner.as_deref() {
            if self.connectivity.is_online() {
                self.reconciler.drain(R::entity(), owner).await;
                match self.remote.list_for_owner(R::entity(), owner).await {
                    Ok(rows) => {
                        let records = decode_rows::<R>(rows);
                        let snapshot: Vec<(String, Value)> = records
                            .iter()
                            .filter_map(|record| {
                                self.encode(record)
                                    .map(|payload| (record.record_id().to_string(), payload))
                            })
                            .collect();
                        if let Err(err) = self
                            .local
                            .replace_records(R::entity(), owner, snapshot)
                            .await
                        {
                            warn!(
                                "[Sync] could not refresh local {} snapshot: {}",
                                R::entity().table_name(),
                                err
                            );
                        }
                        self.with_records(|list| *list = records);
                        return;
                    }
                    Err(err) => {
                        warn!(
                            "[Sync] remote fetch failed for {}; serving local snapshot: {}",
                            R::entity().table_name(),
                            err
                        );
                    }
                }
            }
        }

        match self.local.list_records(R::entity(), &owner_key).await {
            Ok(rows) => {
                let records = decode_rows::<R>(rows);
                debug!(
                    "[Sync] loaded {} {} record(s) from local store",
                    records.len(),
                    R::entity().table_name()
                );
                self.with_records(|list| *list = records);
            }
            Err(err) => {
                error!(
                    "[Sync] local read failed for {}: {}",
                    R::entity().table_name(),
                    err
                );
            }
        }
    }

    async fn persist_local(&self, record_id: &str, payload: Value, owner: Option<&str>) {
        let owner_key = owner.unwrap_or(ANONYMOUS_OWNER);
        if let Err(err) = self
            .local
            .put_record(R::entity(), owner_key, record_id, payload)
            .await
        {
            warn!(
                "[Sync] local write failed for {} {}: {}",
                R::entity().table_name(),
                record_id,
                err
            );
        }
    }

    async fn enqueue(
        &self,
        op: MutationKind,
        record_id: &str,
        payload: Value,
        owner_id: Option<String>,
    ) {
        let queued_at_millis = self.next_queue_millis();
        let op_id = match R::entity().queue_key_policy() {
            QueueKeyPolicy::ByRecordId => record_id.to_string(),
            QueueKeyPolicy::ByTimestamp => queued_at_millis.to_string(),
        };
        let pending = PendingOperation {
            op_id,
            entity: R::entity(),
            op,
            owner_id,
            payload,
            queued_at_millis,
        };
        if let Err(err) = self.local.enqueue_pending(pending).await {
            warn!(
                "[Sync] could not enqueue {} mutation for {}: {}",
                R::entity().table_name(),
                record_id,
                err
            );
        }
    }

    fn next_queue_millis(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let previous = self
            .last_queue_millis
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(last.max(now - 1) + 1)
            })
            .unwrap_or(now - 1);
        previous.max(now - 1) + 1
    }

    fn encode(&self, record: &R) -> Option<Value> {
        match serde_json::to_value(record) {
            Ok(value) => Some(value),
            Err(err) => {
                error!(
                    "[Sync] could not serialize {} record {}: {}",
                    R::entity().table_name(),
                    record.record_id(),
                    err
                );
                None
            }
        }
    }

    fn with_records<T>(&self, f: impl FnOnce(&mut Vec<R>) -> T) -> T {
        let mut guard = match self.records.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }
}

fn decode_rows<R: SyncRecord>(rows: Vec<Value>) -> Vec<R> {
    rows.into_iter()
        .filter_map(|row| match serde_json::from_value::<R>(row) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(
                    "[Sync] skipping undecodable {} row: {}",
                    R::entity().table_name(),
                    err
                );
                None
            }
        })
        .collect()
}
