//! In-memory fake stores for controller and reconciler tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::connectivity::ConnectivitySignal;
use crate::errors::{Error, Result};
use crate::records::{EntityKind, PendingOperation};
use crate::store::{LocalStore, RemoteStore};

#[derive(Debug, Clone)]
struct RecordRow {
    entity: EntityKind,
    owner_id: String,
    record_id: String,
    payload: Value,
}

/// Durable-store fake: plain vectors with the same upsert and queue-key
/// semantics as the SQLite implementation.
#[derive(Default)]
pub struct FakeLocalStore {
    records: Mutex<Vec<RecordRow>>,
    pending: Mutex<Vec<PendingOperation>>,
}

impl FakeLocalStore {
    pub fn record_count(&self, entity: EntityKind, owner_id: &str) -> usize {
        self.records
            .lock()
            .expect("lock")
            .iter()
            .filter(|row| row.entity == entity && row.owner_id == owner_id)
            .count()
    }
}

#[async_trait]
impl LocalStore for FakeLocalStore {
    async fn list_records(&self, entity: EntityKind, owner_id: &str) -> Result<Vec<Value>> {
        Ok(self
            .records
            .lock()
            .expect("lock")
            .iter()
            .filter(|row| row.entity == entity && row.owner_id == owner_id)
            .map(|row| row.payload.clone())
            .collect())
    }

    async fn put_record(
        &self,
        entity: EntityKind,
        owner_id: &str,
        record_id: &str,
        payload: Value,
    ) -> Result<()> {
        let mut records = self.records.lock().expect("lock");
        if let Some(row) = records.iter_mut().find(|row| {
            row.entity == entity && row.owner_id == owner_id && row.record_id == record_id
        }) {
            row.payload = payload;
        } else {
            records.push(RecordRow {
                entity,
                owner_id: owner_id.to_string(),
                record_id: record_id.to_string(),
                payload,
            });
        }
        Ok(())
    }

    async fn replace_records(
        &self,
        entity: EntityKind,
        owner_id: &str,
        rows: Vec<(String, Value)>,
    ) -> Result<()> {
        let mut records = self.records.lock().expect("lock");
        records.retain(|row| !(row.entity == entity && row.owner_id == owner_id));
        for (record_id, payload) in rows {
            records.push(RecordRow {
                entity,
                owner_id: owner_id.to_string(),
                record_id,
                payload,
            });
        }
        Ok(())
    }

    async fn delete_record(
        &self,
        entity: EntityKind,
        owner_id: &str,
        record_id: &str,
    ) -> Result<()> {
        self.records.lock().expect("lock").retain(|row| {
            !(row.entity == entity && row.owner_id == owner_id && row.record_id == record_id)
        });
        Ok(())
    }

    async fn list_pending(&self, entity: EntityKind) -> Result<Vec<PendingOperation>> {
        Ok(self
            .pending
            .lock()
            .expect("lock")
            .iter()
            .filter(|op| op.entity == entity)
            .cloned()
            .collect())
    }

    async fn enqueue_pending(&self, op: PendingOperation) -> Result<()> {
        let mut pending = self.pending.lock().expect("lock");
        if let Some(existing) = pending
            .iter_mut()
            .find(|queued| queued.entity == op.entity && queued.op_id == op.op_id)
        {
            *existing = op;
        } else {
            pending.push(op);
        }
        Ok(())
    }

    async fn remove_pending(&self, entity: EntityKind, op_id: &str) -> Result<()> {
        self.pending
            .lock()
            .expect("lock")
            .retain(|op| !(op.entity == entity && op.op_id == op_id));
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub enum RemoteCall {
    Insert {
        entity: EntityKind,
        owner_id: String,
        payload: Value,
    },
    Update {
        entity: EntityKind,
        owner_id: String,
        record_id: String,
        payload: Value,
    },
    Delete {
        entity: EntityKind,
        owner_id: String,
        record_id: String,
    },
    List {
        entity: EntityKind,
        owner_id: String,
    },
}

/// Remote-store fake: records every call, keeps owner-scoped rows so
/// `list_for_owner` reflects prior mutations, and can fail on demand or
/// flip a connectivity signal offline after N calls.
#[derive(Default)]
pub struct FakeRemoteStore {
    rows: Mutex<Vec<RecordRow>>,
    calls: Mutex<Vec<RemoteCall>>,
    fail_all: AtomicBool,
    offline_after: Mutex<Option<(ConnectivitySignal, usize)>>,
}

impl FakeRemoteStore {
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().expect("lock").clone()
    }

    pub fn mutation_call_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| !matches!(call, RemoteCall::List { .. }))
            .count()
    }

    pub fn fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    pub fn go_offline_after(&self, signal: ConnectivitySignal, calls: usize) {
        *self.offline_after.lock().expect("lock") = Some((signal, calls));
    }

    pub fn seed(&self, entity: EntityKind, owner_id: &str, payload: Value) {
        let record_id = payload[entity.key_field()]
            .as_str()
            .expect("seed payload key")
            .to_string();
        self.rows.lock().expect("lock").push(RecordRow {
            entity,
            owner_id: owner_id.to_string(),
            record_id,
            payload,
        });
    }

    fn record_call(&self, call: RemoteCall) -> Result<()> {
        let mut calls = self.calls.lock().expect("lock");
        calls.push(call);
        let made = calls.len();
        drop(calls);

        if let Some((signal, after)) = self.offline_after.lock().expect("lock").as_ref() {
            if made >= *after {
                signal.set_online(false);
            }
        }
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(Error::remote(Some(503), "fake remote unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for FakeRemoteStore {
    async fn insert(&self, entity: EntityKind, owner_id: &str, payload: Value) -> Result<()> {
        self.record_call(RemoteCall::Insert {
            entity,
            owner_id: owner_id.to_string(),
            payload: payload.clone(),
        })?;
        let record_id = payload[entity.key_field()]
            .as_str()
            .unwrap_or_default()
            .to_string();
        let mut rows = self.rows.lock().expect("lock");
        // Server-side upsert semantics (cities conflict on owner+timezone).
        if let Some(row) = rows.iter_mut().find(|row| {
            row.entity == entity && row.owner_id == owner_id && row.record_id == record_id
        }) {
            row.payload = payload;
        } else {
            rows.push(RecordRow {
                entity,
                owner_id: owner_id.to_string(),
                record_id,
                payload,
            });
        }
        Ok(())
    }

    async fn update(
        &self,
        entity: EntityKind,
        owner_id: &str,
        record_id: &str,
        payload: Value,
    ) -> Result<()> {
        self.record_call(RemoteCall::Update {
            entity,
            owner_id: owner_id.to_string(),
            record_id: record_id.to_string(),
            payload: payload.clone(),
        })?;
        let mut rows = self.rows.lock().expect("lock");
        // Matching zero rows is still success, as in the real backend.
        if let Some(row) = rows.iter_mut().find(|row| {
            row.entity == entity && row.owner_id == owner_id && row.record_id == record_id
        }) {
            row.payload = payload;
        }
        Ok(())
    }

    async fn delete(&self, entity: EntityKind, owner_id: &str, record_id: &str) -> Result<()> {
        self.record_call(RemoteCall::Delete {
            entity,
            owner_id: owner_id.to_string(),
            record_id: record_id.to_string(),
        })?;
        self.rows.lock().expect("lock").retain(|row| {
            !(row.entity == entity && row.owner_id == owner_id && row.record_id == record_id)
        });
        Ok(())
    }

    async fn list_for_owner(&self, entity: EntityKind, owner_id: &str) -> Result<Vec<Value>> {
        self.record_call(RemoteCall::List {
            entity,
            owner_id: owner_id.to_string(),
        })?;
        Ok(self
            .rows
            .lock()
            .expect("lock")
            .iter()
            .filter(|row| row.entity == entity && row.owner_id == owner_id)
            .map(|row| row.payload.clone())
            .collect())
    }
}
