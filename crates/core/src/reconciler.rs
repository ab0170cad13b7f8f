//! Replays queued mutations against the remote store.

use std::sync::Arc;

use chrono::Utc;
use log::{debug, warn};
use serde_json::Value;

use crate::connectivity::ConnectivitySignal;
use crate::errors::{Error, Result};
use crate::records::{EntityKind, MutationKind, PendingOperation};
use crate::store::{LocalStore, RemoteStore};

/// Drains the pending-operation queue for one entity type.
///
/// Entries are replayed in enqueue order and removed only after the
/// corresponding remote call succeeds. A failed entry stays queued for the
/// next drain; there is no backoff or attempt cap. Nothing here raises to
/// the caller.
#[derive(Clone)]
pub struct Reconciler {
    local: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteStore>,
    connectivity: ConnectivitySignal,
}

impl Reconciler {
    pub fn new(
        local: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteStore>,
        connectivity: ConnectivitySignal,
    ) -> Self {
        Self {
            local,
            remote,
            connectivity,
        }
    }

    /// Replay every queued operation for `entity` that belongs to the
    /// draining session. Stops immediately when connectivity is lost
    /// mid-drain; remaining entries stay queued for the next trigger.
    pub async fn drain(&self, entity: EntityKind, owner_id: &str) {
        let mut ops = match self.local.list_pending(entity).await {
            Ok(ops) => ops,
            Err(err) => {
                warn!(
                    "[Sync] could not read pending queue for {}: {}",
                    entity.table_name(),
                    err
                );
                return;
            }
        };
        if ops.is_empty() {
            return;
        }

        ops.sort_by(|a, b| {
            a.queued_at_millis
                .cmp(&b.queued_at_millis)
                .then_with(|| a.op_id.cmp(&b.op_id))
        });
        debug!(
            "[Sync] draining {} pending operation(s) for {}",
            ops.len(),
            entity.table_name()
        );

        for op in ops {
            if !self.connectivity.is_online() {
                debug!(
                    "[Sync] connectivity lost mid-drain for {}; stopping",
                    entity.table_name()
                );
                break;
            }

            // Ops enqueued before any session existed drain under the
            // current owner; ops captured under a different owner are never
            // replayed cross-owner.
            if let Some(queued_owner) = op.owner_id.as_deref() {
                if queued_owner != owner_id {
                    warn!(
                        "[Sync] keeping {} op {} queued: enqueued under a different owner",
                        entity.table_name(),
                        op.op_id
                    );
                    continue;
                }
            }

            match self.replay(&op, owner_id).await {
                Ok(()) => {
                    if let Err(err) = self.local.remove_pending(entity, &op.op_id).await {
                        warn!(
                            "[Sync] replayed {} op {} but could not dequeue it: {}",
                            entity.table_name(),
                            op.op_id,
                            err
                        );
                    }
                }
                Err(err) => {
                    warn!(
                        "[Sync] replay failed for {} op {}; keeping queued: {}",
                        entity.table_name(),
                        op.op_id,
                        err
                    );
                }
            }
        }
    }

    async fn replay(&self, op: &PendingOperation, owner_id: &str) -> Result<()> {
        match op.op {
            MutationKind::Create => {
                self.remote
                    .insert(op.entity, owner_id, op.payload.clone())
                    .await
            }
            MutationKind::Update => {
                let record_id = payload_record_id(op)?;
                let mut payload = op.payload.clone();
                if let Value::Object(fields) = &mut payload {
                    fields.insert(
                        "updatedAt".to_string(),
                        Value::String(Utc::now().to_rfc3339()),
                    );
                }
                self.remote
                    .update(op.entity, owner_id, &record_id, payload)
                    .await
            }
            MutationKind::Delete => {
                let record_id = payload_record_id(op)?;
                self.remote.delete(op.entity, owner_id, &record_id).await
            }
        }
    }
}

fn payload_record_id(op: &PendingOperation) -> Result<String> {
    let key_field = op.entity.key_field();
    op.payload
        .get(key_field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            Error::storage(format!(
                "queued {} operation {} has no '{}' field",
                op.entity.table_name(),
                op.op_id,
                key_field
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeLocalStore, FakeRemoteStore, RemoteCall};
    use serde_json::json;

    fn pending(
        op_id: &str,
        op: MutationKind,
        owner: Option<&str>,
        payload: Value,
        queued_at: i64,
    ) -> PendingOperation {
        PendingOperation {
            op_id: op_id.to_string(),
            entity: EntityKind::Transaction,
            op,
            owner_id: owner.map(str::to_string),
            payload,
            queued_at_millis: queued_at,
        }
    }

    #[tokio::test]
    async fn drain_replays_in_enqueue_order_and_empties_queue() {
        let local = Arc::new(FakeLocalStore::default());
        let remote = Arc::new(FakeRemoteStore::default());
        let connectivity = ConnectivitySignal::new(true);

        for (op_id, at) in [("b", 2), ("a", 1), ("c", 3)] {
            local
                .enqueue_pending(pending(
                    op_id,
                    MutationKind::Create,
                    Some("owner-a"),
                    json!({ "id": op_id }),
                    at,
                ))
                .await
                .unwrap();
        }

        let reconciler = Reconciler::new(local.clone(), remote.clone(), connectivity);
        reconciler.drain(EntityKind::Transaction, "owner-a").await;

        assert!(local
            .list_pending(EntityKind::Transaction)
            .await
            .unwrap()
            .is_empty());
        let inserted: Vec<String> = remote
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                RemoteCall::Insert { payload, .. } => {
                    Some(payload["id"].as_str().unwrap().to_string())
                }
                _ => None,
            })
            .collect();
        assert_eq!(inserted, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn failed_replay_keeps_entry_queued() {
        let local = Arc::new(FakeLocalStore::default());
        let remote = Arc::new(FakeRemoteStore::default());
        remote.fail_all(true);
        let connectivity = ConnectivitySignal::new(true);

        local
            .enqueue_pending(pending(
                "t1",
                MutationKind::Create,
                Some("owner-a"),
                json!({ "id": "t1" }),
                1,
            ))
            .await
            .unwrap();

        let reconciler = Reconciler::new(local.clone(), remote.clone(), connectivity);
        reconciler.drain(EntityKind::Transaction, "owner-a").await;
        assert_eq!(
            local.list_pending(EntityKind::Transaction).await.unwrap().len(),
            1
        );

        // Next drain with a healthy remote removes it.
        remote.fail_all(false);
        let connectivity = ConnectivitySignal::new(true);
        let reconciler = Reconciler::new(local.clone(), remote, connectivity);
        reconciler.drain(EntityKind::Transaction, "owner-a").await;
        assert!(local
            .list_pending(EntityKind::Transaction)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn drain_stops_when_connectivity_drops_mid_loop() {
        let local = Arc::new(FakeLocalStore::default());
        let remote = Arc::new(FakeRemoteStore::default());
        let connectivity = ConnectivitySignal::new(true);
        remote.go_offline_after(connectivity.clone(), 1);

        for i in 0..3 {
            local
                .enqueue_pending(pending(
                    &format!("t{i}"),
                    MutationKind::Create,
                    Some("owner-a"),
                    json!({ "id": format!("t{i}") }),
                    i,
                ))
                .await
                .unwrap();
        }

        let reconciler = Reconciler::new(local.clone(), remote.clone(), connectivity);
        reconciler.drain(EntityKind::Transaction, "owner-a").await;

        // First entry succeeded before the drop; the rest stay queued.
        assert_eq!(
            local.list_pending(EntityKind::Transaction).await.unwrap().len(),
            2
        );
        assert_eq!(remote.calls().len(), 1);
    }

    #[tokio::test]
    async fn foreign_owner_entries_are_never_replayed() {
        let local = Arc::new(FakeLocalStore::default());
        let remote = Arc::new(FakeRemoteStore::default());
        let connectivity = ConnectivitySignal::new(true);

        local
            .enqueue_pending(pending(
                "theirs",
                MutationKind::Delete,
                Some("owner-b"),
                json!({ "id": "theirs" }),
                1,
            ))
            .await
            .unwrap();
        local
            .enqueue_pending(pending(
                "legacy",
                MutationKind::Delete,
                None,
                json!({ "id": "legacy" }),
                2,
            ))
            .await
            .unwrap();

        let reconciler = Reconciler::new(local.clone(), remote.clone(), connectivity);
        reconciler.drain(EntityKind::Transaction, "owner-a").await;

        // The unowned legacy entry drained under the current session; the
        // foreign-owner entry stayed queued untouched.
        let remaining = local.list_pending(EntityKind::Transaction).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].op_id, "theirs");
        assert_eq!(remote.calls().len(), 1);
    }

    #[tokio::test]
    async fn update_replay_stamps_updated_at() {
        let local = Arc::new(FakeLocalStore::default());
        let remote = Arc::new(FakeRemoteStore::default());
        let connectivity = ConnectivitySignal::new(true);

        local
            .enqueue_pending(pending(
                "t1",
                MutationKind::Update,
                Some("owner-a"),
                json!({ "id": "t1", "amount": 7.0 }),
                1,
            ))
            .await
            .unwrap();

        let reconciler = Reconciler::new(local, remote.clone(), connectivity);
        reconciler.drain(EntityKind::Transaction, "owner-a").await;

        match &remote.calls()[0] {
            RemoteCall::Update {
                record_id, payload, ..
            } => {
                assert_eq!(record_id, "t1");
                assert!(payload["updatedAt"].as_str().is_some());
            }
            other => panic!("expected update, got {other:?}"),
        }
    }
}
