//! Wires the three entity controllers over shared collaborators and keeps
//! their reload watchers as explicit task handles.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::connectivity::ConnectivitySignal;
use crate::controller::EntityController;
use crate::records::{City, SyncRecord, Task, Transaction};
use crate::session::Session;
use crate::store::{LocalStore, RemoteStore};

/// Explicit dependency container for the sync pipeline.
///
/// Construction wires each controller with the same local store, remote
/// adapter, session, and connectivity signal. `start` performs the initial
/// load and spawns one watcher per controller that re-runs `load()` on every
/// connectivity or owner transition; `shutdown` joins those watchers instead
/// of leaving dangling tasks behind.
pub struct SyncContext {
    pub transactions: Arc<EntityController<Transaction>>,
    pub tasks: Arc<EntityController<Task>>,
    pub cities: Arc<EntityController<City>>,
    session: Session,
    connectivity: ConnectivitySignal,
    watchers: Mutex<Vec<JoinHandle<()>>>,
}

impl SyncContext {
    pub fn new(
        local: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteStore>,
        session: Session,
        connectivity: ConnectivitySignal,
    ) -> Arc<Self> {
        let transactions = Arc::new(EntityController::new(
            local.clone(),
            remote.clone(),
            session.clone(),
            connectivity.clone(),
        ));
        let tasks = Arc::new(EntityController::new(
            local.clone(),
            remote.clone(),
            session.clone(),
            connectivity.clone(),
        ));
        let cities = Arc::new(EntityController::new(
            local,
            remote,
            session.clone(),
            connectivity.clone(),
        ));
        Arc::new(Self {
            transactions,
            tasks,
            cities,
            session,
            connectivity,
            watchers: Mutex::new(Vec::new()),
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn connectivity(&self) -> &ConnectivitySignal {
        &self.connectivity
    }

    /// Spawn the reload watchers. Idempotent: calling twice does not stack
    /// a second set of watchers.
    pub async fn start(&self) {
        let mut watchers = self.watchers.lock().await;
        if !watchers.is_empty() {
            return;
        }
        watchers.push(spawn_watcher(
            self.transactions.clone(),
            self.connectivity.clone(),
            self.session.clone(),
        ));
        watchers.push(spawn_watcher(
            self.tasks.clone(),
            self.connectivity.clone(),
            self.session.clone(),
        ));
        watchers.push(spawn_watcher(
            self.cities.clone(),
            self.connectivity.clone(),
            self.session.clone(),
        ));
    }

    /// Tear down the watchers deliberately, joining each task.
    pub async fn shutdown(&self) {
        let mut watchers = self.watchers.lock().await;
        for handle in watchers.drain(..) {
            handle.abort();
            let _ = handle.await;
        }
    }
}

fn spawn_watcher<R: SyncRecord>(
    controller: Arc<EntityController<R>>,
    connectivity: ConnectivitySignal,
    session: Session,
) -> JoinHandle<()> {
    let mut online_rx = connectivity.subscribe();
    let mut owner_rx = session.subscribe();
    tokio::spawn(async move {
        controller.load().await;
        loop {
            tokio::select! {
                changed = online_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                changed = owner_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
            controller.load().await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{EntityKind, Transaction};
    use crate::testing::{FakeLocalStore, FakeRemoteStore};
    use std::time::Duration;

    fn transaction(id: &str) -> Transaction {
        Transaction {
            id: id.to_string(),
            transaction_type: "Income".to_string(),
            category: "Salary".to_string(),
            description: String::new(),
            amount: 1.0,
            date: "2026-08-28".to_string(),
            time: "08:00".to_string(),
        }
    }

    #[tokio::test]
    async fn reconnect_transition_drains_and_reloads() {
        let local = Arc::new(FakeLocalStore::default());
        let remote = Arc::new(FakeRemoteStore::default());
        let session = Session::with_owner("owner-a");
        let connectivity = ConnectivitySignal::new(false);

        let context = SyncContext::new(local.clone(), remote, session, connectivity.clone());
        context.start().await;

        context.transactions.create(transaction("t1")).await;
        assert_eq!(
            local.list_pending(EntityKind::Transaction).await.unwrap().len(),
            1
        );

        connectivity.set_online(true);
        // The watcher reloads cooperatively; give it a few polls.
        for _ in 0..50 {
            if local
                .list_pending(EntityKind::Transaction)
                .await
                .unwrap()
                .is_empty()
            {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(local
            .list_pending(EntityKind::Transaction)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(context.transactions.records().len(), 1);

        context.shutdown().await;
    }

    #[tokio::test]
    async fn owner_change_triggers_reload() {
        let local = Arc::new(FakeLocalStore::default());
        let remote = Arc::new(FakeRemoteStore::default());
        remote.seed(
            EntityKind::Transaction,
            "owner-b",
            serde_json::to_value(transaction("theirs")).unwrap(),
        );
        let session = Session::with_owner("owner-a");
        let connectivity = ConnectivitySignal::new(true);

        let context =
            SyncContext::new(local, remote, session.clone(), connectivity);
        context.start().await;

        session.set_owner(Some("owner-b".to_string()));
        for _ in 0..50 {
            if !context.transactions.records().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(context.transactions.records().len(), 1);
        assert_eq!(context.transactions.records()[0].id, "theirs");

        context.shutdown().await;
    }
}
