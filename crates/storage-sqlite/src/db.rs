//! Pool construction, embedded migrations, and the single-writer actor.

use std::path::Path;
use std::sync::Arc;

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use daypack_core::Result;

use crate::errors::StorageError;

pub use write_actor::{spawn_writer, WriteHandle};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

pub const DB_FILE_NAME: &str = "daypack.db";

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;
pub type DbConnection = PooledConnection<ConnectionManager<SqliteConnection>>;

/// Ensure the app data directory exists and return the database file path.
pub fn init(app_data_dir: &str) -> Result<String> {
    let dir = Path::new(app_data_dir);
    if !dir.exists() {
        std::fs::create_dir_all(dir).map_err(StorageError::from)?;
    }
    Ok(dir.join(DB_FILE_NAME).to_string_lossy().to_string())
}

pub fn run_migrations(db_path: &str) -> Result<()> {
    let mut conn = SqliteConnection::establish(db_path).map_err(StorageError::from)?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| StorageError::Migration(e.to_string()))?;
    Ok(())
}

pub fn create_pool(db_path: &str) -> Result<Arc<DbPool>> {
    let manager = ConnectionManager::<SqliteConnection>::new(db_path);
    let pool = Pool::builder()
        .max_size(8)
        .connection_customizer(Box::new(SqlitePragmas))
        .build(manager)
        .map_err(StorageError::from)?;
    Ok(Arc::new(pool))
}

pub fn get_connection(pool: &DbPool) -> Result<DbConnection> {
    let conn = pool.get().map_err(StorageError::from)?;
    Ok(conn)
}

#[derive(Debug)]
struct SqlitePragmas;

impl diesel::r2d2::CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for SqlitePragmas {
    fn on_acquire(
        &self,
        conn: &mut SqliteConnection,
    ) -> std::result::Result<(), diesel::r2d2::Error> {
        conn.batch_execute(
            "PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000; PRAGMA foreign_keys = ON;",
        )
        .map_err(diesel::r2d2::Error::QueryError)
    }
}

pub mod write_actor {
    //! All mutations funnel through one OS thread holding one connection at a
    //! time, each job wrapped in an immediate transaction. Readers keep using
    //! the pool; writers never contend with each other.

    use std::thread;

    use diesel::prelude::*;
    use diesel::r2d2::{ConnectionManager, Pool};
    use diesel::sqlite::SqliteConnection;
    use tokio::sync::{mpsc, oneshot};

    use daypack_core::Result;

    use crate::errors::StorageError;

    type WriteJob = Box<dyn FnOnce(&mut SqliteConnection) + Send + 'static>;

    #[derive(Clone)]
    pub struct WriteHandle {
        sender: mpsc::UnboundedSender<WriteJob>,
    }

    pub fn spawn_writer(pool: Pool<ConnectionManager<SqliteConnection>>) -> WriteHandle {
        let (sender, mut receiver) = mpsc::unbounded_channel::<WriteJob>();
        thread::spawn(move || {
            while let Some(job) = receiver.blocking_recv() {
                match pool.get() {
                    Ok(mut conn) => job(&mut conn),
                    Err(err) => {
                        // The job is dropped; the caller sees a closed reply
                        // channel and maps it to a writer error.
                        log::error!("[Storage] Writer could not acquire a connection: {err}");
                    }
                }
            }
        });
        WriteHandle { sender }
    }

    impl WriteHandle {
        pub async fn exec<F, T>(&self, f: F) -> Result<T>
        where
            F: FnOnce(&mut SqliteConnection) -> std::result::Result<T, StorageError>
                + Send
                + 'static,
            T: Send + 'static,
        {
            let (reply_tx, reply_rx) = oneshot::channel();
            let job: WriteJob = Box::new(move |conn| {
                let result = conn.immediate_transaction::<_, StorageError, _>(f);
                let _ = reply_tx.send(result);
            });
            self.sender
                .send(job)
                .map_err(|_| StorageError::Writer("write actor has shut down".to_string()))?;
            let result = reply_rx
                .await
                .map_err(|_| StorageError::Writer("write actor dropped the job".to_string()))?;
            Ok(result?)
        }
    }
}
