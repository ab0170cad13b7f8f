//! SQLite persistence for the Daypack sync pipeline.
//!
//! Two generic tables back every entity type: `records` holds the durable
//! local copy of each owner's data, `pending_operations` holds the offline
//! mutation queue. Reads go through an r2d2 pool; every mutation is routed
//! through a single writer thread inside an immediate transaction.

pub mod db;
pub mod errors;
pub mod models;
pub mod schema;
pub mod store;

pub use db::{create_pool, get_connection, init, run_migrations, spawn_writer, DbPool, WriteHandle};
pub use errors::StorageError;
pub use store::SqliteLocalStore;
