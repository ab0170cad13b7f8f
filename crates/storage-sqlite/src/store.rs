//! `LocalStore` backed by SQLite: pooled reads, writer-serialized mutations.

use std::sync::Arc;

use async_trait::async_trait;
use diesel::prelude::*;
use serde_json::Value;

use daypack_core::{EntityKind, LocalStore, PendingOperation, Result};

use crate::db::{create_pool, get_connection, run_migrations, spawn_writer, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::models::{enum_to_db, PendingOperationDB, RecordRowDB};
use crate::schema::{pending_operations, records};

pub struct SqliteLocalStore {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl SqliteLocalStore {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }

    /// Migrate and open the database at `db_path`, spawning the writer.
    pub fn open(db_path: &str) -> Result<Self> {
        run_migrations(db_path)?;
        let pool = create_pool(db_path)?;
        let writer = spawn_writer(pool.as_ref().clone());
        Ok(Self::new(pool, writer))
    }
}

#[async_trait]
impl LocalStore for SqliteLocalStore {
    async fn list_records(&self, entity: EntityKind, owner_id: &str) -> Result<Vec<Value>> {
        let mut conn = get_connection(&self.pool)?;
        let entity_db = enum_to_db(&entity)?;
        let rows = records::table
            .filter(records::entity.eq(entity_db))
            .filter(records::owner_id.eq(owner_id))
            .order((records::updated_at.asc(), records::record_id.asc()))
            .load::<RecordRowDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter()
            .map(|row| Ok(row.payload_value()?))
            .collect()
    }

    async fn put_record(
        &self,
        entity: EntityKind,
        owner_id: &str,
        record_id: &str,
        payload: Value,
    ) -> Result<()> {
        let row = RecordRowDB::new(entity, owner_id, record_id, &payload)?;
        self.writer
            .exec(move |conn| {
                diesel::insert_into(records::table)
                    .values(&row)
                    .on_conflict((records::entity, records::owner_id, records::record_id))
                    .do_update()
                    .set((
                        records::payload.eq(&row.payload),
                        records::updated_at.eq(&row.updated_at),
                    ))
                    .execute(conn)?;
                Ok(())
            })
            .await
    }

    async fn replace_records(
        &self,
        entity: EntityKind,
        owner_id: &str,
        rows: Vec<(String, Value)>,
    ) -> Result<()> {
        let entity_db = enum_to_db(&entity)?;
        let owner = owner_id.to_string();
        let db_rows = rows
            .iter()
            .map(|(record_id, payload)| RecordRowDB::new(entity, &owner, record_id, payload))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        self.writer
            .exec(move |conn| {
                diesel::delete(
                    records::table
                        .filter(records::entity.eq(&entity_db))
                        .filter(records::owner_id.eq(&owner)),
                )
                .execute(conn)?;
                diesel::insert_into(records::table)
                    .values(&db_rows)
                    .execute(conn)?;
                Ok(())
            })
            .await
    }

    async fn delete_record(
        &self,
        entity: EntityKind,
        owner_id: &str,
        record_id: &str,
    ) -> Result<()> {
        let entity_db = enum_to_db(&entity)?;
        let owner = owner_id.to_string();
        let record = record_id.to_string();
        self.writer
            .exec(move |conn| {
                diesel::delete(
                    records::table
                        .filter(records::entity.eq(&entity_db))
                        .filter(records::owner_id.eq(&owner))
                        .filter(records::record_id.eq(&record)),
                )
                .execute(conn)?;
                Ok(())
            })
            .await
    }

    async fn list_pending(&self, entity: EntityKind) -> Result<Vec<PendingOperation>> {
        let mut conn = get_connection(&self.pool)?;
        let entity_db = enum_to_db(&entity)?;
        let rows = pending_operations::table
            .filter(pending_operations::entity.eq(entity_db))
            .order((
                pending_operations::queued_at_millis.asc(),
                pending_operations::op_id.asc(),
            ))
            .load::<PendingOperationDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter().map(|row| Ok(row.into_domain()?)).collect()
    }

    async fn enqueue_pending(&self, op: PendingOperation) -> Result<()> {
        let row = PendingOperationDB::from_domain(&op)?;
        self.writer
            .exec(move |conn| {
                diesel::insert_into(pending_operations::table)
                    .values(&row)
                    .on_conflict((pending_operations::entity, pending_operations::op_id))
                    .do_update()
                    .set((
                        pending_operations::op.eq(&row.op),
                        pending_operations::owner_id.eq(row.owner_id.clone()),
                        pending_operations::payload.eq(&row.payload),
                        pending_operations::queued_at_millis.eq(row.queued_at_millis),
                    ))
                    .execute(conn)?;
                Ok(())
            })
            .await
    }

    async fn remove_pending(&self, entity: EntityKind, op_id: &str) -> Result<()> {
        let entity_db = enum_to_db(&entity)?;
        let op = op_id.to_string();
        self.writer
            .exec(move |conn| {
                diesel::delete(
                    pending_operations::table
                        .filter(pending_operations::entity.eq(&entity_db))
                        .filter(pending_operations::op_id.eq(&op)),
                )
                .execute(conn)?;
                Ok(())
            })
            .await
    }
}
