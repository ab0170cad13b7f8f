//! Row types for the generic record and pending-operation tables.

use chrono::Utc;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use daypack_core::{EntityKind, MutationKind, PendingOperation};

use crate::errors::StorageError;
use crate::schema::{pending_operations, records};

pub(crate) fn enum_to_db<T: serde::Serialize>(value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value)
        .map(|s| s.trim_matches('"').to_string())
        .map_err(|e| StorageError::Corrupt(e.to_string()))
}

pub(crate) fn enum_from_db<T: serde::de::DeserializeOwned>(value: &str) -> Result<T, StorageError> {
    serde_json::from_str(&format!("\"{}\"", value)).map_err(|e| StorageError::Corrupt(e.to_string()))
}

#[derive(
    Queryable,
    Identifiable,
    Insertable,
    AsChangeset,
    Selectable,
    Debug,
    Clone,
    Serialize,
    Deserialize,
)]
#[diesel(primary_key(entity, owner_id, record_id))]
#[diesel(table_name = records)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct RecordRowDB {
    pub entity: String,
    pub owner_id: String,
    pub record_id: String,
    pub payload: String,
    pub updated_at: String,
}

impl RecordRowDB {
    pub fn new(
        entity: EntityKind,
        owner_id: &str,
        record_id: &str,
        payload: &serde_json::Value,
    ) -> Result<Self, StorageError> {
        Ok(Self {
            entity: enum_to_db(&entity)?,
            owner_id: owner_id.to_string(),
            record_id: record_id.to_string(),
            payload: serde_json::to_string(payload)
                .map_err(|e| StorageError::Corrupt(e.to_string()))?,
            updated_at: Utc::now().to_rfc3339(),
        })
    }

    pub fn payload_value(&self) -> Result<serde_json::Value, StorageError> {
        serde_json::from_str(&self.payload).map_err(|e| StorageError::Corrupt(e.to_string()))
    }
}

#[derive(
    Queryable,
    Identifiable,
    Insertable,
    AsChangeset,
    Selectable,
    Debug,
    Clone,
    Serialize,
    Deserialize,
)]
#[diesel(primary_key(entity, op_id))]
#[diesel(table_name = pending_operations)]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PendingOperationDB {
    pub entity: String,
    pub op_id: String,
    pub op: String,
    pub owner_id: Option<String>,
    pub payload: String,
    pub queued_at_millis: i64,
    pub created_at: String,
}

impl PendingOperationDB {
    pub fn from_domain(op: &PendingOperation) -> Result<Self, StorageError> {
        Ok(Self {
            entity: enum_to_db(&op.entity)?,
            op_id: op.op_id.clone(),
            op: enum_to_db(&op.op)?,
            owner_id: op.owner_id.clone(),
            payload: serde_json::to_string(&op.payload)
                .map_err(|e| StorageError::Corrupt(e.to_string()))?,
            queued_at_millis: op.queued_at_millis,
            created_at: Utc::now().to_rfc3339(),
        })
    }

    pub fn into_domain(self) -> Result<PendingOperation, StorageError> {
        Ok(PendingOperation {
            entity: enum_from_db::<EntityKind>(&self.entity)?,
            op_id: self.op_id,
            op: enum_from_db::<MutationKind>(&self.op)?,
            owner_id: self.owner_id,
            payload: serde_json::from_str(&self.payload)
                .map_err(|e| StorageError::Corrupt(e.to_string()))?,
            queued_at_millis: self.queued_at_millis,
        })
    }
}
