//! Domain records and the sync queue model.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

/// Entity types served by the sync pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Transaction,
    Task,
    City,
}

impl EntityKind {
    /// Local and remote table name for this entity type.
    pub fn table_name(&self) -> &'static str {
        match self {
            EntityKind::Transaction => "transactions",
            EntityKind::Task => "tasks",
            EntityKind::City => "cities",
        }
    }

    /// Name of the payload field carrying the record key.
    pub fn key_field(&self) -> &'static str {
        match self {
            EntityKind::Transaction | EntityKind::Task => "id",
            EntityKind::City => "timezone",
        }
    }

    /// How pending operations for this entity are keyed in the queue.
    pub fn queue_key_policy(&self) -> QueueKeyPolicy {
        match self {
            EntityKind::Transaction | EntityKind::Task => QueueKeyPolicy::ByRecordId,
            EntityKind::City => QueueKeyPolicy::ByTimestamp,
        }
    }

    pub fn from_table_name(name: &str) -> Option<Self> {
        match name {
            "transactions" => Some(EntityKind::Transaction),
            "tasks" => Some(EntityKind::Task),
            "cities" => Some(EntityKind::City),
            _ => None,
        }
    }
}

/// Queue key strategy per entity type.
///
/// Keying by record id collapses successive intents for the same record into
/// one entry, so only the latest state is ever replayed. Keying by timestamp
/// lets independent operations (city deletes) coexist in the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKeyPolicy {
    ByRecordId,
    ByTimestamp,
}

/// Supported mutation intents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

/// A queued mutation awaiting replay against the remote store.
///
/// Created when a mutation occurs while offline; deleted by the reconciler
/// strictly after the corresponding remote call succeeds; never mutated in
/// place. The owner id is captured at enqueue time so a drain under a
/// different session never replays another owner's intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOperation {
    pub op_id: String,
    pub entity: EntityKind,
    pub op: MutationKind,
    pub owner_id: Option<String>,
    pub payload: serde_json::Value,
    pub queued_at_millis: i64,
}

/// Contract binding a record type to its entity kind.
///
/// The payload is opaque to the pipeline beyond the record key; everything
/// else rides along as serialized JSON.
pub trait SyncRecord:
    Clone + Send + Sync + Serialize + DeserializeOwned + 'static
{
    fn entity() -> EntityKind;

    /// Stable record key, assigned client-side and never reassigned.
    fn record_id(&self) -> &str;

    /// Whether the controller may delete this record. Defaults to true;
    /// the home city overrides this.
    fn deletable(&self) -> bool {
        true
    }
}

/// Generate a fresh client-side record id.
pub fn new_record_id() -> String {
    Uuid::new_v4().to_string()
}

/// A personal-finance ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub transaction_type: String,
    pub category: String,
    pub description: String,
    pub amount: f64,
    pub date: String,
    pub time: String,
}

impl SyncRecord for Transaction {
    fn entity() -> EntityKind {
        EntityKind::Transaction
    }

    fn record_id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskPriority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskCategory {
    Personal,
    Work,
}

/// A task-manager item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub date: String,
    pub time: String,
    pub priority: TaskPriority,
    pub category: TaskCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    pub is_completed: bool,
    pub has_reminder: bool,
}

impl SyncRecord for Task {
    fn entity() -> EntityKind {
        EntityKind::Task
    }

    fn record_id(&self) -> &str {
        &self.id
    }
}

/// A world-clock city. Keyed by its IANA timezone; the home entry is the
/// device's detected location and is not deletable through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct City {
    pub city: String,
    pub timezone: String,
    #[serde(default)]
    pub is_home: bool,
}

impl SyncRecord for City {
    fn entity() -> EntityKind {
        EntityKind::City
    }

    fn record_id(&self) -> &str {
        &self.timezone
    }

    fn deletable(&self) -> bool {
        !self.is_home
    }
}
