use super::expense::Expense;
use super::group::Group;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A pending mutation against the remote store.
///
/// Serialized adjacently tagged so a queued record reads
/// `{"type": "update_expense", "data": {...}}`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum SyncAction {
    CreateExpense(Expense),
    UpdateExpense { id: String, payload: Expense },
    DeleteExpense { id: String, group_id: String },
    CreateGroup(Group),
    UpdateGroup { id: String, payload: Group },
    DeleteGroup { id: String },
}

impl SyncAction {
    pub fn kind(&self) -> &'static str {
        match self {
            SyncAction::CreateExpense(_) => "create_expense",
            SyncAction::UpdateExpense { .. } => "update_expense",
            SyncAction::DeleteExpense { .. } => "delete_expense",
            SyncAction::CreateGroup(_) => "create_group",
            SyncAction::UpdateGroup { .. } => "update_group",
            SyncAction::DeleteGroup { .. } => "delete_group",
        }
    }

    /// Id of the expense or group this action mutates.
    pub fn entity_id(&self) -> &str {
        match self {
            SyncAction::CreateExpense(expense) => &expense.id,
            SyncAction::UpdateExpense { id, .. } => id,
            SyncAction::DeleteExpense { id, .. } => id,
            SyncAction::CreateGroup(group) => &group.id,
            SyncAction::UpdateGroup { id, .. } => id,
            SyncAction::DeleteGroup { id } => id,
        }
    }
}

/// Persisted queue record: `{id, type, data, timestamp, retryCount}`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct QueuedAction {
    pub id: String,
    #[serde(flatten)]
    pub action: SyncAction,
    /// Enqueue time in epoch milliseconds.
    pub timestamp: i64,
    #[serde(rename = "retryCount")]
    pub retry_count: u32,
}

impl QueuedAction {
    pub fn new(action: SyncAction) -> Self {
        let timestamp = Utc::now().timestamp_millis();
        let tiebreak = Uuid::new_v4().simple().to_string();
        QueuedAction {
            id: format!("{}-{}", timestamp, &tiebreak[..8]),
            action,
            timestamp,
            retry_count: 0,
        }
    }
}

/// What the remote store returned for a confirmed action.
#[derive(Clone, Debug, PartialEq)]
pub enum RemoteRecord {
    Expense(Expense),
    Group(Group),
    ExpenseDeleted { id: String, group_id: String },
    GroupDeleted { id: String },
}
