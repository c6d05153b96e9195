use crate::core::models::Money;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub title: String,
    pub description: String,
}

/// Rejections raised while turning an expense total into per-member splits.
/// Always reported before anything is cached or queued.
#[derive(Error, Debug, Serialize, Clone, PartialEq)]
pub enum SplitError {
    #[error("Expense amount must be positive, got {0}")]
    NonPositiveAmount(Money),
    #[error("Split needs at least one member")]
    NoMembers,
    #[error("Member {0} appears more than once in the split")]
    DuplicateMember(String),
    #[error("Exact splits sum to {actual} but expense total is {expected} (off by {delta})")]
    ExactSumMismatch {
        expected: Money,
        actual: Money,
        delta: Money,
    },
    #[error("Split amount for member {0} cannot be negative")]
    NegativeAmount(String),
    #[error("Percentages sum to {0}, expected 100")]
    PercentageSumOutOfRange(f64),
    #[error("Percentage for member {0} must be a finite non-negative number")]
    NegativePercentage(String),
    #[error("Share count for member {0} must be positive")]
    NonPositiveShares(String),
}

#[derive(Error, Debug, Serialize, Clone, PartialEq)]
pub enum BillioError {
    /// Split could not be computed or validated
    #[error(transparent)]
    Split(#[from] SplitError),

    /// Generic input validation error with detailed field information
    #[error("Invalid input for field `{0}`: {1:?}")]
    InvalidInput(String, FieldError),

    #[error("Group {0} not found")]
    GroupNotFound(String),

    #[error("Expense {0} not found")]
    ExpenseNotFound(String),

    #[error("User {0} is not a group member")]
    NotGroupMember(String),

    /// Remote call failed; always treated as transient
    #[error("Remote call failed: {0}")]
    RemoteFailure(String),

    /// Action dropped from the queue after hitting the retry cap
    #[error("Sync action {action_id} dropped after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        action_id: String,
        attempts: u32,
        last_error: String,
    },

    /// Member balances of a group do not net to zero
    #[error("Balances for group {group_id} do not net to zero (residual {residual})")]
    BalanceIntegrity { group_id: String, residual: Money },

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A sync cycle stopped early. Actions it had already dropped were still
    /// audited and published on the failure channel.
    #[error("Sync interrupted after {confirmed} confirmed and {} dropped actions: {cause}", .dropped.len())]
    SyncInterrupted {
        confirmed: usize,
        dropped: Vec<String>,
        cause: Box<BillioError>,
    },
}

impl From<serde_json::Error> for BillioError {
    fn from(err: serde_json::Error) -> Self {
        BillioError::SerializationError(err.to_string())
    }
}
