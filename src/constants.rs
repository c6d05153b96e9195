// Audit log action names
pub const GROUP_CREATED: &str = "GROUP_CREATED";
pub const GROUP_UPDATED: &str = "GROUP_UPDATED";
pub const GROUP_DELETED: &str = "GROUP_DELETED";
pub const EXPENSE_ADDED: &str = "EXPENSE_ADDED";
pub const EXPENSE_UPDATED: &str = "EXPENSE_UPDATED";
pub const EXPENSE_DELETED: &str = "EXPENSE_DELETED";
pub const SYNC_ACTION_ENQUEUED: &str = "SYNC_ACTION_ENQUEUED";
pub const SYNC_ACTION_CONFIRMED: &str = "SYNC_ACTION_CONFIRMED";
pub const SYNC_ACTION_RETRIED: &str = "SYNC_ACTION_RETRIED";
pub const SYNC_ACTION_DROPPED: &str = "SYNC_ACTION_DROPPED";
pub const RECORD_RECONCILED: &str = "RECORD_RECONCILED";

/// Allowed distance of a percentage split's total from 100.
pub const PERCENTAGE_TOLERANCE: f64 = 0.1;

pub const DEFAULT_MAX_SYNC_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 500;
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 30_000;

pub const MAX_DESCRIPTION_LENGTH: usize = 200;
pub const MAX_GROUP_NAME_LENGTH: usize = 100;
