pub const GROUPS_KEY: &str = "cache:groups";
pub const SYNC_QUEUE_KEY: &str = "sync:queue";
pub const LAST_SYNC_KEY: &str = "sync:last_sync";

pub fn group_expenses_key(group_id: &str) -> String {
    format!("cache:expenses:{}", group_id)
}

pub fn group_balances_key(group_id: &str) -> String {
    format!("cache:balances:{}", group_id)
}

pub fn group_settlements_key(group_id: &str) -> String {
    format!("cache:settlements:{}", group_id)
}
