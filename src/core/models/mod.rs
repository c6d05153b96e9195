pub mod audit;
pub mod balance;
pub mod expense;
pub mod group;
pub mod money;
pub mod settlement;
pub mod sync_action;

pub use audit::AppLog;
pub use balance::Balance;
pub use expense::{Expense, Split, SplitType};
pub use group::{Group, GroupMember, Role};
pub use money::{Money, MoneyParseError};
pub use settlement::SettlementSuggestion;
pub use sync_action::{QueuedAction, RemoteRecord, SyncAction};
