pub mod config;
pub mod constants;
pub mod core;
pub mod infrastructure;

pub use crate::core::balances::BalanceAggregator;
pub use crate::core::conflict::{ConflictResolver, ConflictStrategy};
pub use crate::core::errors::{BillioError, SplitError};
pub use crate::core::network::NetworkMonitor;
pub use crate::core::services::{ExpenseDraft, GroupUpdate, SyncService};
pub use crate::core::settlement::SettlementPlanner;
pub use crate::core::split::{SplitCalculator, SplitRequest};
pub use crate::core::sync_queue::{DrainReport, SyncQueue};

#[cfg(test)]
mod tests; // Include integration tests
