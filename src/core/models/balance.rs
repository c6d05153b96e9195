use super::money::Money;
use serde::{Deserialize, Serialize};

/// Derived net position of one member within one group.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Balance {
    pub member_id: String,
    pub group_id: String,
    pub total_paid: Money,
    pub total_owed: Money,
    /// `total_paid - total_owed`; positive means the member is owed money.
    pub balance: Money,
}
