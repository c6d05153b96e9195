use super::money::Money;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SettlementSuggestion {
    pub from_member_id: String,
    pub to_member_id: String,
    pub amount: Money,
}
