//! Greedy debt netting: repeatedly pair the largest creditor with the largest
//! debtor. Produces at most `n - 1` payments for `n` non-zero balances, which
//! is not always the minimum when several equal amounts could be matched.

use crate::core::errors::BillioError;
use crate::core::models::{Balance, Money, SettlementSuggestion};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};
use tracing::{debug, warn};

pub struct SettlementPlanner;

impl SettlementPlanner {
    /// Plans payments that zero every balance of one group.
    ///
    /// Balances must net to exactly zero; otherwise nothing is planned and a
    /// [`BillioError::BalanceIntegrity`] is returned. Equal amounts are
    /// ordered by member id so the output is reproducible.
    pub fn plan(group_id: &str, balances: &[Balance]) -> Result<Vec<SettlementSuggestion>, BillioError> {
        let mut net: BTreeMap<&str, Money> = BTreeMap::new();
        for balance in balances {
            *net.entry(balance.member_id.as_str()).or_default() += balance.balance;
        }

        let residual: Money = net.values().sum();
        if !residual.is_zero() {
            warn!("Balances for group {} are off by {}", group_id, residual);
            return Err(BillioError::BalanceIntegrity {
                group_id: group_id.to_string(),
                residual,
            });
        }

        let mut creditors: BinaryHeap<(Money, Reverse<&str>)> = BinaryHeap::new();
        let mut debtors: BinaryHeap<(Money, Reverse<&str>)> = BinaryHeap::new();
        for (member_id, balance) in net {
            if balance.is_positive() {
                creditors.push((balance, Reverse(member_id)));
            } else if balance.is_negative() {
                debtors.push((-balance, Reverse(member_id)));
            }
        }

        let mut suggestions = Vec::new();
        while let (Some((credit, Reverse(creditor))), Some((debt, Reverse(debtor)))) = (creditors.pop(), debtors.pop()) {
            let amount = credit.min(debt);
            suggestions.push(SettlementSuggestion {
                from_member_id: debtor.to_string(),
                to_member_id: creditor.to_string(),
                amount,
            });

            if credit > amount {
                creditors.push((credit - amount, Reverse(creditor)));
            }
            if debt > amount {
                debtors.push((debt - amount, Reverse(debtor)));
            }
        }

        debug!("Planned {} settlements for group {}", suggestions.len(), group_id);
        Ok(suggestions)
    }
}
