use crate::core::models::{Balance, Expense, Group, Money};
use std::collections::BTreeMap;
use tracing::debug;

/// Reduces a group's expenses into net member balances.
pub struct BalanceAggregator;

#[derive(Default)]
struct Totals {
    paid: Money,
    owed: Money,
}

impl BalanceAggregator {
    /// Paid, owed and net for one member. The payer is debited their own
    /// split like any other member.
    pub fn member_balance(group_id: &str, member_id: &str, expenses: &[Expense]) -> Balance {
        let mut totals = Totals::default();
        for expense in expenses.iter().filter(|e| e.group_id == group_id) {
            if expense.payer_id == member_id {
                totals.paid += expense.amount;
            }
            totals.owed += expense
                .splits
                .iter()
                .filter(|s| s.member_id == member_id)
                .map(|s| s.amount)
                .sum::<Money>();
        }
        to_balance(group_id, member_id, totals)
    }

    /// One balance per group member plus anyone else who appears on an
    /// expense, ordered by member id.
    pub fn group_balances(group: &Group, expenses: &[Expense]) -> Vec<Balance> {
        let mut totals: BTreeMap<&str, Totals> = group
            .members
            .iter()
            .map(|m| (m.user_id.as_str(), Totals::default()))
            .collect();

        for expense in expenses.iter().filter(|e| e.group_id == group.id) {
            totals.entry(expense.payer_id.as_str()).or_default().paid += expense.amount;
            for split in &expense.splits {
                totals.entry(split.member_id.as_str()).or_default().owed += split.amount;
            }
        }

        let balances: Vec<Balance> = totals
            .into_iter()
            .map(|(member_id, t)| to_balance(&group.id, member_id, t))
            .collect();
        debug!("Computed {} balances for group {}", balances.len(), group.id);
        balances
    }

    /// Net position of `member_id` summed over the given per-group balances.
    /// Currency is not looked at; callers filter by currency first.
    pub fn cross_group_balance(member_id: &str, balances: &[Balance]) -> Money {
        balances
            .iter()
            .filter(|b| b.member_id == member_id)
            .map(|b| b.balance)
            .sum()
    }
}

fn to_balance(group_id: &str, member_id: &str, totals: Totals) -> Balance {
    Balance {
        member_id: member_id.to_string(),
        group_id: group_id.to_string(),
        total_paid: totals.paid,
        total_owed: totals.owed,
        balance: totals.paid - totals.owed,
    }
}
