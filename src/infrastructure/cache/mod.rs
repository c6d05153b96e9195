pub mod cache_keys;

use crate::core::errors::BillioError;
use crate::core::models::{Balance, Expense, Group, SettlementSuggestion};
use crate::infrastructure::storage::PersistenceBackend;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::warn;

use cache_keys::{GROUPS_KEY, LAST_SYNC_KEY, group_balances_key, group_expenses_key, group_settlements_key};

/// Last-known snapshots of groups, expenses and derived views for offline
/// reads.
///
/// Reads never fail: a backend error or an undecodable snapshot is logged
/// and reported as absent/empty. Writes return their error so the caller can
/// decide whether to carry on with stale data.
pub struct LocalCache<P: PersistenceBackend> {
    backend: Arc<P>,
}

impl<P: PersistenceBackend> Clone for LocalCache<P> {
    fn clone(&self) -> Self {
        LocalCache {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<P: PersistenceBackend> LocalCache<P> {
    pub fn new(backend: Arc<P>) -> Self {
        LocalCache { backend }
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = match self.backend.get(key).await {
            Ok(bytes) => bytes?,
            Err(e) => {
                warn!("Cache read of {} failed: {}", key, e);
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Discarding undecodable cache entry {}: {}", key, e);
                None
            }
        }
    }

    async fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), BillioError> {
        let bytes = serde_json::to_vec(value)
            .map_err(|e| BillioError::CacheError(format!("Cache serialization failed: {}", e)))?;
        self.backend.set(key, bytes).await
    }

    pub async fn get_groups(&self) -> Vec<Group> {
        self.read(GROUPS_KEY).await.unwrap_or_default()
    }

    pub async fn get_group(&self, group_id: &str) -> Option<Group> {
        self.get_groups().await.into_iter().find(|g| g.id == group_id)
    }

    pub async fn save_groups(&self, groups: &[Group]) -> Result<(), BillioError> {
        self.write(GROUPS_KEY, groups).await
    }

    pub async fn upsert_group(&self, group: &Group) -> Result<(), BillioError> {
        let mut groups = self.get_groups().await;
        match groups.iter_mut().find(|g| g.id == group.id) {
            Some(existing) => *existing = group.clone(),
            None => groups.push(group.clone()),
        }
        self.save_groups(&groups).await
    }

    /// Drops the group and every snapshot derived from it.
    pub async fn remove_group(&self, group_id: &str) -> Result<(), BillioError> {
        let mut groups = self.get_groups().await;
        groups.retain(|g| g.id != group_id);
        self.save_groups(&groups).await?;
        self.backend
            .remove_many(&[
                group_expenses_key(group_id),
                group_balances_key(group_id),
                group_settlements_key(group_id),
            ])
            .await
    }

    pub async fn get_expenses(&self, group_id: &str) -> Vec<Expense> {
        self.read(&group_expenses_key(group_id)).await.unwrap_or_default()
    }

    pub async fn get_expense(&self, group_id: &str, expense_id: &str) -> Option<Expense> {
        self.get_expenses(group_id)
            .await
            .into_iter()
            .find(|e| e.id == expense_id)
    }

    /// Looks an expense up across every cached group.
    pub async fn find_expense(&self, expense_id: &str) -> Option<Expense> {
        for group in self.get_groups().await {
            if let Some(expense) = self.get_expense(&group.id, expense_id).await {
                return Some(expense);
            }
        }
        None
    }

    pub async fn save_expenses(&self, group_id: &str, expenses: &[Expense]) -> Result<(), BillioError> {
        self.write(&group_expenses_key(group_id), expenses).await
    }

    pub async fn upsert_expense(&self, expense: &Expense) -> Result<(), BillioError> {
        let mut expenses = self.get_expenses(&expense.group_id).await;
        match expenses.iter_mut().find(|e| e.id == expense.id) {
            Some(existing) => *existing = expense.clone(),
            None => expenses.push(expense.clone()),
        }
        self.save_expenses(&expense.group_id, &expenses).await
    }

    pub async fn remove_expense(&self, group_id: &str, expense_id: &str) -> Result<(), BillioError> {
        let mut expenses = self.get_expenses(group_id).await;
        expenses.retain(|e| e.id != expense_id);
        self.save_expenses(group_id, &expenses).await
    }

    pub async fn get_balances(&self, group_id: &str) -> Vec<Balance> {
        self.read(&group_balances_key(group_id)).await.unwrap_or_default()
    }

    pub async fn save_balances(&self, group_id: &str, balances: &[Balance]) -> Result<(), BillioError> {
        self.write(&group_balances_key(group_id), balances).await
    }

    /// `None` when no plan is available, e.g. after the group's balances
    /// failed the integrity check. `Some(vec![])` means everyone is settled.
    pub async fn get_settlements(&self, group_id: &str) -> Option<Vec<SettlementSuggestion>> {
        self.read(&group_settlements_key(group_id)).await
    }

    pub async fn save_settlements(
        &self,
        group_id: &str,
        suggestions: &[SettlementSuggestion],
    ) -> Result<(), BillioError> {
        self.write(&group_settlements_key(group_id), suggestions).await
    }

    pub async fn remove_settlements(&self, group_id: &str) -> Result<(), BillioError> {
        self.backend.remove(&group_settlements_key(group_id)).await
    }

    pub async fn last_synced_at(&self) -> Option<DateTime<Utc>> {
        self.read(LAST_SYNC_KEY).await
    }

    pub async fn set_last_synced_at(&self, at: DateTime<Utc>) -> Result<(), BillioError> {
        self.write(LAST_SYNC_KEY, &at).await
    }
}
