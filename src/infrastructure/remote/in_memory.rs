use crate::core::errors::BillioError;
use crate::core::models::{Expense, Group};
use crate::infrastructure::remote::RemoteApi;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory remote store with failure injection for tests and the demo.
#[derive(Clone, Default)]
pub struct InMemoryRemote {
    expenses: Arc<RwLock<HashMap<String, Expense>>>,
    groups: Arc<RwLock<HashMap<String, Group>>>,
    calls: Arc<RwLock<Vec<String>>>,
    failures_left: Arc<RwLock<u32>>,
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `count` calls fail, whatever the operation.
    pub async fn fail_next(&self, count: u32) {
        *self.failures_left.write().await = count;
    }

    /// Every call attempted so far, as `operation:entity_id`.
    pub async fn calls(&self) -> Vec<String> {
        self.calls.read().await.clone()
    }

    /// Puts a record in the remote store as if another device had written it.
    pub async fn seed_expense(&self, expense: Expense) {
        self.expenses.write().await.insert(expense.id.clone(), expense);
    }

    pub async fn seed_group(&self, group: Group) {
        self.groups.write().await.insert(group.id.clone(), group);
    }

    pub async fn expense(&self, id: &str) -> Option<Expense> {
        self.expenses.read().await.get(id).cloned()
    }

    pub async fn group(&self, id: &str) -> Option<Group> {
        self.groups.read().await.get(id).cloned()
    }

    pub async fn expenses_for_group(&self, group_id: &str) -> Vec<Expense> {
        let mut expenses: Vec<Expense> = self
            .expenses
            .read()
            .await
            .values()
            .filter(|e| e.group_id == group_id)
            .cloned()
            .collect();
        expenses.sort_by(|a, b| a.id.cmp(&b.id));
        expenses
    }

    async fn record_call(&self, operation: &str, id: &str) -> Result<(), BillioError> {
        self.calls.write().await.push(format!("{}:{}", operation, id));
        let mut failures_left = self.failures_left.write().await;
        if *failures_left > 0 {
            *failures_left -= 1;
            return Err(BillioError::RemoteFailure(format!("{} {} rejected", operation, id)));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteApi for InMemoryRemote {
    /// Creating an id that already exists returns the stored record, so a
    /// retried create is idempotent.
    async fn create_expense(&self, payload: &Expense) -> Result<Expense, BillioError> {
        self.record_call("create_expense", &payload.id).await?;
        let mut expenses = self.expenses.write().await;
        Ok(expenses
            .entry(payload.id.clone())
            .or_insert_with(|| payload.clone())
            .clone())
    }

    async fn update_expense(&self, id: &str, payload: &Expense) -> Result<Expense, BillioError> {
        self.record_call("update_expense", id).await?;
        let mut expenses = self.expenses.write().await;
        expenses.insert(id.to_string(), payload.clone());
        Ok(payload.clone())
    }

    async fn delete_expense(&self, id: &str) -> Result<(), BillioError> {
        self.record_call("delete_expense", id).await?;
        self.expenses.write().await.remove(id);
        Ok(())
    }

    async fn create_group(&self, payload: &Group) -> Result<Group, BillioError> {
        self.record_call("create_group", &payload.id).await?;
        let mut groups = self.groups.write().await;
        Ok(groups
            .entry(payload.id.clone())
            .or_insert_with(|| payload.clone())
            .clone())
    }

    async fn update_group(&self, id: &str, payload: &Group) -> Result<Group, BillioError> {
        self.record_call("update_group", id).await?;
        let mut groups = self.groups.write().await;
        groups.insert(id.to_string(), payload.clone());
        Ok(payload.clone())
    }

    async fn delete_group(&self, id: &str) -> Result<(), BillioError> {
        self.record_call("delete_group", id).await?;
        self.groups.write().await.remove(id);
        self.expenses.write().await.retain(|_, e| e.group_id != id);
        Ok(())
    }
}
