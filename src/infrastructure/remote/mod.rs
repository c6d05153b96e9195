pub mod in_memory;

use crate::core::errors::BillioError;
use crate::core::models::{Expense, Group};
use async_trait::async_trait;

/// Remote source of truth, implemented by the API client.
///
/// Create and update return the record as the remote store now holds it.
/// Any error is treated as transient by the sync queue.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn create_expense(&self, payload: &Expense) -> Result<Expense, BillioError>;
    async fn update_expense(&self, id: &str, payload: &Expense) -> Result<Expense, BillioError>;
    async fn delete_expense(&self, id: &str) -> Result<(), BillioError>;
    async fn create_group(&self, payload: &Group) -> Result<Group, BillioError>;
    async fn update_group(&self, id: &str, payload: &Group) -> Result<Group, BillioError>;
    async fn delete_group(&self, id: &str) -> Result<(), BillioError>;
}
