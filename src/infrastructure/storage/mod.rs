pub mod in_memory;

use crate::core::errors::BillioError;
use async_trait::async_trait;

/// Durable key/value backend holding cached snapshots, the sync queue and
/// the last-sync timestamp.
#[async_trait]
pub trait PersistenceBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BillioError>;
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), BillioError>;
    async fn remove(&self, key: &str) -> Result<(), BillioError>;
    async fn remove_many(&self, keys: &[String]) -> Result<(), BillioError>;
}
