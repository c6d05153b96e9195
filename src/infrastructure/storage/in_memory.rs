use crate::core::errors::BillioError;
use crate::infrastructure::storage::PersistenceBackend;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

#[derive(Clone, Default)]
pub struct InMemoryStorage {
    entries: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        InMemoryStorage {
            entries: Arc::new(RwLock::new(HashMap::new())),
            unavailable: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Makes every subsequent call fail until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    fn check_available(&self) -> Result<(), BillioError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(BillioError::StorageError("storage unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PersistenceBackend for InMemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BillioError> {
        self.check_available()?;
        let entries = self.entries.read().await;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), BillioError> {
        self.check_available()?;
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), BillioError> {
        self.check_available()?;
        let mut entries = self.entries.write().await;
        entries.remove(key);
        Ok(())
    }

    async fn remove_many(&self, keys: &[String]) -> Result<(), BillioError> {
        self.check_available()?;
        let mut entries = self.entries.write().await;
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }
}
