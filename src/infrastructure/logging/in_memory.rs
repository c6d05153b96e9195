use crate::core::errors::BillioError;
use crate::core::models::AppLog;
use crate::infrastructure::logging::LoggingService;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct InMemoryLogging {
    logs: Arc<RwLock<Vec<AppLog>>>,
}

impl InMemoryLogging {
    pub fn new() -> Self {
        InMemoryLogging {
            logs: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn actions(&self) -> Vec<String> {
        self.logs.read().await.iter().map(|l| l.action.clone()).collect()
    }
}

#[async_trait]
impl LoggingService for InMemoryLogging {
    async fn log_action(
        &self,
        action: &str,
        details: serde_json::Value,
        entity_id: Option<&str>,
    ) -> Result<(), BillioError> {
        let mut logs = self.logs.write().await;
        logs.push(AppLog {
            id: Uuid::new_v4().to_string(),
            action: action.to_string(),
            entity_id: entity_id.map(String::from),
            details,
            timestamp: chrono::Utc::now(),
        });
        Ok(())
    }

    async fn get_entity_logs(&self, entity_id: &str) -> Result<Vec<AppLog>, BillioError> {
        let logs = self.logs.read().await;
        Ok(logs
            .iter()
            .filter(|l| l.entity_id.as_deref() == Some(entity_id))
            .cloned()
            .collect())
    }
}
