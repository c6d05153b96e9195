pub mod in_memory;

use crate::core::errors::BillioError;
use crate::core::models::AppLog;
use async_trait::async_trait;

/// Audit trail of sync activity, surfaced to the UI layer (e.g. to flag
/// unsynced items).
#[async_trait]
pub trait LoggingService: Send + Sync {
    async fn log_action(
        &self,
        action: &str,
        details: serde_json::Value,
        entity_id: Option<&str>,
    ) -> Result<(), BillioError>;
    /// Entries about one expense or group, oldest first.
    async fn get_entity_logs(&self, entity_id: &str) -> Result<Vec<AppLog>, BillioError>;
}
