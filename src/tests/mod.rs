mod sync_queue_tests;

use crate::config::SyncSettings;
use crate::core::errors::BillioError;
use crate::core::conflict::ConflictStrategy;
use crate::core::models::{Expense, Group, GroupMember, Money, Role, Split, SplitType};
use crate::core::network::NetworkMonitor;
use crate::core::services::SyncService;
use crate::infrastructure::logging::in_memory::InMemoryLogging;
use crate::infrastructure::remote::RemoteApi;
use crate::infrastructure::remote::in_memory::InMemoryRemote;
use crate::infrastructure::storage::in_memory::InMemoryStorage;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;

pub type TestService = SyncService<InMemoryStorage, InMemoryRemote, InMemoryLogging>;

pub struct TestHarness {
    pub service: Arc<TestService>,
    pub storage: InMemoryStorage,
    pub remote: InMemoryRemote,
    pub logging: InMemoryLogging,
    pub network: Arc<NetworkMonitor>,
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

pub fn test_settings() -> SyncSettings {
    SyncSettings {
        max_retries: 3,
        retry_base_delay: Duration::ZERO,
        retry_max_delay: Duration::ZERO,
        conflict_strategy: ConflictStrategy::LastWriteWins,
    }
}

pub fn create_test_service(online: bool) -> TestHarness {
    init_tracing();
    let storage = InMemoryStorage::new();
    let remote = InMemoryRemote::new();
    let logging = InMemoryLogging::new();
    let network = Arc::new(NetworkMonitor::new(online));
    let service = SyncService::new(
        storage.clone(),
        remote.clone(),
        logging.clone(),
        Arc::clone(&network),
        test_settings(),
    );
    TestHarness {
        service: Arc::new(service),
        storage,
        remote,
        logging,
        network,
    }
}

pub fn ids(members: &[&str]) -> Vec<String> {
    members.iter().map(|m| m.to_string()).collect()
}

pub fn members(user_ids: &[&str]) -> Vec<GroupMember> {
    user_ids
        .iter()
        .enumerate()
        .map(|(i, id)| GroupMember {
            user_id: id.to_string(),
            display_name: id.to_uppercase(),
            role: if i == 0 { Role::Owner } else { Role::Member },
        })
        .collect()
}

pub fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, hour, 0, 0).unwrap()
}

pub fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}

/// Expense with exact splits given in cents.
pub fn sample_expense(id: &str, group_id: &str, payer_id: &str, splits: &[(&str, i64)]) -> Expense {
    let splits: Vec<Split> = splits
        .iter()
        .map(|(member_id, cents)| Split {
            member_id: member_id.to_string(),
            amount: Money::from_cents(*cents),
            percentage: None,
            shares: None,
        })
        .collect();
    Expense {
        id: id.to_string(),
        group_id: group_id.to_string(),
        description: format!("Expense {}", id),
        amount: splits.iter().map(|s| s.amount).sum(),
        currency: "EUR".to_string(),
        date: day(),
        payer_id: payer_id.to_string(),
        split_type: SplitType::Exact,
        splits,
        notes: None,
        receipt_url: None,
        created_at: at(9),
        updated_at: None,
    }
}

/// Remote that always rejects one expense id and takes the local storage
/// down while accepting another.
#[derive(Clone)]
pub struct OutageRemote {
    pub inner: InMemoryRemote,
    storage: InMemoryStorage,
    rejected_id: String,
    outage_id: String,
}

impl OutageRemote {
    pub fn new(storage: &InMemoryStorage, rejected_id: &str, outage_id: &str) -> Self {
        OutageRemote {
            inner: InMemoryRemote::new(),
            storage: storage.clone(),
            rejected_id: rejected_id.to_string(),
            outage_id: outage_id.to_string(),
        }
    }
}

#[async_trait]
impl RemoteApi for OutageRemote {
    async fn create_expense(&self, payload: &Expense) -> Result<Expense, BillioError> {
        if payload.id == self.rejected_id {
            return Err(BillioError::RemoteFailure(format!("{} rejected", payload.id)));
        }
        if payload.id == self.outage_id {
            self.storage.set_unavailable(true);
        }
        self.inner.create_expense(payload).await
    }

    async fn update_expense(&self, id: &str, payload: &Expense) -> Result<Expense, BillioError> {
        self.inner.update_expense(id, payload).await
    }

    async fn delete_expense(&self, id: &str) -> Result<(), BillioError> {
        self.inner.delete_expense(id).await
    }

    async fn create_group(&self, payload: &Group) -> Result<Group, BillioError> {
        self.inner.create_group(payload).await
    }

    async fn update_group(&self, id: &str, payload: &Group) -> Result<Group, BillioError> {
        self.inner.update_group(id, payload).await
    }

    async fn delete_group(&self, id: &str) -> Result<(), BillioError> {
        self.inner.delete_group(id).await
    }
}
