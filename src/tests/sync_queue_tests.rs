use crate::config::SyncSettings;
use crate::core::errors::BillioError;
use crate::core::models::{Expense, Group, SyncAction};
use crate::core::sync_queue::SyncQueue;
use crate::infrastructure::cache::cache_keys::SYNC_QUEUE_KEY;
use crate::infrastructure::remote::RemoteApi;
use crate::infrastructure::remote::in_memory::InMemoryRemote;
use crate::infrastructure::storage::PersistenceBackend;
use crate::infrastructure::storage::in_memory::InMemoryStorage;
use crate::tests::{OutageRemote, init_tracing, sample_expense, test_settings};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

fn queue_with(storage: &InMemoryStorage, settings: SyncSettings) -> SyncQueue<InMemoryStorage> {
    init_tracing();
    SyncQueue::new(Arc::new(storage.clone()), settings)
}

fn create(id: &str) -> SyncAction {
    SyncAction::CreateExpense(sample_expense(id, "g1", "a", &[("a", 1000)]))
}

#[tokio::test]
async fn test_enqueue_persists_wire_shape() {
    let storage = InMemoryStorage::new();
    let queue = queue_with(&storage, test_settings());

    let queued = queue
        .enqueue(SyncAction::DeleteExpense {
            id: "e1".to_string(),
            group_id: "g1".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(queued.retry_count, 0);

    let bytes = storage.get(SYNC_QUEUE_KEY).await.unwrap().unwrap();
    let persisted: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    let record = &persisted[0];
    assert_eq!(record["id"], queued.id.as_str());
    assert_eq!(record["type"], "delete_expense");
    assert_eq!(record["data"]["id"], "e1");
    assert_eq!(record["data"]["group_id"], "g1");
    assert_eq!(record["retryCount"], 0);
    assert!(record["timestamp"].as_i64().unwrap() > 0);

    // A fresh queue over the same storage sees the action.
    let reopened = queue_with(&storage, test_settings());
    assert_eq!(reopened.pending().await.unwrap(), vec![queued]);
}

#[tokio::test]
async fn test_drain_runs_actions_in_enqueue_order() {
    let storage = InMemoryStorage::new();
    let queue = queue_with(&storage, test_settings());
    let remote = InMemoryRemote::new();

    queue.enqueue(create("e1")).await.unwrap();
    queue
        .enqueue(SyncAction::UpdateExpense {
            id: "e1".to_string(),
            payload: sample_expense("e1", "g1", "a", &[("a", 1200)]),
        })
        .await
        .unwrap();
    queue.enqueue(create("e2")).await.unwrap();

    let report = queue.drain(&remote).await;
    assert_eq!(report.confirmed.len(), 3);
    assert!(report.is_clean());
    assert!(report.interrupted.is_none());
    assert_eq!(
        remote.calls().await,
        vec!["create_expense:e1", "update_expense:e1", "create_expense:e2"]
    );
    assert_eq!(remote.expense("e1").await.unwrap().amount.cents(), 1200);
    assert!(queue.is_empty().await.unwrap());
    assert!(storage.keys().await.is_empty());
}

#[tokio::test]
async fn test_transient_failures_are_retried_until_success() {
    let storage = InMemoryStorage::new();
    let queue = queue_with(&storage, test_settings());
    let remote = InMemoryRemote::new();
    queue.enqueue(create("e1")).await.unwrap();
    remote.fail_next(2).await;

    let report = queue.drain(&remote).await;

    assert_eq!(remote.calls().await.len(), 3);
    assert_eq!(report.retried.len(), 2);
    assert_eq!(report.retried[1].retry_count, 2);
    assert_eq!(report.confirmed.len(), 1);
    assert_eq!(report.confirmed[0].action.retry_count, 2);
    assert!(report.dropped.is_empty());
    assert!(remote.expense("e1").await.is_some());
}

#[tokio::test]
async fn test_action_is_dropped_after_max_retries() {
    let storage = InMemoryStorage::new();
    let queue = queue_with(&storage, test_settings());
    let remote = InMemoryRemote::new();
    let queued = queue.enqueue(create("e1")).await.unwrap();
    remote.fail_next(5).await;

    let report = queue.drain(&remote).await;

    assert_eq!(remote.calls().await.len(), 3);
    assert!(report.confirmed.is_empty());
    assert_eq!(report.dropped.len(), 1);
    assert_eq!(report.dropped[0].action.id, queued.id);
    match &report.dropped[0].error {
        BillioError::RetriesExhausted {
            action_id, attempts, ..
        } => {
            assert_eq!(action_id, &queued.id);
            assert_eq!(*attempts, 3);
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(queue.is_empty().await.unwrap());
}

#[tokio::test]
async fn test_failing_head_blocks_later_actions() {
    let storage = InMemoryStorage::new();
    let queue = queue_with(&storage, test_settings());
    let remote = InMemoryRemote::new();
    queue.enqueue(create("e1")).await.unwrap();
    queue.enqueue(create("e2")).await.unwrap();
    remote.fail_next(1).await;

    let report = queue.drain(&remote).await;

    assert_eq!(
        remote.calls().await,
        vec!["create_expense:e1", "create_expense:e1", "create_expense:e2"]
    );
    let order: Vec<&str> = report
        .confirmed
        .iter()
        .map(|c| c.action.action.entity_id())
        .collect();
    assert_eq!(order, vec!["e1", "e2"]);
}

#[tokio::test(start_paused = true)]
async fn test_retries_back_off_exponentially() {
    let storage = InMemoryStorage::new();
    let settings = SyncSettings {
        retry_base_delay: Duration::from_secs(1),
        retry_max_delay: Duration::from_secs(60),
        ..test_settings()
    };
    let queue = queue_with(&storage, settings);
    let remote = InMemoryRemote::new();
    queue.enqueue(create("e1")).await.unwrap();
    remote.fail_next(2).await;

    let started = tokio::time::Instant::now();
    let report = queue.drain(&remote).await;

    assert_eq!(report.confirmed.len(), 1);
    assert!(started.elapsed() >= Duration::from_secs(3));
}

#[test]
fn test_backoff_is_capped() {
    let settings = SyncSettings {
        retry_base_delay: Duration::from_millis(500),
        retry_max_delay: Duration::from_secs(3),
        ..SyncSettings::default()
    };
    assert_eq!(settings.backoff_for(1), Duration::from_millis(500));
    assert_eq!(settings.backoff_for(2), Duration::from_secs(1));
    assert_eq!(settings.backoff_for(3), Duration::from_secs(2));
    assert_eq!(settings.backoff_for(4), Duration::from_secs(3));
    assert_eq!(settings.backoff_for(40), Duration::from_secs(3));
}

/// Remote that enqueues a follow-up action the first time it is called.
struct EnqueueingRemote {
    inner: InMemoryRemote,
    queue: Arc<SyncQueue<InMemoryStorage>>,
    follow_up: Mutex<Option<SyncAction>>,
}

#[async_trait]
impl RemoteApi for EnqueueingRemote {
    async fn create_expense(&self, payload: &Expense) -> Result<Expense, BillioError> {
        if let Some(action) = self.follow_up.lock().await.take() {
            self.queue.enqueue(action).await?;
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

#[tokio::test]
async fn test_action_enqueued_during_drain_is_processed() {
    let storage = InMemoryStorage::new();
    let queue = Arc::new(queue_with(&storage, test_settings()));
    let remote = EnqueueingRemote {
        inner: InMemoryRemote::new(),
        queue: Arc::clone(&queue),
        follow_up: Mutex::new(Some(SyncAction::DeleteExpense {
            id: "e1".to_string(),
            group_id: "g1".to_string(),
        })),
    };
    queue.enqueue(create("e1")).await.unwrap();

    let report = queue.drain(&remote).await;

    assert_eq!(report.confirmed.len(), 2);
    assert_eq!(
        remote.inner.calls().await,
        vec!["create_expense:e1", "delete_expense:e1"]
    );
    assert!(remote.inner.expense("e1").await.is_none());
}

#[tokio::test]
async fn test_storage_failure_surfaces_from_enqueue() {
    let storage = InMemoryStorage::new();
    let queue = queue_with(&storage, test_settings());
    storage.set_unavailable(true);

    let result = queue.enqueue(create("e1")).await;
    assert!(matches!(result, Err(BillioError::StorageError(_))));

    storage.set_unavailable(false);
    assert!(queue.is_empty().await.unwrap());
}

#[tokio::test]
async fn test_has_pending_for_and_clear() {
    let storage = InMemoryStorage::new();
    let queue = queue_with(&storage, test_settings());
    queue.enqueue(create("e1")).await.unwrap();
    queue.enqueue(SyncAction::DeleteGroup { id: "g9".to_string() }).await.unwrap();

    assert!(queue.has_pending_for("e1").await.unwrap());
    assert!(queue.has_pending_for("g9").await.unwrap());
    assert!(!queue.has_pending_for("e2").await.unwrap());
    assert_eq!(queue.len().await.unwrap(), 2);

    queue.clear().await.unwrap();
    assert!(queue.is_empty().await.unwrap());
}

#[tokio::test]
async fn test_storage_outage_mid_drain_keeps_partial_report() {
    let storage = InMemoryStorage::new();
    let queue = queue_with(&storage, test_settings());
    let remote = OutageRemote::new(&storage, "e1", "e2");
    let dropped = queue.enqueue(create("e1")).await.unwrap();
    queue.enqueue(create("e2")).await.unwrap();

    let report = queue.drain(&remote).await;

    assert_eq!(report.dropped.len(), 1);
    assert_eq!(report.dropped[0].action.id, dropped.id);
    assert!(report.confirmed.is_empty());
    assert!(matches!(report.interrupted, Some(BillioError::StorageError(_))));
    assert!(!report.is_clean());

    // e2 reached the remote but could not be removed, so it is sent again next time.
    storage.set_unavailable(false);
    let pending: Vec<String> = queue
        .pending()
        .await
        .unwrap()
        .iter()
        .map(|a| a.action.entity_id().to_string())
        .collect();
    assert_eq!(pending, vec!["e2"]);
}
