//! Durable FIFO of pending remote mutations.
//!
//! Per action: `Pending -> Processing -> Succeeded (removed)`, or on failure
//! back to `Pending` with `retry_count + 1`, or `Dropped (removed, reported)`
//! once the retry cap is reached. The queue is never reordered: a failing
//! head action is retried (after a backoff) before anything behind it is
//! attempted, so an update never reaches the remote before its create.
//! Actions for the same entity are not coalesced.

use crate::config::SyncSettings;
use crate::core::errors::BillioError;
use crate::core::models::{QueuedAction, RemoteRecord, SyncAction};
use crate::infrastructure::cache::cache_keys::SYNC_QUEUE_KEY;
use crate::infrastructure::remote::RemoteApi;
use crate::infrastructure::storage::PersistenceBackend;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

#[derive(Clone, Debug)]
pub struct ConfirmedAction {
    /// The action as it stood when the successful attempt was made.
    pub action: QueuedAction,
    pub record: RemoteRecord,
}

#[derive(Clone, Debug)]
pub struct RetriedAttempt {
    pub action_id: String,
    pub kind: &'static str,
    pub retry_count: u32,
    pub error: String,
}

#[derive(Clone, Debug)]
pub struct DroppedAction {
    pub action: QueuedAction,
    /// Always [`BillioError::RetriesExhausted`].
    pub error: BillioError,
}

/// Outcome of one drain cycle.
///
/// A cycle cut short by a persistence error still reports everything it did
/// before the error, which is kept in `interrupted`.
#[derive(Clone, Debug, Default)]
pub struct DrainReport {
    pub confirmed: Vec<ConfirmedAction>,
    pub retried: Vec<RetriedAttempt>,
    pub dropped: Vec<DroppedAction>,
    pub interrupted: Option<BillioError>,
}

impl DrainReport {
    pub fn is_clean(&self) -> bool {
        self.dropped.is_empty() && self.interrupted.is_none()
    }
}

pub struct SyncQueue<P: PersistenceBackend> {
    backend: Arc<P>,
    settings: SyncSettings,
    // Guards each read-modify-write of the persisted queue.
    queue_lock: Mutex<()>,
    // Only one drain loop runs at a time.
    drain_lock: Mutex<()>,
}

impl<P: PersistenceBackend> SyncQueue<P> {
    pub fn new(backend: Arc<P>, settings: SyncSettings) -> Self {
        SyncQueue {
            backend,
            settings,
            queue_lock: Mutex::new(()),
            drain_lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<Vec<QueuedAction>, BillioError> {
        match self.backend.get(SYNC_QUEUE_KEY).await? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(Vec::new()),
        }
    }

    async fn store(&self, actions: &[QueuedAction]) -> Result<(), BillioError> {
        if actions.is_empty() {
            return self.backend.remove(SYNC_QUEUE_KEY).await;
        }
        let bytes = serde_json::to_vec(actions)?;
        self.backend.set(SYNC_QUEUE_KEY, bytes).await
    }

    /// Appends `action` with a fresh id and `retry_count = 0`. Safe to call
    /// while a drain is in progress; the running drain picks it up.
    pub async fn enqueue(&self, action: SyncAction) -> Result<QueuedAction, BillioError> {
        let queued = QueuedAction::new(action);
        let _guard = self.queue_lock.lock().await;
        let mut actions = self.load().await?;
        actions.push(queued.clone());
        self.store(&actions).await?;
        debug!(
            "Enqueued {} for {} as {} ({} pending)",
            queued.action.kind(),
            queued.action.entity_id(),
            queued.id,
            actions.len()
        );
        Ok(queued)
    }

    pub async fn pending(&self) -> Result<Vec<QueuedAction>, BillioError> {
        let _guard = self.queue_lock.lock().await;
        self.load().await
    }

    pub async fn len(&self) -> Result<usize, BillioError> {
        Ok(self.pending().await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool, BillioError> {
        Ok(self.pending().await?.is_empty())
    }

    pub async fn has_pending_for(&self, entity_id: &str) -> Result<bool, BillioError> {
        Ok(self
            .pending()
            .await?
            .iter()
            .any(|a| a.action.entity_id() == entity_id))
    }

    pub async fn clear(&self) -> Result<(), BillioError> {
        let _guard = self.queue_lock.lock().await;
        self.store(&[]).await
    }

    async fn head(&self) -> Result<Option<QueuedAction>, BillioError> {
        let _guard = self.queue_lock.lock().await;
        Ok(self.load().await?.into_iter().next())
    }

    async fn remove(&self, action_id: &str) -> Result<(), BillioError> {
        let _guard = self.queue_lock.lock().await;
        let mut actions = self.load().await?;
        actions.retain(|a| a.id != action_id);
        self.store(&actions).await
    }

    async fn set_retry_count(&self, action_id: &str, retry_count: u32) -> Result<(), BillioError> {
        let _guard = self.queue_lock.lock().await;
        let mut actions = self.load().await?;
        if let Some(action) = actions.iter_mut().find(|a| a.id == action_id) {
            action.retry_count = retry_count;
        }
        self.store(&actions).await
    }

    /// Sends queued actions to `remote` one at a time, in enqueue order,
    /// until the queue is empty.
    ///
    /// Remote errors never abort the drain: they are retried and, past the
    /// cap, reported in [`DrainReport::dropped`]. A persistence error ends the
    /// cycle and is returned in [`DrainReport::interrupted`] together with the
    /// outcomes recorded so far.
    pub async fn drain<R: RemoteApi + ?Sized>(&self, remote: &R) -> DrainReport {
        let _drain = self.drain_lock.lock().await;
        let mut report = DrainReport::default();
        if let Err(e) = self.drain_into(remote, &mut report).await {
            error!(
                "Drain interrupted after {} confirmed and {} dropped actions: {}",
                report.confirmed.len(),
                report.dropped.len(),
                e
            );
            report.interrupted = Some(e);
        }
        report
    }

    async fn drain_into<R: RemoteApi + ?Sized>(&self, remote: &R, report: &mut DrainReport) -> Result<(), BillioError> {
        while let Some(queued) = self.head().await? {
            debug!("Processing {} ({})", queued.id, queued.action.kind());
            match dispatch(remote, &queued.action).await {
                Ok(record) => {
                    self.remove(&queued.id).await?;
                    info!("Synced {} for {}", queued.action.kind(), queued.action.entity_id());
                    report.confirmed.push(ConfirmedAction { action: queued, record });
                }
                Err(e) => {
                    let retry_count = queued.retry_count + 1;
                    if retry_count >= self.settings.max_retries {
                        self.remove(&queued.id).await?;
                        error!(
                            "Dropping {} for {} after {} attempts: {}",
                            queued.action.kind(),
                            queued.action.entity_id(),
                            retry_count,
                            e
                        );
                        report.dropped.push(DroppedAction {
                            error: BillioError::RetriesExhausted {
                                action_id: queued.id.clone(),
                                attempts: retry_count,
                                last_error: e.to_string(),
                            },
                            action: queued,
                        });
                    } else {
                        self.set_retry_count(&queued.id, retry_count).await?;
                        let delay = self.settings.backoff_for(retry_count);
                        warn!(
                            "Attempt {} of {} for {} failed: {}; retrying in {:?}",
                            retry_count,
                            self.settings.max_retries,
                            queued.id,
                            e,
                            delay
                        );
                        report.retried.push(RetriedAttempt {
                            action_id: queued.id.clone(),
                            kind: queued.action.kind(),
                            retry_count,
                            error: e.to_string(),
                        });
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
        Ok(())
    }
}

async fn dispatch<R: RemoteApi + ?Sized>(remote: &R, action: &SyncAction) -> Result<RemoteRecord, BillioError> {
    match action {
        SyncAction::CreateExpense(expense) => remote.create_expense(expense).await.map(RemoteRecord::Expense),
        SyncAction::UpdateExpense { id, payload } => remote.update_expense(id, payload).await.map(RemoteRecord::Expense),
        SyncAction::DeleteExpense { id, group_id } => {
            remote.delete_expense(id).await?;
            Ok(RemoteRecord::ExpenseDeleted {
                id: id.clone(),
                group_id: group_id.clone(),
            })
        }
        SyncAction::CreateGroup(group) => remote.create_group(group).await.map(RemoteRecord::Group),
        SyncAction::UpdateGroup { id, payload } => remote.update_group(id, payload).await.map(RemoteRecord::Group),
        SyncAction::DeleteGroup { id } => {
            remote.delete_group(id).await?;
            Ok(RemoteRecord::GroupDeleted { id: id.clone() })
        }
    }
}
