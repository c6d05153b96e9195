use crate::config::SyncSettings;
use crate::constants::{
    EXPENSE_ADDED, EXPENSE_DELETED, EXPENSE_UPDATED, GROUP_CREATED, GROUP_DELETED, GROUP_UPDATED,
    MAX_DESCRIPTION_LENGTH, MAX_GROUP_NAME_LENGTH, RECORD_RECONCILED, SYNC_ACTION_CONFIRMED, SYNC_ACTION_DROPPED,
    SYNC_ACTION_ENQUEUED, SYNC_ACTION_RETRIED,
};
use crate::core::balances::BalanceAggregator;
use crate::core::conflict::{ConflictResolver, ConflictStrategy};
use crate::core::errors::{BillioError, FieldError};
use crate::core::models::{
    AppLog, Balance, Expense, Group, GroupMember, Money, QueuedAction, RemoteRecord, SettlementSuggestion, Split,
    SyncAction,
};
use crate::core::network::NetworkMonitor;
use crate::core::settlement::SettlementPlanner;
use crate::core::split::{SplitCalculator, SplitRequest};
use crate::core::sync_queue::{ConfirmedAction, DrainReport, DroppedAction, SyncQueue};
use crate::infrastructure::cache::LocalCache;
use crate::infrastructure::logging::LoggingService;
use crate::infrastructure::remote::RemoteApi;
use crate::infrastructure::storage::PersistenceBackend;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Everything needed to record or edit an expense. Splits are derived from
/// `split`, never supplied directly.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExpenseDraft {
    pub group_id: String,
    pub description: String,
    pub amount: Money,
    pub payer_id: String,
    pub date: NaiveDate,
    pub split: SplitRequest,
    pub notes: Option<String>,
    pub receipt_url: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GroupUpdate {
    pub name: Option<String>,
    pub members: Option<Vec<GroupMember>>,
    pub archived: Option<bool>,
}

/// Offline-first facade over the local cache, the sync queue and the
/// split/balance/settlement engines.
pub struct SyncService<P: PersistenceBackend, R: RemoteApi, L: LoggingService> {
    cache: LocalCache<P>,
    queue: SyncQueue<P>,
    remote: R,
    logging: L,
    network: Arc<NetworkMonitor>,
    settings: SyncSettings,
    // Serializes every write to the local cache.
    write_lock: Mutex<()>,
    failures: broadcast::Sender<DroppedAction>,
}

impl<P: PersistenceBackend, R: RemoteApi, L: LoggingService> SyncService<P, R, L> {
    pub fn new(storage: P, remote: R, logging: L, network: Arc<NetworkMonitor>, settings: SyncSettings) -> Self {
        let storage = Arc::new(storage);
        let (failures, _) = broadcast::channel(64);
        SyncService {
            cache: LocalCache::new(Arc::clone(&storage)),
            queue: SyncQueue::new(storage, settings.clone()),
            remote,
            logging,
            network,
            settings,
            write_lock: Mutex::new(()),
            failures,
        }
    }

    pub fn cache(&self) -> &LocalCache<P> {
        &self.cache
    }

    pub fn queue(&self) -> &SyncQueue<P> {
        &self.queue
    }

    pub fn network(&self) -> &NetworkMonitor {
        &self.network
    }

    /// Actions dropped after exhausting their retries, for surfacing to the
    /// user as failed-to-sync notices.
    pub fn failures(&self) -> broadcast::Receiver<DroppedAction> {
        self.failures.subscribe()
    }

    async fn log_and_audit(
        &self,
        action: &str,
        details: serde_json::Value,
        entity_id: Option<&str>,
    ) -> Result<(), BillioError> {
        self.logging.log_action(action, details, entity_id).await
    }

    fn validate_string_input(&self, field: &str, value: &str, max_length: usize) -> Result<(), BillioError> {
        if value.trim().is_empty() {
            return Err(BillioError::InvalidInput(
                field.to_string(),
                FieldError {
                    field: field.to_string(),
                    title: format!("Invalid {}", field),
                    description: format!("{} cannot be empty", field),
                },
            ));
        }
        if value.chars().count() > max_length {
            return Err(BillioError::InvalidInput(
                field.to_string(),
                FieldError {
                    field: field.to_string(),
                    title: format!("{} Too Long", field),
                    description: format!("{} cannot exceed {} characters", field, max_length),
                },
            ));
        }
        if value.chars().any(|c| c.is_control()) {
            return Err(BillioError::InvalidInput(
                field.to_string(),
                FieldError {
                    field: field.to_string(),
                    title: format!("Invalid {}", field),
                    description: format!("{} contains invalid characters", field),
                },
            ));
        }
        Ok(())
    }

    fn validate_currency(&self, currency: &str) -> Result<(), BillioError> {
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(BillioError::InvalidInput(
                "currency".to_string(),
                FieldError {
                    field: "currency".to_string(),
                    title: "Invalid currency".to_string(),
                    description: format!("{} is not a three-letter ISO 4217 code", currency),
                },
            ));
        }
        Ok(())
    }

    async fn cached_group(&self, group_id: &str) -> Result<Group, BillioError> {
        self.cache
            .get_group(group_id)
            .await
            .ok_or_else(|| BillioError::GroupNotFound(group_id.to_string()))
    }

    async fn enqueue(&self, action: SyncAction) -> Result<QueuedAction, BillioError> {
        let queued = self.queue.enqueue(action).await?;
        self.log_and_audit(
            SYNC_ACTION_ENQUEUED,
            json!({ "action_id": queued.id, "type": queued.action.kind() }),
            Some(queued.action.entity_id()),
        )
        .await?;
        Ok(queued)
    }

    /// Cache writes are best effort: the mutation is still queued for the
    /// remote when the local copy cannot be written.
    fn note_cache_failure(result: Result<(), BillioError>, what: &str) {
        if let Err(e) = result {
            warn!("Local cache write for {} failed: {}", what, e);
        }
    }

    /// Stores a freshly planned suggestion snapshot, or drops the snapshot
    /// when planning failed so no stale or empty plan is served.
    async fn store_plan(
        &self,
        group_id: &str,
        plan: Result<Vec<SettlementSuggestion>, BillioError>,
    ) -> Result<Vec<SettlementSuggestion>, BillioError> {
        match plan {
            Ok(suggestions) => {
                Self::note_cache_failure(
                    self.cache.save_settlements(group_id, &suggestions).await,
                    "settlement suggestions",
                );
                Ok(suggestions)
            }
            Err(e) => {
                error!("No settlement suggestions for group {}: {}", group_id, e);
                Self::note_cache_failure(
                    self.cache.remove_settlements(group_id).await,
                    "settlement suggestions removal",
                );
                Err(e)
            }
        }
    }

    /// Recomputes and caches balances and settlement suggestions for a group.
    /// Caller holds the write lock.
    async fn refresh_views(&self, group_id: &str) -> Result<(), BillioError> {
        let Some(group) = self.cache.get_group(group_id).await else {
            return Ok(());
        };
        let expenses = self.cache.get_expenses(group_id).await;
        let balances = BalanceAggregator::group_balances(&group, &expenses);
        Self::note_cache_failure(self.cache.save_balances(group_id, &balances).await, "balances");

        self.store_plan(group_id, SettlementPlanner::plan(group_id, &balances))
            .await
            .map(|_| ())
    }

    /// After a local mutation the expense is cached and its action queued
    /// whatever happens to the derived views.
    async fn refresh_views_after_write(&self, group_id: &str) {
        if let Err(e) = self.refresh_views(group_id).await {
            warn!("Views for group {} are incomplete: {}", group_id, e);
        }
    }

    // GROUPS

    pub async fn get_groups(&self) -> Vec<Group> {
        self.cache.get_groups().await
    }

    pub async fn create_group(
        &self,
        name: String,
        currency: String,
        members: Vec<GroupMember>,
    ) -> Result<Group, BillioError> {
        self.validate_string_input("name", &name, MAX_GROUP_NAME_LENGTH)?;
        self.validate_currency(&currency)?;

        let group = Group {
            id: Uuid::new_v4().to_string(),
            name,
            currency,
            archived: false,
            members,
            created_at: Utc::now(),
            updated_at: None,
        };

        {
            let _write = self.write_lock.lock().await;
            Self::note_cache_failure(self.cache.upsert_group(&group).await, "group");
            self.enqueue(SyncAction::CreateGroup(group.clone())).await?;
        }

        info!("Created group {} ({})", group.name, group.id);
        self.log_and_audit(
            GROUP_CREATED,
            json!({ "group_id": group.id, "name": group.name, "currency": group.currency }),
            Some(group.id.as_str()),
        )
        .await?;
        Ok(group)
    }

    pub async fn update_group(&self, group_id: &str, update: GroupUpdate) -> Result<Group, BillioError> {
        if let Some(ref name) = update.name {
            self.validate_string_input("name", name, MAX_GROUP_NAME_LENGTH)?;
        }

        let _write = self.write_lock.lock().await;
        let mut group = self.cached_group(group_id).await?;
        if let Some(name) = update.name {
            group.name = name;
        }
        if let Some(members) = update.members {
            group.members = members;
        }
        if let Some(archived) = update.archived {
            group.archived = archived;
        }
        group.updated_at = Some(Utc::now());

        Self::note_cache_failure(self.cache.upsert_group(&group).await, "group");
        self.refresh_views_after_write(group_id).await;
        self.enqueue(SyncAction::UpdateGroup {
            id: group.id.clone(),
            payload: group.clone(),
        })
        .await?;

        self.log_and_audit(
            GROUP_UPDATED,
            json!({ "group_id": group.id, "name": group.name, "archived": group.archived }),
            Some(group.id.as_str()),
        )
        .await?;
        Ok(group)
    }

    pub async fn archive_group(&self, group_id: &str) -> Result<Group, BillioError> {
        self.update_group(
            group_id,
            GroupUpdate {
                archived: Some(true),
                ..GroupUpdate::default()
            },
        )
        .await
    }

    pub async fn delete_group(&self, group_id: &str) -> Result<(), BillioError> {
        let _write = self.write_lock.lock().await;
        let group = self.cached_group(group_id).await?;
        Self::note_cache_failure(self.cache.remove_group(group_id).await, "group removal");
        self.enqueue(SyncAction::DeleteGroup { id: group.id.clone() }).await?;

        self.log_and_audit(
            GROUP_DELETED,
            json!({ "group_id": group.id, "name": group.name }),
            Some(group.id.as_str()),
        )
        .await?;
        Ok(())
    }

    // EXPENSES

    pub async fn get_expenses(&self, group_id: &str) -> Vec<Expense> {
        self.cache.get_expenses(group_id).await
    }

    /// Computes the splits for `draft`, checking the payer and every split
    /// member against the group roster.
    fn build_splits(&self, group: &Group, draft: &ExpenseDraft) -> Result<Vec<Split>, BillioError> {
        self.validate_string_input("description", &draft.description, MAX_DESCRIPTION_LENGTH)?;
        if !group.is_member(&draft.payer_id) {
            return Err(BillioError::NotGroupMember(draft.payer_id.clone()));
        }
        if let Some(outsider) = draft.split.member_ids().into_iter().find(|m| !group.is_member(m)) {
            return Err(BillioError::NotGroupMember(outsider.to_string()));
        }
        Ok(SplitCalculator::calculate(draft.amount, &draft.split)?)
    }

    /// Records an expense locally and queues it for the remote. Validation
    /// errors are returned before anything is cached or queued.
    pub async fn add_expense(&self, draft: ExpenseDraft) -> Result<Expense, BillioError> {
        let group = self.cached_group(&draft.group_id).await?;
        let splits = self.build_splits(&group, &draft)?;

        let expense = Expense {
            id: Uuid::new_v4().to_string(),
            group_id: group.id.clone(),
            description: draft.description,
            amount: draft.amount,
            currency: group.currency.clone(),
            date: draft.date,
            payer_id: draft.payer_id,
            split_type: draft.split.split_type(),
            splits,
            notes: draft.notes,
            receipt_url: draft.receipt_url,
            created_at: Utc::now(),
            updated_at: None,
        };

        {
            let _write = self.write_lock.lock().await;
            Self::note_cache_failure(self.cache.upsert_expense(&expense).await, "expense");
            self.refresh_views_after_write(&expense.group_id).await;
            self.enqueue(SyncAction::CreateExpense(expense.clone())).await?;
        }

        debug!("Expense {} recorded with {} splits", expense.id, expense.splits.len());
        self.log_and_audit(
            EXPENSE_ADDED,
            json!({
                "expense_id": expense.id,
                "group_id": expense.group_id,
                "amount": expense.amount,
                "payer_id": expense.payer_id
            }),
            Some(expense.id.as_str()),
        )
        .await?;
        Ok(expense)
    }

    pub async fn update_expense(&self, expense_id: &str, draft: ExpenseDraft) -> Result<Expense, BillioError> {
        let group = self.cached_group(&draft.group_id).await?;
        let existing = self
            .cache
            .get_expense(&draft.group_id, expense_id)
            .await
            .ok_or_else(|| BillioError::ExpenseNotFound(expense_id.to_string()))?;
        let splits = self.build_splits(&group, &draft)?;

        let expense = Expense {
            description: draft.description,
            amount: draft.amount,
            date: draft.date,
            payer_id: draft.payer_id,
            split_type: draft.split.split_type(),
            splits,
            notes: draft.notes,
            receipt_url: draft.receipt_url,
            updated_at: Some(Utc::now()),
            ..existing
        };

        {
            let _write = self.write_lock.lock().await;
            Self::note_cache_failure(self.cache.upsert_expense(&expense).await, "expense");
            self.refresh_views_after_write(&expense.group_id).await;
            self.enqueue(SyncAction::UpdateExpense {
                id: expense.id.clone(),
                payload: expense.clone(),
            })
            .await?;
        }

        self.log_and_audit(
            EXPENSE_UPDATED,
            json!({ "expense_id": expense.id, "group_id": expense.group_id, "amount": expense.amount }),
            Some(expense.id.as_str()),
        )
        .await?;
        Ok(expense)
    }

    pub async fn delete_expense(&self, group_id: &str, expense_id: &str) -> Result<(), BillioError> {
        {
            let _write = self.write_lock.lock().await;
            if self.cache.get_expense(group_id, expense_id).await.is_none() {
                return Err(BillioError::ExpenseNotFound(expense_id.to_string()));
            }
            Self::note_cache_failure(self.cache.remove_expense(group_id, expense_id).await, "expense removal");
            self.refresh_views_after_write(group_id).await;
            self.enqueue(SyncAction::DeleteExpense {
                id: expense_id.to_string(),
                group_id: group_id.to_string(),
            })
            .await?;
        }

        self.log_and_audit(
            EXPENSE_DELETED,
            json!({ "expense_id": expense_id, "group_id": group_id }),
            Some(expense_id),
        )
        .await?;
        Ok(())
    }

    // BALANCES & SETTLEMENTS

    pub async fn group_balances(&self, group_id: &str) -> Result<Vec<Balance>, BillioError> {
        let group = self.cached_group(group_id).await?;
        let expenses = self.cache.get_expenses(group_id).await;
        Ok(BalanceAggregator::group_balances(&group, &expenses))
    }

    pub async fn member_balance(&self, group_id: &str, member_id: &str) -> Result<Balance, BillioError> {
        self.cached_group(group_id).await?;
        let expenses = self.cache.get_expenses(group_id).await;
        Ok(BalanceAggregator::member_balance(group_id, member_id, &expenses))
    }

    /// Net position of a member over every cached group in `currency`.
    pub async fn cross_group_balance(&self, member_id: &str, currency: &str) -> Money {
        let mut balances = Vec::new();
        for group in self
            .cache
            .get_groups()
            .await
            .into_iter()
            .filter(|g| g.currency == currency)
        {
            let expenses = self.cache.get_expenses(&group.id).await;
            balances.push(BalanceAggregator::member_balance(&group.id, member_id, &expenses));
        }
        BalanceAggregator::cross_group_balance(member_id, &balances)
    }

    /// Plans settlements from the current balances and caches the result as
    /// the group's suggestion snapshot.
    pub async fn settlement_suggestions(&self, group_id: &str) -> Result<Vec<SettlementSuggestion>, BillioError> {
        let balances = self.group_balances(group_id).await?;
        let plan = SettlementPlanner::plan(group_id, &balances);
        let _write = self.write_lock.lock().await;
        self.store_plan(group_id, plan).await
    }

    // SYNC

    pub async fn last_synced_at(&self) -> Option<DateTime<Utc>> {
        self.cache.last_synced_at().await
    }

    /// Drains the queue if the network is up; offline this is a no-op that
    /// returns an empty report.
    ///
    /// When the cycle stops early, every outcome recorded before the error is
    /// still applied, audited and published, and the error comes back as
    /// [`BillioError::SyncInterrupted`] naming the dropped actions.
    pub async fn sync_now(&self) -> Result<DrainReport, BillioError> {
        if !self.network.is_online() {
            debug!("Offline, leaving sync queue untouched");
            return Ok(DrainReport::default());
        }

        let report = self.queue.drain(&self.remote).await;
        let applied = self.apply_report(&report).await;
        let cause = match report.interrupted.clone() {
            Some(e) => e,
            None => match applied {
                Ok(()) => return Ok(report),
                Err(e) => e,
            },
        };
        Err(BillioError::SyncInterrupted {
            confirmed: report.confirmed.len(),
            dropped: report.dropped.iter().map(|d| d.action.id.clone()).collect(),
            cause: Box::new(cause),
        })
    }

    fn keep_first(first_error: &mut Option<BillioError>, result: Result<(), BillioError>) {
        if let Err(e) = result {
            warn!("Sync report step failed: {}", e);
            first_error.get_or_insert(e);
        }
    }

    /// Publishes dropped actions, writes confirmed records back through the
    /// conflict resolver and audits the cycle. Every step runs even when an
    /// earlier one fails; the first error is returned at the end.
    async fn apply_report(&self, report: &DrainReport) -> Result<(), BillioError> {
        let strategy = self.settings.conflict_strategy;
        let mut first_error = None;

        for dropped in &report.dropped {
            // Nobody listening is fine; the audit trail still has it.
            let _ = self.failures.send(dropped.clone());
            let audited = self
                .log_and_audit(
                    SYNC_ACTION_DROPPED,
                    json!({
                        "action_id": dropped.action.id,
                        "type": dropped.action.action.kind(),
                        "error": dropped.error.to_string()
                    }),
                    Some(dropped.action.action.entity_id()),
                )
                .await;
            Self::keep_first(&mut first_error, audited);
        }

        {
            let _write = self.write_lock.lock().await;
            let mut touched_groups = BTreeSet::new();
            for confirmed in &report.confirmed {
                let written = self.write_back(confirmed, strategy, &mut touched_groups).await;
                Self::keep_first(&mut first_error, written);
            }
            for group_id in &touched_groups {
                let refreshed = self.refresh_views(group_id).await;
                Self::keep_first(&mut first_error, refreshed);
            }
            if !report.confirmed.is_empty() {
                Self::note_cache_failure(self.cache.set_last_synced_at(Utc::now()).await, "last sync time");
            }
        }

        for confirmed in &report.confirmed {
            let audited = self
                .log_and_audit(
                    SYNC_ACTION_CONFIRMED,
                    json!({
                        "action_id": confirmed.action.id,
                        "type": confirmed.action.action.kind(),
                        "retry_count": confirmed.action.retry_count
                    }),
                    Some(confirmed.action.action.entity_id()),
                )
                .await;
            Self::keep_first(&mut first_error, audited);
        }
        for retried in &report.retried {
            let audited = self
                .log_and_audit(
                    SYNC_ACTION_RETRIED,
                    json!({
                        "action_id": retried.action_id,
                        "type": retried.kind,
                        "retry_count": retried.retry_count,
                        "error": retried.error
                    }),
                    None,
                )
                .await;
            Self::keep_first(&mut first_error, audited);
        }

        first_error.map_or(Ok(()), Err)
    }

    /// Caller holds the write lock.
    async fn write_back(
        &self,
        confirmed: &ConfirmedAction,
        strategy: ConflictStrategy,
        touched_groups: &mut BTreeSet<String>,
    ) -> Result<(), BillioError> {
        let entity_id = confirmed.action.action.entity_id();
        // A later queued edit of the same entity supersedes this record.
        if self.queue.has_pending_for(entity_id).await? {
            debug!("Skipping write-back of {}, newer action pending", entity_id);
            return Ok(());
        }
        match &confirmed.record {
            RemoteRecord::Expense(remote) => {
                let merged = self.merge_expense(remote, strategy).await?;
                touched_groups.insert(merged.group_id);
            }
            RemoteRecord::Group(remote) => {
                let merged = self.merge_group(remote, strategy).await?;
                touched_groups.insert(merged.id);
            }
            RemoteRecord::ExpenseDeleted { id, group_id } => {
                Self::note_cache_failure(self.cache.remove_expense(group_id, id).await, "expense removal");
                touched_groups.insert(group_id.clone());
            }
            RemoteRecord::GroupDeleted { id } => {
                Self::note_cache_failure(self.cache.remove_group(id).await, "group removal");
            }
        }
        Ok(())
    }

    /// Remote expenses whose splits do not cover the amount never reach the
    /// cache.
    fn check_balanced(expense: &Expense) -> Result<(), BillioError> {
        if expense.is_balanced() {
            return Ok(());
        }
        Err(BillioError::BalanceIntegrity {
            group_id: expense.group_id.clone(),
            residual: expense.amount - expense.split_total(),
        })
    }

    async fn merge_expense(&self, remote: &Expense, strategy: ConflictStrategy) -> Result<Expense, BillioError> {
        Self::check_balanced(remote)?;
        let merged = match self.cache.get_expense(&remote.group_id, &remote.id).await {
            Some(local) => ConflictResolver::resolve(&local, remote, strategy)?,
            None => remote.clone(),
        };
        Self::note_cache_failure(self.cache.upsert_expense(&merged).await, "expense");
        Ok(merged)
    }

    async fn merge_group(&self, remote: &Group, strategy: ConflictStrategy) -> Result<Group, BillioError> {
        let merged = match self.cache.get_group(&remote.id).await {
            Some(local) => ConflictResolver::resolve(&local, remote, strategy)?,
            None => remote.clone(),
        };
        Self::note_cache_failure(self.cache.upsert_group(&merged).await, "group");
        Ok(merged)
    }

    /// Reconciles a freshly fetched expense with the cached copy and
    /// recomputes the group's balances and suggestions.
    pub async fn reconcile_expense(&self, remote: Expense, strategy: ConflictStrategy) -> Result<Expense, BillioError> {
        let merged = {
            let _write = self.write_lock.lock().await;
            let merged = self.merge_expense(&remote, strategy).await?;
            self.refresh_views(&merged.group_id).await?;
            merged
        };
        self.log_and_audit(
            RECORD_RECONCILED,
            json!({ "expense_id": merged.id, "strategy": strategy }),
            Some(merged.id.as_str()),
        )
        .await?;
        Ok(merged)
    }

    pub async fn reconcile_group(&self, remote: Group, strategy: ConflictStrategy) -> Result<Group, BillioError> {
        let merged = {
            let _write = self.write_lock.lock().await;
            let merged = self.merge_group(&remote, strategy).await?;
            self.refresh_views(&merged.id).await?;
            merged
        };
        self.log_and_audit(
            RECORD_RECONCILED,
            json!({ "group_id": merged.id, "strategy": strategy }),
            Some(merged.id.as_str()),
        )
        .await?;
        Ok(merged)
    }

    /// Replaces the cached expense list of a group with a fetched one.
    ///
    /// Records on both sides go through the resolver. Cached expenses the
    /// remote does not know about survive only while a queued action still
    /// references them. A fetched expense that does not balance rejects the
    /// whole list before the cache is touched.
    pub async fn refresh_group(
        &self,
        group_id: &str,
        remote_expenses: Vec<Expense>,
        strategy: ConflictStrategy,
    ) -> Result<Vec<Expense>, BillioError> {
        for remote in &remote_expenses {
            Self::check_balanced(remote)?;
        }

        let _write = self.write_lock.lock().await;
        self.cached_group(group_id).await?;
        let local_expenses = self.cache.get_expenses(group_id).await;

        let mut refreshed = Vec::with_capacity(remote_expenses.len());
        for remote in remote_expenses.iter().filter(|e| e.group_id == group_id) {
            let merged = match local_expenses.iter().find(|l| l.id == remote.id) {
                Some(local) => ConflictResolver::resolve(local, remote, strategy)?,
                None => {
                    // Missing locally with a queued action means a local delete is in flight.
                    if self.queue.has_pending_for(&remote.id).await? {
                        continue;
                    }
                    remote.clone()
                }
            };
            refreshed.push(merged);
        }
        for local in &local_expenses {
            if refreshed.iter().any(|e| e.id == local.id) {
                continue;
            }
            if self.queue.has_pending_for(&local.id).await? {
                refreshed.push(local.clone());
            } else {
                debug!("Dropping expense {} no longer known remotely", local.id);
            }
        }

        self.cache.save_expenses(group_id, &refreshed).await?;
        Self::note_cache_failure(self.cache.set_last_synced_at(Utc::now()).await, "last sync time");
        info!("Refreshed group {} with {} expenses", group_id, refreshed.len());
        self.refresh_views(group_id).await?;
        Ok(refreshed)
    }

    /// Audit trail of one expense or group. A trailing enqueue with no
    /// confirmation after it marks the record as not yet synced.
    pub async fn sync_history(&self, entity_id: &str) -> Result<Vec<AppLog>, BillioError> {
        self.logging.get_entity_logs(entity_id).await
    }
}

impl<P, R, L> SyncService<P, R, L>
where
    P: PersistenceBackend + 'static,
    R: RemoteApi + 'static,
    L: LoggingService + 'static,
{
    /// Drains the queue on every offline to online transition. The task owns
    /// the service, so it runs until the returned handle is aborted.
    pub fn spawn_auto_sync(self: Arc<Self>) -> JoinHandle<()> {
        let mut online = self.network.watch();
        tokio::spawn(async move {
            let mut was_online = *online.borrow_and_update();
            while online.changed().await.is_ok() {
                let now_online = *online.borrow_and_update();
                if now_online && !was_online {
                    match self.sync_now().await {
                        Ok(report) => info!(
                            "Auto sync finished: {} confirmed, {} dropped",
                            report.confirmed.len(),
                            report.dropped.len()
                        ),
                        Err(e) => error!("Auto sync failed: {}", e),
                    }
                }
                was_online = now_online;
            }
        })
    }
}
