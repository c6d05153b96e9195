use billio_sync::config::{CONFIG, SyncSettings};
use billio_sync::core::models::{GroupMember, Money, Role};
use billio_sync::infrastructure::connectivity::in_memory::ManualConnectivity;
use billio_sync::infrastructure::logging::in_memory::InMemoryLogging;
use billio_sync::infrastructure::remote::in_memory::InMemoryRemote;
use billio_sync::infrastructure::storage::in_memory::InMemoryStorage;
use billio_sync::{ExpenseDraft, NetworkMonitor, SplitRequest, SyncService};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn member(id: &str, name: &str, role: Role) -> GroupMember {
    GroupMember {
        user_id: id.to_string(),
        display_name: name.to_string(),
        role,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&CONFIG.log_level))
        .init();
    info!("Starting with {:?}", *CONFIG);

    let connectivity = ManualConnectivity::new(false);
    let network = Arc::new(NetworkMonitor::attach(&connectivity).await?);
    let remote = InMemoryRemote::new();
    let service = Arc::new(SyncService::new(
        InMemoryStorage::new(),
        remote.clone(),
        InMemoryLogging::new(),
        Arc::clone(&network),
        SyncSettings::from_config(&CONFIG),
    ));
    let auto_sync = Arc::clone(&service).spawn_auto_sync();

    let group = service
        .create_group(
            "Lisbon trip".to_string(),
            "EUR".to_string(),
            vec![
                member("ana", "Ana", Role::Owner),
                member("ben", "Ben", Role::Member),
                member("caro", "Caro", Role::Member),
            ],
        )
        .await?;

    let today = Utc::now().date_naive();
    service
        .add_expense(ExpenseDraft {
            group_id: group.id.clone(),
            description: "Dinner".to_string(),
            amount: Money::parse("100.00")?,
            payer_id: "ana".to_string(),
            date: today,
            split: SplitRequest::Equal {
                members: vec!["ana".to_string(), "ben".to_string(), "caro".to_string()],
            },
            notes: None,
            receipt_url: None,
        })
        .await?;
    service
        .add_expense(ExpenseDraft {
            group_id: group.id.clone(),
            description: "Tram passes".to_string(),
            amount: Money::parse("45.00")?,
            payer_id: "ben".to_string(),
            date: today,
            split: SplitRequest::Shares {
                shares: vec![("ana".to_string(), 1), ("ben".to_string(), 1), ("caro".to_string(), 2)],
            },
            notes: Some("Caro took two rides".to_string()),
            receipt_url: None,
        })
        .await?;

    info!("Queued {} actions while offline", service.queue().len().await?);

    // The first remote call fails once to show the retry path.
    remote.fail_next(1).await;
    connectivity.set_online(true);
    while !service.queue().is_empty().await? {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    for balance in service.group_balances(&group.id).await? {
        info!(
            "{}: paid {}, owes {}, net {}",
            balance.member_id, balance.total_paid, balance.total_owed, balance.balance
        );
    }
    for suggestion in service.settlement_suggestions(&group.id).await? {
        info!(
            "{} pays {} {}",
            suggestion.from_member_id, suggestion.to_member_id, suggestion.amount
        );
    }
    info!("Remote calls: {:?}", remote.calls().await);

    auto_sync.abort();
    Ok(())
}
