use crate::core::errors::BillioError;
use crate::infrastructure::connectivity::{ConnectivityBackend, Listeners, Subscription};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::info;

struct MonitorState {
    online: watch::Sender<bool>,
    listeners: Arc<Listeners<bool>>,
}

impl MonitorState {
    fn set_online(&self, online: bool) -> bool {
        let previous = self.online.send_replace(online);
        if previous == online {
            return false;
        }
        info!("Network is now {}", if online { "online" } else { "offline" });
        self.listeners.notify(online);
        online
    }
}

/// Current connectivity plus change notifications. Offline to online
/// transitions are what trigger a queue drain.
pub struct NetworkMonitor {
    state: Arc<MonitorState>,
    backend_subscription: Mutex<Option<Subscription>>,
}

impl NetworkMonitor {
    pub fn new(initially_online: bool) -> Self {
        let (online, _) = watch::channel(initially_online);
        NetworkMonitor {
            state: Arc::new(MonitorState {
                online,
                listeners: Listeners::new(),
            }),
            backend_subscription: Mutex::new(None),
        }
    }

    /// Seeds the monitor from the backend's current state and follows its
    /// changes for as long as the monitor lives.
    pub async fn attach<B: ConnectivityBackend>(backend: &B) -> Result<Self, BillioError> {
        let initial = backend.fetch_state().await?;
        let monitor = NetworkMonitor::new(initial.online);
        let state = Arc::clone(&monitor.state);
        let subscription = backend.on_change(Box::new(move |network| {
            state.set_online(network.online);
        }));
        *monitor
            .backend_subscription
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(subscription);
        Ok(monitor)
    }

    pub fn is_online(&self) -> bool {
        *self.state.online.borrow()
    }

    /// Records a new state. Returns true only for an offline to online
    /// transition.
    pub fn set_online(&self, online: bool) -> bool {
        self.state.set_online(online)
    }

    /// Calls `callback` with the new state on every transition.
    pub fn subscribe(&self, callback: impl Fn(bool) + Send + Sync + 'static) -> Subscription {
        self.state.listeners.subscribe(callback)
    }

    /// Receiver for tasks that await transitions.
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.state.online.subscribe()
    }
}
