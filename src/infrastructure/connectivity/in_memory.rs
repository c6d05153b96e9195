use crate::core::errors::BillioError;
use crate::infrastructure::connectivity::{ConnectivityBackend, Listeners, NetworkState, Subscription};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Connectivity source flipped by hand, for tests and the demo.
#[derive(Clone)]
pub struct ManualConnectivity {
    online: Arc<AtomicBool>,
    listeners: Arc<Listeners<NetworkState>>,
}

impl ManualConnectivity {
    pub fn new(online: bool) -> Self {
        ManualConnectivity {
            online: Arc::new(AtomicBool::new(online)),
            listeners: Listeners::new(),
        }
    }

    /// Updates the state and notifies subscribers if it changed.
    pub fn set_online(&self, online: bool) {
        let previous = self.online.swap(online, Ordering::SeqCst);
        if previous != online {
            self.listeners.notify(NetworkState { online });
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }
}

#[async_trait]
impl ConnectivityBackend for ManualConnectivity {
    async fn fetch_state(&self) -> Result<NetworkState, BillioError> {
        Ok(NetworkState {
            online: self.online.load(Ordering::SeqCst),
        })
    }

    fn on_change(&self, callback: Box<dyn Fn(NetworkState) + Send + Sync>) -> Subscription {
        self.listeners.subscribe(callback)
    }
}
