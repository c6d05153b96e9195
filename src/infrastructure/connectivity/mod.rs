pub mod in_memory;

use crate::core::errors::BillioError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkState {
    pub online: bool,
}

/// Platform connectivity source, implemented by the host adapter.
#[async_trait]
pub trait ConnectivityBackend: Send + Sync {
    async fn fetch_state(&self) -> Result<NetworkState, BillioError>;
    fn on_change(&self, callback: Box<dyn Fn(NetworkState) + Send + Sync>) -> Subscription;
}

/// Handle returned by a subscribe call. The callback is removed on
/// [`Subscription::unsubscribe`] or when the handle is dropped.
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(unsubscribe: impl FnOnce() + Send + 'static) -> Self {
        Subscription {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    pub fn unsubscribe(mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

type Callback<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Registry of change callbacks, notified in subscription order.
pub struct Listeners<T> {
    next_id: AtomicU64,
    callbacks: Mutex<BTreeMap<u64, Callback<T>>>,
}

impl<T: Copy + Send + 'static> Listeners<T> {
    pub fn new() -> Arc<Self> {
        Arc::new(Listeners {
            next_id: AtomicU64::new(0),
            callbacks: Mutex::new(BTreeMap::new()),
        })
    }

    pub fn subscribe(self: &Arc<Self>, callback: impl Fn(T) + Send + Sync + 'static) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.callbacks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(id, Arc::new(callback));

        let listeners = Arc::downgrade(self);
        Subscription::new(move || {
            if let Some(listeners) = listeners.upgrade() {
                listeners
                    .callbacks
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .remove(&id);
            }
        })
    }

    pub fn notify(&self, value: T) {
        // Callbacks run outside the lock so they may subscribe or unsubscribe.
        let callbacks: Vec<Callback<T>> = self
            .callbacks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .values()
            .cloned()
            .collect();
        for callback in callbacks {
            callback(value);
        }
    }

    pub fn len(&self) -> usize {
        self.callbacks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
