//! Network reachability as reported by the host.
//!
//! # Design
//! The platform reachability APIs live on the host side; the host pushes
//! every change into `NetworkMonitor::update`. The facade consults
//! `is_reachable` before each dispatch. Listeners are notified only when the
//! status actually changes, outside the status lock.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Connectivity class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkType {
    #[default]
    Unknown,
    NotReachable,
    Wifi,
    Mobile,
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NetworkType::Unknown => "unknown",
            NetworkType::NotReachable => "not reachable",
            NetworkType::Wifi => "wifi",
            NetworkType::Mobile => "mobile",
        };
        f.write_str(label)
    }
}

/// Token returned by `NetworkMonitor::subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(NetworkType) + Send + Sync>;

/// Current connectivity plus change listeners.
pub struct NetworkMonitor {
    status: RwLock<NetworkType>,
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
    next_id: AtomicU64,
}

impl NetworkMonitor {
    pub fn new(initial: NetworkType) -> Self {
        Self {
            status: RwLock::new(initial),
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn status(&self) -> NetworkType {
        *self.status.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// `Unknown` counts as unreachable.
    pub fn is_reachable(&self) -> bool {
        matches!(self.status(), NetworkType::Wifi | NetworkType::Mobile)
    }

    pub fn is_wifi(&self) -> bool {
        self.status() == NetworkType::Wifi
    }

    pub fn is_mobile(&self) -> bool {
        self.status() == NetworkType::Mobile
    }

    /// Record a new status. Returns whether it differed from the old one.
    pub fn update(&self, status: NetworkType) -> bool {
        let previous = {
            let mut current = self.status.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *current, status)
        };
        if previous == status {
            return false;
        }
        debug!(from = %previous, to = %status, "network status changed");
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(status);
        }
        true
    }

    pub fn subscribe(&self, listener: impl Fn(NetworkType) + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new(NetworkType::Unknown)
    }
}

impl fmt::Debug for NetworkMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkMonitor").field("status", &self.status()).finish()
    }
}
