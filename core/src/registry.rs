//! Named in-flight request registry.
//!
//! # Design
//! Maps the URL a request was dispatched with to the transport's handle so
//! any part of the host can suspend, resume or cancel it by URL alone. One
//! handle per key: a second dispatch to the same URL replaces the tracked
//! handle. Unknown keys are silently ignored.
//!
//! The map sits behind a mutex because completions arrive on transport
//! threads. Handles are cloned out before the control call so a transport
//! that completes synchronously inside `cancel` can re-enter the registry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::trace;

/// Control surface of an in-flight transport task.
pub trait RequestHandle: Send + Sync {
    fn suspend(&self);
    fn resume(&self);
    fn cancel(&self);
}

/// URL-keyed table of in-flight requests.
#[derive(Default)]
pub struct RequestRegistry {
    tasks: Mutex<HashMap<String, Arc<dyn RequestHandle>>>,
}

impl RequestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the handle tracked for `key`.
    pub fn register(&self, key: impl Into<String>, handle: Arc<dyn RequestHandle>) {
        let key = key.into();
        trace!(key = %key, "register request");
        self.lock().insert(key, handle);
    }

    /// Forget `key`; no-op when absent.
    pub fn remove(&self, key: &str) {
        if self.lock().remove(key).is_some() {
            trace!(key, "remove request");
        }
    }

    pub fn suspend(&self, key: &str) {
        if let Some(handle) = self.get(key) {
            handle.suspend();
        }
    }

    pub fn resume(&self, key: &str) {
        if let Some(handle) = self.get(key) {
            handle.resume();
        }
    }

    pub fn cancel(&self, key: &str) {
        if let Some(handle) = self.get(key) {
            handle.cancel();
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn get(&self, key: &str) -> Option<Arc<dyn RequestHandle>> {
        self.lock().get(key).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<dyn RequestHandle>>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for RequestRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys: Vec<String> = self.lock().keys().cloned().collect();
        f.debug_struct("RequestRegistry").field("keys", &keys).finish()
    }
}
