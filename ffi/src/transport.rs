//! `Transport` implementation backed by host callbacks.
//!
//! # Design
//! Each task gets a numeric id and a pending entry holding its completion.
//! The first `resume` hands the request to the host's `start` callback;
//! later calls map to `suspend`/`resume`/`cancel` by id. The host reports
//! back through `appkit_transport_*`, which look the entry up by id.
//! Removing the entry is what makes a completion fire at most once: a
//! cancelled task is completed locally and a late host report finds nothing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use appkit_core::{
    CompletionFn, HttpRequest, HttpResponse, Progress, ProgressFn, RequestHandle, Transport, TransportError,
    TransportErrorKind,
};
use tracing::{debug, warn};

use crate::types::{FfiHttpRequest, FfiTransportVTable};

struct PendingTask {
    completion: CompletionFn,
    progress: Option<Arc<ProgressFn>>,
}

/// State shared between the transport, its tasks and the FFI entry points.
pub struct FfiTransportShared {
    vtable: FfiTransportVTable,
    next_id: AtomicU64,
    pending: Mutex<HashMap<u64, PendingTask>>,
}

impl FfiTransportShared {
    pub(crate) fn new(vtable: FfiTransportVTable) -> Arc<Self> {
        Arc::new(Self {
            vtable,
            next_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
        })
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, PendingTask>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Complete task `id`. Returns `false` when it already finished.
    pub(crate) fn finish(&self, id: u64, outcome: Result<HttpResponse, TransportError>) -> bool {
        let Some(task) = self.lock().remove(&id) else {
            debug!(task_id = id, "completion for unknown task ignored");
            return false;
        };
        (task.completion)(outcome);
        true
    }

    /// Report progress for task `id`. Returns `false` when it already finished.
    pub(crate) fn progress(&self, id: u64, progress: Progress) -> bool {
        let callback = match self.lock().get(&id) {
            Some(task) => task.progress.clone(),
            None => return false,
        };
        if let Some(callback) = callback {
            callback(progress);
        }
        true
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.lock().len()
    }
}

/// The `Transport` handed to the core `Sdk`.
pub struct FfiTransport {
    shared: Arc<FfiTransportShared>,
}

impl FfiTransport {
    pub(crate) fn new(shared: Arc<FfiTransportShared>) -> Self {
        Self { shared }
    }
}

impl Transport for FfiTransport {
    fn create_task(
        &self,
        request: HttpRequest,
        progress: Option<ProgressFn>,
        completion: CompletionFn,
    ) -> Arc<dyn RequestHandle> {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        self.shared.lock().insert(
            id,
            PendingTask {
                completion,
                progress: progress.map(Arc::new),
            },
        );
        Arc::new(FfiTask {
            id,
            shared: self.shared.clone(),
            request: Mutex::new(Some(request)),
        })
    }
}

struct FfiTask {
    id: u64,
    shared: Arc<FfiTransportShared>,
    /// Taken by the first `resume`.
    request: Mutex<Option<HttpRequest>>,
}

impl RequestHandle for FfiTask {
    fn suspend(&self) {
        if let Some(suspend) = self.shared.vtable.suspend {
            suspend(self.shared.vtable.context, self.id);
        }
    }

    fn resume(&self) {
        let request = self.request.lock().unwrap_or_else(PoisonError::into_inner).take();
        let vtable = self.shared.vtable;
        match request {
            Some(request) => match vtable.start {
                Some(start) => start(vtable.context, FfiHttpRequest::from_core(self.id, request)),
                None => {
                    warn!(task_id = self.id, "host transport has no start callback");
                    let err = TransportError::new(TransportErrorKind::Other, "host transport cannot start requests");
                    self.shared.finish(self.id, Err(err));
                }
            },
            None => {
                if let Some(resume) = vtable.resume {
                    resume(vtable.context, self.id);
                }
            }
        }
    }

    fn cancel(&self) {
        let never_started = self.request.lock().unwrap_or_else(PoisonError::into_inner).take().is_some();
        if !never_started {
            if let Some(cancel) = self.shared.vtable.cancel {
                cancel(self.shared.vtable.context, self.id);
            }
        }
        self.shared.finish(self.id, Err(TransportError::cancelled()));
    }
}
