//! In-memory transport for unit tests.
//!
//! Scripted responses are consumed in order by newly created tasks; such a
//! task completes synchronously on its first `resume`. Tasks created with no
//! script stay pending until the test calls `FakeTask::complete`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::TransportError;
use crate::http::{HttpRequest, HttpResponse, Progress};
use crate::registry::RequestHandle;
use crate::transport::{CompletionFn, ProgressFn, Transport};

type Outcome = Result<HttpResponse, TransportError>;

#[derive(Default)]
pub(crate) struct FakeTransport {
    script: Mutex<VecDeque<Outcome>>,
    tasks: Mutex<Vec<Arc<FakeTask>>>,
}

impl FakeTransport {
    pub(crate) fn respond_with(&self, outcome: Outcome) {
        self.script.lock().unwrap().push_back(outcome);
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.tasks.lock().unwrap().iter().map(|t| t.request.clone()).collect()
    }

    pub(crate) fn task(&self, index: usize) -> Arc<FakeTask> {
        self.tasks.lock().unwrap()[index].clone()
    }
}

impl Transport for FakeTransport {
    fn create_task(
        &self,
        request: HttpRequest,
        progress: Option<ProgressFn>,
        completion: CompletionFn,
    ) -> Arc<dyn RequestHandle> {
        let task = Arc::new(FakeTask {
            request,
            progress,
            completion: Mutex::new(Some(completion)),
            scripted: Mutex::new(self.script.lock().unwrap().pop_front()),
            resumes: AtomicUsize::new(0),
            suspends: AtomicUsize::new(0),
            cancels: AtomicUsize::new(0),
        });
        self.tasks.lock().unwrap().push(task.clone());
        task
    }
}

pub(crate) struct FakeTask {
    pub(crate) request: HttpRequest,
    progress: Option<ProgressFn>,
    completion: Mutex<Option<CompletionFn>>,
    scripted: Mutex<Option<Outcome>>,
    pub(crate) resumes: AtomicUsize,
    pub(crate) suspends: AtomicUsize,
    pub(crate) cancels: AtomicUsize,
}

impl FakeTask {
    /// Deliver `outcome` unless the task already completed.
    pub(crate) fn complete(&self, outcome: Outcome) {
        let completion = self.completion.lock().unwrap().take();
        if let Some(completion) = completion {
            completion(outcome);
        }
    }
}

impl RequestHandle for FakeTask {
    fn suspend(&self) {
        self.suspends.fetch_add(1, Ordering::SeqCst);
    }

    fn resume(&self) {
        if self.resumes.fetch_add(1, Ordering::SeqCst) > 0 {
            return;
        }
        let scripted = self.scripted.lock().unwrap().take();
        if let Some(outcome) = scripted {
            if let (Some(progress), Ok(response)) = (&self.progress, &outcome) {
                let total = response.body.len() as u64;
                progress(Progress::new(total, Some(total)));
            }
            self.complete(outcome);
        }
    }

    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        self.complete(Err(TransportError::cancelled()));
    }
}
