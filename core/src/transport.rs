//! The host transport seam.
//!
//! # Design
//! The SDK never opens sockets itself. The host implements `Transport` on
//! top of its platform networking stack (URLSession, OkHttp, ureq, ...) and
//! the facade drives it through `create_task`. Tasks are created suspended:
//! the facade registers the handle first and only then calls `resume`, so a
//! fast completion can never race ahead of registration.
//!
//! Contract for implementors:
//! - no I/O before the first `resume` on the returned handle;
//! - `completion` is invoked exactly once, from any thread;
//! - `progress`, when present, may be invoked any number of times before
//!   `completion`;
//! - `cancel` must still end in a completion (`TransportErrorKind::Cancelled`).

use std::sync::Arc;

use crate::error::TransportError;
use crate::http::{HttpRequest, HttpResponse, Progress};
use crate::registry::RequestHandle;

pub type ProgressFn = Box<dyn Fn(Progress) + Send + Sync>;
pub type CompletionFn = Box<dyn FnOnce(Result<HttpResponse, TransportError>) + Send>;

/// Executes HTTP exchanges on behalf of the SDK.
pub trait Transport: Send + Sync {
    /// Create a suspended task for `request`.
    fn create_task(
        &self,
        request: HttpRequest,
        progress: Option<ProgressFn>,
        completion: CompletionFn,
    ) -> Arc<dyn RequestHandle>;
}
