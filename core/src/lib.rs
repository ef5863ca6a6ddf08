//! Mobile app support core: HTTP facade, request registry, reachability,
//! crash log, behavior log and image cache.
//!
//! # Overview
//! The core never performs network I/O itself (host-does-IO pattern). It
//! builds `HttpRequest` descriptors and hands them to a host-implemented
//! `Transport`, tracks the resulting tasks by URL so they can be suspended,
//! resumed or cancelled, and turns responses into typed callback payloads.
//!
//! # Design
//! - `Sdk` is an explicit context object; hosts may create several.
//! - Each response shape is split into `build_*` and `parse_*` steps on
//!   `NetClient`, so request construction and response interpretation are
//!   testable without a transport.
//! - Precondition failures (unreachable network, missing base URL, empty
//!   URL) are returned as `Err` from the dispatching call; callbacks only
//!   ever report outcomes of requests that were actually started.
//! - Log files (`Exception.log`, `UserBehavior.plist`) live in the
//!   configured documents directory.

pub mod behavior;
pub mod callbacks;
pub mod client;
pub mod config;
pub mod crash;
pub mod error;
pub mod http;
pub mod image;
pub mod logging;
pub mod mapping;
pub mod network;
pub mod registry;
pub mod sdk;
pub mod transport;

#[cfg(test)]
mod testing;

pub use behavior::{BehaviorTracker, ButtonTracker, LogRecord, ScreenTracker, TrackedScreen};
pub use callbacks::{
    BasicHandler, BasicResponse, DownloadFailure, DownloadHandler, DownloadSuccess, ModelHandler, ModelResponse,
    UploadHandler, UploadOutcome,
};
pub use client::{NetClient, RequestTicket, UploadForm};
pub use config::{AppInfo, Parameters, RequestConfig, SdkConfig, Target, TlsConfig, TrustPolicy};
pub use crash::{CrashLogger, DeviceInfo, ExceptionReport};
pub use error::{Failure, Result, SdkError, TransportError, TransportErrorKind};
pub use http::{HttpMethod, HttpRequest, HttpResponse, MimeKind, Progress, RequestBody, TransferKind};
pub use image::{ImageCache, ImageLoader};
pub use mapping::Mapped;
pub use network::{NetworkMonitor, NetworkType};
pub use registry::{RequestHandle, RequestRegistry};
pub use sdk::Sdk;
pub use transport::{CompletionFn, ProgressFn, Transport};
