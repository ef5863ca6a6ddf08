//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Each type mirrors a core type but uses C-compatible representations:
//! `*mut c_char` instead of `String`, pointer + length instead of `Vec`, and
//! tagged enums with explicit discriminants. Conversion functions live here
//! to keep `lib.rs` focused on the `extern "C"` surface.

use std::ffi::{c_void, CStr, CString};
use std::os::raw::c_char;
use std::sync::Arc;

use appkit_core::{HttpMethod, HttpRequest, NetworkType, RequestBody, SdkError, TrackedScreen, TransferKind, TransportErrorKind};

use crate::transport::FfiTransportShared;

/// Opaque handle to an `Sdk`. C callers receive a pointer to this and pass
/// it back into every FFI function.
pub struct FfiSdk {
    pub(crate) inner: appkit_core::Sdk,
    pub(crate) transport: Arc<FfiTransportShared>,
}

// ---------------------------------------------------------------------------
// Strings and buffers
// ---------------------------------------------------------------------------

/// Copy `s` into a C string owned by the caller. Interior NULs are dropped.
pub(crate) fn to_c_string(s: impl Into<String>) -> *mut c_char {
    let s = s.into().replace('\0', "");
    CString::new(s).unwrap_or_default().into_raw()
}

/// Borrow a caller-owned C string. `None` for null or invalid UTF-8.
pub(crate) fn from_c_str<'a>(s: *const c_char) -> Option<&'a str> {
    if s.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(s) }.to_str().ok()
}

/// Move `bytes` to the heap as an exact-size allocation.
pub(crate) fn bytes_into_raw(bytes: Vec<u8>) -> (*mut u8, usize) {
    if bytes.is_empty() {
        return (std::ptr::null_mut(), 0);
    }
    let len = bytes.len();
    (Box::into_raw(bytes.into_boxed_slice()) as *mut u8, len)
}

/// Release a buffer produced by `bytes_into_raw`.
pub(crate) unsafe fn free_bytes(ptr: *mut u8, len: usize) {
    if !ptr.is_null() && len > 0 {
        drop(unsafe { Box::from_raw(std::ptr::slice_from_raw_parts_mut(ptr, len)) });
    }
}

/// Copy a caller-owned buffer. Null yields an empty vector.
pub(crate) fn copy_bytes(ptr: *const u8, len: usize) -> Vec<u8> {
    if ptr.is_null() || len == 0 {
        return Vec::new();
    }
    unsafe { std::slice::from_raw_parts(ptr, len) }.to_vec()
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// HTTP method as a C enum.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiHttpMethod {
    Get = 0,
    Post = 1,
    Put = 2,
    Delete = 3,
}

impl From<HttpMethod> for FfiHttpMethod {
    fn from(m: HttpMethod) -> Self {
        match m {
            HttpMethod::Get => FfiHttpMethod::Get,
            HttpMethod::Post => FfiHttpMethod::Post,
            HttpMethod::Put => FfiHttpMethod::Put,
            HttpMethod::Delete => FfiHttpMethod::Delete,
        }
    }
}

impl From<FfiHttpMethod> for HttpMethod {
    fn from(m: FfiHttpMethod) -> Self {
        match m {
            FfiHttpMethod::Get => HttpMethod::Get,
            FfiHttpMethod::Post => HttpMethod::Post,
            FfiHttpMethod::Put => HttpMethod::Put,
            FfiHttpMethod::Delete => HttpMethod::Delete,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiTransferKind {
    Data = 0,
    Upload = 1,
    Download = 2,
}

impl From<TransferKind> for FfiTransferKind {
    fn from(kind: TransferKind) -> Self {
        match kind {
            TransferKind::Data => FfiTransferKind::Data,
            TransferKind::Upload => FfiTransferKind::Upload,
            TransferKind::Download => FfiTransferKind::Download,
        }
    }
}

/// How a target string is interpreted.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiTargetKind {
    /// Path joined onto the configured base URL.
    Api = 0,
    /// Absolute URL.
    Url = 1,
}

/// A single HTTP header as a key-value pair of C strings.
#[repr(C)]
pub struct FfiHeader {
    pub key: *mut c_char,
    pub value: *mut c_char,
}

/// An HTTP request handed to the host's `start` callback.
///
/// The host owns it from then on and releases it with `appkit_free_request`.
/// `task_id` identifies the task in every later transport call.
#[repr(C)]
pub struct FfiHttpRequest {
    pub task_id: u64,
    pub method: FfiHttpMethod,
    pub url: *mut c_char,
    pub headers: *mut FfiHeader,
    pub headers_len: u32,
    pub body: *mut u8,
    pub body_len: usize,
    pub timeout_ms: u64,
    pub transfer: FfiTransferKind,
}

impl FfiHttpRequest {
    /// Convert a core `HttpRequest` into a heap-allocated `FfiHttpRequest`.
    ///
    /// Only JSON bodies cross the boundary; the C surface dispatches no
    /// uploads, so a multipart body is dropped with a warning.
    pub(crate) fn from_core(task_id: u64, req: HttpRequest) -> *mut Self {
        let body = match req.body {
            RequestBody::Empty => Vec::new(),
            RequestBody::Json(bytes) => bytes,
            RequestBody::Multipart(_) => {
                tracing::warn!(task_id, url = %req.url, "multipart body cannot cross the C boundary");
                Vec::new()
            }
        };
        let (body, body_len) = bytes_into_raw(body);

        let headers_len = req.headers.len() as u32;
        let headers = if req.headers.is_empty() {
            std::ptr::null_mut()
        } else {
            let ffi_headers: Box<[FfiHeader]> = req
                .headers
                .into_iter()
                .map(|(k, v)| FfiHeader {
                    key: to_c_string(k),
                    value: to_c_string(v),
                })
                .collect();
            Box::into_raw(ffi_headers) as *mut FfiHeader
        };

        Box::into_raw(Box::new(FfiHttpRequest {
            task_id,
            method: req.method.into(),
            url: to_c_string(req.url),
            headers,
            headers_len,
            body,
            body_len,
            timeout_ms: req.timeout.as_millis() as u64,
            transfer: req.transfer.into(),
        }))
    }
}

// ---------------------------------------------------------------------------
// Transport input (caller-provided, not heap-allocated by us)
// ---------------------------------------------------------------------------

/// An HTTP response described by the host after executing a request.
///
/// The FFI layer copies what it needs and never frees these fields.
/// `headers` may be null when `headers_len` is 0.
#[repr(C)]
pub struct FfiHttpResponse {
    pub status: u16,
    pub headers: *const FfiHeader,
    pub headers_len: u32,
    pub body: *const u8,
    pub body_len: usize,
}

impl FfiHttpResponse {
    pub(crate) fn to_core(&self) -> appkit_core::HttpResponse {
        let mut response = appkit_core::HttpResponse::new(self.status, copy_bytes(self.body, self.body_len));
        if !self.headers.is_null() && self.headers_len > 0 {
            let headers = unsafe { std::slice::from_raw_parts(self.headers, self.headers_len as usize) };
            for header in headers {
                if let (Some(k), Some(v)) = (from_c_str(header.key), from_c_str(header.value)) {
                    response = response.with_header(k, v);
                }
            }
        }
        response
    }
}

/// Transport failure category reported by the host.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiTransportErrorKind {
    Cancelled = 0,
    TimedOut = 1,
    Connection = 2,
    Tls = 3,
    Other = 4,
}

impl From<FfiTransportErrorKind> for TransportErrorKind {
    fn from(kind: FfiTransportErrorKind) -> Self {
        match kind {
            FfiTransportErrorKind::Cancelled => TransportErrorKind::Cancelled,
            FfiTransportErrorKind::TimedOut => TransportErrorKind::TimedOut,
            FfiTransportErrorKind::Connection => TransportErrorKind::Connection,
            FfiTransportErrorKind::Tls => TransportErrorKind::Tls,
            FfiTransportErrorKind::Other => TransportErrorKind::Other,
        }
    }
}

/// Host transport callbacks. `context` is passed back verbatim.
///
/// `start` receives ownership of the request. `suspend`, `resume` and
/// `cancel` refer to a task by the `task_id` it was started with. After
/// `cancel` the host may still report a completion; it is ignored.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct FfiTransportVTable {
    pub context: *mut c_void,
    pub start: Option<extern "C" fn(context: *mut c_void, request: *mut FfiHttpRequest)>,
    pub suspend: Option<extern "C" fn(context: *mut c_void, task_id: u64)>,
    pub resume: Option<extern "C" fn(context: *mut c_void, task_id: u64)>,
    pub cancel: Option<extern "C" fn(context: *mut c_void, task_id: u64)>,
}

// SAFETY: the host promises its callbacks and `context` may be used from any
// thread; that is part of the documented contract of `appkit_sdk_new`.
unsafe impl Send for FfiTransportVTable {}
unsafe impl Sync for FfiTransportVTable {}

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiNetworkType {
    Unknown = 0,
    NotReachable = 1,
    Wifi = 2,
    Mobile = 3,
}

impl From<FfiNetworkType> for NetworkType {
    fn from(status: FfiNetworkType) -> Self {
        match status {
            FfiNetworkType::Unknown => NetworkType::Unknown,
            FfiNetworkType::NotReachable => NetworkType::NotReachable,
            FfiNetworkType::Wifi => NetworkType::Wifi,
            FfiNetworkType::Mobile => NetworkType::Mobile,
        }
    }
}

impl From<NetworkType> for FfiNetworkType {
    fn from(status: NetworkType) -> Self {
        match status {
            NetworkType::Unknown => FfiNetworkType::Unknown,
            NetworkType::NotReachable => FfiNetworkType::NotReachable,
            NetworkType::Wifi => FfiNetworkType::Wifi,
            NetworkType::Mobile => FfiNetworkType::Mobile,
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Error codes returned directly or inside `FfiResult`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiErrorCode {
    Ok = 0,
    NullArg = 1,
    InvalidArgument = 2,
    NotReachable = 3,
    MissingBaseUrl = 4,
    EmptyUrl = 5,
    InvalidUrl = 6,
    Http = 7,
    Transport = 8,
    Cancelled = 9,
    Deserialization = 10,
    Io = 11,
    Config = 12,
    Panic = 13,
    Other = 14,
}

impl From<&SdkError> for FfiErrorCode {
    fn from(err: &SdkError) -> Self {
        match err {
            SdkError::MissingBaseUrl => FfiErrorCode::MissingBaseUrl,
            SdkError::EmptyUrl => FfiErrorCode::EmptyUrl,
            SdkError::InvalidUrl { .. } => FfiErrorCode::InvalidUrl,
            SdkError::NotReachable => FfiErrorCode::NotReachable,
            SdkError::InvalidConfig(_) => FfiErrorCode::Config,
            SdkError::Transport(e) if e.kind == TransportErrorKind::Cancelled => FfiErrorCode::Cancelled,
            SdkError::Transport(_) => FfiErrorCode::Transport,
            SdkError::HttpStatus { .. } => FfiErrorCode::Http,
            SdkError::Deserialization(_) | SdkError::KeyPathNotFound(_) => FfiErrorCode::Deserialization,
            SdkError::Io(_) => FfiErrorCode::Io,
            SdkError::Serialization(_) | SdkError::Plist(_) => FfiErrorCode::Other,
        }
    }
}

/// Outcome of a request, delivered to the C callback.
///
/// On success `error_code` is `Ok` and `error_message` is null. `body` holds
/// the response body in both cases (null when empty). `http_status` is 0
/// when no response was received.
#[repr(C)]
pub struct FfiResult {
    pub error_code: FfiErrorCode,
    pub error_message: *mut c_char,
    pub http_status: u16,
    pub body: *mut u8,
    pub body_len: usize,
}

impl FfiResult {
    pub(crate) fn success(status: u16, body: Vec<u8>) -> *mut Self {
        let (body, body_len) = bytes_into_raw(body);
        Box::into_raw(Box::new(FfiResult {
            error_code: FfiErrorCode::Ok,
            error_message: std::ptr::null_mut(),
            http_status: status,
            body,
            body_len,
        }))
    }

    pub(crate) fn failure(failure: appkit_core::Failure) -> *mut Self {
        let (body, body_len) = bytes_into_raw(failure.data.unwrap_or_default());
        Box::into_raw(Box::new(FfiResult {
            error_code: FfiErrorCode::from(&failure.error),
            error_message: to_c_string(failure.error.to_string()),
            http_status: failure.status.unwrap_or(0),
            body,
            body_len,
        }))
    }
}

/// Completion callback for `appkit_request`. The callee owns `result` and
/// releases it with `appkit_free_result`.
pub type FfiResponseCallback = extern "C" fn(user_data: *mut c_void, result: *mut FfiResult);

/// Caller context carried to the callback thread.
pub(crate) struct UserData(pub(crate) *mut c_void);

// SAFETY: `user_data` is opaque to us; the caller guarantees it may be used
// on the thread the callback fires on.
unsafe impl Send for UserData {}

// ---------------------------------------------------------------------------
// Behavior
// ---------------------------------------------------------------------------

/// A host screen identified by class name.
pub(crate) struct HostScreen<'a> {
    pub(crate) class_name: &'a str,
    pub(crate) tracks_dwell_time: bool,
}

impl TrackedScreen for HostScreen<'_> {
    fn class_name(&self) -> &str {
        self.class_name
    }

    fn tracks_dwell_time(&self) -> bool {
        self.tracks_dwell_time
    }
}
