//! C-ABI wrapper around `appkit-core`.
//!
//! # Overview
//! Exposes the SDK through `extern "C"` functions so a host app written in
//! any language with a C FFI can drive it. The host supplies its networking
//! stack as a table of callbacks (`FfiTransportVTable`) and reports results
//! back through the `appkit_transport_*` functions.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Dispatch preconditions come back synchronously as an `FfiErrorCode`;
//!   the request callback only fires for requests that were started.
//! - The C caller owns all returned pointers and must call the matching
//!   `appkit_free_*` function to release them.

pub mod transport;
pub mod types;

use std::ffi::{c_void, CString};
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use appkit_core::logging::{init_logging, LoggingConfig};
use appkit_core::{BasicHandler, ExceptionReport, Parameters, Progress, Sdk, SdkConfig, Target, TransportError};
use serde_json::Value;
use tracing::error;

use transport::{FfiTransport, FfiTransportShared};
use types::*;

/// Resolve a non-null handle or return `$fallback`.
macro_rules! sdk_or {
    ($sdk:expr, $fallback:expr) => {{
        if $sdk.is_null() {
            return $fallback;
        }
        unsafe { &*$sdk }
    }};
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Create an SDK from a JSON-encoded `SdkConfig` and the host transport.
///
/// Every callback in `vtable` may be invoked from any thread, and
/// `vtable.context` must stay valid until `appkit_sdk_free`. Returns null if
/// `config_json` is null, not valid config JSON, or fails validation.
/// The caller must free the returned pointer with `appkit_sdk_free`.
#[unsafe(no_mangle)]
pub extern "C" fn appkit_sdk_new(config_json: *const c_char, vtable: FfiTransportVTable) -> *mut FfiSdk {
    catch_unwind(AssertUnwindSafe(|| {
        let Some(json) = from_c_str(config_json) else {
            return std::ptr::null_mut();
        };
        let config = match SdkConfig::from_json(json) {
            Ok(config) => config,
            Err(err) => {
                error!(error = %err, "rejected sdk config");
                return std::ptr::null_mut();
            }
        };
        let shared = FfiTransportShared::new(vtable);
        match Sdk::new(config, Arc::new(FfiTransport::new(shared.clone()))) {
            Ok(inner) => Box::into_raw(Box::new(FfiSdk {
                inner,
                transport: shared,
            })),
            Err(err) => {
                error!(error = %err, "sdk initialization failed");
                std::ptr::null_mut()
            }
        }
    }))
    .unwrap_or(std::ptr::null_mut())
}

/// Free an SDK created by `appkit_sdk_new`. Safe to call with null.
///
/// Requests still in flight are not cancelled; late host reports for them
/// must not be sent after this call.
#[unsafe(no_mangle)]
pub extern "C" fn appkit_sdk_free(sdk: *mut FfiSdk) {
    if !sdk.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            drop(unsafe { Box::from_raw(sdk) });
        }));
    }
}

/// Initialize process-wide logging from a JSON-encoded `LoggingConfig`.
/// Null selects the defaults.
#[unsafe(no_mangle)]
pub extern "C" fn appkit_init_logging(config_json: *const c_char) -> FfiErrorCode {
    catch_unwind(AssertUnwindSafe(|| {
        let config = if config_json.is_null() {
            LoggingConfig::default()
        } else {
            let Some(json) = from_c_str(config_json) else {
                return FfiErrorCode::InvalidArgument;
            };
            match serde_json::from_str::<LoggingConfig>(json) {
                Ok(config) => config,
                Err(_) => return FfiErrorCode::InvalidArgument,
            }
        };
        match init_logging(config) {
            Ok(()) => FfiErrorCode::Ok,
            Err(err) => FfiErrorCode::from(&err),
        }
    }))
    .unwrap_or(FfiErrorCode::Panic)
}

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

/// Push the current reachability. Returns `true` if the status changed.
#[unsafe(no_mangle)]
pub extern "C" fn appkit_network_update(sdk: *const FfiSdk, status: FfiNetworkType) -> bool {
    catch_unwind(AssertUnwindSafe(|| {
        let sdk = sdk_or!(sdk, false);
        sdk.inner.network().update(status.into())
    }))
    .unwrap_or(false)
}

/// Current reachability; `Unknown` for a null handle.
#[unsafe(no_mangle)]
pub extern "C" fn appkit_network_status(sdk: *const FfiSdk) -> FfiNetworkType {
    catch_unwind(AssertUnwindSafe(|| {
        let sdk = sdk_or!(sdk, FfiNetworkType::Unknown);
        sdk.inner.network().status().into()
    }))
    .unwrap_or(FfiNetworkType::Unknown)
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

fn target(kind: FfiTargetKind, value: &str) -> Target {
    match kind {
        FfiTargetKind::Api => Target::api(value),
        FfiTargetKind::Url => Target::url(value),
    }
}

fn parse_params(params_json: *const c_char) -> Result<Option<Parameters>, FfiErrorCode> {
    if params_json.is_null() {
        return Ok(None);
    }
    let json = from_c_str(params_json).ok_or(FfiErrorCode::InvalidArgument)?;
    match serde_json::from_str::<Value>(json) {
        Ok(Value::Object(map)) => Ok(Some(map)),
        Ok(Value::Null) => Ok(None),
        _ => Err(FfiErrorCode::InvalidArgument),
    }
}

/// Send a request and deliver its outcome to `callback`.
///
/// `params_json` is an optional JSON object of fields. On any code other
/// than `Ok` nothing was sent and `callback` never fires. Otherwise
/// `callback` fires exactly once, possibly on another thread, with a result
/// the callee must free with `appkit_free_result`.
#[unsafe(no_mangle)]
pub extern "C" fn appkit_request(
    sdk: *const FfiSdk,
    method: FfiHttpMethod,
    kind: FfiTargetKind,
    target_str: *const c_char,
    params_json: *const c_char,
    callback: Option<FfiResponseCallback>,
    user_data: *mut c_void,
) -> FfiErrorCode {
    catch_unwind(AssertUnwindSafe(|| {
        let sdk = sdk_or!(sdk, FfiErrorCode::NullArg);
        let (Some(callback), false) = (callback, target_str.is_null()) else {
            return FfiErrorCode::NullArg;
        };
        let Some(value) = from_c_str(target_str) else {
            return FfiErrorCode::InvalidArgument;
        };
        let params = match parse_params(params_json) {
            Ok(params) => params,
            Err(code) => return code,
        };

        let ok_data = UserData(user_data);
        let err_data = UserData(user_data);
        let handler = BasicHandler::new()
            .on_success(move |response| {
                let ok_data = ok_data;
                callback(ok_data.0, FfiResult::success(response.status, response.data));
            })
            .on_failure(move |failure| {
                let err_data = err_data;
                callback(err_data.0, FfiResult::failure(failure));
            });

        match sdk.inner.http().send(method.into(), target(kind, value), params, handler) {
            Ok(_) => FfiErrorCode::Ok,
            Err(err) => FfiErrorCode::from(&err),
        }
    }))
    .unwrap_or(FfiErrorCode::Panic)
}

fn control(
    sdk: *const FfiSdk,
    kind: FfiTargetKind,
    key: *const c_char,
    by_url: fn(&Sdk, &str) -> appkit_core::Result<()>,
    by_api: fn(&Sdk, &str) -> appkit_core::Result<()>,
) -> FfiErrorCode {
    let sdk = sdk_or!(sdk, FfiErrorCode::NullArg);
    if key.is_null() {
        return FfiErrorCode::NullArg;
    }
    let Some(value) = from_c_str(key) else {
        return FfiErrorCode::InvalidArgument;
    };
    let result = match kind {
        FfiTargetKind::Url => by_url(&sdk.inner, value),
        FfiTargetKind::Api => by_api(&sdk.inner, value),
    };
    match result {
        Ok(()) => FfiErrorCode::Ok,
        Err(err) => FfiErrorCode::from(&err),
    }
}

/// Suspend the in-flight request tracked under `key`. Unknown keys are a
/// no-op.
#[unsafe(no_mangle)]
pub extern "C" fn appkit_suspend_request(sdk: *const FfiSdk, kind: FfiTargetKind, key: *const c_char) -> FfiErrorCode {
    catch_unwind(AssertUnwindSafe(|| {
        control(sdk, kind, key, Sdk::suspend_request_by_url, Sdk::suspend_request_by_api)
    }))
    .unwrap_or(FfiErrorCode::Panic)
}

/// Resume the request tracked under `key`.
#[unsafe(no_mangle)]
pub extern "C" fn appkit_resume_request(sdk: *const FfiSdk, kind: FfiTargetKind, key: *const c_char) -> FfiErrorCode {
    catch_unwind(AssertUnwindSafe(|| {
        control(sdk, kind, key, Sdk::resume_request_by_url, Sdk::resume_request_by_api)
    }))
    .unwrap_or(FfiErrorCode::Panic)
}

/// Cancel the request tracked under `key`. Its callback still fires, with
/// `FfiErrorCode::Cancelled`.
#[unsafe(no_mangle)]
pub extern "C" fn appkit_cancel_request(sdk: *const FfiSdk, kind: FfiTargetKind, key: *const c_char) -> FfiErrorCode {
    catch_unwind(AssertUnwindSafe(|| {
        control(sdk, kind, key, Sdk::cancel_request_by_url, Sdk::cancel_request_by_api)
    }))
    .unwrap_or(FfiErrorCode::Panic)
}

// ---------------------------------------------------------------------------
// Transport reports
// ---------------------------------------------------------------------------

/// Report the response for task `task_id`. The response is copied.
///
/// Returns `false` if the task already finished (for example it was
/// cancelled) or an argument is null.
#[unsafe(no_mangle)]
pub extern "C" fn appkit_transport_complete(
    sdk: *const FfiSdk,
    task_id: u64,
    response: *const FfiHttpResponse,
) -> bool {
    catch_unwind(AssertUnwindSafe(|| {
        let sdk = sdk_or!(sdk, false);
        if response.is_null() {
            return false;
        }
        let response = unsafe { &*response }.to_core();
        sdk.transport.finish(task_id, Ok(response))
    }))
    .unwrap_or(false)
}

/// Report that task `task_id` failed before a full response arrived.
/// `message` may be null.
#[unsafe(no_mangle)]
pub extern "C" fn appkit_transport_fail(
    sdk: *const FfiSdk,
    task_id: u64,
    kind: FfiTransportErrorKind,
    message: *const c_char,
) -> bool {
    catch_unwind(AssertUnwindSafe(|| {
        let sdk = sdk_or!(sdk, false);
        let message = from_c_str(message).unwrap_or("transport failure");
        sdk.transport
            .finish(task_id, Err(TransportError::new(kind.into(), message)))
    }))
    .unwrap_or(false)
}

/// Report transfer progress for task `task_id`. A negative `total` means
/// the size is unknown.
#[unsafe(no_mangle)]
pub extern "C" fn appkit_transport_progress(sdk: *const FfiSdk, task_id: u64, completed: u64, total: i64) -> bool {
    catch_unwind(AssertUnwindSafe(|| {
        let sdk = sdk_or!(sdk, false);
        let total = u64::try_from(total).ok();
        sdk.transport.progress(task_id, Progress::new(completed, total))
    }))
    .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Crash log
// ---------------------------------------------------------------------------

/// Install the process-wide panic hook. Returns `false` if one was already
/// installed.
#[unsafe(no_mangle)]
pub extern "C" fn appkit_install_crash_handler(sdk: *const FfiSdk) -> bool {
    catch_unwind(AssertUnwindSafe(|| {
        let sdk = sdk_or!(sdk, false);
        sdk.inner.install_crash_handler()
    }))
    .unwrap_or(false)
}

/// Append a host exception (for example an uncaught platform exception) to
/// the crash log. `call_stack` may be null when `call_stack_len` is 0.
#[unsafe(no_mangle)]
pub extern "C" fn appkit_record_exception(
    sdk: *const FfiSdk,
    name: *const c_char,
    reason: *const c_char,
    call_stack: *const *const c_char,
    call_stack_len: usize,
) -> FfiErrorCode {
    catch_unwind(AssertUnwindSafe(|| {
        let sdk = sdk_or!(sdk, FfiErrorCode::NullArg);
        if name.is_null() || reason.is_null() || (call_stack.is_null() && call_stack_len > 0) {
            return FfiErrorCode::NullArg;
        }
        let frames = if call_stack_len == 0 {
            Vec::new()
        } else {
            unsafe { std::slice::from_raw_parts(call_stack, call_stack_len) }
                .iter()
                .filter_map(|frame| from_c_str(*frame))
                .map(str::to_string)
                .collect()
        };
        let report = ExceptionReport::new(
            from_c_str(name).unwrap_or_default(),
            from_c_str(reason).unwrap_or_default(),
            frames,
        );
        sdk.inner.crash_logger().record(&report);
        FfiErrorCode::Ok
    }))
    .unwrap_or(FfiErrorCode::Panic)
}

/// The whole exception log, or null if none was written yet.
/// Free with `appkit_free_string`.
#[unsafe(no_mangle)]
pub extern "C" fn appkit_exception_log(sdk: *const FfiSdk) -> *mut c_char {
    catch_unwind(AssertUnwindSafe(|| {
        let sdk = sdk_or!(sdk, std::ptr::null_mut());
        match sdk.inner.crash_logger().exception_log() {
            Some(log) => to_c_string(log),
            None => std::ptr::null_mut(),
        }
    }))
    .unwrap_or(std::ptr::null_mut())
}

// ---------------------------------------------------------------------------
// Behavior log
// ---------------------------------------------------------------------------

/// Start recording button taps. Returns `false` if already enabled.
#[unsafe(no_mangle)]
pub extern "C" fn appkit_enable_button_tracking(sdk: *const FfiSdk) -> bool {
    catch_unwind(AssertUnwindSafe(|| {
        let sdk = sdk_or!(sdk, false);
        sdk.inner.behavior().buttons().enable()
    }))
    .unwrap_or(false)
}

/// Start recording screen dwell times. Returns `false` if already enabled.
#[unsafe(no_mangle)]
pub extern "C" fn appkit_enable_screen_tracking(sdk: *const FfiSdk) -> bool {
    catch_unwind(AssertUnwindSafe(|| {
        let sdk = sdk_or!(sdk, false);
        sdk.inner.behavior().screens().enable()
    }))
    .unwrap_or(false)
}

/// Record a tap on the control identified by `identifier`.
///
/// Returns the tap count for that identifier, or -1 if nothing was
/// recorded (tracking disabled, blank or null identifier).
#[unsafe(no_mangle)]
pub extern "C" fn appkit_button_tap(sdk: *const FfiSdk, identifier: *const c_char) -> i64 {
    catch_unwind(AssertUnwindSafe(|| {
        let sdk = sdk_or!(sdk, -1);
        let Some(identifier) = from_c_str(identifier) else {
            return -1;
        };
        match sdk.inner.behavior().buttons().tap(identifier) {
            Some(count) => i64::try_from(count).unwrap_or(i64::MAX),
            None => -1,
        }
    }))
    .unwrap_or(-1)
}

/// Mark the screen `class_name` as shown. Returns `true` if it is tracked.
#[unsafe(no_mangle)]
pub extern "C" fn appkit_screen_appeared(
    sdk: *const FfiSdk,
    class_name: *const c_char,
    tracks_dwell_time: bool,
) -> bool {
    catch_unwind(AssertUnwindSafe(|| {
        let sdk = sdk_or!(sdk, false);
        let Some(class_name) = from_c_str(class_name) else {
            return false;
        };
        let screen = HostScreen {
            class_name,
            tracks_dwell_time,
        };
        sdk.inner.behavior().screens().appeared(&screen)
    }))
    .unwrap_or(false)
}

/// Mark the screen `class_name` as hidden.
///
/// Returns the whole seconds it was visible, or -1 if nothing was recorded.
#[unsafe(no_mangle)]
pub extern "C" fn appkit_screen_disappeared(
    sdk: *const FfiSdk,
    class_name: *const c_char,
    tracks_dwell_time: bool,
) -> i64 {
    catch_unwind(AssertUnwindSafe(|| {
        let sdk = sdk_or!(sdk, -1);
        let Some(class_name) = from_c_str(class_name) else {
            return -1;
        };
        let screen = HostScreen {
            class_name,
            tracks_dwell_time,
        };
        match sdk.inner.behavior().screens().disappeared(&screen) {
            Some(secs) => i64::try_from(secs).unwrap_or(i64::MAX),
            None => -1,
        }
    }))
    .unwrap_or(-1)
}

/// The behavior log as pretty-printed JSON, or null if there is none.
/// Free with `appkit_free_string`.
#[unsafe(no_mangle)]
pub extern "C" fn appkit_user_behavior_info(sdk: *const FfiSdk) -> *mut c_char {
    catch_unwind(AssertUnwindSafe(|| {
        let sdk = sdk_or!(sdk, std::ptr::null_mut());
        match sdk.inner.behavior().user_behavior_info() {
            Some(info) => to_c_string(info),
            None => std::ptr::null_mut(),
        }
    }))
    .unwrap_or(std::ptr::null_mut())
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

/// Drop every cached image.
#[unsafe(no_mangle)]
pub extern "C" fn appkit_clear_image_cache(sdk: *const FfiSdk) {
    let _ = catch_unwind(AssertUnwindSafe(|| {
        let sdk = sdk_or!(sdk, ());
        sdk.inner.images().clear_cache();
    }));
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free an `FfiHttpRequest` handed to the transport `start` callback.
/// Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn appkit_free_request(req: *mut FfiHttpRequest) {
    if req.is_null() {
        return;
    }
    let _ = catch_unwind(AssertUnwindSafe(|| {
        let req = unsafe { Box::from_raw(req) };
        if !req.url.is_null() {
            drop(unsafe { CString::from_raw(req.url) });
        }
        unsafe { free_bytes(req.body, req.body_len) };
        if !req.headers.is_null() && req.headers_len > 0 {
            let headers = unsafe {
                Box::from_raw(std::ptr::slice_from_raw_parts_mut(req.headers, req.headers_len as usize))
            };
            for h in headers.iter() {
                if !h.key.is_null() {
                    drop(unsafe { CString::from_raw(h.key) });
                }
                if !h.value.is_null() {
                    drop(unsafe { CString::from_raw(h.value) });
                }
            }
        }
    }));
}

/// Free an `FfiResult` delivered to a request callback. Safe to call with
/// null.
#[unsafe(no_mangle)]
pub extern "C" fn appkit_free_result(result: *mut FfiResult) {
    if result.is_null() {
        return;
    }
    let _ = catch_unwind(AssertUnwindSafe(|| {
        let result = unsafe { Box::from_raw(result) };
        if !result.error_message.is_null() {
            drop(unsafe { CString::from_raw(result.error_message) });
        }
        unsafe { free_bytes(result.body, result.body_len) };
    }));
}

/// Free a C string allocated by this library. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn appkit_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            drop(unsafe { CString::from_raw(s) });
        }));
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::{CStr, CString};
    use std::sync::Mutex;

    /// What the fake host transport saw.
    #[derive(Default)]
    struct Host {
        started: Mutex<Vec<(u64, FfiHttpMethod, String, Option<String>)>>,
        cancelled: Mutex<Vec<u64>>,
        suspended: Mutex<Vec<u64>>,
    }

    fn host_of<'a>(context: *mut c_void) -> &'a Host {
        unsafe { &*(context as *const Host) }
    }

    extern "C" fn host_start(context: *mut c_void, request: *mut FfiHttpRequest) {
        let req = unsafe { &*request };
        let url = unsafe { CStr::from_ptr(req.url) }.to_str().unwrap().to_string();
        let body = if req.body.is_null() {
            None
        } else {
            let bytes = unsafe { std::slice::from_raw_parts(req.body, req.body_len) };
            Some(String::from_utf8(bytes.to_vec()).unwrap())
        };
        host_of(context)
            .started
            .lock()
            .unwrap()
            .push((req.task_id, req.method, url, body));
        appkit_free_request(request);
    }

    extern "C" fn host_suspend(context: *mut c_void, task_id: u64) {
        host_of(context).suspended.lock().unwrap().push(task_id);
    }

    extern "C" fn host_cancel(context: *mut c_void, task_id: u64) {
        host_of(context).cancelled.lock().unwrap().push(task_id);
    }

    /// Results delivered to `on_result`, as (code, status, body).
    type Delivered = Mutex<Vec<(FfiErrorCode, u16, String)>>;

    extern "C" fn on_result(user_data: *mut c_void, result: *mut FfiResult) {
        let delivered = unsafe { &*(user_data as *const Delivered) };
        let r = unsafe { &*result };
        let body = if r.body.is_null() {
            String::new()
        } else {
            String::from_utf8(unsafe { std::slice::from_raw_parts(r.body, r.body_len) }.to_vec()).unwrap()
        };
        delivered.lock().unwrap().push((r.error_code, r.http_status, body));
        appkit_free_result(result);
    }

    struct Fixture {
        sdk: *mut FfiSdk,
        host: Box<Host>,
        _docs: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let docs = tempfile::tempdir().unwrap();
            let host = Box::new(Host::default());
            let config = serde_json::json!({
                "base_url": "https://api.example.com/v1/",
                "documents_dir": docs.path(),
            });
            let config = CString::new(config.to_string()).unwrap();
            let vtable = FfiTransportVTable {
                context: &*host as *const Host as *mut c_void,
                start: Some(host_start),
                suspend: Some(host_suspend),
                resume: None,
                cancel: Some(host_cancel),
            };
            let sdk = appkit_sdk_new(config.as_ptr(), vtable);
            assert!(!sdk.is_null());
            Self {
                sdk,
                host,
                _docs: docs,
            }
        }

        fn online(self) -> Self {
            appkit_network_update(self.sdk, FfiNetworkType::Wifi);
            self
        }

        fn get(&self, api: &str, params: Option<&str>, delivered: &Delivered) -> FfiErrorCode {
            let api = CString::new(api).unwrap();
            let params = params.map(|p| CString::new(p).unwrap());
            appkit_request(
                self.sdk,
                FfiHttpMethod::Get,
                FfiTargetKind::Api,
                api.as_ptr(),
                params.as_ref().map_or(std::ptr::null(), |p| p.as_ptr()),
                Some(on_result),
                delivered as *const Delivered as *mut c_void,
            )
        }

        fn last_task(&self) -> u64 {
            self.host.started.lock().unwrap().last().unwrap().0
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            appkit_sdk_free(self.sdk);
        }
    }

    fn take_string(s: *mut c_char) -> String {
        assert!(!s.is_null());
        let out = unsafe { CStr::from_ptr(s) }.to_str().unwrap().to_string();
        appkit_free_string(s);
        out
    }

    #[test]
    fn sdk_new_and_free() {
        let fixture = Fixture::new();
        assert_eq!(appkit_network_status(fixture.sdk), FfiNetworkType::Unknown);
    }

    #[test]
    fn sdk_new_rejects_null_and_bad_config() {
        let vtable = FfiTransportVTable {
            context: std::ptr::null_mut(),
            start: None,
            suspend: None,
            resume: None,
            cancel: None,
        };
        assert!(appkit_sdk_new(std::ptr::null(), vtable).is_null());
        let bad = CString::new(r#"{"base_url": "ftp://example.com/"}"#).unwrap();
        assert!(appkit_sdk_new(bad.as_ptr(), vtable).is_null());
        let garbage = CString::new("not json").unwrap();
        assert!(appkit_sdk_new(garbage.as_ptr(), vtable).is_null());
        let huge_timeout = CString::new(r#"{"base_url": "https://api.example.com/", "timeout_secs": 1e30}"#).unwrap();
        assert!(appkit_sdk_new(huge_timeout.as_ptr(), vtable).is_null());
    }

    #[test]
    fn sdk_free_null_is_safe() {
        appkit_sdk_free(std::ptr::null_mut());
    }

    #[test]
    fn request_round_trip_through_host() {
        let fixture = Fixture::new().online();
        let delivered = Delivered::default();

        let code = fixture.get("users", Some(r#"{"page": 2}"#), &delivered);
        assert_eq!(code, FfiErrorCode::Ok);
        {
            let started = fixture.host.started.lock().unwrap();
            let (_, method, url, body) = &started[0];
            assert_eq!(*method, FfiHttpMethod::Get);
            assert_eq!(url, "https://api.example.com/v1/users?page=2");
            assert!(body.is_none());
        }
        assert!(delivered.lock().unwrap().is_empty());

        let body = br#"{"ok":true}"#;
        let response = FfiHttpResponse {
            status: 200,
            headers: std::ptr::null(),
            headers_len: 0,
            body: body.as_ptr(),
            body_len: body.len(),
        };
        let task = fixture.last_task();
        assert!(appkit_transport_complete(fixture.sdk, task, &response));
        assert!(!appkit_transport_complete(fixture.sdk, task, &response));

        let delivered = delivered.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0], (FfiErrorCode::Ok, 200, r#"{"ok":true}"#.to_string()));
        let sdk = unsafe { &*fixture.sdk };
        assert!(sdk.inner.registry().is_empty());
        assert_eq!(sdk.transport.pending_len(), 0);
    }

    #[test]
    fn http_error_status_is_reported_in_result() {
        let fixture = Fixture::new().online();
        let delivered = Delivered::default();
        assert_eq!(fixture.get("missing", None, &delivered), FfiErrorCode::Ok);

        let body = b"gone";
        let response = FfiHttpResponse {
            status: 404,
            headers: std::ptr::null(),
            headers_len: 0,
            body: body.as_ptr(),
            body_len: body.len(),
        };
        assert!(appkit_transport_complete(fixture.sdk, fixture.last_task(), &response));
        assert_eq!(
            delivered.lock().unwrap()[0],
            (FfiErrorCode::Http, 404, "gone".to_string())
        );
    }

    #[test]
    fn transport_failure_maps_to_transport_code() {
        let fixture = Fixture::new().online();
        let delivered = Delivered::default();
        assert_eq!(fixture.get("users", None, &delivered), FfiErrorCode::Ok);

        let message = CString::new("connection reset").unwrap();
        assert!(appkit_transport_fail(
            fixture.sdk,
            fixture.last_task(),
            FfiTransportErrorKind::Connection,
            message.as_ptr(),
        ));
        assert_eq!(delivered.lock().unwrap()[0].0, FfiErrorCode::Transport);
    }

    #[test]
    fn unreachable_network_returns_code_without_callback() {
        let fixture = Fixture::new();
        let delivered = Delivered::default();
        assert_eq!(fixture.get("users", None, &delivered), FfiErrorCode::NotReachable);
        assert!(fixture.host.started.lock().unwrap().is_empty());
        assert!(delivered.lock().unwrap().is_empty());
    }

    #[test]
    fn request_rejects_bad_arguments() {
        let fixture = Fixture::new().online();
        let delivered = Delivered::default();
        assert_eq!(fixture.get("users", Some("[1, 2]"), &delivered), FfiErrorCode::InvalidArgument);

        let empty = CString::new("").unwrap();
        let code = appkit_request(
            fixture.sdk,
            FfiHttpMethod::Get,
            FfiTargetKind::Url,
            empty.as_ptr(),
            std::ptr::null(),
            Some(on_result),
            &delivered as *const Delivered as *mut c_void,
        );
        assert_eq!(code, FfiErrorCode::EmptyUrl);

        let api = CString::new("users").unwrap();
        let code = appkit_request(
            fixture.sdk,
            FfiHttpMethod::Get,
            FfiTargetKind::Api,
            api.as_ptr(),
            std::ptr::null(),
            None,
            std::ptr::null_mut(),
        );
        assert_eq!(code, FfiErrorCode::NullArg);
        assert!(fixture.host.started.lock().unwrap().is_empty());
    }

    #[test]
    fn cancel_by_api_completes_with_cancelled_and_ignores_late_report() {
        let fixture = Fixture::new().online();
        let delivered = Delivered::default();
        assert_eq!(fixture.get("slow", None, &delivered), FfiErrorCode::Ok);
        let task = fixture.last_task();

        let key = CString::new("slow").unwrap();
        assert_eq!(
            appkit_suspend_request(fixture.sdk, FfiTargetKind::Api, key.as_ptr()),
            FfiErrorCode::Ok
        );
        assert_eq!(*fixture.host.suspended.lock().unwrap(), vec![task]);

        assert_eq!(
            appkit_cancel_request(fixture.sdk, FfiTargetKind::Api, key.as_ptr()),
            FfiErrorCode::Ok
        );
        assert_eq!(*fixture.host.cancelled.lock().unwrap(), vec![task]);
        assert_eq!(delivered.lock().unwrap()[0].0, FfiErrorCode::Cancelled);

        let message = CString::new("late").unwrap();
        assert!(!appkit_transport_fail(
            fixture.sdk,
            task,
            FfiTransportErrorKind::Cancelled,
            message.as_ptr(),
        ));
        assert_eq!(delivered.lock().unwrap().len(), 1);
    }

    #[test]
    fn control_with_empty_key_is_an_error() {
        let fixture = Fixture::new();
        let empty = CString::new("").unwrap();
        assert_eq!(
            appkit_cancel_request(fixture.sdk, FfiTargetKind::Url, empty.as_ptr()),
            FfiErrorCode::EmptyUrl
        );
        assert_eq!(
            appkit_resume_request(fixture.sdk, FfiTargetKind::Url, std::ptr::null()),
            FfiErrorCode::NullArg
        );
    }

    #[test]
    fn recorded_exception_appears_in_log() {
        let fixture = Fixture::new();
        assert!(appkit_exception_log(fixture.sdk).is_null());

        let name = CString::new("NSRangeException").unwrap();
        let reason = CString::new("index 3 beyond bounds").unwrap();
        let frames = [CString::new("0 CoreFoundation").unwrap(), CString::new("1 libobjc").unwrap()];
        let frame_ptrs: Vec<*const c_char> = frames.iter().map(|f| f.as_ptr()).collect();
        let code = appkit_record_exception(
            fixture.sdk,
            name.as_ptr(),
            reason.as_ptr(),
            frame_ptrs.as_ptr(),
            frame_ptrs.len(),
        );
        assert_eq!(code, FfiErrorCode::Ok);

        let log = take_string(appkit_exception_log(fixture.sdk));
        assert!(log.contains("name:NSRangeException"));
        assert!(log.contains("index 3 beyond bounds"));
        assert!(log.contains("1 libobjc"));
    }

    #[test]
    fn behavior_calls_reach_the_log() {
        let fixture = Fixture::new();
        let button = CString::new("checkout").unwrap();
        assert_eq!(appkit_button_tap(fixture.sdk, button.as_ptr()), -1);
        assert!(appkit_user_behavior_info(fixture.sdk).is_null());

        assert!(appkit_enable_button_tracking(fixture.sdk));
        assert!(!appkit_enable_button_tracking(fixture.sdk));
        assert_eq!(appkit_button_tap(fixture.sdk, button.as_ptr()), 1);
        assert_eq!(appkit_button_tap(fixture.sdk, button.as_ptr()), 2);

        assert!(appkit_enable_screen_tracking(fixture.sdk));
        let screen = CString::new("CartViewController").unwrap();
        assert!(appkit_screen_appeared(fixture.sdk, screen.as_ptr(), true));
        assert_eq!(appkit_screen_disappeared(fixture.sdk, screen.as_ptr(), true), 0);
        assert!(!appkit_screen_appeared(fixture.sdk, screen.as_ptr(), false));

        let info = take_string(appkit_user_behavior_info(fixture.sdk));
        let records: Vec<serde_json::Value> = serde_json::from_str(&info).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0]["ButtonClick"], "checkout");
        assert_eq!(records[2]["viewControllerHold"], "CartViewController-0s");
    }

    #[test]
    fn null_handles_are_safe() {
        assert!(!appkit_network_update(std::ptr::null(), FfiNetworkType::Wifi));
        assert_eq!(appkit_button_tap(std::ptr::null(), std::ptr::null()), -1);
        assert!(appkit_exception_log(std::ptr::null()).is_null());
        assert!(!appkit_transport_complete(std::ptr::null(), 1, std::ptr::null()));
        appkit_clear_image_cache(std::ptr::null());
    }

    #[test]
    fn invalid_logging_config_is_rejected() {
        let bad = CString::new(r#"{"level": "loudest"}"#).unwrap();
        assert_eq!(appkit_init_logging(bad.as_ptr()), FfiErrorCode::InvalidArgument);
    }

    #[test]
    fn free_request_null_is_safe() {
        appkit_free_request(std::ptr::null_mut());
    }

    #[test]
    fn free_result_null_is_safe() {
        appkit_free_result(std::ptr::null_mut());
    }

    #[test]
    fn free_string_null_is_safe() {
        appkit_free_string(std::ptr::null_mut());
    }
}
