//! Shared fixtures: a ureq-backed `Transport` and the mock server launcher.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use appkit_core::http::MultipartForm;
use appkit_core::{
    CompletionFn, HttpMethod, HttpRequest, HttpResponse, Progress, ProgressFn, RequestBody, RequestHandle, Transport,
    TransportError, TransportErrorKind,
};

pub const WAIT: Duration = Duration::from_secs(5);

/// Start the mock server on a random port and return its base URL.
pub fn start_server() -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    format!("http://{addr}/")
}

/// Runs each task on its own thread once resumed.
#[derive(Default)]
pub struct UreqTransport;

impl Transport for UreqTransport {
    fn create_task(
        &self,
        request: HttpRequest,
        progress: Option<ProgressFn>,
        completion: CompletionFn,
    ) -> Arc<dyn RequestHandle> {
        Arc::new(UreqTask {
            pending: Mutex::new(Some((request, progress))),
            completion: Arc::new(Mutex::new(Some(completion))),
            suspended: AtomicBool::new(false),
        })
    }
}

type Slot = Arc<Mutex<Option<CompletionFn>>>;

struct UreqTask {
    pending: Mutex<Option<(HttpRequest, Option<ProgressFn>)>>,
    completion: Slot,
    suspended: AtomicBool,
}

fn finish(slot: &Slot, outcome: Result<HttpResponse, TransportError>) {
    let completion = slot.lock().unwrap().take();
    if let Some(completion) = completion {
        completion(outcome);
    }
}

impl RequestHandle for UreqTask {
    fn suspend(&self) {
        self.suspended.store(true, Ordering::SeqCst);
    }

    fn resume(&self) {
        self.suspended.store(false, Ordering::SeqCst);
        let Some((request, progress)) = self.pending.lock().unwrap().take() else {
            return;
        };
        let slot = self.completion.clone();
        std::thread::spawn(move || {
            let outcome = execute(&request);
            if let (Some(progress), Ok(response)) = (&progress, &outcome) {
                let total = response.body.len() as u64;
                progress(Progress::new(total, Some(total)));
            }
            finish(&slot, outcome);
        });
    }

    fn cancel(&self) {
        finish(&self.completion, Err(TransportError::cancelled()));
    }
}

fn with_headers<B>(mut builder: ureq::RequestBuilder<B>, headers: &[(String, String)]) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

const BOUNDARY: &str = "appkit-test-boundary";

fn encode_multipart(form: &MultipartForm) -> Vec<u8> {
    let mut out = Vec::new();
    for (name, value) in &form.fields {
        out.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
        );
    }
    for file in &form.files {
        out.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                file.name, file.file_name, file.mime_type
            )
            .as_bytes(),
        );
        out.extend_from_slice(&file.data);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    out
}

/// Execute an `HttpRequest` with ureq. Statuses are returned as data so the
/// core decides what counts as failure.
fn execute(req: &HttpRequest) -> Result<HttpResponse, TransportError> {
    let agent = ureq::Agent::config_builder()
        .http_status_as_error(false)
        .timeout_global(Some(req.timeout))
        .build()
        .new_agent();

    let mut headers = req.headers.clone();
    let body = match &req.body {
        RequestBody::Empty => None,
        RequestBody::Json(bytes) => Some(bytes.clone()),
        RequestBody::Multipart(form) => {
            headers.push((
                "Content-Type".to_string(),
                format!("multipart/form-data; boundary={BOUNDARY}"),
            ));
            Some(encode_multipart(form))
        }
    };

    let result = match (req.method, body) {
        (HttpMethod::Get, _) => with_headers(agent.get(&req.url), &headers).call(),
        (HttpMethod::Delete, _) => with_headers(agent.delete(&req.url), &headers).call(),
        (HttpMethod::Post, Some(body)) => with_headers(agent.post(&req.url), &headers).send(&body[..]),
        (HttpMethod::Post, None) => with_headers(agent.post(&req.url), &headers).send_empty(),
        (HttpMethod::Put, Some(body)) => with_headers(agent.put(&req.url), &headers).send(&body[..]),
        (HttpMethod::Put, None) => with_headers(agent.put(&req.url), &headers).send_empty(),
    };

    let mut response = result.map_err(|err| {
        let kind = match err {
            ureq::Error::Timeout(_) => TransportErrorKind::TimedOut,
            ureq::Error::Io(_) | ureq::Error::ConnectionFailed | ureq::Error::HostNotFound => {
                TransportErrorKind::Connection
            }
            _ => TransportErrorKind::Other,
        };
        TransportError::new(kind, err.to_string())
    })?;

    let mut out = HttpResponse::new(response.status().as_u16(), Vec::new());
    for (name, value) in response.headers() {
        out = out.with_header(name.as_str(), value.to_str().unwrap_or_default());
    }
    out.body = response
        .body_mut()
        .read_to_vec()
        .map_err(|err| TransportError::new(TransportErrorKind::Connection, err.to_string()))?;
    Ok(out)
}
