//! Request facade: builds request descriptors and dispatches them.
//!
//! # Design
//! `NetClient` pairs the process-wide `SdkConfig` with one `RequestConfig`.
//! Each response shape is split into a pure `build_*` step that produces an
//! `HttpRequest` and a pure `parse_*` step that turns the transport's answer
//! into the callback payload. `dispatch` glues them together: reachability
//! check, task creation, registry bookkeeping, resume.
//!
//! Precedence rules:
//! - headers: user agent < JSON content type < `SdkConfig::default_headers`
//!   < `RequestConfig::headers`, compared case-insensitively;
//! - fields: `SdkConfig::default_body` < `RequestConfig::body` < caller
//!   parameters.
//!
//! GET/DELETE fields go into the query string (strings verbatim, other
//! values as JSON text); POST/PUT fields form a JSON object body.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use crate::callbacks::{
    BasicHandler, BasicResponse, DownloadFailure, DownloadHandler, DownloadSuccess, ModelHandler, ModelResponse,
    UploadHandler, UploadOutcome,
};
use crate::config::{Parameters, RequestConfig, SdkConfig, Target, TlsConfig};
use crate::error::{Failure, Result, SdkError, TransportError};
use crate::http::{
    merge_headers, FilePart, HttpMethod, HttpRequest, HttpResponse, MimeKind, MultipartForm, RequestBody,
    TransferKind,
};
use crate::mapping;
use crate::network::NetworkMonitor;
use crate::registry::RequestRegistry;
use crate::transport::{CompletionFn, ProgressFn, Transport};

pub const USER_AGENT: &str = concat!("appkit/", env!("CARGO_PKG_VERSION"));
const DEFAULT_DOWNLOAD_NAME: &str = "temp.tmp";

/// Returned by every successful dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTicket {
    /// Correlates log lines for one request.
    pub id: Uuid,
    /// Registry key: the resolved target URL without query string.
    pub url: String,
}

/// Files and fields for a multipart upload.
#[derive(Debug, Clone)]
pub struct UploadForm {
    /// Field name -> file content. Each part is sent as `<field>.<ext>`.
    pub files: Vec<(String, Vec<u8>)>,
    pub fields: Parameters,
    /// Media width/height, sent as `width` / `height` headers.
    pub size: Option<(f64, f64)>,
    pub mime: MimeKind,
}

impl UploadForm {
    pub fn new(mime: MimeKind) -> Self {
        Self {
            files: Vec::new(),
            fields: Parameters::new(),
            size: None,
            mime,
        }
    }

    pub fn file(mut self, field: impl Into<String>, data: Vec<u8>) -> Self {
        self.files.push((field.into(), data));
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn size(mut self, width: f64, height: f64) -> Self {
        self.size = Some((width, height));
        self
    }
}

/// Collaborators shared by every client created from one `Sdk`.
pub(crate) struct ClientContext {
    pub(crate) config: Arc<SdkConfig>,
    pub(crate) registry: Arc<RequestRegistry>,
    pub(crate) network: Arc<NetworkMonitor>,
    pub(crate) transport: Arc<dyn Transport>,
}

/// HTTP facade bound to one `RequestConfig`.
#[derive(Clone)]
pub struct NetClient {
    ctx: Arc<ClientContext>,
    request: Arc<RequestConfig>,
}

impl NetClient {
    pub(crate) fn new(ctx: Arc<ClientContext>, request: RequestConfig) -> Self {
        Self {
            ctx,
            request: Arc::new(request),
        }
    }

    pub fn request_config(&self) -> &RequestConfig {
        &self.request
    }

    // -----------------------------------------------------------------------
    // Building
    // -----------------------------------------------------------------------

    /// Build a plain data request. Returns the registry key with it.
    pub fn build_request(
        &self,
        method: HttpMethod,
        target: &Target,
        params: Option<Parameters>,
    ) -> Result<(String, HttpRequest)> {
        self.build(method, target, params, TransferKind::Data)
    }

    pub fn build_download(&self, target: &Target, params: Option<Parameters>) -> Result<(String, HttpRequest)> {
        self.build(HttpMethod::Get, target, params, TransferKind::Download)
    }

    pub fn build_upload(&self, target: &Target, form: UploadForm) -> Result<(String, HttpRequest)> {
        let key = target.resolve(&self.ctx.config.base_url)?;
        parse_url(&key)?;

        let mut extra = Vec::new();
        if let Some((width, height)) = form.size {
            extra.push(("width".to_string(), width.to_string()));
            extra.push(("height".to_string(), height.to_string()));
        }
        let mut headers = self.headers(extra);
        headers.retain(|(name, _)| !name.eq_ignore_ascii_case("content-type"));

        let fields = self
            .merge_fields(Some(form.fields))
            .into_iter()
            .map(|(name, value)| (name, value_to_text(&value)))
            .collect();
        let files = form
            .files
            .into_iter()
            .map(|(name, data)| FilePart {
                file_name: form.mime.file_name(&name),
                mime_type: form.mime.mime_type().to_string(),
                name,
                data,
            })
            .collect();

        let request = HttpRequest {
            method: HttpMethod::Post,
            url: key.clone(),
            headers,
            body: RequestBody::Multipart(MultipartForm { fields, files }),
            timeout: self.timeout(),
            tls: self.tls(),
            transfer: TransferKind::Upload,
        };
        Ok((key, request))
    }

    /// Build a bare image GET. SDK default fields and headers are not
    /// applied, since image hosts are usually not the API host.
    pub fn build_image(&self, url: &str) -> Result<(String, HttpRequest)> {
        let key = Target::url(url).resolve(&self.ctx.config.base_url)?;
        parse_url(&key)?;
        let request = HttpRequest {
            method: HttpMethod::Get,
            url: key.clone(),
            headers: vec![("User-Agent".to_string(), USER_AGENT.to_string())],
            body: RequestBody::Empty,
            timeout: self.timeout(),
            tls: self.tls(),
            transfer: TransferKind::Data,
        };
        Ok((key, request))
    }

    fn build(
        &self,
        method: HttpMethod,
        target: &Target,
        params: Option<Parameters>,
        transfer: TransferKind,
    ) -> Result<(String, HttpRequest)> {
        let key = target.resolve(&self.ctx.config.base_url)?;
        let mut url = parse_url(&key)?;
        let fields = self.merge_fields(params);

        let (url, body) = if fields.is_empty() {
            (key.clone(), RequestBody::Empty)
        } else if method.encodes_fields_in_query() {
            {
                let mut query = url.query_pairs_mut();
                for (name, value) in &fields {
                    query.append_pair(name, &value_to_text(value));
                }
            }
            (url.to_string(), RequestBody::Empty)
        } else {
            let body = serde_json::to_vec(&Value::Object(fields)).map_err(|e| SdkError::Serialization(e.to_string()))?;
            (key.clone(), RequestBody::Json(body))
        };

        let request = HttpRequest {
            method,
            url,
            headers: self.headers(Vec::new()),
            body,
            timeout: self.timeout(),
            tls: self.tls(),
            transfer,
        };
        Ok((key, request))
    }

    fn headers(&self, extra: Vec<(String, String)>) -> Vec<(String, String)> {
        let base = [
            ("User-Agent".to_string(), USER_AGENT.to_string()),
            ("Content-Type".to_string(), "application/json".to_string()),
        ];
        merge_headers(
            base.into_iter()
                .chain(clone_map(&self.ctx.config.default_headers))
                .chain(clone_map(&self.request.headers))
                .chain(extra),
        )
    }

    fn merge_fields(&self, params: Option<Parameters>) -> Parameters {
        let mut fields = self.ctx.config.default_body.clone();
        fields.extend(self.request.body.clone());
        if let Some(params) = params {
            fields.extend(params);
        }
        fields
    }

    fn timeout(&self) -> Duration {
        self.request.timeout.unwrap_or_else(|| self.ctx.config.timeout())
    }

    fn tls(&self) -> Option<TlsConfig> {
        self.request.tls.clone().or_else(|| self.ctx.config.tls.clone())
    }

    // -----------------------------------------------------------------------
    // Parsing
    // -----------------------------------------------------------------------

    pub fn parse_basic(
        outcome: std::result::Result<HttpResponse, TransportError>,
    ) -> std::result::Result<BasicResponse, Failure> {
        let response = outcome.map_err(Failure::from_transport)?;
        check_status(&response)?;
        Ok(BasicResponse::from_body(response.status, response.body))
    }

    pub fn parse_model<T: DeserializeOwned>(
        outcome: std::result::Result<HttpResponse, TransportError>,
        key_path: Option<&str>,
        array: bool,
    ) -> std::result::Result<ModelResponse<T>, Failure> {
        let response = outcome.map_err(Failure::from_transport)?;
        check_status(&response)?;
        match mapping::decode(&response.body, key_path, array) {
            Ok(model) => Ok(ModelResponse {
                model,
                data: response.body,
            }),
            Err(error) => Err(Failure {
                data: Some(response.body),
                error,
                status: Some(response.status),
            }),
        }
    }

    pub fn parse_upload(url: &str, outcome: std::result::Result<HttpResponse, TransportError>) -> UploadOutcome {
        match outcome {
            Ok(response) => {
                let json = BasicResponse::from_body(response.status, response.body).json;
                if (200..300).contains(&response.status) {
                    UploadOutcome {
                        url: url.to_string(),
                        success: true,
                        error: None,
                        json,
                        status: Some(response.status),
                    }
                } else {
                    UploadOutcome {
                        url: url.to_string(),
                        success: false,
                        error: Some(SdkError::HttpStatus {
                            status: response.status,
                        }),
                        json,
                        status: Some(response.status),
                    }
                }
            }
            Err(err) => UploadOutcome {
                url: url.to_string(),
                success: false,
                status: err.status,
                error: Some(SdkError::Transport(err)),
                json: None,
            },
        }
    }

    /// Store a download under `documents_dir` and describe the result.
    pub fn parse_download(
        url: &str,
        documents_dir: &Path,
        outcome: std::result::Result<HttpResponse, TransportError>,
    ) -> std::result::Result<DownloadSuccess, DownloadFailure> {
        let response = match outcome {
            Ok(response) => response,
            Err(err) => {
                return Err(DownloadFailure {
                    resume_data: err.body.clone(),
                    temporary: None,
                    status: err.status,
                    error: SdkError::Transport(err),
                })
            }
        };
        if !response.is_success() {
            return Err(DownloadFailure {
                temporary: response.temp_file,
                error: SdkError::HttpStatus {
                    status: response.status,
                },
                status: Some(response.status),
                resume_data: Some(response.body),
            });
        }

        let destination = documents_dir.join(suggested_file_name(url, &response));
        let temporary = response.temp_file.clone();
        let status = response.status;
        match store_download(&destination, response) {
            Ok(data) => Ok(DownloadSuccess {
                temporary,
                destination,
                data,
            }),
            Err(err) => {
                warn!(path = %destination.display(), error = %err, "failed to store download");
                Err(DownloadFailure {
                    resume_data: None,
                    temporary,
                    error: SdkError::Io(err),
                    status: Some(status),
                })
            }
        }
    }

    // -----------------------------------------------------------------------
    // Basic shape
    // -----------------------------------------------------------------------

    /// Dispatch using the client's configured target and method.
    pub fn request(&self, params: Option<Parameters>, handler: BasicHandler) -> Result<RequestTicket> {
        let target = self.request.target.clone();
        self.send(self.request.method, target, params, handler)
    }

    pub fn get(&self, api: &str, params: Option<Parameters>, handler: BasicHandler) -> Result<RequestTicket> {
        self.send(HttpMethod::Get, Target::api(api), params, handler)
    }

    pub fn post(&self, api: &str, params: Option<Parameters>, handler: BasicHandler) -> Result<RequestTicket> {
        self.send(HttpMethod::Post, Target::api(api), params, handler)
    }

    pub fn put(&self, api: &str, params: Option<Parameters>, handler: BasicHandler) -> Result<RequestTicket> {
        self.send(HttpMethod::Put, Target::api(api), params, handler)
    }

    pub fn delete(&self, api: &str, params: Option<Parameters>, handler: BasicHandler) -> Result<RequestTicket> {
        self.send(HttpMethod::Delete, Target::api(api), params, handler)
    }

    pub fn send(
        &self,
        method: HttpMethod,
        target: Target,
        params: Option<Parameters>,
        handler: BasicHandler,
    ) -> Result<RequestTicket> {
        let (key, request) = self.build_request(method, &target, params)?;
        self.dispatch(
            key,
            request,
            None,
            Box::new(move |outcome| handler.finish(Self::parse_basic(outcome))),
        )
    }

    pub(crate) fn send_image(&self, url: &str, handler: BasicHandler) -> Result<RequestTicket> {
        let (key, request) = self.build_image(url)?;
        self.dispatch(
            key,
            request,
            None,
            Box::new(move |outcome| handler.finish(Self::parse_basic(outcome))),
        )
    }

    // -----------------------------------------------------------------------
    // Model shape
    // -----------------------------------------------------------------------

    pub fn request_model<T>(&self, params: Option<Parameters>, handler: ModelHandler<T>) -> Result<RequestTicket>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let target = self.request.target.clone();
        self.send_model(self.request.method, target, params, handler)
    }

    pub fn get_model<T>(&self, api: &str, params: Option<Parameters>, handler: ModelHandler<T>) -> Result<RequestTicket>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.send_model(HttpMethod::Get, Target::api(api), params, handler)
    }

    pub fn post_model<T>(&self, api: &str, params: Option<Parameters>, handler: ModelHandler<T>) -> Result<RequestTicket>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.send_model(HttpMethod::Post, Target::api(api), params, handler)
    }

    pub fn put_model<T>(&self, api: &str, params: Option<Parameters>, handler: ModelHandler<T>) -> Result<RequestTicket>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.send_model(HttpMethod::Put, Target::api(api), params, handler)
    }

    pub fn delete_model<T>(&self, api: &str, params: Option<Parameters>, handler: ModelHandler<T>) -> Result<RequestTicket>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.send_model(HttpMethod::Delete, Target::api(api), params, handler)
    }

    pub fn send_model<T>(
        &self,
        method: HttpMethod,
        target: Target,
        params: Option<Parameters>,
        handler: ModelHandler<T>,
    ) -> Result<RequestTicket>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let (key, request) = self.build_request(method, &target, params)?;
        self.dispatch(
            key,
            request,
            None,
            Box::new(move |outcome| {
                let (key_path, array) = handler.shape();
                let parsed = Self::parse_model::<T>(outcome, key_path, array);
                handler.finish(parsed);
            }),
        )
    }

    // -----------------------------------------------------------------------
    // File transfers
    // -----------------------------------------------------------------------

    pub fn upload(&self, target: Target, form: UploadForm, handler: UploadHandler) -> Result<RequestTicket> {
        let (key, request) = self.build_upload(&target, form)?;
        let (on_result, on_progress) = handler.split();
        let progress = on_progress.map(|callback| {
            let url = key.clone();
            Box::new(move |progress| callback(&url, progress)) as ProgressFn
        });
        let url = key.clone();
        self.dispatch(
            key,
            request,
            progress,
            Box::new(move |outcome| {
                let result = Self::parse_upload(&url, outcome);
                if let Some(on_result) = on_result {
                    on_result(result);
                }
            }),
        )
    }

    pub fn download(
        &self,
        target: Target,
        params: Option<Parameters>,
        mut handler: DownloadHandler,
    ) -> Result<RequestTicket> {
        let (key, request) = self.build_download(&target, params)?;
        let progress = handler.take_progress();
        let url = key.clone();
        let documents_dir = self.ctx.config.documents_dir();
        self.dispatch(
            key,
            request,
            progress,
            Box::new(move |outcome| handler.finish(Self::parse_download(&url, &documents_dir, outcome))),
        )
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    fn dispatch(
        &self,
        key: String,
        request: HttpRequest,
        progress: Option<ProgressFn>,
        on_complete: CompletionFn,
    ) -> Result<RequestTicket> {
        if !self.ctx.network.is_reachable() {
            debug!(url = %key, network = %self.ctx.network.status(), "network not reachable, request dropped");
            return Err(SdkError::NotReachable);
        }

        let id = Uuid::new_v4();
        debug!(%id, method = %request.method, url = %request.url, "dispatching request");

        let registry = self.ctx.registry.clone();
        let registry_key = key.clone();
        let completion: CompletionFn = Box::new(move |outcome| {
            registry.remove(&registry_key);
            match &outcome {
                Ok(response) => debug!(%id, status = response.status, "request finished"),
                Err(err) => debug!(%id, error = %err, "request failed"),
            }
            on_complete(outcome);
        });

        let handle = self.ctx.transport.create_task(request, progress, completion);
        self.ctx.registry.register(key.clone(), handle.clone());
        handle.resume();
        Ok(RequestTicket { id, url: key })
    }
}

fn parse_url(url: &str) -> Result<Url> {
    Url::parse(url).map_err(|e| SdkError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

fn check_status(response: &HttpResponse) -> std::result::Result<(), Failure> {
    if response.is_success() {
        return Ok(());
    }
    Err(Failure {
        data: Some(response.body.clone()),
        error: SdkError::HttpStatus {
            status: response.status,
        },
        status: Some(response.status),
    })
}

fn clone_map(map: &BTreeMap<String, String>) -> impl Iterator<Item = (String, String)> + '_ {
    map.iter().map(|(k, v)| (k.clone(), v.clone()))
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Pick the file name for a download: Content-Disposition, then the last
/// URL path segment, then a fixed fallback. Only the final path component
/// is kept.
fn suggested_file_name(url: &str, response: &HttpResponse) -> String {
    let from_header = response
        .header("content-disposition")
        .and_then(disposition_file_name);
    let from_url = || {
        Url::parse(url)
            .ok()
            .and_then(|u| u.path_segments().and_then(|mut s| s.next_back().map(str::to_string)))
            .filter(|segment| !segment.is_empty())
    };
    from_header
        .or_else(from_url)
        .and_then(|name| Path::new(&name).file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| DEFAULT_DOWNLOAD_NAME.to_string())
}

fn disposition_file_name(header: &str) -> Option<String> {
    header.split(';').map(str::trim).find_map(|part| {
        let (key, value) = part.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("filename") {
            return None;
        }
        let value = value.trim().trim_matches('"');
        (!value.is_empty()).then(|| value.to_string())
    })
}

fn store_download(destination: &Path, response: HttpResponse) -> io::Result<Vec<u8>> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }
    if destination.exists() {
        fs::remove_file(destination)?;
    }
    match response.temp_file {
        Some(temp) if response.body.is_empty() => {
            fs::copy(&temp, destination)?;
            fs::read(destination)
        }
        _ => {
            fs::write(destination, &response.body)?;
            Ok(response.body)
        }
    }
}

/// Registry key for an API-relative path, for control-by-API calls.
pub(crate) fn api_key(config: &SdkConfig, api: &str) -> Result<String> {
    Target::api(api).resolve(&config.base_url)
}
