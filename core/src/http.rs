//! HTTP transport types exchanged with the host transport.
//!
//! # Design
//! These types describe HTTP requests and responses as plain data. The
//! facade builds an `HttpRequest` and hands it to the host's `Transport`;
//! the transport reports back an `HttpResponse`. Multipart encoding, TLS
//! evaluation and the socket work all live on the transport side, so the
//! request only carries the structured form and the trust configuration.
//!
//! All fields use owned types (`String`, `Vec`) so values can cross FFI
//! boundaries without lifetime concerns.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::TlsConfig;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Whether body fields travel in the query string rather than the body.
    pub fn encodes_fields_in_query(&self) -> bool {
        matches!(self, HttpMethod::Get | HttpMethod::Delete)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the transport should do with the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    /// Plain request; the body is buffered in memory.
    Data,
    /// Multipart upload; upload progress is reported.
    Upload,
    /// File download; download progress is reported and the body may be
    /// spooled to a temporary file.
    Download,
}

/// Media type of an uploaded file part. The optional string overrides the
/// default file extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MimeKind {
    Image(Option<String>),
    Gif(Option<String>),
    Video(Option<String>),
}

impl MimeKind {
    pub fn mime_type(&self) -> &'static str {
        match self {
            MimeKind::Image(_) => "image/*",
            MimeKind::Gif(_) => "image/gif",
            MimeKind::Video(_) => "video/*",
        }
    }

    pub fn extension(&self) -> &str {
        match self {
            MimeKind::Image(ext) => ext.as_deref().unwrap_or("jpg"),
            MimeKind::Gif(ext) => ext.as_deref().unwrap_or("gif"),
            MimeKind::Video(ext) => ext.as_deref().unwrap_or("mp4"),
        }
    }

    /// File name sent for a part uploaded under `field`.
    pub fn file_name(&self, field: &str) -> String {
        format!("{field}.{}", self.extension())
    }
}

/// One file inside a multipart form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub name: String,
    pub file_name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// A multipart form: plain text fields followed by file parts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartForm {
    pub fields: Vec<(String, String)>,
    pub files: Vec<FilePart>,
}

/// Request payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Vec<u8>),
    Multipart(MultipartForm),
}

impl RequestBody {
    pub fn is_empty(&self) -> bool {
        matches!(self, RequestBody::Empty)
    }
}

/// An HTTP request described as plain data.
///
/// Built by the facade. `url` already carries the query string for
/// GET/DELETE fields; `headers` are deduplicated case-insensitively.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
    pub timeout: Duration,
    pub tls: Option<TlsConfig>,
    pub transfer: TransferKind,
}

impl HttpRequest {
    /// Look up a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// An HTTP response described as plain data.
///
/// Constructed by the transport after executing an `HttpRequest`. For
/// downloads the transport may leave `body` empty and point `temp_file` at
/// the spooled content instead.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub temp_file: Option<PathBuf>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
            temp_file: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// Transfer progress. `total` is `None` when the size is not known up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    pub completed: u64,
    pub total: Option<u64>,
}

impl Progress {
    pub fn new(completed: u64, total: Option<u64>) -> Self {
        Self { completed, total }
    }

    /// Completed fraction in `0.0..=1.0`, if the total is known.
    pub fn fraction(&self) -> Option<f64> {
        match self.total {
            Some(0) => Some(1.0),
            Some(total) => Some((self.completed as f64 / total as f64).min(1.0)),
            None => None,
        }
    }
}

/// Merge header layers in order; a later key replaces an earlier one,
/// compared case-insensitively.
pub fn merge_headers<I, K, V>(layers: I) -> Vec<(String, String)>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let mut merged: Vec<(String, String)> = Vec::new();
    for (key, value) in layers {
        let key = key.into();
        merged.retain(|(existing, _)| !existing.eq_ignore_ascii_case(&key));
        merged.push((key, value.into()));
    }
    merged
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .rev()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}
