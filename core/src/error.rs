//! Error types for the SDK.
//!
//! # Design
//! `SdkError` is the single error type threaded through the crate. Dispatch
//! preconditions (`MissingBaseUrl`, `EmptyUrl`, `NotReachable`) are returned
//! directly from the dispatching call and never reach a callback. Everything
//! that happens after the transport takes over is delivered through the
//! failure callback, wrapped in a `Failure` together with the raw body and
//! status code.

use std::fmt;

use thiserror::Error;

/// Errors produced by the SDK.
#[derive(Debug, Error)]
pub enum SdkError {
    /// An API-relative target was dispatched but no base URL is configured.
    #[error("base URL is not configured")]
    MissingBaseUrl,

    /// The request target (or control key) is empty.
    #[error("request URL is empty")]
    EmptyUrl,

    /// The request target could not be parsed as an absolute URL.
    #[error("invalid URL `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The network monitor reports no connectivity; nothing was dispatched.
    #[error("network is not reachable")]
    NotReachable,

    /// The configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The transport failed before a response was received.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}")]
    HttpStatus { status: u16 },

    /// The response body could not be decoded into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The request parameters could not be encoded.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The configured key path does not exist in the response document.
    #[error("key path `{0}` not found in response")]
    KeyPathNotFound(String),

    /// Reading or writing a local file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The behavior log could not be encoded or decoded.
    #[error("property list error: {0}")]
    Plist(String),
}

pub type Result<T> = std::result::Result<T, SdkError>;

/// Category of a transport-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Cancelled,
    TimedOut,
    Connection,
    Tls,
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransportErrorKind::Cancelled => "cancelled",
            TransportErrorKind::TimedOut => "timed out",
            TransportErrorKind::Connection => "connection failed",
            TransportErrorKind::Tls => "TLS failure",
            TransportErrorKind::Other => "failed",
        };
        f.write_str(label)
    }
}

/// A failure reported by the host transport.
///
/// `status` and `body` are filled in when the transport got far enough to
/// receive (part of) a response before failing.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
    pub status: Option<u16>,
    pub body: Option<Vec<u8>>,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            body: None,
        }
    }

    pub fn cancelled() -> Self {
        Self::new(TransportErrorKind::Cancelled, "request was cancelled")
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }
}

/// Payload of every failure callback: the raw body (if any), the error, and
/// the HTTP status when one was received.
#[derive(Debug)]
pub struct Failure {
    pub data: Option<Vec<u8>>,
    pub error: SdkError,
    pub status: Option<u16>,
}

impl Failure {
    pub fn new(error: SdkError) -> Self {
        Self {
            data: None,
            error,
            status: None,
        }
    }

    pub(crate) fn from_transport(err: TransportError) -> Self {
        Self {
            data: err.body.clone(),
            status: err.status,
            error: SdkError::Transport(err),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (status {status})", self.error),
            None => write!(f, "{}", self.error),
        }
    }
}
