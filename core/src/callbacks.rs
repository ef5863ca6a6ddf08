//! Callback handlers for the three response shapes.
//!
//! Every handler holds `FnOnce` success/failure closures and is consumed by
//! `finish`, so at most one of them can ever run. Progress closures are
//! `Fn` and handed to the transport separately.

use std::path::PathBuf;

use serde_json::{Map, Value};

use crate::error::{Failure, SdkError};
use crate::http::Progress;
use crate::mapping::Mapped;

type FailureFn = Box<dyn FnOnce(Failure) + Send>;

/// Successful basic response: raw bytes plus the text and JSON views when
/// the body supports them.
#[derive(Debug, Clone)]
pub struct BasicResponse {
    pub status: u16,
    pub data: Vec<u8>,
    pub text: Option<String>,
    pub json: Option<Map<String, Value>>,
}

impl BasicResponse {
    pub fn from_body(status: u16, data: Vec<u8>) -> Self {
        let text = String::from_utf8(data.clone()).ok();
        let json = match serde_json::from_slice::<Value>(&data) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        };
        Self {
            status,
            data,
            text,
            json,
        }
    }
}

/// Handler for the bytes / text / JSON object shape.
#[derive(Default)]
pub struct BasicHandler {
    success: Option<Box<dyn FnOnce(BasicResponse) + Send>>,
    failure: Option<FailureFn>,
}

impl BasicHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_success(mut self, callback: impl FnOnce(BasicResponse) + Send + 'static) -> Self {
        self.success = Some(Box::new(callback));
        self
    }

    pub fn on_failure(mut self, callback: impl FnOnce(Failure) + Send + 'static) -> Self {
        self.failure = Some(Box::new(callback));
        self
    }

    pub(crate) fn finish(self, outcome: Result<BasicResponse, Failure>) {
        match outcome {
            Ok(response) => {
                if let Some(success) = self.success {
                    success(response);
                }
            }
            Err(failure) => {
                if let Some(on_failure) = self.failure {
                    on_failure(failure);
                }
            }
        }
    }
}

/// Successful typed response: the decoded model(s) and the raw body.
#[derive(Debug, Clone)]
pub struct ModelResponse<T> {
    pub model: Mapped<T>,
    pub data: Vec<u8>,
}

/// Handler for the typed-model shape.
///
/// `key_path` and `array` describe where the model sits in the document and
/// whether a list is expected.
pub struct ModelHandler<T> {
    key_path: Option<String>,
    array: bool,
    success: Option<Box<dyn FnOnce(ModelResponse<T>) + Send>>,
    failure: Option<FailureFn>,
}

impl<T> Default for ModelHandler<T> {
    fn default() -> Self {
        Self {
            key_path: None,
            array: false,
            success: None,
            failure: None,
        }
    }
}

impl<T> ModelHandler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key_path(mut self, path: impl Into<String>) -> Self {
        self.key_path = Some(path.into());
        self
    }

    pub fn array(mut self, array: bool) -> Self {
        self.array = array;
        self
    }

    pub fn on_success(mut self, callback: impl FnOnce(ModelResponse<T>) + Send + 'static) -> Self {
        self.success = Some(Box::new(callback));
        self
    }

    pub fn on_failure(mut self, callback: impl FnOnce(Failure) + Send + 'static) -> Self {
        self.failure = Some(Box::new(callback));
        self
    }

    pub(crate) fn shape(&self) -> (Option<&str>, bool) {
        (self.key_path.as_deref(), self.array)
    }

    pub(crate) fn finish(self, outcome: Result<ModelResponse<T>, Failure>) {
        match outcome {
            Ok(response) => {
                if let Some(success) = self.success {
                    success(response);
                }
            }
            Err(failure) => {
                if let Some(on_failure) = self.failure {
                    on_failure(failure);
                }
            }
        }
    }
}

/// Result of a multipart upload.
#[derive(Debug)]
pub struct UploadOutcome {
    pub url: String,
    pub success: bool,
    pub error: Option<SdkError>,
    pub json: Option<Map<String, Value>>,
    pub status: Option<u16>,
}

/// Handler for uploads: one result callback plus optional progress.
#[derive(Default)]
pub struct UploadHandler {
    result: Option<Box<dyn FnOnce(UploadOutcome) + Send>>,
    progress: Option<Box<dyn Fn(&str, Progress) + Send + Sync>>,
}

impl UploadHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_result(mut self, callback: impl FnOnce(UploadOutcome) + Send + 'static) -> Self {
        self.result = Some(Box::new(callback));
        self
    }

    pub fn on_progress(mut self, callback: impl Fn(&str, Progress) + Send + Sync + 'static) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    pub(crate) fn split(
        self,
    ) -> (
        Option<Box<dyn FnOnce(UploadOutcome) + Send>>,
        Option<Box<dyn Fn(&str, Progress) + Send + Sync>>,
    ) {
        (self.result, self.progress)
    }
}

/// Successful download.
#[derive(Debug, Clone)]
pub struct DownloadSuccess {
    /// Spool file reported by the transport, if it used one.
    pub temporary: Option<PathBuf>,
    pub destination: PathBuf,
    pub data: Vec<u8>,
}

/// Failed download. `resume_data` is whatever partial body was received.
#[derive(Debug)]
pub struct DownloadFailure {
    pub resume_data: Option<Vec<u8>>,
    pub temporary: Option<PathBuf>,
    pub error: SdkError,
    pub status: Option<u16>,
}

/// Handler for downloads.
#[derive(Default)]
pub struct DownloadHandler {
    success: Option<Box<dyn FnOnce(DownloadSuccess) + Send>>,
    failure: Option<Box<dyn FnOnce(DownloadFailure) + Send>>,
    progress: Option<Box<dyn Fn(Progress) + Send + Sync>>,
}

impl DownloadHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_success(mut self, callback: impl FnOnce(DownloadSuccess) + Send + 'static) -> Self {
        self.success = Some(Box::new(callback));
        self
    }

    pub fn on_failure(mut self, callback: impl FnOnce(DownloadFailure) + Send + 'static) -> Self {
        self.failure = Some(Box::new(callback));
        self
    }

    pub fn on_progress(mut self, callback: impl Fn(Progress) + Send + Sync + 'static) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    pub(crate) fn take_progress(&mut self) -> Option<Box<dyn Fn(Progress) + Send + Sync>> {
        self.progress.take()
    }

    pub(crate) fn finish(self, outcome: Result<DownloadSuccess, DownloadFailure>) {
        match outcome {
            Ok(success) => {
                if let Some(on_success) = self.success {
                    on_success(success);
                }
            }
            Err(failure) => {
                if let Some(on_failure) = self.failure {
                    on_failure(failure);
                }
            }
        }
    }
}
