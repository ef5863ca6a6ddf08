//! Configuration for the SDK context and for individual request clients.
//!
//! # Design
//! `SdkConfig` is an immutable value handed to `Sdk::new`, which calls
//! `validate` before anything is constructed. It derives `Deserialize` so
//! hosts on the far side of the C ABI can pass it as JSON. `RequestConfig`
//! is the per-client override layer (target, method, extra headers and body
//! fields, timeout, TLS) used by `Sdk::client`.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, SdkError};
use crate::http::HttpMethod;

/// JSON body/query fields.
pub type Parameters = serde_json::Map<String, serde_json::Value>;

pub const DEFAULT_TIMEOUT_SECS: f64 = 15.0;
pub const DEFAULT_IMAGE_MEMORY_COST: u64 = 50 * 1024 * 1024;
pub const EXCEPTION_LOG_FILE: &str = "Exception.log";
pub const USER_BEHAVIOR_FILE: &str = "UserBehavior.plist";

/// How the transport should judge the server certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrustPolicy {
    /// Platform default chain and host validation.
    PerformDefaultEvaluation { validate_host: bool },
    /// Accept only chains containing one of the given certificates.
    PinCertificates { certificates: Vec<PathBuf>, validate_host: bool },
    /// Accept only chains presenting one of the given public keys.
    PinPublicKeys { keys: Vec<PathBuf>, validate_host: bool },
    /// Accept any certificate.
    DisableEvaluation,
}

/// Server trust policy plus the client identity presented on request.
///
/// Kept as one value so the three settings always travel together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfig {
    pub trust_policy: TrustPolicy,
    pub client_certificate: PathBuf,
    pub password: String,
}

impl TlsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.client_certificate.as_os_str().is_empty() {
            return Err(SdkError::InvalidConfig(
                "TLS client certificate path is empty".to_string(),
            ));
        }
        match &self.trust_policy {
            TrustPolicy::PinCertificates { certificates, .. } if certificates.is_empty() => Err(
                SdkError::InvalidConfig("certificate pinning needs at least one certificate".to_string()),
            ),
            TrustPolicy::PinPublicKeys { keys, .. } if keys.is_empty() => Err(SdkError::InvalidConfig(
                "public key pinning needs at least one key".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Host application metadata written into crash reports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppInfo {
    pub display_name: Option<String>,
    pub version: Option<String>,
    /// Vendor-scoped device identifier supplied by the host.
    pub device_id: Option<String>,
}

/// Process-wide settings consumed by the `Sdk` context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SdkConfig {
    pub base_url: String,
    pub default_headers: BTreeMap<String, String>,
    pub default_body: Parameters,
    pub timeout_secs: f64,
    pub tls: Option<TlsConfig>,
    /// Image memory-cache budget in bytes; 0 selects the default.
    pub max_image_memory_cost: u64,
    pub crash_handler: bool,
    pub button_tracking: bool,
    pub screen_tracking: bool,
    /// Screen class names that never produce dwell records.
    pub screen_exclusions: Vec<String>,
    pub documents_dir: Option<PathBuf>,
    pub app: AppInfo,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            default_headers: BTreeMap::new(),
            default_body: Parameters::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            tls: None,
            max_image_memory_cost: DEFAULT_IMAGE_MEMORY_COST,
            crash_handler: false,
            button_tracking: false,
            screen_tracking: false,
            screen_exclusions: Vec::new(),
            documents_dir: None,
            app: AppInfo::default(),
        }
    }
}

impl SdkConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| SdkError::InvalidConfig(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if !self.base_url.is_empty() {
            let parsed = Url::parse(&self.base_url).map_err(|e| SdkError::InvalidUrl {
                url: self.base_url.clone(),
                reason: e.to_string(),
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(SdkError::InvalidConfig(format!(
                    "base URL scheme `{}` is not http(s)",
                    parsed.scheme()
                )));
            }
        }
        let representable = Duration::try_from_secs_f64(self.timeout_secs).is_ok();
        if !representable || self.timeout_secs <= 0.0 {
            return Err(SdkError::InvalidConfig(format!(
                "timeout must be a positive number of seconds, got {}",
                self.timeout_secs
            )));
        }
        if let Some(tls) = &self.tls {
            tls.validate()?;
        }
        Ok(())
    }

    /// Falls back to the default when `timeout_secs` does not fit a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_secs)
            .unwrap_or_else(|_| Duration::from_secs_f64(DEFAULT_TIMEOUT_SECS))
    }

    pub fn image_memory_cost(&self) -> u64 {
        if self.max_image_memory_cost == 0 {
            DEFAULT_IMAGE_MEMORY_COST
        } else {
            self.max_image_memory_cost
        }
    }

    /// Directory holding the crash log, the behavior log and downloads.
    pub fn documents_dir(&self) -> PathBuf {
        if let Some(dir) = &self.documents_dir {
            return dir.clone();
        }
        dirs::document_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join("Documents")))
            .unwrap_or_else(std::env::temp_dir)
    }

    pub fn exception_log_path(&self) -> PathBuf {
        self.documents_dir().join(EXCEPTION_LOG_FILE)
    }

    pub fn behavior_log_path(&self) -> PathBuf {
        self.documents_dir().join(USER_BEHAVIOR_FILE)
    }
}

/// Where a request goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Path joined onto `SdkConfig::base_url`.
    Api(String),
    /// Absolute URL used as-is.
    Url(String),
}

impl Target {
    pub fn api(path: impl Into<String>) -> Self {
        Target::Api(path.into())
    }

    pub fn url(url: impl Into<String>) -> Self {
        Target::Url(url.into())
    }

    /// Resolve against `base_url`. The result is the registry key.
    pub fn resolve(&self, base_url: &str) -> Result<String> {
        match self {
            Target::Api(path) => {
                if base_url.trim().is_empty() {
                    return Err(SdkError::MissingBaseUrl);
                }
                Ok(join_url(base_url, path))
            }
            Target::Url(url) => {
                if url.trim().is_empty() {
                    return Err(SdkError::EmptyUrl);
                }
                Ok(url.clone())
            }
        }
    }
}

impl Default for Target {
    fn default() -> Self {
        Target::Api(String::new())
    }
}

/// Join a base URL and a path with exactly one `/` between them.
pub fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{path}")
    }
}

/// Per-client request settings layered over `SdkConfig`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestConfig {
    pub target: Target,
    pub method: HttpMethod,
    pub headers: BTreeMap<String, String>,
    pub body: Parameters,
    pub timeout: Option<Duration>,
    pub tls: Option<TlsConfig>,
}

impl RequestConfig {
    pub fn new(target: Target, method: HttpMethod) -> Self {
        Self {
            target,
            method,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(timeout) = self.timeout {
            if timeout.is_zero() {
                return Err(SdkError::InvalidConfig("request timeout is zero".to_string()));
            }
        }
        if let Some(tls) = &self.tls {
            tls.validate()?;
        }
        Ok(())
    }
}
