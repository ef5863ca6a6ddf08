//! Crash log: panic hook plus host-reported exceptions.
//!
//! # Design
//! Reports are plain-text blocks appended to `<documents>/Exception.log`.
//! `install` registers a process-wide panic hook exactly once and chains
//! whatever hook was installed before it. Hosts forward their own uncaught
//! exceptions through `record`. I/O failures are logged and swallowed.

use std::backtrace::Backtrace;
use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::Write as _;
use std::panic::PanicHookInfo;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once, OnceLock};

use chrono::Local;
use tracing::{debug, warn};

use crate::config::{AppInfo, SdkConfig};

const REPORT_HEADER: &str = "========Exception Report========";
const TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S %3f";
const UNKNOWN: &str = "unknown";

/// App and device facts appended to every report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub manufacturer: String,
    pub system_type: String,
    pub device_code: String,
    pub device_model: String,
    pub system_version: String,
    pub package_name: String,
    pub version_name: String,
    pub version_code: String,
}

impl DeviceInfo {
    /// Probe the running system and fill app fields from `app`.
    pub fn detect(app: &AppInfo) -> Self {
        let (model, release) = system_identity();
        let manufacturer = match std::env::consts::OS {
            "ios" | "macos" => "Apple",
            _ => UNKNOWN,
        };
        let or_unknown = |value: &Option<String>| value.clone().unwrap_or_else(|| UNKNOWN.to_string());
        Self {
            manufacturer: manufacturer.to_string(),
            system_type: std::env::consts::OS.to_string(),
            device_code: or_unknown(&app.device_id),
            device_model: model,
            system_version: release,
            package_name: or_unknown(&app.display_name),
            version_name: or_unknown(&app.version),
            version_code: or_unknown(&app.version),
        }
    }

    fn render(&self) -> String {
        [
            ("deviceManufacturer", &self.manufacturer),
            ("systemType", &self.system_type),
            ("deviceCode", &self.device_code),
            ("deviceModel", &self.device_model),
            ("systemVersion", &self.system_version),
            ("packageName", &self.package_name),
            ("versionName", &self.version_name),
            ("versionCode", &self.version_code),
        ]
        .iter()
        .map(|(label, value)| format!("{label}: {value}"))
        .collect::<Vec<_>>()
        .join("\n")
    }
}

/// Decode a fixed-size, null-terminated C string field (e.g.
/// `utsname.machine`). Bytes after the first NUL are ignored.
pub fn model_from_raw(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

#[cfg(unix)]
fn system_identity() -> (String, String) {
    // SAFETY: `utsname` is plain old data; zeroed is a valid value and
    // `uname` only writes into the struct we own.
    let mut info: libc::utsname = unsafe { std::mem::zeroed() };
    if unsafe { libc::uname(&mut info) } != 0 {
        return (std::env::consts::ARCH.to_string(), UNKNOWN.to_string());
    }
    let field = |raw: &[libc::c_char]| model_from_raw(&raw.iter().map(|&c| c as u8).collect::<Vec<u8>>());
    (field(&info.machine), field(&info.release))
}

#[cfg(not(unix))]
fn system_identity() -> (String, String) {
    (std::env::consts::ARCH.to_string(), UNKNOWN.to_string())
}

/// One crash, panic or host exception.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionReport {
    pub time: String,
    pub name: String,
    pub reason: String,
    pub call_stack: Vec<String>,
}

impl ExceptionReport {
    pub fn new(name: impl Into<String>, reason: impl Into<String>, call_stack: Vec<String>) -> Self {
        Self {
            time: Local::now().format(TIME_FORMAT).to_string(),
            name: name.into(),
            reason: reason.into(),
            call_stack,
        }
    }

    pub fn from_panic(info: &PanicHookInfo<'_>) -> Self {
        let payload = info.payload();
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "Unknown".to_string());
        let reason = match info.location() {
            Some(location) => format!("{message} ({location})"),
            None => message,
        };
        let thread = std::thread::current();
        let name = format!("panic in thread '{}'", thread.name().unwrap_or("<unnamed>"));
        let call_stack = Backtrace::force_capture()
            .to_string()
            .lines()
            .map(|line| line.trim_end().to_string())
            .collect();
        Self::new(name, reason, call_stack)
    }

    pub fn render(&self, device: &DeviceInfo) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{REPORT_HEADER}");
        let _ = writeln!(out, "time:{}", self.time);
        let _ = writeln!(out, "name:{}", self.name);
        let _ = writeln!(out, "reason:\n{}", self.reason);
        let _ = writeln!(out, "callStackSymbols:\n{}", self.call_stack.join("\n"));
        let _ = writeln!(out, "appAndDeviceInfo:\n{}", device.render());
        out
    }
}

/// Append-only writer for `Exception.log`.
#[derive(Debug)]
pub struct CrashLogger {
    path: PathBuf,
    device: DeviceInfo,
}

static HOOK_LOGGER: OnceLock<Arc<CrashLogger>> = OnceLock::new();
static HOOK_INSTALLED: Once = Once::new();

impl CrashLogger {
    pub fn new(path: impl Into<PathBuf>, device: DeviceInfo) -> Self {
        Self {
            path: path.into(),
            device,
        }
    }

    pub fn from_config(config: &SdkConfig) -> Self {
        Self::new(config.exception_log_path(), DeviceInfo::detect(&config.app))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    /// Append `report`, creating the file and its directory if needed.
    pub fn record(&self, report: &ExceptionReport) {
        if let Err(err) = self.append(&report.render(&self.device)) {
            warn!(path = %self.path.display(), error = %err, "failed to write exception report");
        }
    }

    fn append(&self, text: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(text.as_bytes())?;
        file.flush()
    }

    /// Whole log as text, `None` if it does not exist or is unreadable.
    pub fn exception_log(&self) -> Option<String> {
        fs::read_to_string(&self.path).ok()
    }

    /// Install the panic hook for this process. Only the first call in a
    /// process installs anything; later calls return `false`.
    pub fn install(self: &Arc<Self>) -> bool {
        let mut installed = false;
        HOOK_INSTALLED.call_once(|| {
            let logger = HOOK_LOGGER.get_or_init(|| self.clone()).clone();
            let previous = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                logger.record(&ExceptionReport::from_panic(info));
                previous(info);
            }));
            installed = true;
            debug!(path = %self.path.display(), "crash handler installed");
        });
        installed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> DeviceInfo {
        DeviceInfo::detect(&AppInfo {
            display_name: Some("Demo".into()),
            version: Some("1.2.0".into()),
            device_id: Some("ABC-123".into()),
        })
    }

    #[test]
    fn model_from_raw_stops_at_nul() {
        let mut raw = [0u8; 16];
        raw[..9].copy_from_slice(b"iPhone8,1");
        raw[10] = b'x';
        assert_eq!(model_from_raw(&raw), "iPhone8,1");
        assert_eq!(model_from_raw(b"arm64"), "arm64");
        assert_eq!(model_from_raw(&[0, b'a']), "");
    }

    #[test]
    fn render_has_all_sections() {
        let report = ExceptionReport::new("NSRangeException", "index 3 beyond bounds", vec!["0 foo".into(), "1 bar".into()]);
        let text = report.render(&device());
        assert!(text.starts_with("========Exception Report========\n"));
        assert!(text.contains("name:NSRangeException\n"));
        assert!(text.contains("reason:\nindex 3 beyond bounds\n"));
        assert!(text.contains("callStackSymbols:\n0 foo\n1 bar\n"));
        assert!(text.contains("deviceCode: ABC-123"));
        assert!(text.contains("packageName: Demo"));
        assert!(text.contains("versionCode: 1.2.0"));
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn time_uses_slash_date_and_millis() {
        let report = ExceptionReport::new("n", "r", Vec::new());
        // 2026/10/19 08:15:42 123
        assert_eq!(report.time.len(), 23);
        assert_eq!(&report.time[4..5], "/");
        assert_eq!(&report.time[19..20], " ");
    }

    #[test]
    fn records_append_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let logger = CrashLogger::new(dir.path().join("nested/Exception.log"), device());
        assert!(logger.exception_log().is_none());

        logger.record(&ExceptionReport::new("First", "one", Vec::new()));
        logger.record(&ExceptionReport::new("Second", "two", Vec::new()));

        let log = logger.exception_log().unwrap();
        assert_eq!(log.matches(REPORT_HEADER).count(), 2);
        let first = log.find("name:First").unwrap();
        let second = log.find("name:Second").unwrap();
        assert!(first < second);
    }

    #[test]
    fn unwritable_path_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let logger = CrashLogger::new(dir.path().to_path_buf(), device());
        logger.record(&ExceptionReport::new("n", "r", Vec::new()));
    }
}
