//! User behavior tracking: button taps and screen dwell time.
//!
//! # Design
//! The host calls `ButtonTracker::tap` and `ScreenTracker::appeared` /
//! `disappeared` from its own UI event hooks. Both trackers hand finished
//! records to one `BehaviorStore`, whose writer thread owns the plist file.
//! Each append is a read-modify-write of the whole array, written to a
//! sibling temp file and renamed over the original, so concurrent taps
//! never lose records and readers never see a half-written file.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use chrono::Local;
use tracing::{debug, trace, warn};

use crate::config::SdkConfig;
use crate::error::{Result, SdkError};

pub const TIME_KEY: &str = "Time";
pub const BUTTON_CLICK_KEY: &str = "ButtonClick";
pub const SCREEN_HOLD_KEY: &str = "viewControllerHold";
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One entry of the behavior log.
pub type LogRecord = BTreeMap<String, String>;

fn record(key: &str, value: String) -> LogRecord {
    let mut record = LogRecord::new();
    record.insert(TIME_KEY.to_string(), Local::now().format(TIME_FORMAT).to_string());
    record.insert(key.to_string(), value);
    record
}

enum Command {
    Append(LogRecord),
    Flush(Sender<()>),
    Shutdown,
}

/// Serialized writer for `UserBehavior.plist`.
pub struct BehaviorStore {
    path: PathBuf,
    sender: Sender<Command>,
    worker: Option<JoinHandle<()>>,
}

impl BehaviorStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let (sender, receiver) = mpsc::channel();
        let worker_path = path.clone();
        let worker = thread::Builder::new()
            .name("appkit-behavior".to_string())
            .spawn(move || run_writer(&worker_path, receiver))?;
        Ok(Self {
            path,
            sender,
            worker: Some(worker),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Queue `record` for appending.
    pub fn append(&self, record: LogRecord) {
        if self.sender.send(Command::Append(record)).is_err() {
            warn!("behavior writer is gone, record dropped");
        }
    }

    /// Block until every append queued so far is on disk.
    pub fn flush(&self) {
        let (tx, rx) = mpsc::channel();
        if self.sender.send(Command::Flush(tx)).is_ok() {
            let _ = rx.recv();
        }
    }

    /// Records currently on disk. A missing file reads as empty.
    pub fn read(&self) -> Result<Vec<LogRecord>> {
        read_records(&self.path)
    }
}

impl Drop for BehaviorStore {
    fn drop(&mut self) {
        let _ = self.sender.send(Command::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn run_writer(path: &Path, receiver: Receiver<Command>) {
    for command in receiver {
        match command {
            Command::Append(record) => {
                if let Err(err) = append_record(path, record) {
                    warn!(path = %path.display(), error = %err, "failed to append behavior record");
                }
            }
            Command::Flush(reply) => {
                let _ = reply.send(());
            }
            Command::Shutdown => break,
        }
    }
    trace!("behavior writer stopped");
}

fn read_records(path: &Path) -> Result<Vec<LogRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    plist::from_file(path).map_err(|e| SdkError::Plist(e.to_string()))
}

fn append_record(path: &Path, record: LogRecord) -> Result<()> {
    let mut records = match read_records(path) {
        Ok(records) => records,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "behavior log unreadable, starting a new one");
            Vec::new()
        }
    };
    records.push(record);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let temp = path.with_extension("plist.tmp");
    let writer = BufWriter::new(File::create(&temp)?);
    plist::to_writer_xml(writer, &records).map_err(|e| SdkError::Plist(e.to_string()))?;
    fs::rename(&temp, path)?;
    Ok(())
}

/// Counts taps per button identifier.
pub struct ButtonTracker {
    store: Arc<BehaviorStore>,
    enabled: AtomicBool,
    counts: Mutex<HashMap<String, u64>>,
}

impl ButtonTracker {
    pub fn new(store: Arc<BehaviorStore>) -> Self {
        Self {
            store,
            enabled: AtomicBool::new(false),
            counts: Mutex::new(HashMap::new()),
        }
    }

    /// Turn tracking on. Returns `true` only for the call that enabled it.
    pub fn enable(&self) -> bool {
        !self.enabled.swap(true, Ordering::SeqCst)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Record a tap. Blank identifiers are not tracked.
    ///
    /// Returns the identifier's tap count, or `None` when nothing was recorded.
    pub fn tap(&self, identifier: &str) -> Option<u64> {
        if !self.is_enabled() || identifier.trim().is_empty() {
            return None;
        }
        let count = {
            let mut counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
            let count = counts.entry(identifier.to_string()).or_insert(0);
            *count += 1;
            *count
        };
        debug!(button = identifier, count, "button tapped");
        self.store.append(record(BUTTON_CLICK_KEY, identifier.to_string()));
        Some(count)
    }

    pub fn count(&self, identifier: &str) -> u64 {
        self.counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(identifier)
            .copied()
            .unwrap_or(0)
    }
}

/// A screen whose visible time can be measured.
pub trait TrackedScreen {
    /// Stable class name; also the key matched against the exclusion list.
    fn class_name(&self) -> &str;

    /// Screens may opt out by returning `false`.
    fn tracks_dwell_time(&self) -> bool {
        true
    }
}

impl TrackedScreen for str {
    fn class_name(&self) -> &str {
        self
    }
}

impl TrackedScreen for String {
    fn class_name(&self) -> &str {
        self
    }
}

/// Measures how long screens stay visible.
pub struct ScreenTracker {
    store: Arc<BehaviorStore>,
    enabled: AtomicBool,
    exclusions: HashSet<String>,
    visible_since: Mutex<HashMap<String, Instant>>,
}

impl ScreenTracker {
    pub fn new(store: Arc<BehaviorStore>, exclusions: impl IntoIterator<Item = String>) -> Self {
        Self {
            store,
            enabled: AtomicBool::new(false),
            exclusions: exclusions.into_iter().collect(),
            visible_since: Mutex::new(HashMap::new()),
        }
    }

    /// Turn tracking on. Returns `true` only for the call that enabled it.
    pub fn enable(&self) -> bool {
        !self.enabled.swap(true, Ordering::SeqCst)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn tracks<S: TrackedScreen + ?Sized>(&self, screen: &S) -> bool {
        self.is_enabled() && screen.tracks_dwell_time() && !self.exclusions.contains(screen.class_name())
    }

    /// Start the clock for `screen`. Returns whether it is being tracked.
    pub fn appeared<S: TrackedScreen + ?Sized>(&self, screen: &S) -> bool {
        if !self.tracks(screen) {
            return false;
        }
        self.visible_since
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(screen.class_name().to_string(), Instant::now());
        true
    }

    /// Stop the clock and record the dwell time in whole seconds.
    ///
    /// `None` when the screen is untracked or never appeared.
    pub fn disappeared<S: TrackedScreen + ?Sized>(&self, screen: &S) -> Option<u64> {
        if !self.tracks(screen) {
            return None;
        }
        let class_name = screen.class_name();
        let started = self
            .visible_since
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(class_name)?;
        let secs = started.elapsed().as_secs();
        debug!(screen = class_name, secs, "screen dwell time");
        self.store.append(record(SCREEN_HOLD_KEY, format!("{class_name}-{secs}s")));
        Some(secs)
    }
}

/// Both trackers over one shared store.
pub struct BehaviorTracker {
    store: Arc<BehaviorStore>,
    buttons: ButtonTracker,
    screens: ScreenTracker,
}

impl BehaviorTracker {
    pub fn open(path: impl Into<PathBuf>, exclusions: impl IntoIterator<Item = String>) -> Result<Self> {
        let store = Arc::new(BehaviorStore::open(path)?);
        Ok(Self {
            buttons: ButtonTracker::new(store.clone()),
            screens: ScreenTracker::new(store.clone(), exclusions),
            store,
        })
    }

    /// Open the log under the configured documents directory and enable the
    /// trackers the config asks for.
    pub fn from_config(config: &SdkConfig) -> Result<Self> {
        let tracker = Self::open(config.behavior_log_path(), config.screen_exclusions.iter().cloned())?;
        if config.button_tracking {
            tracker.buttons.enable();
        }
        if config.screen_tracking {
            tracker.screens.enable();
        }
        Ok(tracker)
    }

    pub fn buttons(&self) -> &ButtonTracker {
        &self.buttons
    }

    pub fn screens(&self) -> &ScreenTracker {
        &self.screens
    }

    pub fn path(&self) -> &Path {
        self.store.path()
    }

    pub fn flush(&self) {
        self.store.flush();
    }

    /// All records after flushing pending appends.
    pub fn records(&self) -> Result<Vec<LogRecord>> {
        self.store.flush();
        self.store.read()
    }

    /// The log as pretty-printed JSON; `None` if there is no readable log.
    pub fn user_behavior_info(&self) -> Option<String> {
        self.store.flush();
        if !self.store.path().exists() {
            return None;
        }
        let records = self.store.read().ok()?;
        serde_json::to_string_pretty(&records).ok()
    }
}
