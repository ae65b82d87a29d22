//! Observer registrations and change dispatch
//!
//! An observer pairs a [`WatchSet`] with a callback. On every state
//! transition the store asks each active observer whether anything it
//! watches changed between the old and new snapshot; the callback runs at
//! most once per transition.

use arbor_core::{ArborError, ArborResult, Path};
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::snapshot::Snapshot;
use crate::store::{Store, StoreInner};

/// Callback invoked when an observer fires
pub type ObserverCallback = Box<dyn Fn(&Store) + Send + Sync>;

/// Observer identifier, unique within one store
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObserverId(pub u64);

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer#{}", self.0)
    }
}

/// A watched path, keeping the text it was registered with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchPath {
    raw: String,
    path: Path,
}

impl WatchPath {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let path = Path::parse(&raw);
        Self { raw, path }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// What an observer watches
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum WatchSet {
    /// Any change anywhere in the tree
    #[default]
    All,
    /// Specific paths, checked in registration order
    Paths(Vec<WatchPath>),
}

impl WatchSet {
    pub fn all() -> Self {
        WatchSet::All
    }

    /// Watch the given paths; an empty list watches the whole tree
    pub fn paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let paths: Vec<WatchPath> = paths.into_iter().map(WatchPath::new).collect();
        if paths.is_empty() {
            WatchSet::All
        } else {
            WatchSet::Paths(paths)
        }
    }

    /// Validate watch paths coming from plain data
    ///
    /// Accepts `null`, a string, or an array of strings.
    pub fn from_json(value: &Value) -> ArborResult<Self> {
        match value {
            Value::Null => Ok(WatchSet::All),
            Value::String(path) => Ok(WatchSet::paths([path.as_str()])),
            Value::Array(items) => {
                let mut paths = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    match item {
                        Value::String(path) => paths.push(path.clone()),
                        other => {
                            return Err(ArborError::invalid_argument(format!(
                                "Store.observer: watch paths must be strings (element {} is {}).",
                                index, other
                            )))
                        }
                    }
                }
                Ok(WatchSet::paths(paths))
            }
            other => Err(ArborError::invalid_argument(format!(
                "Store.observer: watch paths must be a string or an array of strings (got {}).",
                other
            ))),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, WatchSet::All)
    }

    /// Label of the first watched location that differs between snapshots
    ///
    /// `*` stands for the whole tree.
    pub fn first_change(&self, old: &Snapshot, new: &Snapshot) -> Option<&str> {
        match self {
            WatchSet::All => old.changed_at(new, &Path::root()).then_some("*"),
            WatchSet::Paths(paths) => paths
                .iter()
                .find(|watched| old.changed_at(new, watched.path()))
                .map(WatchPath::as_str),
        }
    }
}

impl From<()> for WatchSet {
    fn from(_: ()) -> Self {
        WatchSet::All
    }
}

impl From<&str> for WatchSet {
    fn from(path: &str) -> Self {
        WatchSet::paths([path])
    }
}

impl From<String> for WatchSet {
    fn from(path: String) -> Self {
        WatchSet::paths([path])
    }
}

impl From<&[&str]> for WatchSet {
    fn from(paths: &[&str]) -> Self {
        WatchSet::paths(paths.iter().copied())
    }
}

impl<const N: usize> From<[&str; N]> for WatchSet {
    fn from(paths: [&str; N]) -> Self {
        WatchSet::paths(paths)
    }
}

impl From<Vec<&str>> for WatchSet {
    fn from(paths: Vec<&str>) -> Self {
        WatchSet::paths(paths)
    }
}

impl From<Vec<String>> for WatchSet {
    fn from(paths: Vec<String>) -> Self {
        WatchSet::paths(paths)
    }
}

/// Registration record held in a store's observer list
pub(crate) struct ObserverEntry {
    id: ObserverId,
    watch: WatchSet,
    callback: ObserverCallback,
    active: AtomicBool,
    last_trigger: Mutex<Option<Instant>>,
}

impl ObserverEntry {
    pub(crate) fn new(id: ObserverId, watch: WatchSet, callback: ObserverCallback) -> Self {
        Self {
            id,
            watch,
            callback,
            active: AtomicBool::new(true),
            last_trigger: Mutex::new(None),
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Returns whether the entry was still active
    fn deactivate(&self) -> bool {
        self.active.swap(false, Ordering::AcqRel)
    }

    /// Run the callback if a watched location changed; returns whether it ran
    pub(crate) fn call_if_needed(&self, store: &Store, old: &Snapshot, new: &Snapshot) -> bool {
        match self.watch.first_change(old, new) {
            Some(key) => {
                self.trigger(store, key);
                true
            }
            None => false,
        }
    }

    fn trigger(&self, store: &Store, key: &str) {
        let diagnostics = store.diagnostics();
        if diagnostics.is_enabled() {
            let state = store.state();
            debug!(observer = %self.id, state = %state, "observer triggered ({})", key);
            self.detect_multiple_calls(diagnostics.fast_trigger_window(), &state);
        }
        (self.callback)(store);
    }

    fn detect_multiple_calls(&self, window: Duration, state: &Value) {
        let now = Instant::now();
        let mut last = self.last_trigger.lock();
        if let Some(previous) = *last {
            if now.duration_since(previous) <= window {
                warn!(observer = %self.id, state = %state, "observer triggered multiple times too fast");
            }
        }
        *last = Some(now);
    }
}

impl fmt::Debug for ObserverEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverEntry")
            .field("id", &self.id)
            .field("watch", &self.watch)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Handle to a registered observer
///
/// Dropping the handle does not unregister the observer; call
/// [`release`](Observer::release) for that.
#[derive(Clone)]
pub struct Observer {
    entry: Arc<ObserverEntry>,
    store: Weak<StoreInner>,
}

impl Observer {
    pub(crate) fn new(entry: Arc<ObserverEntry>, store: Weak<StoreInner>) -> Self {
        Self { entry, store }
    }

    pub fn id(&self) -> ObserverId {
        self.entry.id
    }

    pub fn watch_set(&self) -> &WatchSet {
        &self.entry.watch
    }

    pub fn is_active(&self) -> bool {
        self.entry.is_active()
    }

    /// Stop the observer and remove it from its store
    ///
    /// Idempotent. Safe to call from inside any callback, including the
    /// observer's own; a released observer is skipped for the rest of an
    /// ongoing dispatch pass.
    pub fn release(&self) {
        if self.entry.deactivate() {
            debug!("Released {}", self.entry.id);
        }
        if let Some(inner) = self.store.upgrade() {
            inner.remove_observer(&self.entry);
        }
    }
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("id", &self.entry.id)
            .field("watch", &self.entry.watch)
            .field("active", &self.is_active())
            .finish()
    }
}
