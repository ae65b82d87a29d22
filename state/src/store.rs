//! Observable state store
//!
//! A [`Store`] holds one current [`Snapshot`] plus the snapshot it was
//! created with. Every mutation swaps in a new snapshot and, outside of a
//! transaction, hands the `(old, new)` pair to the observers.
//!
//! Locks are never held while observer callbacks run, so callbacks may read,
//! mutate, register or release observers on the same store.

use arbor_core::{ArborError, ArborResult, Node, Path, StoreConfig};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::convert::Infallible;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::diagnostics::Diagnostics;
use crate::observer::{Observer, ObserverEntry, ObserverId, WatchSet};
use crate::snapshot::Snapshot;

/// Mutable part of a store
#[derive(Debug)]
struct StoreState {
    current: Snapshot,
    transaction_depth: usize,
}

pub(crate) struct StoreInner {
    initial: Snapshot,
    state: RwLock<StoreState>,
    observers: RwLock<Vec<Arc<ObserverEntry>>>,
    next_observer_id: AtomicU64,
    diagnostics: Diagnostics,
}

impl StoreInner {
    pub(crate) fn remove_observer(&self, entry: &Arc<ObserverEntry>) {
        self.observers
            .write()
            .retain(|registered| !Arc::ptr_eq(registered, entry));
    }
}

/// Observable in-memory state tree
///
/// Cloning a `Store` yields another handle to the same state.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Create a store; `initial` must be a JSON object
    pub fn new(initial: Value) -> ArborResult<Self> {
        Self::with_config(initial, &StoreConfig::default())
    }

    pub fn with_config(initial: Value, config: &StoreConfig) -> ArborResult<Self> {
        Self::with_diagnostics(initial, Diagnostics::new(config))
    }

    pub(crate) fn with_diagnostics(initial: Value, diagnostics: Diagnostics) -> ArborResult<Self> {
        Ok(Self::from_snapshot(Snapshot::from_json(initial)?, diagnostics))
    }

    fn from_snapshot(initial: Snapshot, diagnostics: Diagnostics) -> Self {
        Self::from_inner(Arc::new(StoreInner {
            state: RwLock::new(StoreState {
                current: initial.clone(),
                transaction_depth: 0,
            }),
            initial,
            observers: RwLock::new(Vec::new()),
            next_observer_id: AtomicU64::new(0),
            diagnostics,
        }))
    }

    pub(crate) fn from_inner(inner: Arc<StoreInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> std::sync::Weak<StoreInner> {
        Arc::downgrade(&self.inner)
    }

    /// True when both handles point at the same store
    pub fn ptr_eq(&self, other: &Store) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // ============ Reads ============

    /// Plain value at a dotted path; `""` is the whole tree
    ///
    /// Paths that do not resolve, at any depth, yield `None`.
    pub fn get(&self, path: &str) -> Option<Value> {
        self.snapshot().get(path)
    }

    /// The whole tree as plain data
    pub fn state(&self) -> Value {
        self.snapshot().to_json()
    }

    /// Decode the value at `path` into `T`
    pub fn get_as<T: DeserializeOwned>(&self, path: &str) -> ArborResult<Option<T>> {
        self.get(path)
            .map(serde_json::from_value)
            .transpose()
            .map_err(ArborError::from)
    }

    /// Current snapshot; retaining it is cheap and it never changes
    pub fn snapshot(&self) -> Snapshot {
        self.inner.state.read().current.clone()
    }

    /// Snapshot captured at construction
    pub fn initial(&self) -> Snapshot {
        self.inner.initial.clone()
    }

    pub fn transaction_depth(&self) -> usize {
        self.inner.state.read().transaction_depth
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.inner.diagnostics
    }

    // ============ Mutations ============

    /// Write `value` at `path`, creating missing intermediate maps
    pub fn set<T: Serialize>(&self, path: &str, value: T) -> ArborResult<()> {
        let value = Node::from_json(serde_json::to_value(value)?);
        let parsed = Path::parse(path);
        self.update_state("set", path, |current| {
            current
                .with_value(&parsed, value)
                .map_err(|e| with_operation("set", e))
        })
    }

    /// Remove the value at `path`; list elements shift down
    pub fn del(&self, path: &str) {
        let parsed = Path::parse(path);
        self.apply("del", path, |current| current.without(&parsed));
    }

    /// Deep-merge a JSON object into the state
    pub fn merge(&self, partial: Value) -> ArborResult<()> {
        if !partial.is_object() {
            return Err(ArborError::invalid_argument(
                "Store.merge: state can only merge with an object.",
            ));
        }
        let patch = Node::from_json(partial);
        self.apply("merge", "", |current| current.merged(&patch));
        Ok(())
    }

    /// Restore the snapshot captured at construction
    pub fn reset(&self) {
        let initial = self.inner.initial.clone();
        self.apply("reset", "", |_| initial);
    }

    fn apply(&self, op: &str, path: &str, f: impl FnOnce(&Snapshot) -> Snapshot) {
        if let Err(never) = self.update_state(op, path, |current| Ok::<_, Infallible>(f(current))) {
            match never {}
        }
    }

    fn update_state<E>(
        &self,
        op: &str,
        path: &str,
        f: impl FnOnce(&Snapshot) -> Result<Snapshot, E>,
    ) -> Result<(), E> {
        let (old, new, depth) = {
            let mut state = self.inner.state.write();
            let new = f(&state.current)?;
            let old = std::mem::replace(&mut state.current, new.clone());
            (old, new, state.transaction_depth)
        };

        trace!(op = op, path = path, depth = depth, "state updated");

        if depth == 0 {
            self.notify_observers(&old, &new);
        }
        Ok(())
    }

    // ============ Transactions ============

    /// Run `body` with notifications deferred until the outermost transaction ends
    ///
    /// Observers see one coalesced transition from the state at entry to the
    /// state at exit. If `body` panics the depth is restored and no
    /// notification is sent for this level; applied mutations are kept.
    pub fn transaction<R>(&self, body: impl FnOnce() -> R) -> R {
        let scope = TransactionScope::begin(self);
        let result = body();
        scope.commit();
        result
    }

    /// Like [`transaction`](Store::transaction) for fallible bodies
    ///
    /// An `Err` is treated like a panic: depth restored, no notification for
    /// this level, mutations kept, error returned to the caller.
    pub fn try_transaction<R, E>(&self, body: impl FnOnce() -> Result<R, E>) -> Result<R, E> {
        let scope = TransactionScope::begin(self);
        let result = body()?;
        scope.commit();
        Ok(result)
    }

    // ============ Observers ============

    /// Register a callback that fires when anything in `paths` changes
    ///
    /// An empty watch set observes the whole tree.
    pub fn observer<F>(&self, callback: F, paths: impl Into<WatchSet>) -> Observer
    where
        F: Fn(&Store) + Send + Sync + 'static,
    {
        let id = ObserverId(self.inner.next_observer_id.fetch_add(1, Ordering::Relaxed));
        let entry = Arc::new(ObserverEntry::new(id, paths.into(), Box::new(callback)));
        self.inner.observers.write().push(entry.clone());
        debug!("Registered {}", id);
        Observer::new(entry, self.downgrade())
    }

    pub fn observer_count(&self) -> usize {
        self.inner.observers.read().len()
    }

    /// Evaluate every active observer against one transition
    ///
    /// Works on a copy of the observer list: observers registered during the
    /// pass wait for the next one, observers released during the pass are
    /// skipped. A panicking callback aborts the rest of the pass.
    fn notify_observers(&self, old: &Snapshot, new: &Snapshot) {
        if old.ptr_eq(new) {
            return;
        }
        let observers: Vec<Arc<ObserverEntry>> = self.inner.observers.read().clone();
        for observer in observers {
            if observer.is_active() {
                observer.call_if_needed(self, old, new);
            }
        }
    }
}

/// Prefix contract violations with the operation that hit them
fn with_operation(op: &str, err: ArborError) -> ArborError {
    match err {
        ArborError::InvalidArgument(msg) => {
            ArborError::InvalidArgument(format!("Store.{}: {}", op, msg))
        }
        other => other,
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::from_snapshot(Snapshot::default(), Diagnostics::default())
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("state", &self.state())
            .field("transaction_depth", &self.transaction_depth())
            .field("observers", &self.observer_count())
            .finish()
    }
}

/// Open transaction level; restores the depth even if the body unwinds
struct TransactionScope<'a> {
    store: &'a Store,
    entry: Snapshot,
    open: bool,
}

impl<'a> TransactionScope<'a> {
    fn begin(store: &'a Store) -> Self {
        let mut state = store.inner.state.write();
        state.transaction_depth += 1;
        Self {
            store,
            entry: state.current.clone(),
            open: true,
        }
    }

    /// Close this level; yields the exit snapshot when it was the outermost
    fn close(&mut self) -> Option<Snapshot> {
        if !self.open {
            return None;
        }
        self.open = false;
        let mut state = self.store.inner.state.write();
        state.transaction_depth -= 1;
        (state.transaction_depth == 0).then(|| state.current.clone())
    }

    fn commit(mut self) {
        if let Some(exit) = self.close() {
            debug!("Transaction committed");
            self.store.notify_observers(&self.entry, &exit);
        }
    }
}

impl Drop for TransactionScope<'_> {
    fn drop(&mut self) {
        if self.open {
            self.close();
            debug!("Transaction abandoned, notification suppressed");
        }
    }
}
