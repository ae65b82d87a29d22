//! Store registry
//!
//! An explicit collection of stores owned by the host application. It backs
//! bulk reset and owns the diagnostics switch shared by the stores it
//! creates. Stores are held weakly: dropping the last handle to a store
//! removes it from the registry on the next sweep.

use arbor_core::{ArborResult, StoreConfig};
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::{Arc, Weak};
use tracing::debug;

use crate::diagnostics::Diagnostics;
use crate::store::{Store, StoreInner};

/// Collection of live stores
#[derive(Debug)]
pub struct StoreRegistry {
    stores: RwLock<Vec<Weak<StoreInner>>>,
    diagnostics: Diagnostics,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::with_config(&StoreConfig::default())
    }

    pub fn with_config(config: &StoreConfig) -> Self {
        Self {
            stores: RwLock::new(Vec::new()),
            diagnostics: Diagnostics::new(config),
        }
    }

    /// Create a store wired to this registry's diagnostics switch and enrol it
    pub fn create(&self, initial: Value) -> ArborResult<Store> {
        let store = Store::with_diagnostics(initial, self.diagnostics.clone())?;
        self.register(&store);
        Ok(store)
    }

    /// Enrol an existing store for bulk reset
    ///
    /// The store keeps its own diagnostics switch. Registering the same
    /// store twice has no effect.
    pub fn register(&self, store: &Store) {
        let mut stores = self.stores.write();
        stores.retain(|weak| weak.strong_count() > 0);
        let already = stores
            .iter()
            .filter_map(Weak::upgrade)
            .any(|inner| Store::from_inner(inner).ptr_eq(store));
        if !already {
            stores.push(store.downgrade());
        }
    }

    /// Live stores in enrolment order
    pub fn stores(&self) -> Vec<Store> {
        let mut stores = self.stores.write();
        stores.retain(|weak| weak.strong_count() > 0);
        stores
            .iter()
            .filter_map(Weak::upgrade)
            .map(Store::from_inner)
            .collect()
    }

    /// Reset every live store to its initial state
    ///
    /// Observers fire per store as usual. Returns the number of stores reset.
    pub fn reset_all(&self) -> usize {
        // callbacks may create or register stores, so no lock is held here
        let stores = self.stores();
        debug!("Resetting {} stores", stores.len());
        for store in &stores {
            store.reset();
        }
        stores.len()
    }

    pub fn set_debug(&self, enabled: bool) {
        debug!("Observer diagnostics {}", if enabled { "enabled" } else { "disabled" });
        self.diagnostics.set_enabled(enabled);
    }

    pub fn is_debug(&self) -> bool {
        self.diagnostics.is_enabled()
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Number of live stores
    pub fn len(&self) -> usize {
        self.stores
            .read()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every store; the stores themselves stay usable
    pub fn clear(&self) {
        self.stores.write().clear();
    }
}

impl Default for StoreRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe registry wrapper
pub type SharedStoreRegistry = Arc<StoreRegistry>;

/// Create a shared store registry
pub fn create_registry() -> SharedStoreRegistry {
    Arc::new(StoreRegistry::new())
}
