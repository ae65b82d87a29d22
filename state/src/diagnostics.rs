//! Observer diagnostics switch
//!
//! When enabled, every observer firing is logged together with the store's
//! state, and an observer firing twice within the configured window is
//! reported as a warning. This is a smell test for observers that feed back
//! into the store in a tight loop, not a correctness mechanism.

use arbor_core::StoreConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Shared on/off switch for observer diagnostics
///
/// Clones share the same flag, so a registry can flip it for every store it
/// created.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    enabled: Arc<AtomicBool>,
    fast_trigger_window: Duration,
}

impl Diagnostics {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(config.debug)),
            fast_trigger_window: config.fast_trigger_window(),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn fast_trigger_window(&self) -> Duration {
        self.fast_trigger_window
    }

    /// True when both handles drive the same flag
    pub fn shares_switch_with(&self, other: &Diagnostics) -> bool {
        Arc::ptr_eq(&self.enabled, &other.enabled)
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new(&StoreConfig::default())
    }
}
