//! Configuration types for Arbor stores

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ArborError, ArborResult};

/// Store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Start with observer diagnostics enabled
    pub debug: bool,

    /// Repeat-firing warning window in milliseconds
    pub fast_trigger_window_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            debug: false,
            fast_trigger_window_ms: 10,
        }
    }
}

impl StoreConfig {
    /// Parse a configuration from JSON, filling missing fields with defaults
    pub fn from_json_str(input: &str) -> ArborResult<Self> {
        serde_json::from_str(input).map_err(|e| ArborError::Config(e.to_string()))
    }

    pub fn fast_trigger_window(&self) -> Duration {
        Duration::from_millis(self.fast_trigger_window_ms)
    }
}
