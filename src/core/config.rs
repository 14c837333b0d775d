//! Policy configuration backed by a key/value store

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const MIN_FREE_MB_KEY: &str = "MinFreeMB";
pub const CHECK_INTERVAL_KEY: &str = "CheckIntervalSec";

pub const DEFAULT_MIN_FREE_MB: u32 = 2048;
pub const DEFAULT_INTERVAL_SECS: u32 = 10;

/// Monitor policy tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Purge when effective free memory drops below this many MB
    pub min_free_mb: u32,

    /// Seconds between memory checks
    pub interval_secs: u32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            min_free_mb: DEFAULT_MIN_FREE_MB,
            interval_secs: DEFAULT_INTERVAL_SECS,
        }
    }
}

impl PolicyConfig {
    /// Load both tunables, initializing absent values to their defaults.
    ///
    /// An interval of zero would collapse the loop into a busy spin, so it
    /// is treated as "use default".
    pub fn load(store: &dyn ConfigStore) -> Self {
        let min_free_mb = store.get_or_init(MIN_FREE_MB_KEY, DEFAULT_MIN_FREE_MB);
        let mut interval_secs = store.get_or_init(CHECK_INTERVAL_KEY, DEFAULT_INTERVAL_SECS);
        if interval_secs == 0 {
            interval_secs = DEFAULT_INTERVAL_SECS;
        }

        Self {
            min_free_mb,
            interval_secs,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.interval_secs))
    }
}

/// Persistent key/value store for the policy tunables.
///
/// A read of an absent key writes `default` back and returns it, so the
/// store is self-initializing on first run. A failing backend degrades to
/// returning `default`; the caller never sees an error.
pub trait ConfigStore: Send + Sync {
    fn get_or_init(&self, key: &str, default: u32) -> u32;
}

/// In-memory store, used for command-line overrides and in tests.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    values: Mutex<HashMap<String, u32>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: &str, value: u32) {
        if let Ok(mut values) = self.values.lock() {
            values.insert(key.to_string(), value);
        }
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get_or_init(&self, key: &str, default: u32) -> u32 {
        let Ok(mut values) = self.values.lock() else {
            return default;
        };
        *values.entry(key.to_string()).or_insert(default)
    }
}
