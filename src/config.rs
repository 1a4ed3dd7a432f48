//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables.

use std::env;
use std::time::Duration;

use crate::cache::{LockingStrategy, ReadIsolation};

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Locking strategy for regions built without explicit options
    pub locking_strategy: LockingStrategy,
    /// Read isolation for regions built without explicit options
    pub read_isolation: ReadIsolation,
    /// Write lock wait bound in milliseconds, 0 = wait indefinitely
    pub lock_acquisition_timeout_ms: u64,
    /// HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_LOCKING_STRATEGY` - `optimistic-shared` or `pessimistic-shared` (default: pessimistic-shared)
    /// - `CACHE_READ_ISOLATION` - `read-uncommitted` or `read-committed` (default: read-uncommitted)
    /// - `LOCK_ACQUISITION_TIMEOUT_MS` - Write lock wait bound, 0 for none (default: 0)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            locking_strategy: env::var("CACHE_LOCKING_STRATEGY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.locking_strategy),
            read_isolation: env::var("CACHE_READ_ISOLATION")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.read_isolation),
            lock_acquisition_timeout_ms: env::var("LOCK_ACQUISITION_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.lock_acquisition_timeout_ms),
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.server_port),
        }
    }

    /// Returns the write lock wait bound, None when unbounded.
    pub fn lock_acquisition_timeout(&self) -> Option<Duration> {
        match self.lock_acquisition_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            locking_strategy: LockingStrategy::Pessimistic,
            read_isolation: ReadIsolation::ReadUncommitted,
            lock_acquisition_timeout_ms: 0,
            server_port: 3000,
        }
    }
}
