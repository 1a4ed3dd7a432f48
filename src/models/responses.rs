//! Response DTOs for the region cache API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::{LockingStrategy, ReadIsolation, Region, RegionStats};

/// Response body for GET /regions/:region/entries/:key
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    /// Region the value was read from
    pub region: String,
    /// The requested key
    pub key: String,
    /// The stored value
    pub value: String,
}

impl GetResponse {
    /// Creates a new GetResponse
    pub fn new(
        region: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            region: region.into(),
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Response body for PUT /regions/:region/entries
#[derive(Debug, Clone, Serialize)]
pub struct PutResponse {
    /// Success message
    pub message: String,
    /// Region written to
    pub region: String,
    /// The key that was written
    pub key: String,
}

impl PutResponse {
    /// Creates a new PutResponse
    pub fn new(region: impl Into<String>, key: impl Into<String>) -> Self {
        let region = region.into();
        let key = key.into();
        Self {
            message: format!("Key '{}' committed to region '{}'", key, region),
            region,
            key,
        }
    }
}

/// Description of one region, returned by POST /regions and GET /regions
#[derive(Debug, Clone, Serialize)]
pub struct RegionResponse {
    /// Region name
    pub name: String,
    /// Locking strategy
    pub strategy: LockingStrategy,
    /// Read isolation
    pub isolation: ReadIsolation,
    /// Write lock wait bound in milliseconds, absent when unbounded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_timeout_ms: Option<u64>,
    /// Current number of entries holding a value
    pub total_entries: usize,
}

impl From<&Region> for RegionResponse {
    fn from(region: &Region) -> Self {
        let options = region.options();
        Self {
            name: region.name().to_string(),
            strategy: options.strategy,
            isolation: options.isolation,
            lock_timeout_ms: options
                .lock_acquisition_timeout
                .map(|timeout| timeout.as_millis() as u64),
            total_entries: region.len(),
        }
    }
}

/// Statistics of one region
#[derive(Debug, Clone, Serialize)]
pub struct RegionStatsResponse {
    /// Region name
    pub region: String,
    #[serde(flatten)]
    pub stats: RegionStats,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Transactions begun and not yet ended
    pub active_transactions: usize,
    /// Transactions committed
    pub committed_transactions: u64,
    /// Transactions rolled back
    pub rolled_back_transactions: u64,
    /// Per-region statistics, sorted by region name
    pub regions: Vec<RegionStatsResponse>,
}

impl RegionStatsResponse {
    /// Creates a new RegionStatsResponse from region statistics
    pub fn new(region: impl Into<String>, stats: RegionStats) -> Self {
        let hit_rate = stats.hit_rate();
        Self {
            region: region.into(),
            stats,
            hit_rate,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
