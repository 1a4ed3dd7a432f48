//! Request DTOs for the region cache API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;

use crate::cache::{MAX_KEY_LENGTH, MAX_REGION_NAME_LENGTH};

/// Validates a region name, from a request body or a path segment.
///
/// Returns an error message if validation fails, None if valid.
pub fn validate_region_name(name: &str) -> Option<String> {
    if name.is_empty() {
        return Some("Region name cannot be empty".to_string());
    }
    if name.len() > MAX_REGION_NAME_LENGTH {
        return Some(format!(
            "Region name exceeds maximum length of {} characters",
            MAX_REGION_NAME_LENGTH
        ));
    }
    None
}

/// Request body for PUT /regions/:region/entries
#[derive(Debug, Clone, Deserialize)]
pub struct PutRequest {
    /// The entry key
    pub key: String,
    /// The value to store
    pub value: String,
}

impl PutRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.key.is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        if self.key.len() > MAX_KEY_LENGTH {
            return Some(format!(
                "Key exceeds maximum length of {} characters",
                MAX_KEY_LENGTH
            ));
        }
        None
    }
}

/// Request body for POST /regions
///
/// # Fields
/// - `name`: Region name
/// - `strategy`: Optional locking strategy name (uses the configured default if not specified)
/// - `isolation`: Optional read isolation name
/// - `lock_timeout_ms`: Optional write lock wait bound in milliseconds
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRegionRequest {
    /// Region name
    pub name: String,
    /// Locking strategy, e.g. "optimistic-shared"
    #[serde(default)]
    pub strategy: Option<String>,
    /// Read isolation, e.g. "read-committed"
    #[serde(default)]
    pub isolation: Option<String>,
    /// Write lock wait bound in milliseconds
    #[serde(default)]
    pub lock_timeout_ms: Option<u64>,
}

impl CreateRegionRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        validate_region_name(&self.name)
    }
}
