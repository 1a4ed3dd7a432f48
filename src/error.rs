//! Error types for the region cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::cache::TransactionId;
use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Unified error type for the region cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key not found in a region
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Region does not exist
    #[error("Region not found: {0}")]
    RegionNotFound(String),

    /// A write lock could not be acquired on an entry
    #[error("Lock acquisition failed on {region}/{key}: {reason}")]
    LockAcquisitionFailure {
        region: String,
        key: String,
        reason: String,
    },

    /// A blocked writer was interrupted before the lock was granted
    #[error("Interrupted while waiting for write lock on {region}/{key}")]
    InterruptedWait { region: String, key: String },

    /// The transaction was marked rollback-only by an earlier failure
    #[error("Transaction {0} is marked rollback-only")]
    RollbackOnly(TransactionId),

    /// A region was requested with a strategy different from the one it was built with
    #[error("Region '{name}' already uses {existing}, cannot rebind to {requested}")]
    RegionConflict {
        name: String,
        existing: String,
        requested: String,
    },

    /// Unrecognized locking strategy name
    #[error("Unknown locking strategy: {0}")]
    UnknownStrategy(String),

    /// Unrecognized read isolation name
    #[error("Unknown read isolation: {0}")]
    UnknownIsolation(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Returns true if the enclosing transaction may simply be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CacheError::InterruptedWait { .. })
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) | CacheError::RegionNotFound(_) => StatusCode::NOT_FOUND,
            CacheError::LockAcquisitionFailure { .. } | CacheError::InterruptedWait { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            CacheError::RollbackOnly(_) | CacheError::RegionConflict { .. } => {
                StatusCode::CONFLICT
            }
            CacheError::UnknownStrategy(_)
            | CacheError::UnknownIsolation(_)
            | CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the region cache.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupted_wait_is_retryable() {
        let err = CacheError::InterruptedWait {
            region: "r".to_string(),
            key: "k".to_string(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn test_lock_failure_is_not_retryable() {
        let err = CacheError::LockAcquisitionFailure {
            region: "r".to_string(),
            key: "k".to_string(),
            reason: "timed out".to_string(),
        };
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("r/k"));
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (CacheError::NotFound("k".into()), StatusCode::NOT_FOUND),
            (CacheError::RegionNotFound("r".into()), StatusCode::NOT_FOUND),
            (
                CacheError::RollbackOnly(TransactionId::new(7)),
                StatusCode::CONFLICT,
            ),
            (
                CacheError::UnknownStrategy("mvcc".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                CacheError::Internal("join".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
