//! API Handlers
//!
//! HTTP request handlers for each region cache endpoint. Every call runs as
//! its own auto-commit transaction on the blocking pool, since a pessimistic
//! write may wait on in-flight readers.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    Json,
};

use crate::cache::{LockingStrategy, ReadIsolation, RegionCacheManager, RegionOptions};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    validate_region_name, CreateRegionRequest, GetResponse, HealthResponse, PutRequest,
    PutResponse, RegionResponse, RegionStatsResponse, StatsResponse,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Process-wide region registry
    pub manager: Arc<RegionCacheManager>,
}

impl AppState {
    /// Creates a new AppState around the given manager.
    pub fn new(manager: RegionCacheManager) -> Self {
        Self {
            manager: Arc::new(manager),
        }
    }

    /// Creates a new AppState from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(RegionCacheManager::new(config.clone()))
    }
}

/// Runs a region operation off the async runtime.
async fn run_blocking<T, F>(op: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| CacheError::Internal(format!("Region task failed: {}", e)))?
}

/// Handler for PUT /regions/:region/entries
///
/// Writes a key-value pair and commits it.
pub async fn put_handler(
    State(state): State<AppState>,
    Path(region): Path<String>,
    Json(req): Json<PutRequest>,
) -> Result<Json<PutResponse>> {
    if let Some(error_msg) = validate_region_name(&region).or_else(|| req.validate()) {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let handle = state.manager.query_results_region(&region);
    let PutRequest { key, value } = req;
    let written = key.clone();
    run_blocking(move || handle.put_autocommit(&written, value)).await?;

    Ok(Json(PutResponse::new(region, key)))
}

/// Handler for GET /regions/:region/entries/:key
///
/// Reads a committed value by key. Never creates the region.
pub async fn get_handler(
    State(state): State<AppState>,
    Path((region, key)): Path<(String, String)>,
) -> Result<Json<GetResponse>> {
    let handle = state
        .manager
        .region(&region)
        .ok_or_else(|| CacheError::RegionNotFound(region.clone()))?;
    let lookup = key.clone();
    let value = run_blocking(move || handle.get_autocommit(&lookup)).await?;

    match value {
        Some(value) => Ok(Json(GetResponse::new(region, key, value))),
        None => Err(CacheError::NotFound(key)),
    }
}

/// Handler for POST /regions
///
/// Builds a region with explicit options, or returns it if it already
/// exists with the same options.
pub async fn create_region_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateRegionRequest>,
) -> Result<Json<RegionResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let mut options = RegionOptions::from_config(state.manager.config());
    if let Some(strategy) = &req.strategy {
        options.strategy = strategy.parse::<LockingStrategy>()?;
    }
    if let Some(isolation) = &req.isolation {
        options.isolation = isolation.parse::<ReadIsolation>()?;
    }
    if let Some(ms) = req.lock_timeout_ms {
        options.lock_acquisition_timeout = (ms > 0).then(|| Duration::from_millis(ms));
    }

    let region = state.manager.build_query_results_region(&req.name, options)?;
    Ok(Json(RegionResponse::from(&region)))
}

/// Handler for GET /regions
///
/// Lists every region, sorted by name.
pub async fn list_regions_handler(State(state): State<AppState>) -> Json<Vec<RegionResponse>> {
    Json(
        state
            .manager
            .regions()
            .iter()
            .map(RegionResponse::from)
            .collect(),
    )
}

/// Handler for GET /stats
///
/// Returns transaction counters and per-region statistics.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let transactions = state.manager.transactions();
    let regions = state
        .manager
        .stats()
        .into_iter()
        .map(|(name, stats)| RegionStatsResponse::new(name, stats))
        .collect();

    Json(StatsResponse {
        active_transactions: transactions.active_count(),
        committed_transactions: transactions.committed_count(),
        rolled_back_transactions: transactions.rolled_back_count(),
        regions,
    })
}

/// Handler for GET /health
///
/// Returns health status of the server.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn state() -> AppState {
        AppState::new(RegionCacheManager::default())
    }

    fn put_request(key: &str, value: &str) -> PutRequest {
        PutRequest {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    #[tokio::test]
    async fn test_put_and_get_handler() {
        let state = state();

        let result = put_handler(
            State(state.clone()),
            Path("q".to_string()),
            Json(put_request("test_key", "test_value")),
        )
        .await;
        assert_ok!(result);

        let result = get_handler(
            State(state.clone()),
            Path(("q".to_string(), "test_key".to_string())),
        )
        .await;
        let response = assert_ok!(result);
        assert_eq!(response.value, "test_value");
        assert_eq!(response.region, "q");
    }

    #[tokio::test]
    async fn test_get_nonexistent_key() {
        let state = state();
        state.manager.query_results_region("q");

        let result = get_handler(
            State(state),
            Path(("q".to_string(), "nonexistent".to_string())),
        )
        .await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_get_missing_region_does_not_create_it() {
        let state = state();

        let result = get_handler(
            State(state.clone()),
            Path(("never-written".to_string(), "k".to_string())),
        )
        .await;
        assert!(matches!(result, Err(CacheError::RegionNotFound(_))));
        assert!(state.manager.region_names().is_empty());
    }

    #[tokio::test]
    async fn test_put_rejects_oversized_region_name() {
        let state = state();
        let region = "r".repeat(crate::cache::MAX_REGION_NAME_LENGTH + 1);

        let result = put_handler(
            State(state.clone()),
            Path(region),
            Json(put_request("k", "v")),
        )
        .await;
        assert!(matches!(result, Err(CacheError::InvalidRequest(_))));
        assert!(state.manager.region_names().is_empty());
    }

    #[tokio::test]
    async fn test_create_region_handler() {
        let state = state();
        let req = CreateRegionRequest {
            name: "opt".to_string(),
            strategy: Some("optimistic-shared".to_string()),
            isolation: Some("read-committed".to_string()),
            lock_timeout_ms: None,
        };

        let response = assert_ok!(create_region_handler(State(state.clone()), Json(req)).await);
        assert_eq!(response.strategy, LockingStrategy::Optimistic);
        assert_eq!(response.isolation, ReadIsolation::ReadCommitted);

        let listed = list_regions_handler(State(state)).await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "opt");
    }

    #[tokio::test]
    async fn test_create_region_unknown_strategy() {
        let req = CreateRegionRequest {
            name: "bad".to_string(),
            strategy: Some("mvcc".to_string()),
            isolation: None,
            lock_timeout_ms: None,
        };

        let result = create_region_handler(State(state()), Json(req)).await;
        assert!(matches!(result, Err(CacheError::UnknownStrategy(_))));
    }

    #[tokio::test]
    async fn test_stats_handler() {
        let state = state();
        put_handler(
            State(state.clone()),
            Path("q".to_string()),
            Json(put_request("k", "v")),
        )
        .await
        .unwrap();

        let response = stats_handler(State(state)).await;
        assert_eq!(response.committed_transactions, 1);
        assert_eq!(response.active_transactions, 0);
        assert_eq!(response.regions.len(), 1);
        assert_eq!(response.regions[0].stats.puts, 1);
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }

    #[tokio::test]
    async fn test_put_invalid_request() {
        let result = put_handler(
            State(state()),
            Path("q".to_string()),
            Json(put_request("", "value")),
        )
        .await;
        assert_err!(result);
    }
}
