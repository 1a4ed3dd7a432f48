//! Region Cache - a transactional, region-scoped query results cache
//!
//! Regions hold key/value entries under an optimistic or pessimistic locking
//! strategy, inside transactions that commit or roll back their writes.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;

pub use api::AppState;
pub use cache::{Region, RegionCacheManager, RegionOptions, Transaction};
pub use config::Config;
pub use error::{CacheError, Result};
