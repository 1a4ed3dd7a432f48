//! Region Cache Manager Module
//!
//! Owns every named region and the transaction manager they share.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::cache::{Region, RegionOptions, RegionStats, Transaction, TransactionManager};
use crate::config::Config;
use crate::error::{CacheError, Result};

// == Region Cache Manager ==
/// Process-wide registry of regions.
///
/// Regions are created on first reference and live until `shutdown`. A
/// region's options cannot change once it exists.
#[derive(Debug)]
pub struct RegionCacheManager {
    config: Config,
    regions: RwLock<HashMap<String, Region>>,
    transactions: Arc<TransactionManager>,
}

impl RegionCacheManager {
    // == Constructor ==
    /// Creates a manager with no regions.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            regions: RwLock::new(HashMap::new()),
            transactions: Arc::new(TransactionManager::new()),
        }
    }

    /// Returns the configuration regions are built from by default.
    pub fn config(&self) -> &Config {
        &self.config
    }

    // == Build Region ==
    /// Returns the query results region `name`, building it with `options`
    /// if it does not exist yet.
    ///
    /// # Errors
    /// `RegionConflict` if the region exists with different options.
    pub fn build_query_results_region(&self, name: &str, options: RegionOptions) -> Result<Region> {
        if let Some(region) = self.regions.read().get(name) {
            return Self::check_options(region, options);
        }

        let mut regions = self.regions.write();
        if let Some(region) = regions.get(name) {
            return Self::check_options(region, options);
        }

        let region = Region::new(name, options, Arc::clone(&self.transactions));
        info!(
            region = name,
            strategy = %options.strategy,
            isolation = %options.isolation,
            "Region created"
        );
        regions.insert(name.to_string(), region.clone());
        Ok(region)
    }

    /// Returns the query results region `name`, building it with the
    /// configured defaults if needed.
    pub fn query_results_region(&self, name: &str) -> Region {
        if let Some(region) = self.regions.read().get(name) {
            return region.clone();
        }

        self.regions
            .write()
            .entry(name.to_string())
            .or_insert_with(|| {
                let options = RegionOptions::from_config(&self.config);
                info!(region = name, strategy = %options.strategy, "Region created");
                Region::new(name, options, Arc::clone(&self.transactions))
            })
            .clone()
    }

    fn check_options(region: &Region, options: RegionOptions) -> Result<Region> {
        let existing = region.options();
        if existing != options {
            warn!(
                region = region.name(),
                existing = %describe(existing),
                requested = %describe(options),
                "Refusing to rebind region options"
            );
            return Err(CacheError::RegionConflict {
                name: region.name().to_string(),
                existing: describe(existing),
                requested: describe(options),
            });
        }
        Ok(region.clone())
    }

    // == Lookup ==
    /// Returns the region `name` if it exists.
    pub fn region(&self, name: &str) -> Option<Region> {
        self.regions.read().get(name).cloned()
    }

    /// Returns all region names, sorted.
    pub fn region_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.regions.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns all regions, sorted by name.
    pub fn regions(&self) -> Vec<Region> {
        let mut regions: Vec<Region> = self.regions.read().values().cloned().collect();
        regions.sort_by(|a, b| a.name().cmp(b.name()));
        regions
    }

    // == Transactions ==
    /// Begins a transaction usable with any region of this manager.
    pub fn begin(&self) -> Transaction {
        self.transactions.begin()
    }

    /// Returns the shared transaction manager.
    pub fn transactions(&self) -> &Arc<TransactionManager> {
        &self.transactions
    }

    // == Stats ==
    /// Returns a statistics snapshot per region, sorted by name.
    pub fn stats(&self) -> Vec<(String, RegionStats)> {
        self.regions()
            .into_iter()
            .map(|region| (region.name().to_string(), region.stats()))
            .collect()
    }

    // == Shutdown ==
    /// Drops every region. Handles held elsewhere stay usable but are no
    /// longer reachable through the manager.
    pub fn shutdown(&self) {
        let mut regions = self.regions.write();
        let count = regions.len();
        regions.clear();

        let active = self.transactions.active_count();
        if active > 0 {
            warn!(active, "Shutting down with open transactions");
        }
        info!(regions = count, "Region cache manager shut down");
    }
}

fn describe(options: RegionOptions) -> String {
    match options.lock_acquisition_timeout {
        Some(timeout) => format!(
            "{} ({}, lock timeout {} ms)",
            options.strategy,
            options.isolation,
            timeout.as_millis()
        ),
        None => format!("{} ({})", options.strategy, options.isolation),
    }
}

impl Default for RegionCacheManager {
    fn default() -> Self {
        Self::new(Config::default())
    }
}
