//! Cache Module
//!
//! Transactional query result regions with optimistic or pessimistic locking.

mod entry;
mod locking;
mod manager;
mod region;
mod stats;
mod store;
mod transaction;


// Re-export public types
pub use entry::{CacheEntry, LockMode, LockState};
pub use locking::{LockingStrategy, Outcome, ReadIsolation, WriteTicket};
pub use manager::RegionCacheManager;
pub use region::{Region, RegionOptions};
pub use stats::RegionStats;
pub use store::{ReadHook, ReadVisit};
pub use transaction::{
    InterruptHandle, Transaction, TransactionId, TransactionManager, TransactionState,
};

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Maximum allowed region name length in bytes
pub const MAX_REGION_NAME_LENGTH: usize = 256;
