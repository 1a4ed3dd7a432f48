//! Region Module
//!
//! The public `get`/`put` façade over one named entry store.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use crate::cache::locking::{LockTarget, Outcome, ReadTicket, WriteTicket};
use crate::cache::store::{EntryStore, ReadVisit};
use crate::cache::{
    LockMode, LockingStrategy, ReadIsolation, RegionStats, Transaction, TransactionManager,
};
use crate::config::Config;
use crate::error::Result;

// == Region Options ==
/// Settings fixed when a region is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionOptions {
    /// Locking discipline for every entry in the region
    pub strategy: LockingStrategy,
    /// Visibility of uncommitted writes to optimistic readers
    pub isolation: ReadIsolation,
    /// Upper bound on a blocked write; None waits indefinitely
    pub lock_acquisition_timeout: Option<Duration>,
}

impl RegionOptions {
    /// Options for `strategy` with default isolation and no lock timeout.
    pub fn new(strategy: LockingStrategy) -> Self {
        Self {
            strategy,
            isolation: ReadIsolation::default(),
            lock_acquisition_timeout: None,
        }
    }

    /// Options taken from the configured defaults.
    pub fn from_config(config: &Config) -> Self {
        Self {
            strategy: config.locking_strategy,
            isolation: config.read_isolation,
            lock_acquisition_timeout: config.lock_acquisition_timeout(),
        }
    }

    /// Sets the read isolation.
    pub fn with_isolation(mut self, isolation: ReadIsolation) -> Self {
        self.isolation = isolation;
        self
    }

    /// Sets the lock acquisition timeout.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_acquisition_timeout = Some(timeout);
        self
    }
}

impl Default for RegionOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

// == Region ==
/// A named cache partition. Clones share the same entries.
#[derive(Clone)]
pub struct Region {
    inner: Arc<RegionInner>,
}

struct RegionInner {
    name: String,
    options: RegionOptions,
    store: EntryStore,
    stats: Mutex<RegionStats>,
    transactions: Arc<TransactionManager>,
}

impl Region {
    // == Constructor ==
    /// Creates an empty region.
    ///
    /// # Arguments
    /// * `name` - Region name
    /// * `options` - Strategy, isolation and lock timeout, fixed for the region's lifetime
    /// * `transactions` - Manager used by the auto-commit operations
    pub fn new(
        name: impl Into<String>,
        options: RegionOptions,
        transactions: Arc<TransactionManager>,
    ) -> Self {
        Self {
            inner: Arc::new(RegionInner {
                name: name.into(),
                options,
                store: EntryStore::new(),
                stats: Mutex::new(RegionStats::new()),
                transactions,
            }),
        }
    }

    /// Returns the region name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the options the region was built with.
    pub fn options(&self) -> RegionOptions {
        self.inner.options
    }

    /// Returns the locking strategy.
    pub fn strategy(&self) -> LockingStrategy {
        self.inner.options.strategy
    }

    /// Returns the read isolation.
    pub fn isolation(&self) -> ReadIsolation {
        self.inner.options.isolation
    }

    // == Get ==
    /// Reads `key` within `tx`. Never blocks on writers.
    ///
    /// The value returned is the one visible when the read was admitted; the
    /// pre-read hook runs between admission and return.
    pub fn get(&self, tx: &Transaction, key: &str) -> Option<String> {
        let strategy = self.strategy();
        let ticket = {
            let mut slots = self.inner.store.lock();
            strategy.begin_read(&mut slots, key, tx.id())
        };
        let mut read = AdmittedRead {
            region: &self.inner,
            ticket,
            released: false,
        };

        self.inner.store.visit(&ReadVisit {
            region: &self.inner.name,
            key,
            transaction: tx.id(),
        });

        let value = read.release();

        let mut stats = self.inner.stats.lock();
        if value.is_some() {
            stats.record_hit();
        } else {
            stats.record_miss();
        }
        value
    }

    // == Put ==
    /// Writes `key` within `tx`. May block under the pessimistic strategy.
    ///
    /// The write ticket stays with `tx` until it commits or rolls back.
    ///
    /// # Errors
    /// - `RollbackOnly` if `tx` is already doomed
    /// - `LockAcquisitionFailure` / `InterruptedWait` from the strategy; `tx`
    ///   is marked rollback-only
    pub fn put(&self, tx: &mut Transaction, key: &str, value: impl Into<String>) -> Result<()> {
        tx.ensure_writable()?;
        let value = value.into();
        let strategy = self.strategy();

        if let Some(ticket) = tx.held_write(&self.inner.name, key) {
            let mut slots = self.inner.store.lock();
            strategy.apply_write(&mut slots, ticket, value);
            drop(slots);
            self.inner.stats.lock().record_put();
            return Ok(());
        }

        let target = LockTarget {
            region: &self.inner.name,
            key,
            transaction: tx.id(),
            interrupt: tx.interrupt(),
        };
        let admitted = strategy.begin_write(
            &self.inner.store,
            &target,
            self.isolation(),
            self.inner.options.lock_acquisition_timeout,
        );
        let ticket = match admitted {
            Ok(ticket) => ticket,
            Err(err) => {
                tx.set_rollback_only();
                return Err(err);
            }
        };

        {
            let mut slots = self.inner.store.lock();
            strategy.apply_write(&mut slots, &ticket, value);
        }
        debug!(region = %self.inner.name, key, tx = %tx.id(), "Entry written");

        {
            let mut stats = self.inner.stats.lock();
            stats.record_put();
            if ticket.waited() {
                stats.record_write_wait();
            }
        }
        tx.hold_write(self.clone(), ticket);
        Ok(())
    }

    // == Auto-commit ==
    /// Reads `key` in a transaction of its own.
    pub fn get_autocommit(&self, key: &str) -> Result<Option<String>> {
        let tx = self.inner.transactions.begin();
        let value = self.get(&tx, key);
        tx.commit()?;
        Ok(value)
    }

    /// Writes `key` in a transaction of its own, rolling back on failure.
    pub fn put_autocommit(&self, key: &str, value: impl Into<String>) -> Result<()> {
        let mut tx = self.inner.transactions.begin();
        if let Err(err) = self.put(&mut tx, key, value) {
            tx.rollback();
            return Err(err);
        }
        tx.commit()
    }

    // == Read Hook ==
    /// Installs a callback fired by every read after admission, before the
    /// value is returned. Replaces any previous hook.
    pub fn set_read_hook<F>(&self, hook: F)
    where
        F: Fn(&ReadVisit<'_>) + Send + Sync + 'static,
    {
        self.inner.store.set_read_hook(Arc::new(hook));
    }

    /// Removes the read hook.
    pub fn clear_read_hook(&self) {
        self.inner.store.clear_read_hook();
    }

    // == Inspection ==
    /// Returns the lock mode of `key`; `Free` if it was never referenced.
    pub fn lock_mode(&self, key: &str) -> LockMode {
        self.inner
            .store
            .lock()
            .get(key)
            .map_or(LockMode::Free, |entry| entry.lock().mode())
    }

    /// Number of entries holding a visible value.
    pub fn len(&self) -> usize {
        self.inner.store.len()
    }

    /// Returns true if no entry holds a visible value.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a statistics snapshot.
    pub fn stats(&self) -> RegionStats {
        let mut stats = self.inner.stats.lock().clone();
        stats.set_total_entries(self.len());
        stats
    }

    // == Release ==
    pub(crate) fn release_write(&self, ticket: WriteTicket, outcome: Outcome) {
        let wake = {
            let mut slots = self.inner.store.lock();
            self.strategy().end_write(&mut slots, ticket, outcome)
        };
        if wake {
            self.inner.store.notify_released();
        }

        let mut stats = self.inner.stats.lock();
        match outcome {
            Outcome::Commit => stats.record_committed_write(),
            Outcome::Rollback => stats.record_rolled_back_write(),
        }
    }
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Region")
            .field("name", &self.inner.name)
            .field("options", &self.inner.options)
            .finish()
    }
}

/// A read between admission and release; releases its marker on drop so a
/// panicking hook cannot strand it.
struct AdmittedRead<'a> {
    region: &'a RegionInner,
    ticket: ReadTicket,
    released: bool,
}

impl AdmittedRead<'_> {
    fn release(&mut self) -> Option<String> {
        if self.released {
            return None;
        }
        self.released = true;

        let wake = {
            let mut slots = self.region.store.lock();
            self.region
                .options
                .strategy
                .end_read(&mut slots, &self.ticket)
        };
        if wake {
            self.region.store.notify_released();
        }
        self.ticket.take_snapshot()
    }
}

impl Drop for AdmittedRead<'_> {
    fn drop(&mut self) {
        self.release();
    }
}
