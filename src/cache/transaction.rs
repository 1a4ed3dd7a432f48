//! Transaction Module
//!
//! Units of work that own write tickets until they commit or roll back.
//!
//! A `Transaction` is consumed by `commit`/`rollback`. One that is dropped
//! while still open (early return, panic unwinding) is rolled back, so no
//! ticket outlives its transaction.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::locking::{Outcome, WriteTicket};
use crate::cache::Region;
use crate::error::{CacheError, Result};

// == Transaction Id ==
/// Identifier of a transaction, unique within its manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TransactionId(u64);

impl TransactionId {
    /// Wraps a raw id.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw id.
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx-{}", self.0)
    }
}

// == Transaction State ==
/// Lifecycle of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionState {
    /// Accepting reads and writes
    Active,
    /// A write failed; the only possible ending is a rollback
    MarkedRollback,
    /// Writes made permanent and tickets released
    Committed,
    /// Writes discarded and tickets released
    RolledBack,
}

// == Interrupt Handle ==
/// Wakes a transaction's blocked writer from another thread.
///
/// The blocked `put` fails with `InterruptedWait`. The flag is consumed when
/// observed; an interrupt raised while nothing is blocked is seen by the next
/// wait.
#[derive(Debug, Clone, Default)]
pub struct InterruptHandle {
    flag: Arc<AtomicBool>,
}

impl InterruptHandle {
    /// Creates a handle with no pending interrupt.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the interrupt.
    pub fn interrupt(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Returns true if an interrupt is pending.
    pub fn is_interrupted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Clears a pending interrupt, returning whether there was one.
    pub(crate) fn take(&self) -> bool {
        self.flag.swap(false, Ordering::SeqCst)
    }
}

// == Transaction Manager ==
/// Hands out transactions and keeps outcome counters.
#[derive(Debug, Default)]
pub struct TransactionManager {
    next_id: AtomicU64,
    active: AtomicUsize,
    committed: AtomicU64,
    rolled_back: AtomicU64,
}

impl TransactionManager {
    /// Creates a manager whose first transaction is `tx-1`.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            ..Self::default()
        }
    }

    /// Begins a new active transaction.
    pub fn begin(self: &Arc<Self>) -> Transaction {
        let id = TransactionId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.active.fetch_add(1, Ordering::SeqCst);
        debug!(tx = %id, "Transaction started");

        Transaction {
            id,
            state: TransactionState::Active,
            writes: Vec::new(),
            interrupt: InterruptHandle::new(),
            started: Instant::now(),
            manager: Arc::clone(self),
        }
    }

    /// Number of transactions begun and not yet ended.
    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Number of transactions that committed.
    pub fn committed_count(&self) -> u64 {
        self.committed.load(Ordering::SeqCst)
    }

    /// Number of transactions that rolled back, explicitly or otherwise.
    pub fn rolled_back_count(&self) -> u64 {
        self.rolled_back.load(Ordering::SeqCst)
    }

    fn record_end(&self, outcome: Outcome) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        let counter = match outcome {
            Outcome::Commit => &self.committed,
            Outcome::Rollback => &self.rolled_back,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

/// A write ticket together with the region that must release it.
struct HeldWrite {
    region: Region,
    ticket: WriteTicket,
}

// == Transaction ==
/// One unit of work. Reads borrow it shared; writes need it exclusively.
pub struct Transaction {
    id: TransactionId,
    state: TransactionState,
    writes: Vec<HeldWrite>,
    interrupt: InterruptHandle,
    started: Instant,
    manager: Arc<TransactionManager>,
}

impl Transaction {
    /// Returns the transaction id.
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the current state.
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Returns true while the transaction may still commit.
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Time since `begin`.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Number of write tickets currently held.
    pub fn write_count(&self) -> usize {
        self.writes.len()
    }

    /// Returns a handle that can interrupt this transaction's blocked writes.
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    /// Dooms the transaction: further writes and `commit` fail with `RollbackOnly`.
    pub fn set_rollback_only(&mut self) {
        if self.state == TransactionState::Active {
            debug!(tx = %self.id, "Transaction marked rollback-only");
            self.state = TransactionState::MarkedRollback;
        }
    }

    // == Commit ==
    /// Makes every write permanent and releases all tickets.
    ///
    /// # Errors
    /// `RollbackOnly` if the transaction was marked rollback-only; it is
    /// rolled back instead.
    pub fn commit(mut self) -> Result<()> {
        if self.state == TransactionState::MarkedRollback {
            self.finish(Outcome::Rollback);
            return Err(CacheError::RollbackOnly(self.id));
        }
        self.finish(Outcome::Commit);
        Ok(())
    }

    // == Rollback ==
    /// Discards every write and releases all tickets. Never fails.
    pub fn rollback(mut self) {
        self.finish(Outcome::Rollback);
    }

    // == Internals ==
    pub(crate) fn interrupt(&self) -> &InterruptHandle {
        &self.interrupt
    }

    pub(crate) fn held_write(&self, region: &str, key: &str) -> Option<&WriteTicket> {
        self.writes
            .iter()
            .find(|held| held.region.name() == region && held.ticket.key() == key)
            .map(|held| &held.ticket)
    }

    pub(crate) fn hold_write(&mut self, region: Region, ticket: WriteTicket) {
        self.writes.push(HeldWrite { region, ticket });
    }

    pub(crate) fn ensure_writable(&self) -> Result<()> {
        match self.state {
            TransactionState::Active => Ok(()),
            _ => Err(CacheError::RollbackOnly(self.id)),
        }
    }

    fn finish(&mut self, outcome: Outcome) {
        let released = self.writes.len();
        for held in self.writes.drain(..) {
            held.region.release_write(held.ticket, outcome);
        }

        self.state = match outcome {
            Outcome::Commit => TransactionState::Committed,
            Outcome::Rollback => TransactionState::RolledBack,
        };
        self.manager.record_end(outcome);

        debug!(
            tx = %self.id,
            ?outcome,
            released,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "Transaction ended"
        );
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if matches!(
            self.state,
            TransactionState::Active | TransactionState::MarkedRollback
        ) {
            warn!(
                tx = %self.id,
                held = self.writes.len(),
                "Transaction dropped without commit or rollback, rolling back"
            );
            self.finish(Outcome::Rollback);
        }
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("writes", &self.writes.len())
            .finish()
    }
}
