//! Locking Strategy Module
//!
//! Decides what blocks what between reads and writes of a single entry.
//!
//! - `Optimistic`: nothing ever blocks. Writes land in place (visible at once)
//!   unless the region asks for read-committed isolation, in which case they
//!   are staged until commit.
//! - `Pessimistic`: reads leave a shared marker and never block. A write waits
//!   until no other transaction holds a shared or exclusive marker, then holds
//!   the exclusive marker until its transaction ends. Writes are staged.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::store::{EntryStore, Slots};
use crate::cache::{InterruptHandle, TransactionId};
use crate::error::{CacheError, Result};

/// Longest a blocked writer parks before re-checking interrupts and deadlines.
const WAIT_SLICE: Duration = Duration::from_millis(20);

// == Locking Strategy ==
/// Concurrency policy bound to a region for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LockingStrategy {
    #[serde(rename = "optimistic-shared", alias = "optimistic")]
    Optimistic,
    #[serde(rename = "pessimistic-shared", alias = "pessimistic")]
    Pessimistic,
}

impl LockingStrategy {
    /// Configuration name of the strategy.
    pub fn as_str(&self) -> &'static str {
        match self {
            LockingStrategy::Optimistic => "optimistic-shared",
            LockingStrategy::Pessimistic => "pessimistic-shared",
        }
    }

    // == Begin Read ==
    /// Admits a read of `key` by `tx` and captures its snapshot. Never blocks.
    pub(crate) fn begin_read(self, slots: &mut Slots, key: &str, tx: TransactionId) -> ReadTicket {
        let entry = slots.entry_mut(key);
        let shared = self == LockingStrategy::Pessimistic;
        if shared {
            entry.lock.add_reader(tx);
        }

        ReadTicket {
            key: key.to_string(),
            transaction: tx,
            shared,
            snapshot: entry.visible_to(tx),
        }
    }

    // == End Read ==
    /// Releases the read's shared marker. Returns true if writers should be woken.
    pub(crate) fn end_read(self, slots: &mut Slots, ticket: &ReadTicket) -> bool {
        if !ticket.shared {
            return false;
        }
        slots
            .entry_mut(&ticket.key)
            .lock
            .remove_reader(ticket.transaction)
    }

    // == Begin Write ==
    /// Admits a write, blocking under `Pessimistic` until the entry is free of
    /// other transactions' markers.
    ///
    /// # Errors
    /// - `InterruptedWait` if the transaction is interrupted while blocked
    /// - `LockAcquisitionFailure` if `timeout` elapses first
    pub(crate) fn begin_write(
        self,
        store: &EntryStore,
        target: &LockTarget<'_>,
        isolation: ReadIsolation,
        timeout: Option<Duration>,
    ) -> Result<WriteTicket> {
        let mut slots = store.lock();

        match self {
            LockingStrategy::Optimistic => {
                slots.entry_mut(target.key);
                let mode = match isolation {
                    ReadIsolation::ReadCommitted => WriteMode::Staged,
                    ReadIsolation::ReadUncommitted => WriteMode::InPlace,
                };
                Ok(WriteTicket::new(target, mode, false, false))
            }
            LockingStrategy::Pessimistic => {
                let deadline = timeout.map(|limit| Instant::now() + limit);
                let mut waited = false;

                loop {
                    let lock = &mut slots.entry_mut(target.key).lock;
                    if lock.can_write(target.transaction) {
                        lock.grant_write(target.transaction);
                        break;
                    }

                    if target.interrupt.take() {
                        warn!(
                            region = target.region,
                            key = target.key,
                            tx = %target.transaction,
                            "Write lock wait interrupted"
                        );
                        return Err(CacheError::InterruptedWait {
                            region: target.region.to_string(),
                            key: target.key.to_string(),
                        });
                    }

                    let slice = match deadline {
                        Some(deadline) => {
                            let now = Instant::now();
                            if now >= deadline {
                                warn!(
                                    region = target.region,
                                    key = target.key,
                                    tx = %target.transaction,
                                    "Write lock acquisition timed out"
                                );
                                return Err(CacheError::LockAcquisitionFailure {
                                    region: target.region.to_string(),
                                    key: target.key.to_string(),
                                    reason: format!(
                                        "timed out after {} ms",
                                        timeout.unwrap_or_default().as_millis()
                                    ),
                                });
                            }
                            (deadline - now).min(WAIT_SLICE)
                        }
                        None => WAIT_SLICE,
                    };

                    if !waited {
                        debug!(
                            region = target.region,
                            key = target.key,
                            tx = %target.transaction,
                            "Writer blocked behind entry markers"
                        );
                        waited = true;
                    }

                    lock.writer_waiting();
                    store.wait_for_release(&mut slots, slice);
                    slots.entry_mut(target.key).lock.writer_done_waiting();
                }

                Ok(WriteTicket::new(target, WriteMode::Staged, true, waited))
            }
        }
    }

    // == Apply Write ==
    /// Performs the store write authorized by `ticket`.
    pub(crate) fn apply_write(self, slots: &mut Slots, ticket: &WriteTicket, value: String) {
        match ticket.mode {
            WriteMode::Staged => slots.stage(&ticket.key, ticket.transaction, value),
            WriteMode::InPlace => {
                slots.write_uncommitted(&ticket.key, ticket.transaction, value);
            }
        }
    }

    // == End Write ==
    /// Finishes a write: `Commit` makes it permanent, `Rollback` undoes it.
    /// Releases the exclusive marker. Returns true if waiters should be woken.
    pub(crate) fn end_write(self, slots: &mut Slots, ticket: WriteTicket, outcome: Outcome) -> bool {
        let WriteTicket {
            key,
            transaction,
            exclusive,
            mode,
            ..
        } = ticket;

        match (mode, outcome) {
            (WriteMode::Staged, Outcome::Commit) => {
                slots.promote(&key, transaction);
            }
            (WriteMode::Staged, Outcome::Rollback) => {
                slots.discard(&key, transaction);
            }
            (WriteMode::InPlace, Outcome::Commit) => {
                slots.commit_uncommitted(&key, transaction);
            }
            (WriteMode::InPlace, Outcome::Rollback) => {
                slots.revert_uncommitted(&key, transaction);
            }
        }

        exclusive && slots.entry_mut(&key).lock.release_write(transaction)
    }
}

impl fmt::Display for LockingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LockingStrategy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "optimistic" | "optimistic-shared" => Ok(LockingStrategy::Optimistic),
            "pessimistic" | "pessimistic-shared" => Ok(LockingStrategy::Pessimistic),
            other => Err(CacheError::UnknownStrategy(other.to_string())),
        }
    }
}

// == Read Isolation ==
/// Whether optimistic readers see writes of transactions that have not committed.
///
/// Pessimistic regions always behave as `ReadCommitted`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReadIsolation {
    #[default]
    ReadUncommitted,
    ReadCommitted,
}

impl ReadIsolation {
    /// Configuration name of the isolation level.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadIsolation::ReadUncommitted => "read-uncommitted",
            ReadIsolation::ReadCommitted => "read-committed",
        }
    }
}

impl fmt::Display for ReadIsolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReadIsolation {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read-uncommitted" | "read_uncommitted" => Ok(ReadIsolation::ReadUncommitted),
            "read-committed" | "read_committed" => Ok(ReadIsolation::ReadCommitted),
            other => Err(CacheError::UnknownIsolation(other.to_string())),
        }
    }
}

// == Outcome ==
/// How a transaction ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Commit,
    Rollback,
}

// == Lock Target ==
/// The entry a writer wants and who is asking.
#[derive(Debug)]
pub(crate) struct LockTarget<'a> {
    pub(crate) region: &'a str,
    pub(crate) key: &'a str,
    pub(crate) transaction: TransactionId,
    pub(crate) interrupt: &'a InterruptHandle,
}

// == Tickets ==
/// Permission to read one entry; carries the value captured at admission.
#[derive(Debug)]
pub(crate) struct ReadTicket {
    key: String,
    transaction: TransactionId,
    shared: bool,
    snapshot: Option<String>,
}

impl ReadTicket {
    pub(crate) fn take_snapshot(&mut self) -> Option<String> {
        self.snapshot.take()
    }
}

#[derive(Debug)]
enum WriteMode {
    /// Held aside until commit
    Staged,
    /// Visible at once; withdrawn on rollback, leaving the newest remaining
    /// write or the committed value
    InPlace,
}

/// Permission to write one entry, held by a transaction until it ends.
#[derive(Debug)]
pub struct WriteTicket {
    key: String,
    transaction: TransactionId,
    exclusive: bool,
    waited: bool,
    mode: WriteMode,
}

impl WriteTicket {
    fn new(target: &LockTarget<'_>, mode: WriteMode, exclusive: bool, waited: bool) -> Self {
        Self {
            key: target.key.to_string(),
            transaction: target.transaction,
            exclusive,
            waited,
            mode,
        }
    }

    /// The key being written.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether this ticket holds the entry's exclusive marker.
    pub fn is_exclusive(&self) -> bool {
        self.exclusive
    }

    /// Whether acquiring this ticket had to wait on other transactions.
    pub fn waited(&self) -> bool {
        self.waited
    }
}
