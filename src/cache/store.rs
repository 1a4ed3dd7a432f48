//! Entry Store Module
//!
//! In-memory key to entry mapping for one region. Data operations only; the
//! locking strategy decides when they may run.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex, MutexGuard, RwLock};

use crate::cache::{CacheEntry, TransactionId};

// == Read Hook ==
/// A read arriving at an entry, reported to the pre-read hook.
#[derive(Debug, Clone, Copy)]
pub struct ReadVisit<'a> {
    /// Region being read
    pub region: &'a str,
    /// Key being read
    pub key: &'a str,
    /// Transaction performing the read
    pub transaction: TransactionId,
}

/// Callback fired after a read is admitted and before its value is returned.
pub type ReadHook = Arc<dyn Fn(&ReadVisit<'_>) + Send + Sync>;

// == Slots ==
/// The guarded entry map.
#[derive(Debug, Default)]
pub(crate) struct Slots {
    entries: HashMap<String, CacheEntry>,
}

impl Slots {
    /// Returns the visible value for `key`.
    #[cfg(test)]
    pub fn read(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(|entry| entry.value())
    }

    /// Commits `value` for `key`, returning the new version.
    pub fn write(&mut self, key: &str, value: String) -> u64 {
        self.entry_mut(key).commit_value(value)
    }

    /// Writes `value` for `key` in place on behalf of `tx`, uncommitted but
    /// visible to every reader. Returns the new version.
    pub fn write_uncommitted(&mut self, key: &str, tx: TransactionId, value: String) -> u64 {
        self.entry_mut(key).write_dirty(tx, value)
    }

    /// Makes the in-place write of `tx` permanent.
    pub fn commit_uncommitted(&mut self, key: &str, tx: TransactionId) -> bool {
        self.entries
            .get_mut(key)
            .map_or(false, |entry| entry.commit_dirty(tx))
    }

    /// Withdraws the in-place write of `tx`.
    pub fn revert_uncommitted(&mut self, key: &str, tx: TransactionId) -> bool {
        self.entries
            .get_mut(key)
            .map_or(false, |entry| entry.revert_dirty(tx))
    }

    /// Records an uncommitted write by `tx`.
    pub fn stage(&mut self, key: &str, tx: TransactionId, value: String) {
        self.entry_mut(key).staged.insert(tx, value);
    }

    /// Makes the staged write of `tx` visible. Returns false if nothing was staged.
    pub fn promote(&mut self, key: &str, tx: TransactionId) -> bool {
        let staged = self
            .entries
            .get_mut(key)
            .and_then(|entry| entry.staged.remove(&tx));
        match staged {
            Some(value) => {
                self.write(key, value);
                true
            }
            None => false,
        }
    }

    /// Drops the staged write of `tx`.
    pub fn discard(&mut self, key: &str, tx: TransactionId) -> bool {
        self.entries
            .get_mut(key)
            .map_or(false, |entry| entry.staged.remove(&tx).is_some())
    }

    /// Returns the entry for `key`.
    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// Returns the entry for `key`, creating it on first reference.
    pub fn entry_mut(&mut self, key: &str) -> &mut CacheEntry {
        self.entries.entry(key.to_string()).or_default()
    }

    /// Number of entries holding a visible value.
    pub fn len(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.value.is_some())
            .count()
    }

    /// Returns true if no entry holds a visible value.
    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// == Entry Store ==
/// Shared entry storage for one region.
pub(crate) struct EntryStore {
    slots: Mutex<Slots>,
    /// Signalled whenever a marker is released
    released: Condvar,
    read_hook: RwLock<Option<ReadHook>>,
}

impl EntryStore {
    // == Constructor ==
    /// Creates an empty store with no read hook.
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(Slots::default()),
            released: Condvar::new(),
            read_hook: RwLock::new(None),
        }
    }

    /// Number of entries holding a visible value.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    // == Guarded Access ==
    pub(crate) fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock()
    }

    /// Parks until a marker is released or `slice` elapses.
    pub(crate) fn wait_for_release(&self, guard: &mut MutexGuard<'_, Slots>, slice: Duration) {
        let _ = self.released.wait_for(guard, slice);
    }

    pub(crate) fn notify_released(&self) {
        self.released.notify_all();
    }

    // == Read Hook ==
    /// Installs the pre-read hook, replacing any previous one.
    pub fn set_read_hook(&self, hook: ReadHook) {
        *self.read_hook.write() = Some(hook);
    }

    /// Removes the pre-read hook.
    pub fn clear_read_hook(&self) {
        *self.read_hook.write() = None;
    }

    /// Fires the pre-read hook. Must be called without holding the slots lock.
    pub(crate) fn visit(&self, visit: &ReadVisit<'_>) {
        let hook = self.read_hook.read().clone();
        if let Some(hook) = hook {
            hook(visit);
        }
    }
}

impl Default for EntryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EntryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryStore")
            .field("slots", &*self.slots.lock())
            .field("read_hook", &self.read_hook.read().is_some())
            .finish()
    }
}
