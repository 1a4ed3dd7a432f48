//! Cache Entry Module
//!
//! Defines a single region entry: its visible value, staged writes and lock state.

use std::collections::HashMap;

use serde::Serialize;

use crate::cache::TransactionId;

// == Cache Entry ==
/// Represents a single region entry with value and concurrency metadata.
///
/// `value` is what readers see: the newest uncommitted in-place write if one
/// is newer than the committed value, else the committed value.
#[derive(Debug, Default)]
pub struct CacheEntry {
    /// The globally visible value, None until something is written
    pub(crate) value: Option<String>,
    /// Bumped on every write; orders committed and uncommitted values
    pub(crate) version: u64,
    /// Last committed value
    pub(crate) committed: Option<String>,
    /// Version at which `committed` was written
    pub(crate) committed_version: u64,
    /// Uncommitted in-place writes, oldest first, at most one per transaction
    pub(crate) dirty: Vec<DirtyWrite>,
    /// Uncommitted staged writes, one per writing transaction
    pub(crate) staged: HashMap<TransactionId, String>,
    /// Shared and exclusive markers
    pub(crate) lock: LockState,
}

/// An uncommitted write already visible to readers.
#[derive(Debug, Clone)]
pub(crate) struct DirtyWrite {
    pub(crate) transaction: TransactionId,
    pub(crate) value: String,
    pub(crate) version: u64,
}

impl CacheEntry {
    /// Creates an empty entry with no value and a free lock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the globally visible value.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Returns the last committed value.
    pub fn committed(&self) -> Option<&str> {
        self.committed.as_deref()
    }

    /// Returns the current version.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Returns what `tx` would see: its own staged write if any, else the visible value.
    pub fn visible_to(&self, tx: TransactionId) -> Option<String> {
        self.staged
            .get(&tx)
            .cloned()
            .or_else(|| self.value.clone())
    }

    /// Returns the lock state.
    pub fn lock(&self) -> &LockState {
        &self.lock
    }

    // == Writes ==
    /// Commits `value` directly.
    pub(crate) fn commit_value(&mut self, value: String) -> u64 {
        self.version += 1;
        self.committed = Some(value);
        self.committed_version = self.version;
        self.refresh();
        self.version
    }

    /// Records an uncommitted write by `tx` that readers see at once. A
    /// repeat write by the same transaction replaces its earlier one.
    pub(crate) fn write_dirty(&mut self, tx: TransactionId, value: String) -> u64 {
        self.version += 1;
        self.dirty.retain(|write| write.transaction != tx);
        self.dirty.push(DirtyWrite {
            transaction: tx,
            value,
            version: self.version,
        });
        self.refresh();
        self.version
    }

    /// Makes the uncommitted write of `tx` permanent. A committed value
    /// written after it is kept. Returns false if `tx` had no such write.
    pub(crate) fn commit_dirty(&mut self, tx: TransactionId) -> bool {
        let Some(write) = self.take_dirty(tx) else {
            return false;
        };
        if write.version > self.committed_version {
            self.committed = Some(write.value);
            self.committed_version = write.version;
        }
        self.refresh();
        true
    }

    /// Drops the uncommitted write of `tx`; readers fall back to the newest
    /// remaining write. Returns false if `tx` had no such write.
    pub(crate) fn revert_dirty(&mut self, tx: TransactionId) -> bool {
        let reverted = self.take_dirty(tx).is_some();
        self.refresh();
        reverted
    }

    fn take_dirty(&mut self, tx: TransactionId) -> Option<DirtyWrite> {
        let index = self.dirty.iter().position(|write| write.transaction == tx)?;
        Some(self.dirty.remove(index))
    }

    fn refresh(&mut self) {
        self.value = match self.dirty.last() {
            Some(write) if write.version > self.committed_version => Some(write.value.clone()),
            _ => self.committed.clone(),
        };
    }
}

// == Lock Mode ==
/// Observable view of an entry's lock state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum LockMode {
    /// No markers held
    Free,
    /// Shared markers held by these transactions
    ReadHeld { holders: Vec<TransactionId> },
    /// Exclusive marker held; `waiting` writers are blocked behind it or behind readers
    WriteHeld {
        holder: TransactionId,
        waiting: usize,
    },
}

// == Lock State ==
/// Per-entry shared/exclusive markers.
///
/// Shared markers are counted per transaction so a transaction can visit the
/// same entry from several reads. Readers are admitted even while the
/// exclusive marker is held.
#[derive(Debug, Default)]
pub struct LockState {
    readers: HashMap<TransactionId, usize>,
    writer: Option<TransactionId>,
    waiting_writers: usize,
}

impl LockState {
    // == Mode ==
    /// Returns the observable lock mode.
    pub fn mode(&self) -> LockMode {
        if let Some(holder) = self.writer {
            return LockMode::WriteHeld {
                holder,
                waiting: self.waiting_writers,
            };
        }
        if self.readers.is_empty() {
            return LockMode::Free;
        }
        let mut holders: Vec<TransactionId> = self.readers.keys().copied().collect();
        holders.sort();
        LockMode::ReadHeld { holders }
    }

    /// Returns true if no marker of any kind is held.
    pub fn is_free(&self) -> bool {
        self.writer.is_none() && self.readers.is_empty()
    }

    /// Returns the holder of the exclusive marker.
    pub fn writer(&self) -> Option<TransactionId> {
        self.writer
    }

    /// Returns the number of writers currently blocked on this entry.
    pub fn waiting_writers(&self) -> usize {
        self.waiting_writers
    }

    // == Shared Markers ==
    pub(crate) fn add_reader(&mut self, tx: TransactionId) {
        *self.readers.entry(tx).or_insert(0) += 1;
    }

    /// Drops one shared marker of `tx`. Returns false if it held none.
    pub(crate) fn remove_reader(&mut self, tx: TransactionId) -> bool {
        match self.readers.get_mut(&tx) {
            Some(count) if *count > 1 => {
                *count -= 1;
                true
            }
            Some(_) => {
                self.readers.remove(&tx);
                true
            }
            None => false,
        }
    }

    /// Returns true if a transaction other than `tx` holds a shared marker.
    pub fn has_foreign_readers(&self, tx: TransactionId) -> bool {
        self.readers.keys().any(|holder| *holder != tx)
    }

    // == Exclusive Marker ==
    /// Returns true if `tx` could take the exclusive marker right now.
    pub fn can_write(&self, tx: TransactionId) -> bool {
        self.writer.map_or(true, |holder| holder == tx) && !self.has_foreign_readers(tx)
    }

    pub(crate) fn grant_write(&mut self, tx: TransactionId) {
        debug_assert!(self.can_write(tx));
        self.writer = Some(tx);
    }

    /// Releases the exclusive marker if `tx` holds it.
    pub(crate) fn release_write(&mut self, tx: TransactionId) -> bool {
        if self.writer == Some(tx) {
            self.writer = None;
            true
        } else {
            false
        }
    }

    pub(crate) fn writer_waiting(&mut self) {
        self.waiting_writers += 1;
    }

    pub(crate) fn writer_done_waiting(&mut self) {
        self.waiting_writers = self.waiting_writers.saturating_sub(1);
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn tx(id: u64) -> TransactionId {
        TransactionId::new(id)
    }

    #[test]
    fn test_entry_new_is_empty() {
        let entry = CacheEntry::new();
        assert!(entry.value().is_none());
        assert_eq!(entry.version(), 0);
        assert_eq!(entry.lock().mode(), LockMode::Free);
    }

    #[test]
    fn test_visible_to_prefers_own_staged_write() {
        let mut entry = CacheEntry::new();
        entry.commit_value("committed".to_string());
        entry.staged.insert(tx(1), "staged".to_string());

        assert_eq!(entry.visible_to(tx(1)).as_deref(), Some("staged"));
        assert_eq!(entry.visible_to(tx(2)).as_deref(), Some("committed"));
    }

    #[test]
    fn test_dirty_write_visible_until_reverted() {
        let mut entry = CacheEntry::new();
        entry.commit_value("value1".to_string());
        entry.write_dirty(tx(1), "value2".to_string());

        assert_eq!(entry.value(), Some("value2"));
        assert_eq!(entry.committed(), Some("value1"));
        assert!(entry.revert_dirty(tx(1)));
        assert_eq!(entry.value(), Some("value1"));
        assert!(!entry.revert_dirty(tx(1)));
    }

    #[test]
    fn test_overlapping_reverts_fall_back_to_committed() {
        let mut entry = CacheEntry::new();
        entry.commit_value("value1".to_string());
        entry.write_dirty(tx(1), "value2".to_string());
        entry.write_dirty(tx(2), "value3".to_string());

        entry.revert_dirty(tx(2));
        assert_eq!(entry.value(), Some("value2"));
        entry.revert_dirty(tx(1));
        assert_eq!(entry.value(), Some("value1"));
    }

    #[test]
    fn test_revert_keeps_later_commit() {
        let mut entry = CacheEntry::new();
        entry.commit_value("value1".to_string());
        entry.write_dirty(tx(1), "value2".to_string());
        entry.write_dirty(tx(2), "value3".to_string());
        assert!(entry.commit_dirty(tx(2)));
        entry.write_dirty(tx(1), "value4".to_string());

        assert_eq!(entry.value(), Some("value4"));
        entry.revert_dirty(tx(1));
        assert_eq!(entry.value(), Some("value3"));
        assert_eq!(entry.committed(), Some("value3"));
    }

    #[test]
    fn test_older_commit_does_not_override_newer_one() {
        let mut entry = CacheEntry::new();
        entry.write_dirty(tx(1), "value1".to_string());
        entry.commit_value("value2".to_string());

        assert!(entry.commit_dirty(tx(1)));
        assert_eq!(entry.value(), Some("value2"));
        assert_eq!(entry.committed(), Some("value2"));
    }

    #[test]
    fn test_readers_are_counted() {
        let mut lock = LockState::default();
        lock.add_reader(tx(1));
        lock.add_reader(tx(1));

        assert!(lock.remove_reader(tx(1)));
        assert_eq!(lock.mode(), LockMode::ReadHeld { holders: vec![tx(1)] });
        assert!(lock.remove_reader(tx(1)));
        assert!(lock.is_free());
        assert!(!lock.remove_reader(tx(1)));
    }

    #[test]
    fn test_foreign_reader_blocks_write() {
        let mut lock = LockState::default();
        lock.add_reader(tx(1));

        assert!(lock.can_write(tx(1)));
        assert!(!lock.can_write(tx(2)));

        lock.remove_reader(tx(1));
        assert!(lock.can_write(tx(2)));
    }

    #[test]
    fn test_exclusive_marker_is_reentrant() {
        let mut lock = LockState::default();
        lock.grant_write(tx(1));

        assert!(lock.can_write(tx(1)));
        assert!(!lock.can_write(tx(2)));
        assert!(!lock.release_write(tx(2)));
        assert!(lock.release_write(tx(1)));
        assert!(lock.is_free());
    }

    #[test]
    fn test_reader_admitted_while_write_held() {
        let mut lock = LockState::default();
        lock.grant_write(tx(1));
        lock.add_reader(tx(2));
        lock.writer_waiting();

        assert_eq!(
            lock.mode(),
            LockMode::WriteHeld {
                holder: tx(1),
                waiting: 1
            }
        );
        lock.writer_done_waiting();
        assert_eq!(lock.waiting_writers(), 0);
    }
}
