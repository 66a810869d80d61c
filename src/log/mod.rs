//! Types related to Raft log storage.
//!
//! Raft requires a backing storage for entries of its distributed log as they are being replicated to and from other
//! nodes. The [`Log`] trait is implemented for that purpose, and the implementation is supplied to
//! [`Node`](crate::node::Node).

use crate::message::{LogEntry, LogIndex, TermId};

#[cfg(any(feature = "test", test))]
#[macro_use]
pub mod tests;
pub mod memory;

/// An interface for storage of the Raft log of a [`Node`](crate::node::Node).
///
/// # Initial state
///
/// A Raft log is initialized as empty, with both [`prev_index`] and [`last_index`] returning
/// [`LogIndex::default()`](crate::message::LogIndex::default). The index of the first appended log entry is `1` and all
/// indices are contiguous.
///
/// # Log truncation
///
/// A Raft log of bounded size may discard old entries from the beginning of the log if, for example, it runs out of
/// space. However, the term of the last discarded entry is preserved to be returned from [`prev_term`] if requested.
/// The log can also be truncated explicitly from the end via [`cancel_from`].
///
/// [`append`]: Self::append
/// [`cancel_from`]: Self::cancel_from
/// [`last_index`]: Self::last_index
/// [`prev_index`]: Self::prev_index
/// [`prev_term`]: Self::prev_term
pub trait Log {
    /// The type of error returned by fallable operations.
    type Error;

    /// Appends an entry to the end of the log.
    ///
    /// # Errors
    ///
    /// If there was any error modifying the log, an error is returned.
    fn append(&mut self, entry: LogEntry) -> Result<(), Self::Error>;

    /// Cancels all entries including and after the entry at index `from_index`, removing them from the log. Returns the
    /// number of entries removed.
    ///
    /// # Errors
    ///
    /// If there was any error modifying the log, or if the entries did not exist, an error is returned.
    fn cancel_from(&mut self, from_index: LogIndex) -> Result<usize, Self::Error>;

    /// Returns the approximate serialized length in bytes of a given log entry.
    fn entry_len(&self, entry: &LogEntry) -> usize;

    /// Returns the entry at a given index, or `None` if the index is greater than the length of the log or if the entry
    /// has been discarded.
    fn get(&mut self, index: LogIndex) -> Option<LogEntry>;

    /// Returns the term of the entry at a given index, or `None` if the index is greater than the length of the log or
    /// if the entry has been discarded.
    fn get_term(&mut self, index: LogIndex) -> Option<TermId>;

    /// Returns the approximate serialized length of the entry at a given index, or `None` if the index is greater than
    /// the length of the log or if the entry has been discarded.
    fn get_len(&mut self, index: LogIndex) -> Option<usize> {
        self.get(index)
            .map(|entry: LogEntry| self.entry_len(&entry))
    }

    /// Returns the index of the last entry in the log, or [`LogIndex::default()`](crate::message::LogIndex::default) if
    /// empty.
    fn last_index(&self) -> LogIndex;

    /// Returns the term of the last entry in the log, or [`TermId::default()`](crate::message::TermId::default) if
    /// empty.
    fn last_term(&self) -> TermId;

    /// Returns the index immediately before the index of the first undiscarded entry in the log (see ["Log
    /// Truncation"](Log#log-truncation)).
    fn prev_index(&self) -> LogIndex;

    /// Returns the term of the entry immediately preceding the first undiscarded entry in the log (see ["Log
    /// Truncation"](Log#log-truncation)).
    fn prev_term(&self) -> TermId;
}

/// Implements the Raft log consistency check and truncate-on-conflict rule.
///
/// `prev_index == LogIndex::default()` anchors the call at the start of the log and `prev_term` is
/// ignored. Otherwise this fails (returning `false` without mutating `log`) if `log` doesn't extend to
/// `prev_index`, if the entry at `prev_index` has a different term than `prev_term`, or if `entries` is
/// not in non-decreasing term order starting from `prev_term`.
///
/// On success, `log[prev_index + 1 ..]` is replaced by `entries`, but only where they disagree: the
/// common prefix of the existing tail and `entries` is left untouched, so calling this twice with
/// identical arguments mutates the log only on the first call and returns `true` both times.
pub fn append_entries<L: Log>(
    log: &mut L,
    prev_index: LogIndex,
    prev_term: TermId,
    entries: &[LogEntry],
) -> bool {
    let mut expected_term = prev_term;
    for entry in entries {
        if entry.term < expected_term {
            return false;
        }
        expected_term = entry.term;
    }

    if prev_index != LogIndex::default() {
        match log.get_term(prev_index) {
            Some(term) if term == prev_term => {}
            _ => return false,
        }
    }

    // length of the common prefix between the log's existing tail and `entries`
    let mut agree = 0usize;
    while agree < entries.len() {
        let idx = prev_index + (agree as u64 + 1);
        match log.get_term(idx) {
            Some(term) if term == entries[agree].term => agree += 1,
            _ => break,
        }
    }

    if agree == entries.len() {
        return true;
    }

    let truncate_from = prev_index + (agree as u64 + 1);
    if truncate_from <= log.last_index() {
        let _ = log.cancel_from(truncate_from);
    }
    for entry in &entries[agree..] {
        if log.append(entry.clone()).is_err() {
            return false;
        }
    }
    true
}

pub(crate) struct LogState<L> {
    log: L,
    pub commit_idx: LogIndex,
}

//
// LogState
//

impl<L: Log> LogState<L> {
    pub fn new(log: L) -> Self {
        Self {
            log,
            commit_idx: LogIndex::default(),
        }
    }

    pub fn append(&mut self, entry: LogEntry) -> Result<(), L::Error> {
        self.log.append(entry)
    }

    pub fn cancel_from(&mut self, from_index: LogIndex) -> Result<usize, L::Error> {
        self.log.cancel_from(from_index)
    }

    pub fn entry_len(&self, entry: &LogEntry) -> usize {
        self.log.entry_len(entry)
    }

    pub fn get(&mut self, index: LogIndex) -> Option<LogEntry> {
        if index == LogIndex::default() {
            None
        } else {
            self.log.get(index)
        }
    }

    pub fn get_term(&mut self, index: LogIndex) -> Option<TermId> {
        if index == self.prev_index() {
            Some(self.prev_term())
        } else if index == LogIndex::default() {
            None
        } else {
            self.log.get_term(index)
        }
    }

    pub fn get_len(&mut self, index: LogIndex) -> Option<usize> {
        self.log.get_len(index)
    }

    pub fn last_index(&self) -> LogIndex {
        self.log.last_index()
    }

    pub fn last_term(&self) -> TermId {
        self.log.last_term()
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    pub fn log_mut(&mut self) -> &mut L {
        &mut self.log
    }

    pub fn prev_index(&self) -> LogIndex {
        self.log.prev_index()
    }

    pub fn prev_term(&self) -> TermId {
        self.log.prev_term()
    }
}
