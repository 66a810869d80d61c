//! Delivery of committed log entries to an external application state machine.
//!
//! A [`Node`](crate::node::Node) has no opinion on what committed entries mean; it only
//! guarantees they are delivered to an [`Applier`] once, in commit order, and batched by the
//! [`process_event`](crate::core::State::process_event) call that advanced `commit_index`.

use alloc::vec::Vec;

use crate::message::{LogEntry, LogIndex};

/// One or more consecutively-committed [`LogEntry`] values, delivered together because they were
/// committed by the same event.
#[derive(Debug, Clone, PartialEq)]
pub struct CommittedBatch {
    /// The log index of `entries[0]`.
    pub first_index: LogIndex,
    /// The newly-committed entries, in log order.
    pub entries: Vec<LogEntry>,
}

/// A consumer of committed log entries.
pub trait Applier {
    /// Applies a newly-committed batch of entries to the application state machine.
    fn apply(&mut self, batch: CommittedBatch);
}

/// An [`Applier`] that records every batch it receives, for use in tests.
#[derive(Debug, Default)]
pub struct VecApplier {
    /// The batches recorded so far, in the order they were applied.
    pub batches: Vec<CommittedBatch>,
}

impl VecApplier {
    /// Constructs an applier with no recorded batches.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every entry applied so far, flattened across batches, in commit order.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.batches
            .iter()
            .flat_map(|batch| batch.entries.iter().cloned())
            .collect()
    }
}

impl Applier for VecApplier {
    fn apply(&mut self, batch: CommittedBatch) {
        self.batches.push(batch);
    }
}

/// An [`Applier`] that discards every batch it receives.
#[derive(Debug, Default)]
pub struct NullApplier;

impl Applier for NullApplier {
    fn apply(&mut self, _batch: CommittedBatch) {}
}
