//! Higher-level, queue-based API for a Raft node.

use alloc::collections::VecDeque;

use bytes::Bytes;
use rand_core::RngCore;

use crate::applier::CommittedBatch;
use crate::core::{Event, State, Submitted};
use crate::error::AppendError;
use crate::log::Log;
use crate::message::{LogEntry, LogIndex, Message, NodeId, TermId};

/// A Raft node, used for replicating a strongly-consistent distributed log of entries with
/// arbitrary data amongst its peers.
///
/// The distributed log can be used, for example, to replicate transactions in a database.
///
/// # Driving a node
///
/// A [`Node`] does no I/O of its own. The caller drives it by calling [`tick`] at a steady
/// interval and [`enqueue_message`] for every [`Message`] addressed to this node's
/// [`node_id`](Self::node_id) received off the network, and drains [`take_outgoing`] after each
/// call for messages to hand to a [`Network`](crate::network::Network) and [`take_committed`]
/// for entries to hand to an [`Applier`](crate::applier::Applier). Any consistent time interval
/// may be chosen between [`tick`] calls, but it and [`Config`] must be identical on every node in
/// a group: shorter intervals react to network disruption faster, at the cost of spurious
/// leadership changes if latency exceeds `interval * election_timeout_low_ticks`.
///
/// # Appending entries to the distributed log
///
/// Only the current leader, as reported by [`leader`], can accept [`submit`]. Even the leader may
/// lose leadership before an entry commits, in which case the caller should resubmit the entry to
/// the new leader. [`take_committed`] returns the same entries in the same order on every node
/// that has called it long enough, regardless of which node the entry was originally submitted to.
///
/// [`enqueue_message`]: Self::enqueue_message
/// [`leader`]: Self::leader
/// [`submit`]: Self::submit
/// [`take_committed`]: Self::take_committed
/// [`take_outgoing`]: Self::take_outgoing
/// [`tick`]: Self::tick
pub struct Node<L, R> {
    state: State<L, R>,
    outgoing: VecDeque<Message>,
    committed: VecDeque<CommittedBatch>,
}

/// Configurable timing parameters of a Raft node.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Config {
    /// The minimum number of timer ticks to wait, after the last reset, before starting a new
    /// election. The actual timeout is drawn uniformly from
    /// `[election_timeout_low_ticks, election_timeout_high_ticks]` on every reset.
    pub election_timeout_low_ticks: u32,

    /// The maximum number of timer ticks to wait before starting a new election.
    pub election_timeout_high_ticks: u32,

    /// The number of timer ticks between a leader's heartbeats to its peers.
    pub heartbeat_interval_ticks: u32,
}

impl Config {
    /// Constructs a new `Config`.
    ///
    /// # Panics
    ///
    /// Panics if `election_timeout_low_ticks > election_timeout_high_ticks`. In debug builds,
    /// also asserts that `heartbeat_interval_ticks` is at least an order of magnitude smaller than
    /// `election_timeout_low_ticks`, since a heartbeat rate too close to the election timeout
    /// causes spurious elections under ordinary network jitter.
    pub fn new(
        election_timeout_low_ticks: u32,
        election_timeout_high_ticks: u32,
        heartbeat_interval_ticks: u32,
    ) -> Self {
        assert!(election_timeout_low_ticks <= election_timeout_high_ticks);
        debug_assert!(
            heartbeat_interval_ticks.saturating_mul(10) <= election_timeout_low_ticks,
            "heartbeat_interval_ticks should be an order of magnitude smaller than election_timeout_low_ticks"
        );
        Self {
            election_timeout_low_ticks,
            election_timeout_high_ticks,
            heartbeat_interval_ticks,
        }
    }
}

impl Default for Config {
    /// 100-200 tick election timeout, 5 tick heartbeat interval.
    fn default() -> Self {
        Self::new(100, 200, 5)
    }
}

impl<L, R> Node<L, R>
where
    L: Log,
    R: RngCore,
{
    /// Constructs a new Raft node, one of `peer_count` total nodes addressed `0..peer_count`,
    /// starting with an empty log and as a follower.
    ///
    /// `log` should be in an empty initial state. Every node in a group must be constructed with
    /// the same `peer_count` and `config`; `random` must produce different values on every node.
    pub fn new(node_id: NodeId, peer_count: usize, log: L, random: R, config: Config) -> Self {
        Self {
            state: State::new(node_id, peer_count, log, random, config),
            outgoing: VecDeque::new(),
            committed: VecDeque::new(),
        }
    }

    /// Advances this node's internal clock by one tick.
    pub fn tick(&mut self) {
        self.process(Event::ClockTick);
    }

    /// Delivers a `message` received off the network, addressed to this node, from a peer.
    pub fn enqueue_message(&mut self, message: Message) {
        self.process(Event::Message(message));
    }

    /// Requests appending an entry with arbitrary `data` to the distributed log.
    ///
    /// # Errors
    ///
    /// Returns [`AppendError::NotLeader`] if this node does not currently believe itself to be
    /// the leader. The caller should resubmit to the node named by [`leader`](Self::leader), once
    /// known.
    pub fn submit<T: Into<Bytes>>(&mut self, data: T) -> Result<Submitted, AppendError<L::Error>> {
        self.state.submit(data.into())
    }

    /// Removes and returns every message queued to be sent since the last call.
    pub fn take_outgoing(&mut self) -> impl Iterator<Item = Message> + '_ {
        self.outgoing.drain(..)
    }

    /// Removes and returns every batch of newly-committed entries queued since the last call, in
    /// commit order.
    pub fn take_committed(&mut self) -> impl Iterator<Item = CommittedBatch> + '_ {
        self.committed.drain(..)
    }

    /// Returns this node's ID.
    pub fn node_id(&self) -> NodeId {
        self.state.node_id()
    }

    /// Returns the total number of nodes in the group, including this one.
    pub fn peer_count(&self) -> usize {
        self.state.peer_count()
    }

    /// Returns this node's configurable parameters.
    pub fn config(&self) -> &Config {
        self.state.config()
    }

    /// Returns whether this node believes itself to be the leader of the latest known term.
    pub fn is_leader(&self) -> bool {
        self.state.is_leader()
    }

    /// Returns the ID of the leader of the latest known term, if known, along with the term.
    pub fn leader(&self) -> (Option<NodeId>, TermId) {
        self.state.leader()
    }

    /// Returns the index of the highest committed log entry.
    pub fn commit_index(&self) -> LogIndex {
        self.state.commit_index()
    }

    /// Returns the entry at `index`, if it is still present in the log. Provided as a convenience
    /// for reading back entries without waiting on [`take_committed`](Self::take_committed).
    pub fn get_local(&mut self, index: LogIndex) -> Option<LogEntry> {
        self.state.log_mut().get(index)
    }

    /// Returns a reference to the backing log storage.
    pub fn log(&self) -> &L {
        self.state.log()
    }

    /// Returns a mutable reference to the backing log storage.
    pub fn log_mut(&mut self) -> &mut L {
        self.state.log_mut()
    }

    fn process(&mut self, event: Event) {
        let processed = self.state.process_event(event);
        self.outgoing.extend(processed.outgoing);
        self.committed.extend(processed.committed);
    }
}
