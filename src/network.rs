//! A pluggable transport abstraction for delivering [`Message`]s between nodes, plus a
//! deterministic in-memory implementation for tests.

use alloc::collections::{BTreeSet, VecDeque};
use alloc::vec::Vec;

use rand_core::RngCore;

use crate::message::{Message, NodeId};

/// A transport capable of delivering [`Message`]s between nodes.
///
/// Implementations are free to drop, delay, duplicate, or reorder messages; [`Node`][node] is
/// built to tolerate all of these as long as delivery is not permanently and universally lossy.
///
/// [node]: crate::node::Node
pub trait Network {
    /// Hands `message` to the network for eventual delivery to `message.recipient_id`.
    fn send(&mut self, message: Message);

    /// Removes and returns the next message queued for `node_id`, if any.
    fn recv(&mut self, node_id: NodeId) -> Option<Message>;
}

/// An in-memory [`Network`] for deterministic simulation in tests.
///
/// Every message passes through two independent coin flips gated by
/// [`message_failure_rate`](Self::message_failure_rate): one when [`send`](Self::send) is called,
/// one when [`recv`](Self::recv) is called, each with half the configured failure probability so
/// that the overall chance a message is lost end-to-end is approximately
/// `message_failure_rate`. Messages queued for a [`disable`](Self::disable)d node are never
/// delivered, but are not discarded: they remain queued and are delivered once the node is
/// [`enable`](Self::enable)d again.
pub struct InMemoryNetwork<R> {
    num_nodes: usize,
    mailboxes: alloc::collections::BTreeMap<NodeId, VecDeque<Message>>,
    disabled: BTreeSet<NodeId>,
    random: R,

    /// The approximate fraction of messages, in `[0.0, 1.0]`, lost in transit.
    pub message_failure_rate: f64,
    /// Whether queued messages for a node are shuffled before delivery, simulating reordering.
    pub shuffle: bool,
}

impl<R: RngCore> InMemoryNetwork<R> {
    /// Constructs a network connecting `num_nodes` nodes with ids `0..num_nodes`, with no message
    /// loss or reordering and no nodes disabled.
    pub fn new(num_nodes: usize, random: R) -> Self {
        Self {
            num_nodes,
            mailboxes: (0..num_nodes).map(|id| (id, VecDeque::new())).collect(),
            disabled: BTreeSet::new(),
            random,
            message_failure_rate: 0.0,
            shuffle: false,
        }
    }

    /// Stops delivering messages queued for `node_id` until it is [`enable`](Self::enable)d.
    pub fn disable(&mut self, node_id: NodeId) {
        self.disabled.insert(node_id);
    }

    /// Resumes delivering messages queued for `node_id`.
    pub fn enable(&mut self, node_id: NodeId) {
        self.disabled.remove(&node_id);
    }

    /// Returns whether `node_id` is currently disabled.
    pub fn is_disabled(&self, node_id: NodeId) -> bool {
        self.disabled.contains(&node_id)
    }

    fn coin_flip(&mut self, probability: f64) -> bool {
        (self.random.next_u32() as f64 / u32::MAX as f64) < probability
    }
}

impl<R: RngCore> Network for InMemoryNetwork<R> {
    fn send(&mut self, message: Message) {
        let recipient = message.recipient_id as usize;
        if recipient >= self.num_nodes {
            return;
        }
        if self.coin_flip(self.message_failure_rate / 2.0) {
            return;
        }
        self.mailboxes.entry(recipient).or_default().push_back(message);
    }

    fn recv(&mut self, node_id: NodeId) -> Option<Message> {
        if self.disabled.contains(&node_id) {
            return None;
        }
        if self.coin_flip(self.message_failure_rate / 2.0) {
            return None;
        }
        let mailbox = self.mailboxes.get_mut(&node_id)?;
        if self.shuffle {
            shuffle(mailbox, &mut self.random);
        }
        mailbox.pop_front()
    }
}

fn shuffle<T>(deque: &mut VecDeque<T>, random: &mut impl RngCore) {
    let mut items: Vec<T> = deque.drain(..).collect();
    for i in (1..items.len()).rev() {
        let j = (random.next_u32() as usize) % (i + 1);
        items.swap(i, j);
    }
    deque.extend(items);
}
