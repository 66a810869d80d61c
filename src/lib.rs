//! Raft consensus algorithm implementation.
//!
//! Raft is a consensus algorithm which replicates a strongly-consistent distributed log of entries with arbitrary data
//! amongst a group of peers. It is also fault-tolerant, allowing replication to continue while a majority of peers can
//! still communicate with each other. This crate provides an implementation of the Raft consensus algorithm with some
//! optional features not implemented, such as pre-voting, membership changes, and snapshots.
//!
//! The Raft algorithm is implemented as a state machine driven in a few ways:
//!
//! * When attempting to append a new entry to the distributed log: [`submit`](node::Node::submit) is called.
//! * When a message is received from a peer: [`enqueue_message`](node::Node::enqueue_message) is called.
//! * Every time a fixed amount of time has elapsed: [`tick`](node::Node::tick) is called.
//!
//! Each of these functions modifies the internal state; outgoing [`Message`](message::Message)s and newly-committed
//! batches queue up and are drained with [`take_outgoing`](node::Node::take_outgoing) and
//! [`take_committed`](node::Node::take_committed) respectively. Once a log entry is "committed" — guaranteed to be
//! returned at the same index on every functioning peer in the group — it will appear in a
//! [`CommittedBatch`](applier::CommittedBatch). A submission may still be abandoned before reaching the committed
//! state if this node loses leadership, in which case it should be resubmitted to the new leader.
//!
//! The backing storage for the distributed log must be provided as an implementation of the [`Log`](log::Log)
//! trait, with careful attention to following the trait specification. A trivial in-memory implementation is provided
//! by [`InMemoryLog`](log::memory::InMemoryLog). Likewise, [`network::Network`] abstracts message transport, with
//! [`InMemoryNetwork`](network::InMemoryNetwork) provided for tests and simulation.
//!
//! # Example
//!
//! ```
//! use raft::applier::{Applier, VecApplier};
//! use raft::log::memory::InMemoryLog;
//! use raft::network::{InMemoryNetwork, Network};
//! use raft::node::{Config, Node};
//! use rand_chacha::ChaChaRng;
//! use rand_core::SeedableRng;
//!
//! const PEERS: usize = 5;
//!
//! let mut peers = (0..PEERS)
//!     .map(|id| {
//!         Node::new(
//!             id,
//!             PEERS,
//!             InMemoryLog::new_unbounded(),
//!             ChaChaRng::seed_from_u64(id as u64),
//!             Config::new(10, 20, 1),
//!         )
//!     })
//!     .collect::<Vec<_>>();
//! let mut network = InMemoryNetwork::new(PEERS, ChaChaRng::seed_from_u64(1000));
//! let mut appliers = (0..PEERS).map(|_| VecApplier::new()).collect::<Vec<_>>();
//!
//! let mut submitted = false;
//! while !appliers.iter().any(|applier| !applier.entries().is_empty()) {
//!     for (id, peer) in peers.iter_mut().enumerate() {
//!         peer.tick();
//!         if !submitted && peer.is_leader() {
//!             submitted = peer.submit("hello world").is_ok();
//!         }
//!         while let Some(message) = network.recv(id) {
//!             peer.enqueue_message(message);
//!         }
//!         peer.take_outgoing().for_each(|message| network.send(message));
//!         peer.take_committed().for_each(|batch| appliers[id].apply(batch));
//!     }
//! }
//! ```

#![no_std]
#![allow(unused_parens)]
#![warn(missing_docs)]

extern crate alloc;

pub mod applier;
pub mod core;
pub mod error;
pub mod log;
pub mod message;
pub mod network;
pub mod node;
