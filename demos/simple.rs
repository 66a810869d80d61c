//! A simple example built on the in-memory simulation used by the crate's doctest.

use std::str;

use rand_core::SeedableRng;

use raft::applier::{Applier, VecApplier};
use raft::log::memory::InMemoryLog;
use raft::network::{InMemoryNetwork, Network};
use raft::node::{Config, Node};
use rand_chacha::ChaChaRng;

const PEERS: usize = 5;

fn main() {
    let mut peers = (0..PEERS)
        .map(|id| {
            Node::new(
                id,
                PEERS,
                InMemoryLog::new_unbounded(),
                ChaChaRng::seed_from_u64(id as u64),
                Config::new(10, 20, 1),
            )
        })
        .collect::<Vec<_>>();
    let mut network = InMemoryNetwork::new(PEERS, ChaChaRng::seed_from_u64(1000));
    let mut appliers = (0..PEERS).map(|_| VecApplier::new()).collect::<Vec<_>>();

    let mut submitted = false;
    while !appliers.iter().any(|applier| !applier.entries().is_empty()) {
        for (id, peer) in peers.iter_mut().enumerate() {
            peer.tick();

            if !submitted && peer.is_leader() {
                if peer.submit("Hello world!").is_ok() {
                    println!("peer {} appending to the log", id);
                    submitted = true;
                }
            }

            while let Some(message) = network.recv(id) {
                peer.enqueue_message(message);
            }
            peer.take_outgoing().for_each(|message| network.send(message));

            for batch in peer.take_committed() {
                for entry in &batch.entries {
                    if !entry.data.is_empty() {
                        println!(
                            "peer {} saw commit {}",
                            id,
                            str::from_utf8(&entry.data).unwrap()
                        );
                    }
                }
                appliers[id].apply(batch);
            }
        }
    }
}
