//! A simple example with a thread per Raft node.

use std::str;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use rand_core::SeedableRng;

use raft::log::memory::InMemoryLog;
use raft::message::Message;
use raft::node::{Config, Node};
use rand_chacha::ChaChaRng;

const PEERS: usize = 5;
const TICK_DURATION: Duration = Duration::from_millis(100);
const RAFT_CONFIG: Config = Config {
    election_timeout_low_ticks: 10,
    election_timeout_high_ticks: 20,
    heartbeat_interval_ticks: 1,
};

#[derive(Clone)]
struct Network {
    peers_tx: Vec<mpsc::Sender<Message>>,
}

impl Network {
    fn send(&self, message: Message) {
        println!(
            "peer {} -> peer {}: term {}",
            message.sender_id, message.recipient_id, message.current_term.id
        );
        let _ = self.peers_tx[message.recipient_id as usize].send(message);
    }
}

fn main() {
    let (peers_tx, peers_rx): (Vec<_>, Vec<_>) = (0..PEERS).map(|_| mpsc::channel()).unzip();
    let network = Network { peers_tx };

    let appended = Arc::new(Mutex::new(false));
    let (peer_committed_tx, peer_committed_rx) = mpsc::channel();
    let mut peers_committed = vec![false; PEERS];

    for (peer_id, rx) in peers_rx.into_iter().enumerate() {
        let mut peer = Node::new(
            peer_id,
            PEERS,
            InMemoryLog::new_unbounded(),
            ChaChaRng::seed_from_u64(peer_id as u64),
            RAFT_CONFIG,
        );
        let appended = Arc::clone(&appended);
        let network = network.clone();
        let peer_committed_tx = peer_committed_tx.clone();
        thread::spawn(move || {
            let mut next_tick = Instant::now() + TICK_DURATION;
            loop {
                match rx.recv_timeout(next_tick.saturating_duration_since(Instant::now())) {
                    Ok(message) => peer.enqueue_message(message),
                    Err(mpsc::RecvTimeoutError::Timeout) => {
                        peer.tick();
                        next_tick = Instant::now() + TICK_DURATION;
                    }
                    Err(mpsc::RecvTimeoutError::Disconnected) => {
                        panic!("peer {} disconnected", peer_id)
                    }
                }
                peer.take_outgoing().for_each(|message| network.send(message));

                let mut appended = appended.lock().unwrap();
                if !*appended && peer.is_leader() {
                    if peer.submit("Hello world!").is_ok() {
                        println!("peer {} appending to the log", peer_id);
                        *appended = true;
                    }
                }
                drop(appended);
                peer.take_outgoing().for_each(|message| network.send(message));

                for batch in peer.take_committed() {
                    for entry in &batch.entries {
                        if !entry.data.is_empty() {
                            println!(
                                "peer {} saw commit {}",
                                peer_id,
                                str::from_utf8(&entry.data).unwrap()
                            );
                            peer_committed_tx.send(peer_id).unwrap();
                        }
                    }
                }
            }
        });
    }
    drop((network, peer_committed_tx));

    while !peers_committed.iter().all(|seen| *seen) {
        let peer_id = peer_committed_rx.recv().unwrap();
        assert!(!peers_committed[peer_id]);
        peers_committed[peer_id] = true;
    }
}
