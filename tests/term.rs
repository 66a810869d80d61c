use raft::core::{Event, State};
use raft::log::memory::InMemoryLog;
use raft::message::{Message, RejectMessage, Rpc, TermId};
use raft::node::Config;
use rand_chacha::ChaChaRng;
use rand_core::SeedableRng;

const CONFIG: Config = Config {
    election_timeout_low_ticks: 10,
    election_timeout_high_ticks: 20,
    heartbeat_interval_ticks: 1,
};

fn state(node_id: usize) -> State<InMemoryLog, ChaChaRng> {
    state_with_peers(node_id, 3)
}

fn state_with_peers(node_id: usize, peer_count: usize) -> State<InMemoryLog, ChaChaRng> {
    State::new(
        node_id,
        peer_count,
        InMemoryLog::new_unbounded(),
        ChaChaRng::seed_from_u64(node_id as u64),
        CONFIG,
    )
}

fn message(from: usize, to: usize, term: TermId, rpc: Rpc) -> Message {
    Message {
        sender_id: from as u64,
        recipient_id: to as u64,
        current_term: term,
        rpc: Some(rpc),
    }
}

#[test]
fn follower_adopts_a_higher_term_from_any_message() {
    let mut node = state(0);
    assert!(node.leader().1 == TermId::default());

    let higher = TermId { id: 5 };
    node.process_event(Event::Message(message(
        1,
        0,
        higher,
        Rpc::RejectMessage(RejectMessage {}),
    )));
    assert!(node.leader().1 == higher);
}

#[test]
fn stale_term_message_is_rejected_and_does_not_advance_the_term() {
    let mut node = state(0);
    node.process_event(Event::Message(message(
        1,
        0,
        TermId { id: 5 },
        Rpc::RejectMessage(RejectMessage {}),
    )));
    assert!(node.leader().1 == TermId { id: 5 });

    let processed = node.process_event(Event::Message(message(
        1,
        0,
        TermId { id: 2 },
        Rpc::RejectMessage(RejectMessage {}),
    )));
    assert!(node.leader().1 == TermId { id: 5 });
    assert_eq!(processed.outgoing.len(), 1);
    assert!(matches!(processed.outgoing[0].rpc, Some(Rpc::RejectMessage(_))));
}

#[test]
fn leader_steps_down_on_a_higher_term() {
    let mut node = state_with_peers(0, 1);
    for _ in 0..30 {
        node.process_event(Event::ClockTick);
        if node.is_leader() {
            break;
        }
    }
    assert!(node.is_leader());

    let mut higher = node.leader().1;
    higher += 1;
    node.process_event(Event::Message(message(
        1,
        0,
        higher,
        Rpc::RejectMessage(RejectMessage {}),
    )));
    assert!(!node.is_leader());
}
