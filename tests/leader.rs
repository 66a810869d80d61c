use common::*;

mod common;

#[test]
fn non_leader_rejects_submissions() {
    let mut group = TestRaftGroup::new(3);
    let followers: Vec<usize> = (0..3).filter(|&id| !group.nodes[id].is_leader()).collect();
    assert!(group.nodes[followers[0]].submit("nope").is_err());
}

#[test]
fn leader_commits_a_submitted_entry_on_every_node() {
    let mut group = TestRaftGroup::new(3);
    group.run_until(|group| group.has_leader());
    assert!(group.submit_on_leader("hello"));

    group.run_until_commit(|entry| entry.data == "hello".as_bytes());

    // Run a while longer so every follower has had a chance to apply the heartbeat that carries
    // the commit index forward, then confirm every node's local log agrees on the entry.
    group.run_for(5 * CONFIG.heartbeat_interval_ticks);
    for node in &mut group.nodes {
        let last = node.log().last_index();
        assert_eq!(node.get_local(last).unwrap().data, "hello".as_bytes());
    }
}

#[test]
fn entries_commit_in_submission_order() {
    let mut group = TestRaftGroup::new(3);
    group.run_until(|group| group.has_leader());
    assert!(group.submit_on_leader("first"));
    assert!(group.submit_on_leader("second"));

    let mut seen = Vec::new();
    group.run_until(|group| {
        seen.extend(
            group
                .take_committed()
                .filter(|entry| !entry.data.is_empty())
                .map(|entry| entry.data),
        );
        seen.len() >= 2
    });
    assert_eq!(seen[0], "first".as_bytes());
    assert_eq!(seen[1], "second".as_bytes());
}

#[test]
fn leadership_moves_on_after_the_leader_is_isolated() {
    let mut group = TestRaftGroup::new(3);
    group.run_until(|group| group.has_leader());
    let first_leader = group.leader().unwrap();
    group.isolate(first_leader);
    group.run_until(|group| {
        group
            .leader()
            .map_or(false, |leader| leader != first_leader)
    });
    assert_ne!(group.leader(), Some(first_leader));
}
