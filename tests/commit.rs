use common::*;

mod common;

#[test]
fn single_node_group_commits_immediately() {
    let mut group = TestRaftGroup::new(1);
    group.run_until(|group| group.has_leader());
    assert!(group.submit_on_leader("one"));
    group.run_until_commit(|entry| entry.data == "one".as_bytes());
}

#[test]
fn two_node_group_commits_with_both_nodes_up() {
    let mut group = TestRaftGroup::new(2);
    group.run_until(|group| group.has_leader());
    assert!(group.submit_on_leader("one"));
    group.run_until_commit(|entry| entry.data == "one".as_bytes());
}

#[test]
fn three_node_group_commits_with_a_majority() {
    let mut group = TestRaftGroup::new(3);
    group.run_until(|group| group.has_leader());
    assert!(group.submit_on_leader("one"));
    group.run_until_commit(|entry| entry.data == "one".as_bytes());
}

#[test]
fn entry_survives_a_leader_change_before_replication_completes() {
    let mut group = TestRaftGroup::new(3);
    group.run_until(|group| group.has_leader());
    let first_leader = group.leader().unwrap();
    assert!(group.submit_on_leader("one"));

    // Isolate the leader before its followers get a chance to acknowledge, forcing a new
    // election. The entry lives only in the old leader's log until a new leader replicates it.
    group.isolate(first_leader);
    group.run_until(|group| {
        group
            .leader()
            .map_or(false, |leader| leader != first_leader)
    });
    group.heal(first_leader);

    group.run_until_commit(|entry| entry.data == "one".as_bytes());
}

#[test]
fn minority_partition_never_commits_while_majority_does() {
    let mut group = TestRaftGroup::new(5);
    group.run_until(|group| group.has_leader());
    let leader = group.leader().unwrap();
    let minority: Vec<usize> = (0..5).filter(|&id| id != leader).take(2).collect();
    for &id in &minority {
        group.isolate(id);
    }

    assert!(group.submit_on_leader("one"));
    group.run_until_commit(|entry| entry.data == "one".as_bytes());

    assert!(minority.iter().all(|&id| !group.nodes[id].is_leader()));
}

#[test]
fn committed_entries_apply_in_log_order_on_every_node() {
    let mut group = TestRaftGroup::new(3);
    group.run_until(|group| group.has_leader());
    assert!(group.submit_on_leader("one"));
    assert!(group.submit_on_leader("two"));
    assert!(group.submit_on_leader("three"));

    let mut seen = Vec::new();
    group.run_until(|group| {
        seen.extend(
            group
                .take_committed()
                .filter(|entry| !entry.data.is_empty())
                .map(|entry| entry.data),
        );
        seen.len() >= 3
    });
    assert_eq!(seen[0], "one".as_bytes());
    assert_eq!(seen[1], "two".as_bytes());
    assert_eq!(seen[2], "three".as_bytes());

    group.run_for(5 * CONFIG.heartbeat_interval_ticks);
    for node in &mut group.nodes {
        let last = node.log().last_index();
        assert_eq!(node.get_local(last).unwrap().data, "three".as_bytes());
    }
}
