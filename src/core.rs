//! Unstable, low-level API for the complete state of a Raft node.
//!
//! [`State::process_event`] is the single entry point driving the state machine: every clock
//! tick and every received message is an [`Event`], and every event produces a
//! [`ProcessedEvent`] bundling the messages to send and any log entries newly committed as a
//! result.

use alloc::vec::Vec;
use core::fmt;

use bytes::Bytes;
use log::info;
use rand_core::RngCore;

use crate::applier::CommittedBatch;
use crate::error::AppendError;
use crate::log::{append_entries, Log, LogState};
use crate::message::*;
use crate::node::Config;

use self::Role::*;

/// An occurrence that advances a [`State`] machine.
pub enum Event {
    /// The node's internal clock has advanced by one tick.
    ClockTick,
    /// A [`Message`] was received from a peer.
    Message(Message),
}

/// The result of processing one [`Event`].
pub struct ProcessedEvent {
    /// Messages to be delivered to their respective [`recipient_id`](Message::recipient_id)s.
    pub outgoing: Vec<Message>,
    /// A batch of log entries newly committed as a result of this event, if any.
    pub committed: Option<CommittedBatch>,
}

/// The outcome of a successful [`State::submit`].
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Submitted {
    /// The term during which the entry was appended.
    pub term: TermId,
    /// The log index at which the entry was appended.
    pub index: LogIndex,
}

/// A countdown to the next election, redrawn uniformly within [`Config`]'s configured range
/// whenever it is reset.
struct ElectionTimer {
    timeout_ticks: u32,
    ticks_since_reset: u32,
}

impl ElectionTimer {
    fn fresh(config: &Config, random: &mut impl RngCore) -> Self {
        Self {
            timeout_ticks: random_election_timeout(random, config),
            ticks_since_reset: 0,
        }
    }

    /// Advances by one tick, returning whether the timeout has elapsed.
    fn tick(&mut self) -> bool {
        self.ticks_since_reset += 1;
        self.ticks_since_reset >= self.timeout_ticks
    }
}

enum Role {
    Follower(FollowerState),
    Candidate(CandidateState),
    Leader(LeaderState),
}

struct FollowerState {
    leader: Option<NodeId>,
    timer: ElectionTimer,
}

struct CandidateState {
    /// `votes[id]` is `true` once node `id` has granted this candidate its vote this election.
    votes: Vec<bool>,
    timer: ElectionTimer,
}

struct LeaderState {
    /// The next log index to send to each peer, indexed by `NodeId`.
    next_index: Vec<LogIndex>,
    /// The highest log index known to match between this node and each peer, indexed by
    /// `NodeId`. This node's own slot is kept equal to `log.last_index()`.
    match_index: Vec<LogIndex>,
    heartbeat_ticks_since_last: u32,
}

/// The complete state of a Raft node.
pub struct State<L, R> {
    node_id: NodeId,
    peer_count: usize,
    config: Config,
    random: R,

    current_term: TermId,
    voted_for: Option<NodeId>,
    role: Role,

    log: LogState<L>,
}

impl<L: Log, R: RngCore> State<L, R> {
    /// Constructs a new Raft node state with `peer_count` total nodes in the group (including
    /// this one), addressed `0..peer_count`, starting as a follower.
    pub fn new(node_id: NodeId, peer_count: usize, log: L, mut random: R, config: Config) -> Self {
        let timer = ElectionTimer::fresh(&config, &mut random);
        Self {
            node_id,
            peer_count,
            config,
            random,
            current_term: TermId::default(),
            voted_for: None,
            role: Follower(FollowerState {
                leader: None,
                timer,
            }),
            log: LogState::new(log),
        }
    }

    /// Returns this node's ID.
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Returns the total number of nodes in the group, including this one.
    pub fn peer_count(&self) -> usize {
        self.peer_count
    }

    /// Returns whether this node believes itself to be the leader of the current term.
    pub fn is_leader(&self) -> bool {
        matches!(self.role, Leader(_))
    }

    /// Returns the ID of the leader of the current term, if known, along with the term.
    pub fn leader(&self) -> (Option<NodeId>, TermId) {
        let leader = match &self.role {
            Follower(follower) => follower.leader,
            Candidate(_) => None,
            Leader(_) => Some(self.node_id),
        };
        (leader, self.current_term)
    }

    /// Returns the index of the highest log entry known to be committed.
    pub fn commit_index(&self) -> LogIndex {
        self.log.commit_idx
    }

    /// Returns this node's configurable parameters.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns a reference to the backing log storage.
    pub fn log(&self) -> &L {
        self.log.log()
    }

    /// Returns a mutable reference to the backing log storage.
    pub fn log_mut(&mut self) -> &mut L {
        self.log.log_mut()
    }

    /// Processes one [`Event`], returning outgoing messages and any newly committed batch.
    pub fn process_event(&mut self, event: Event) -> ProcessedEvent {
        let commit_before = self.log.commit_idx;
        let outgoing = match event {
            Event::ClockTick => self.on_clock_tick(),
            Event::Message(message) => self.on_message(message),
        };
        let committed = self.collect_committed_since(commit_before);
        ProcessedEvent { outgoing, committed }
    }

    /// Requests appending `data` to the distributed log, returning the resulting term and index
    /// on success.
    ///
    /// # Errors
    ///
    /// Returns [`AppendError::NotLeader`] if this node is not currently the leader.
    pub fn submit(&mut self, data: Bytes) -> Result<Submitted, AppendError<L::Error>> {
        self.append_entry(data)
    }

    //
    // event dispatch
    //

    fn on_clock_tick(&mut self) -> Vec<Message> {
        let mut fire_heartbeat = false;
        let mut election_timed_out = false;
        match &mut self.role {
            Leader(leader) => {
                leader.heartbeat_ticks_since_last += 1;
                if leader.heartbeat_ticks_since_last >= self.config.heartbeat_interval_ticks {
                    leader.heartbeat_ticks_since_last = 0;
                    fire_heartbeat = true;
                }
            }
            Follower(FollowerState { timer, .. }) | Candidate(CandidateState { timer, .. }) => {
                election_timed_out = timer.tick();
            }
        }
        if fire_heartbeat {
            self.broadcast_append_entries()
        } else if election_timed_out {
            info!("election timeout at {}", self.current_term);
            self.start_election()
        } else {
            Vec::new()
        }
    }

    fn on_message(&mut self, message: Message) -> Vec<Message> {
        let from = message.sender_id as usize;
        if from >= self.peer_count || from == self.node_id {
            return Vec::new();
        }

        // Guard 1: a stale message is rejected without touching local state.
        if message.current_term < self.current_term {
            return alloc::vec![self.reject_message(from)];
        }

        // Guard 2: any message bearing a newer term demotes this node to follower first, before
        // the term is overwritten, so the demotion sees the term this node is demoted *from*.
        if message.current_term > self.current_term {
            info!(
                "became follower at {} (from {}) due to message from {}",
                message.current_term, self.current_term, from
            );
            self.become_follower(None);
            self.current_term = message.current_term;
            self.voted_for = None;
            if let Follower(follower) = &mut self.role {
                follower.timer = ElectionTimer::fresh(&self.config, &mut self.random);
            }
        }

        match message.rpc {
            Some(Rpc::RequestVote(args)) => alloc::vec![self.handle_request_vote(from, args)],
            Some(Rpc::RequestVoteResponse(args)) => self.handle_request_vote_response(from, args),
            Some(Rpc::FollowerAppendEntries(args)) => {
                alloc::vec![self.handle_follower_append_entries(from, args)]
            }
            Some(Rpc::LeaderAppendEntriesResponse(args)) => {
                self.handle_leader_append_entries_response(from, args)
            }
            Some(Rpc::RejectMessage(_)) => Vec::new(),
            None => Vec::new(),
        }
    }

    //
    // role transitions
    //

    fn become_follower(&mut self, leader: Option<NodeId>) {
        let timer = match &self.role {
            Follower(f) => ElectionTimer {
                timeout_ticks: f.timer.timeout_ticks,
                ticks_since_reset: f.timer.ticks_since_reset,
            },
            Candidate(c) => ElectionTimer {
                timeout_ticks: c.timer.timeout_ticks,
                ticks_since_reset: c.timer.ticks_since_reset,
            },
            Leader(_) => ElectionTimer::fresh(&self.config, &mut self.random),
        };
        self.role = Follower(FollowerState { leader, timer });
    }

    fn start_election(&mut self) -> Vec<Message> {
        self.current_term += 1;
        self.voted_for = Some(self.node_id);
        let mut votes = alloc::vec![false; self.peer_count];
        votes[self.node_id] = true;
        self.role = Candidate(CandidateState {
            votes,
            timer: ElectionTimer::fresh(&self.config, &mut self.random),
        });
        info!("became candidate at {}", self.current_term);

        let outgoing = self.try_become_leader();
        if matches!(self.role, Leader(_)) {
            return outgoing;
        }
        self.peers()
            .map(|peer| self.request_vote_message(peer))
            .collect()
    }

    /// Transitions from candidate to leader if a quorum of votes has been granted. Returns the
    /// immediate post-election heartbeat broadcast if so, or an empty list otherwise.
    fn try_become_leader(&mut self) -> Vec<Message> {
        let granted = match &self.role {
            Candidate(candidate) => candidate.votes.iter().filter(|&&v| v).count(),
            _ => return Vec::new(),
        };
        if granted < self.quorum_size() {
            return Vec::new();
        }

        let next = self.log.last_index() + 1;
        let mut match_index = alloc::vec![LogIndex::default(); self.peer_count];
        match_index[self.node_id] = self.log.last_index();
        self.role = Leader(LeaderState {
            next_index: alloc::vec![next; self.peer_count],
            match_index,
            heartbeat_ticks_since_last: 0,
        });
        info!("became leader at {}", self.current_term);
        self.broadcast_append_entries()
    }

    //
    // message handlers
    //

    fn handle_request_vote(&mut self, from: NodeId, args: RequestVote) -> Message {
        let last_index = self.log.last_index();
        let last_term = self.log.last_term();
        let log_ok = args.last_log_term > last_term
            || (args.last_log_term == last_term && args.last_log_index >= last_index);
        let grant = log_ok && self.voted_for.map_or(true, |voted_for| voted_for == from);

        if grant {
            self.voted_for = Some(from);
            let new_timeout = random_election_timeout(&mut self.random, &self.config);
            if let Follower(follower) = &mut self.role {
                follower.timer.timeout_ticks = new_timeout;
                follower.timer.ticks_since_reset = 0;
            }
            info!("granted vote at {} to {}", self.current_term, from);
        } else {
            info!("denied vote at {} to {}", self.current_term, from);
        }

        Message {
            sender_id: self.node_id as u64,
            recipient_id: from as u64,
            current_term: self.current_term,
            rpc: Some(Rpc::RequestVoteResponse(RequestVoteResponse {
                vote_granted: grant,
            })),
        }
    }

    fn handle_request_vote_response(&mut self, from: NodeId, args: RequestVoteResponse) -> Vec<Message> {
        match &mut self.role {
            Candidate(candidate) if args.vote_granted => candidate.votes[from] = true,
            _ => return Vec::new(),
        }
        self.try_become_leader()
    }

    fn handle_follower_append_entries(&mut self, from: NodeId, args: FollowerAppendEntries) -> Message {
        assert!(
            !matches!(self.role, Leader(_)),
            "received append entries as leader at {} from {}",
            self.current_term,
            from
        );

        // A candidate observing AppendEntries from a legitimate leader of its own term steps
        // down (Raft figure 2, Rules for Servers: Candidates).
        if matches!(self.role, Candidate(_)) {
            self.become_follower(Some(from));
        }
        if let Follower(follower) = &mut self.role {
            follower.leader = Some(from);
            follower.timer.ticks_since_reset = 0;
        }

        let ok = append_entries(self.log.log_mut(), args.prev_index, args.prev_term, &args.entries);
        let match_index = if ok {
            let match_index = args.prev_index + (args.entries.len() as u64);
            let new_commit = args.leader_commit_index.min(match_index);
            self.log.commit_idx = self.log.commit_idx.max(new_commit);
            Some(match_index)
        } else {
            None
        };

        Message {
            sender_id: self.node_id as u64,
            recipient_id: from as u64,
            current_term: self.current_term,
            rpc: Some(Rpc::LeaderAppendEntriesResponse(LeaderAppendEntriesResponse {
                match_index,
            })),
        }
    }

    /// Updates replication progress for `from` from its response to an earlier AppendEntries. On
    /// rejection, decrements `next_index[from]` (floor at 1) and immediately resends AppendEntries
    /// to `from` with the earlier prefix, rather than waiting for the next heartbeat tick.
    fn handle_leader_append_entries_response(
        &mut self,
        from: NodeId,
        args: LeaderAppendEntriesResponse,
    ) -> Vec<Message> {
        let mut retry = false;
        match &mut self.role {
            Leader(leader) => match args.match_index {
                Some(match_index) => {
                    if match_index + 1 > leader.next_index[from] {
                        leader.next_index[from] = match_index + 1;
                    }
                    if match_index > leader.match_index[from] {
                        leader.match_index[from] = match_index;
                    }
                }
                None => {
                    leader.next_index[from] = (leader.next_index[from] - 1).max(LogIndex { id: 1 });
                    retry = true;
                }
            },
            _ => return Vec::new(),
        }
        self.advance_commit_idx();
        if retry {
            alloc::vec![self.append_entries_message(from)]
        } else {
            Vec::new()
        }
    }

    //
    // replication
    //

    fn append_entry(&mut self, data: Bytes) -> Result<Submitted, AppendError<L::Error>> {
        if !matches!(self.role, Leader(_)) {
            return Err(AppendError::NotLeader);
        }
        let entry = LogEntry {
            term: self.current_term,
            data,
        };
        self.log.append(entry).map_err(AppendError::LogErr)?;
        if let Leader(leader) = &mut self.role {
            leader.match_index[self.node_id] = self.log.last_index();
        }
        self.advance_commit_idx();
        Ok(Submitted {
            term: self.current_term,
            index: self.log.last_index(),
        })
    }

    fn broadcast_append_entries(&mut self) -> Vec<Message> {
        let peers: Vec<NodeId> = self.peers().collect();
        peers
            .into_iter()
            .map(|peer| self.append_entries_message(peer))
            .collect()
    }

    fn append_entries_message(&mut self, to: NodeId) -> Message {
        let next_index = match &self.role {
            Leader(leader) => leader.next_index[to],
            _ => unreachable!("append_entries_message called while not leader"),
        };
        let prev_index = next_index - 1;
        let prev_term = if prev_index == LogIndex::default() {
            TermId::default()
        } else {
            self.log.get_term(prev_index).unwrap_or_default()
        };

        let last_index = self.log.last_index();
        let mut entries = Vec::new();
        let mut idx = next_index;
        while idx <= last_index {
            if let Some(entry) = self.log.get(idx) {
                entries.push(entry);
            }
            idx = idx + 1;
        }

        Message {
            sender_id: self.node_id as u64,
            recipient_id: to as u64,
            current_term: self.current_term,
            rpc: Some(Rpc::FollowerAppendEntries(FollowerAppendEntries {
                prev_index,
                prev_term,
                entries,
                leader_commit_index: self.log.commit_idx,
            })),
        }
    }

    /// Advances `commit_index` to the highest index replicated to a quorum of the group,
    /// restricted to entries from the current term (Raft figure 8 safety).
    fn advance_commit_idx(&mut self) {
        let leader = match &self.role {
            Leader(leader) => leader,
            _ => return,
        };
        let mut matches: Vec<LogIndex> = leader.match_index.clone();
        matches.sort_unstable_by(|a, b| b.cmp(a));
        let majority_match = matches[self.peer_count / 2];
        if majority_match > self.log.commit_idx
            && self.log.get_term(majority_match) == Some(self.current_term)
        {
            self.log.commit_idx = majority_match;
        }
    }

    fn collect_committed_since(&mut self, commit_before: LogIndex) -> Option<CommittedBatch> {
        if self.log.commit_idx <= commit_before {
            return None;
        }
        let first_index = commit_before + 1;
        let mut entries = Vec::new();
        let mut idx = first_index;
        while idx <= self.log.commit_idx {
            if let Some(entry) = self.log.get(idx) {
                entries.push(entry);
            }
            idx = idx + 1;
        }
        Some(CommittedBatch { first_index, entries })
    }

    //
    // helpers
    //

    fn peers(&self) -> impl Iterator<Item = NodeId> + '_ {
        let node_id = self.node_id;
        (0..self.peer_count).filter(move |&id| id != node_id)
    }

    fn quorum_size(&self) -> usize {
        quorum_size(self.peer_count)
    }

    fn request_vote_message(&self, to: NodeId) -> Message {
        Message {
            sender_id: self.node_id as u64,
            recipient_id: to as u64,
            current_term: self.current_term,
            rpc: Some(Rpc::RequestVote(RequestVote {
                last_log_index: self.log.last_index(),
                last_log_term: self.log.last_term(),
            })),
        }
    }

    fn reject_message(&self, to: NodeId) -> Message {
        Message {
            sender_id: self.node_id as u64,
            recipient_id: to as u64,
            current_term: self.current_term,
            rpc: Some(Rpc::RejectMessage(RejectMessage {})),
        }
    }
}

impl<L, R> fmt::Debug for State<L, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("node_id", &self.node_id)
            .field("current_term", &self.current_term)
            .finish()
    }
}

/// Computes the minimum number of nodes out of a group of `total_nodes` necessary to constitute a
/// quorum.
pub fn quorum_size(total_nodes: usize) -> usize {
    total_nodes / 2 + 1
}

fn random_election_timeout(random: &mut impl RngCore, config: &Config) -> u32 {
    let span = config
        .election_timeout_high_ticks
        .saturating_sub(config.election_timeout_low_ticks);
    let offset = if span == 0 {
        0
    } else {
        random.next_u32() % (span + 1)
    };
    config.election_timeout_low_ticks.saturating_add(offset)
}
