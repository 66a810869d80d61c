//! Raft message types sent between nodes over the wire.
//!
//! The top-level type is [`Message`], matching the wire shape `{sender_id, recipient_id,
//! current_term, rpc}` — every RPC in the protocol is one `Message` value, with the `rpc` field
//! selecting which of the five methods it carries. Protobuf-based serialization of all types in
//! this module is provided through the `prost` crate if the corresponding feature is enabled.
//!
//! Decoding maps the wire method tag into this closed Rust enum; a structurally valid message
//! carrying no recognized method is a fatal [`DecodeError`](crate::error::DecodeError), not a
//! silently-skipped field, since it signals protocol corruption or version skew.

use alloc::vec::Vec;
use core::cmp::Ordering;
use core::fmt;
use core::ops::{Add, AddAssign, Sub};

use bytes::Bytes;

use crate::error::DecodeError;

pub mod framing;

/// A node's stable integer identifier in `[0, N)`.
pub type NodeId = usize;

/// A message sent between Raft nodes, self-contained for wire transmission.
#[derive(Clone, PartialEq)]
#[cfg_attr(feature = "prost", derive(prost::Message))]
#[cfg_attr(not(feature = "prost"), derive(Debug, Default))]
pub struct Message {
    /// The id of the node that sent this message.
    #[cfg_attr(feature = "prost", prost(uint64, required, tag = "1"))]
    pub sender_id: u64,

    /// The id of the node this message is addressed to.
    #[cfg_attr(feature = "prost", prost(uint64, required, tag = "2"))]
    pub recipient_id: u64,

    /// The greatest Raft leadership term ID seen by the sender.
    #[cfg_attr(feature = "prost", prost(message, required, tag = "3"))]
    pub current_term: TermId,

    /// The RPC method and arguments carried by this message.
    ///
    /// Only optional so that `prost` can represent a message still being built; a decoded
    /// [`Message`] with `rpc == None` is a [`DecodeError::UnknownMethod`].
    #[cfg_attr(feature = "prost", prost(oneof = "Rpc", tags = "4, 5, 6, 7, 8"))]
    pub rpc: Option<Rpc>,
}

/// The RPC method and arguments carried by a [`Message`].
#[derive(Clone, PartialEq)]
#[cfg_attr(feature = "prost", derive(prost::Oneof))]
#[cfg_attr(not(feature = "prost"), derive(Debug))]
pub enum Rpc {
    /// `request_vote`: candidate to peer.
    #[cfg_attr(feature = "prost", prost(message, tag = "4"))]
    RequestVote(RequestVote),

    /// `request_vote_response`: peer to candidate.
    #[cfg_attr(feature = "prost", prost(message, tag = "5"))]
    RequestVoteResponse(RequestVoteResponse),

    /// `follower_append_entries`: leader to peer.
    #[cfg_attr(feature = "prost", prost(message, tag = "6"))]
    FollowerAppendEntries(FollowerAppendEntries),

    /// `leader_append_entries_response`: peer to leader.
    #[cfg_attr(feature = "prost", prost(message, tag = "7"))]
    LeaderAppendEntriesResponse(LeaderAppendEntriesResponse),

    /// `reject_message`: peer to sender, carrying only the higher term that caused the rejection
    /// (already present in [`Message::current_term`]).
    #[cfg_attr(feature = "prost", prost(message, tag = "8"))]
    RejectMessage(RejectMessage),
}

/// `request_vote` arguments.
#[derive(Clone, PartialEq)]
#[cfg_attr(feature = "prost", derive(prost::Message))]
#[cfg_attr(not(feature = "prost"), derive(Debug, Default))]
pub struct RequestVote {
    /// Index of the last entry in the candidate's log.
    #[cfg_attr(feature = "prost", prost(message, required, tag = "1"))]
    pub last_log_index: LogIndex,

    /// Term of the last entry in the candidate's log.
    #[cfg_attr(feature = "prost", prost(message, required, tag = "2"))]
    pub last_log_term: TermId,
}

/// `request_vote_response` arguments.
#[derive(Clone, PartialEq)]
#[cfg_attr(feature = "prost", derive(prost::Message))]
#[cfg_attr(not(feature = "prost"), derive(Debug, Default))]
pub struct RequestVoteResponse {
    /// Whether the vote was granted.
    #[cfg_attr(feature = "prost", prost(bool, required, tag = "1"))]
    pub vote_granted: bool,
}

/// `follower_append_entries` arguments.
#[derive(Clone, PartialEq)]
#[cfg_attr(feature = "prost", derive(prost::Message))]
#[cfg_attr(not(feature = "prost"), derive(Debug, Default))]
pub struct FollowerAppendEntries {
    /// The log index immediately before the first entry in [`entries`](Self::entries).
    #[cfg_attr(feature = "prost", prost(message, required, tag = "1"))]
    pub prev_index: LogIndex,

    /// The term of the entry immediately before the first entry in [`entries`](Self::entries).
    #[cfg_attr(feature = "prost", prost(message, required, tag = "2"))]
    pub prev_term: TermId,

    /// Consecutive log entries to append, starting at `prev_index + 1`.
    #[cfg_attr(feature = "prost", prost(message, repeated, tag = "3"))]
    pub entries: Vec<LogEntry>,

    /// The highest log index the leader knows to be committed.
    #[cfg_attr(feature = "prost", prost(message, required, tag = "4"))]
    pub leader_commit_index: LogIndex,
}

/// `leader_append_entries_response` arguments.
#[derive(Clone, PartialEq)]
#[cfg_attr(feature = "prost", derive(prost::Message))]
#[cfg_attr(not(feature = "prost"), derive(Debug, Default))]
pub struct LeaderAppendEntriesResponse {
    /// The responder's resulting match index, or `None` if the consistency check failed.
    #[cfg_attr(feature = "prost", prost(message, optional, tag = "1"))]
    pub match_index: Option<LogIndex>,
}

/// `reject_message` arguments: deliberately empty.
#[derive(Clone, PartialEq)]
#[cfg_attr(feature = "prost", derive(prost::Message))]
#[cfg_attr(not(feature = "prost"), derive(Debug, Default))]
pub struct RejectMessage {}

/// An entry in the Raft log.
#[derive(Clone, PartialEq)]
#[cfg_attr(feature = "prost", derive(prost::Message))]
#[cfg_attr(not(feature = "prost"), derive(Debug, Default))]
pub struct LogEntry {
    /// The term of leadership during which this entry was appended.
    #[cfg_attr(feature = "prost", prost(message, required, tag = "1"))]
    pub term: TermId,

    /// Arbitrary application payload.
    #[cfg_attr(feature = "prost", prost(bytes = "vec", required, tag = "2"))]
    pub data: Bytes,
}

/// A monotonically-increasing Raft leadership term.
#[derive(Clone, PartialEq)]
#[cfg_attr(feature = "prost", derive(prost::Message))]
#[cfg_attr(not(feature = "prost"), derive(Debug, Default))]
pub struct TermId {
    /// The non-negative integer assigned to this term.
    #[cfg_attr(feature = "prost", prost(uint64, required, tag = "1"))]
    pub id: u64,
}

/// A 1-based index into the Raft log. `0` is the sentinel "before the log starts".
#[derive(Clone, PartialEq)]
#[cfg_attr(feature = "prost", derive(prost::Message))]
#[cfg_attr(not(feature = "prost"), derive(Debug, Default))]
pub struct LogIndex {
    /// The integer representing this log index.
    #[cfg_attr(feature = "prost", prost(uint64, required, tag = "1"))]
    pub id: u64,
}

impl Message {
    /// Encodes this message to its `prost`-based byte representation.
    #[cfg(feature = "prost")]
    pub fn encode(&self) -> Vec<u8> {
        use prost::Message as _;
        self.encode_to_vec()
    }

    /// Decodes a message previously produced by [`encode`](Self::encode).
    ///
    /// Returns [`DecodeError::Malformed`] if `bytes` doesn't decode at all, and
    /// [`DecodeError::UnknownMethod`] if it decodes structurally but carries no recognized RPC.
    #[cfg(feature = "prost")]
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        use prost::Message as _;
        let message = <Self as prost::Message>::decode(bytes).map_err(|_| DecodeError::Malformed)?;
        if message.rpc.is_none() {
            return Err(DecodeError::UnknownMethod);
        }
        Ok(message)
    }
}

//
// Message impls
//

impl fmt::Display for Message {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            sender_id,
            recipient_id,
            current_term,
            rpc,
        } = self;
        let mut debug = fmt.debug_tuple("");
        debug.field(&format_args!("{}->{}", sender_id, recipient_id));
        debug.field(&format_args!("{}", current_term));
        if let Some(rpc) = rpc {
            debug.field(&format_args!("{}", rpc));
        } else {
            debug.field(&"None");
        }
        debug.finish()
    }
}

//
// Rpc impls
//

impl fmt::Display for Rpc {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rpc::RequestVote(msg) => fmt::Display::fmt(msg, fmt),
            Rpc::RequestVoteResponse(msg) => fmt::Display::fmt(msg, fmt),
            Rpc::FollowerAppendEntries(msg) => fmt::Display::fmt(msg, fmt),
            Rpc::LeaderAppendEntriesResponse(msg) => fmt::Display::fmt(msg, fmt),
            Rpc::RejectMessage(msg) => fmt::Display::fmt(msg, fmt),
        }
    }
}

impl fmt::Display for RequestVote {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            last_log_index,
            last_log_term,
        } = self;
        fmt.debug_struct("RequestVote")
            .field("last_log_index", &format_args!("{}", last_log_index))
            .field("last_log_term", &format_args!("{}", last_log_term))
            .finish()
    }
}

impl fmt::Display for RequestVoteResponse {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self { vote_granted } = self;
        fmt.debug_struct("RequestVoteResponse")
            .field("vote_granted", vote_granted)
            .finish()
    }
}

impl fmt::Display for FollowerAppendEntries {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            prev_index,
            prev_term,
            entries,
            leader_commit_index,
        } = self;
        fmt.debug_struct("FollowerAppendEntries")
            .field("prev_index", &format_args!("{}", prev_index))
            .field("prev_term", &format_args!("{}", prev_term))
            .field(
                "leader_commit_index",
                &format_args!("{}", leader_commit_index),
            )
            .field("entries", &entries.len())
            .finish()
    }
}

impl fmt::Display for LeaderAppendEntriesResponse {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self { match_index } = self;
        match match_index {
            Some(match_index) => fmt
                .debug_struct("LeaderAppendEntriesResponse")
                .field("match_index", &format_args!("{}", match_index))
                .finish(),
            None => fmt
                .debug_struct("LeaderAppendEntriesResponse")
                .field("match_index", &"None")
                .finish(),
        }
    }
}

impl fmt::Display for RejectMessage {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.debug_struct("RejectMessage").finish()
    }
}

//
// TermId impls
//

impl fmt::Display for TermId {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self { id } = self;
        fmt.debug_tuple("TermId").field(id).finish()
    }
}

impl Copy for TermId {}

impl Eq for TermId {}

impl PartialOrd for TermId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TermId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl AddAssign<u64> for TermId {
    fn add_assign(&mut self, rhs: u64) {
        self.id = self
            .id
            .checked_add(rhs)
            .unwrap_or_else(|| panic!("term overflow"));
    }
}

//
// LogIndex impls
//

impl LogIndex {
    /// Subtraction with a non-negative integer, checking for overflow. Returns `self - dec`, or
    /// `None` if an overflow occurred.
    pub fn checked_sub(self, dec: u64) -> Option<Self> {
        self.id.checked_sub(dec).map(|id| Self { id })
    }
}

impl fmt::Display for LogIndex {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self { id } = self;
        fmt.debug_tuple("LogIndex").field(id).finish()
    }
}

impl Copy for LogIndex {}

impl Eq for LogIndex {}

impl PartialOrd for LogIndex {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LogIndex {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl Add<u64> for LogIndex {
    type Output = Self;
    fn add(self, inc: u64) -> Self {
        Self {
            id: self
                .id
                .checked_add(inc)
                .unwrap_or_else(|| panic!("index overflow")),
        }
    }
}

impl Sub<u64> for LogIndex {
    type Output = Self;
    fn sub(self, dec: u64) -> Self {
        Self {
            id: self.id.saturating_sub(dec),
        }
    }
}
