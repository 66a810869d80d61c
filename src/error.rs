//! Error types for the fallible boundaries of this crate.

use core::fmt::{self, Display, Formatter};

/// An error decoding a [`Message`](crate::message::Message) from the wire, or reassembling one
/// from [`framing`](crate::message::framing).
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum DecodeError {
    /// The bytes did not decode to a structurally valid message, or a frame's length prefix was
    /// not a plain non-empty run of ASCII digits within the accepted limit.
    Malformed,
    /// The bytes decoded structurally but named no RPC method this crate recognizes — a protocol
    /// version mismatch or wire corruption, not a normal runtime condition.
    UnknownMethod,
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed message"),
            Self::UnknownMethod => write!(f, "message names an unknown RPC method"),
        }
    }
}

/// An error attempting to submit a new entry for replication.
#[derive(Debug)]
pub enum AppendError<E> {
    /// This node is not the leader of the current term. The caller should retry against the
    /// leader named by [`Node::leader`](crate::node::Node::leader), if known.
    NotLeader,
    /// The backing [`Log`](crate::log::Log) implementation returned an error appending the entry.
    LogErr(E),
}

impl<E: Display> Display for AppendError<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotLeader => write!(f, "not the leader of the current term"),
            Self::LogErr(err) => write!(f, "{}", err),
        }
    }
}
