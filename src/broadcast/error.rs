//! Per-request failures of the broadcast engine.
//!
//! None of these are fatal: the engine logs them and, where a client is
//! at fault, answers that client with an ERROR frame whose payload is the
//! `Display` text below.

use thiserror::Error;

use crate::protocol::CodecError;

use super::group::{ControlOp, GroupId};

/// Broadcast request errors.
#[derive(Error, Debug)]
pub enum BroadcastError {
    /// CTRL from a client id that never subscribed.
    #[error("client not subscribed")]
    NotSubscribed(u16),

    /// CTRL payload empty or longer than opcode + 255 bytes.
    #[error("invalid CTRL message size: {0}")]
    InvalidControlSize(usize),

    /// Unknown CTRL opcode.
    #[error("invalid client control message: {0:#04x}")]
    UnknownOpcode(u8),

    /// GROUP_JOIN without a name.
    #[error("group name is empty")]
    EmptyGroupName,

    /// GROUP_LEAVE / QUERY_USER without a 4-byte group id.
    #[error("{0:?} request is missing its group id")]
    MissingGroupId(ControlOp),

    /// QUERY_USER for a group the requester has not joined.
    #[error("client {client} is not a member of group {group}")]
    NotMember {
        /// Requesting client.
        client: u16,
        /// Queried group.
        group: GroupId,
    },

    /// DATA payload shorter than its 4-byte group id.
    #[error("DATA payload too short: {0} bytes, expected at least 4")]
    DataTooShort(usize),

    /// A response could not be encoded (oversized field).
    #[error(transparent)]
    Codec(#[from] CodecError),
}
