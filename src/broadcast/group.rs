//! Group identifiers and CTRL payload layouts.
//!
//! CTRL payload layouts (group ids big-endian):
//!
//! ```text
//! request   GROUP_JOIN   [0x0A][group name]
//!           GROUP_LEAVE  [0x0B][u32 group_id]
//!           QUERY_USER   [0x0C][u32 group_id]
//!           QUERY_GROUP  [0x0D]
//!
//! notify    GROUP_JOIN   [0x0A][u8 len][user name][u32 group_id][group name]
//!           GROUP_LEAVE  [0x0B][u8 len][user name][u32 group_id]
//!
//! reply     QUERY_USER   [0x0C][u32 group_id][member name]      (one per member)
//!           QUERY_GROUP  [0x0D][u32 group_id][group name]       (one per group)
//! ```

use std::fmt;

use crate::constants::MAX_NAME_LEN;
use crate::protocol::CodecError;

use super::error::BroadcastError;

/// 32-bit group identifier derived from the group name.
///
/// The hash is one-way and not collision free; two names with the same
/// hash address the same group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupId(pub u32);

impl GroupId {
    /// Hash a group name: `h = byte + 31 * h` with bytes widened as signed
    /// chars, wrapping at 32 bits. Names are raw bytes, in any encoding.
    pub fn from_name(name: &[u8]) -> Self {
        let hash = name
            .iter()
            .fold(0u32, |h, &b| (b as i8 as u32).wrapping_add(h.wrapping_mul(31)));
        Self(hash)
    }

    /// Read a big-endian id from the first four bytes of `bytes`.
    pub fn read_be(bytes: &[u8]) -> Option<Self> {
        let raw: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
        Some(Self(u32::from_be_bytes(raw)))
    }

    /// Big-endian wire bytes.
    pub fn to_be_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// CTRL opcode, carried in the first payload byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ControlOp {
    /// Join a group by name.
    GroupJoin = 0x0A,
    /// Leave a group by id.
    GroupLeave = 0x0B,
    /// List the members of a group.
    QueryUser = 0x0C,
    /// List the caller's own groups.
    QueryGroup = 0x0D,
}

impl TryFrom<u8> for ControlOp {
    type Error = BroadcastError;

    fn try_from(value: u8) -> Result<Self, BroadcastError> {
        Ok(match value {
            0x0A => Self::GroupJoin,
            0x0B => Self::GroupLeave,
            0x0C => Self::QueryUser,
            0x0D => Self::QueryGroup,
            other => return Err(BroadcastError::UnknownOpcode(other)),
        })
    }
}

/// Parsed CTRL request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlRequest {
    /// `[0x0A][group name]`
    Join {
        /// Group name bytes as sent.
        name: Vec<u8>,
    },
    /// `[0x0B][u32 group_id]`
    Leave(GroupId),
    /// `[0x0C][u32 group_id]`
    QueryUser(GroupId),
    /// `[0x0D]`
    QueryGroup,
}

impl ControlRequest {
    /// Parse a CTRL payload.
    pub fn parse(payload: &[u8]) -> Result<Self, BroadcastError> {
        let (&op, arg) = payload
            .split_first()
            .filter(|_| payload.len() <= 1 + MAX_NAME_LEN)
            .ok_or(BroadcastError::InvalidControlSize(payload.len()))?;

        let group_arg = |op| GroupId::read_be(arg).ok_or(BroadcastError::MissingGroupId(op));
        match ControlOp::try_from(op)? {
            ControlOp::GroupJoin => {
                if arg.is_empty() {
                    return Err(BroadcastError::EmptyGroupName);
                }
                Ok(Self::Join { name: arg.to_vec() })
            }
            ControlOp::GroupLeave => Ok(Self::Leave(group_arg(ControlOp::GroupLeave)?)),
            ControlOp::QueryUser => Ok(Self::QueryUser(group_arg(ControlOp::QueryUser)?)),
            ControlOp::QueryGroup => Ok(Self::QueryGroup),
        }
    }
}

/// Bounds-checked CTRL payload builder.
///
/// Every variable-length field is checked against its slot before it is
/// copied; an oversized field is an error, never a truncation.
#[derive(Debug)]
pub struct ControlPayload {
    buf: Vec<u8>,
}

impl ControlPayload {
    /// Largest payload any builder produces:
    /// opcode, length byte, user name, group id, group name.
    pub const MAX_LEN: usize = 1 + 1 + MAX_NAME_LEN + 4 + MAX_NAME_LEN;

    /// Start a payload with `op`.
    pub fn new(op: ControlOp) -> Self {
        let mut buf = Vec::with_capacity(64);
        buf.push(op as u8);
        Self { buf }
    }

    fn reserve(
        &self,
        field: &'static str,
        len: usize,
        max: usize,
        overhead: usize,
    ) -> Result<(), CodecError> {
        if len > max || self.buf.len() + overhead + len > Self::MAX_LEN {
            return Err(CodecError::FieldTooLong { field, len, max });
        }
        Ok(())
    }

    /// Append `[u8 len][name]`.
    pub fn name(mut self, field: &'static str, name: &[u8]) -> Result<Self, CodecError> {
        self.reserve(field, name.len(), MAX_NAME_LEN, 1)?;
        self.buf.push(name.len() as u8);
        self.buf.extend_from_slice(name);
        Ok(self)
    }

    /// Append a big-endian group id.
    pub fn group(mut self, id: GroupId) -> Self {
        self.buf.extend_from_slice(&id.to_be_bytes());
        self
    }

    /// Append unprefixed trailing bytes.
    pub fn tail(mut self, field: &'static str, text: &[u8]) -> Result<Self, CodecError> {
        self.reserve(field, text.len(), MAX_NAME_LEN, 0)?;
        self.buf.extend_from_slice(text);
        Ok(self)
    }

    /// Finished payload bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// `[0x0A][len][user][gid][group name]`
pub fn join_notification(user: &[u8], id: GroupId, group: &[u8]) -> Result<Vec<u8>, CodecError> {
    Ok(ControlPayload::new(ControlOp::GroupJoin)
        .name("user name", user)?
        .group(id)
        .tail("group name", group)?
        .into_bytes())
}

/// `[0x0B][len][user][gid]`
pub fn leave_notification(user: &[u8], id: GroupId) -> Result<Vec<u8>, CodecError> {
    Ok(ControlPayload::new(ControlOp::GroupLeave).name("user name", user)?.group(id).into_bytes())
}

/// `[0x0C][gid][member]`
pub fn query_user_reply(id: GroupId, member: &[u8]) -> Result<Vec<u8>, CodecError> {
    Ok(ControlPayload::new(ControlOp::QueryUser).group(id).tail("user name", member)?.into_bytes())
}

/// `[0x0D][gid][group name]`
pub fn query_group_reply(id: GroupId, group: &[u8]) -> Result<Vec<u8>, CodecError> {
    Ok(ControlPayload::new(ControlOp::QueryGroup).group(id).tail("group name", group)?.into_bytes())
}
