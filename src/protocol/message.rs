//! Message envelope and type codes.

use std::fmt;

use super::codec::{read_message, write_message};
use super::error::CodecError;

/// Type byte of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Request accepted.
    Ok = 0x0,
    /// Request rejected; payload carries the reason.
    Error = 0x1,
    /// Client joined the channel.
    Subscribe = 0x2,
    /// Client left the channel.
    Unsubscribe = 0x3,
    /// Channel open request.
    Open = 0x4,
    /// Channel close request.
    Close = 0x5,
    /// Application data.
    Data = 0x6,
    /// Service-specific control.
    Ctrl = 0x7,
}

impl MessageType {
    /// Wire value of this type.
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for MessageType {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, CodecError> {
        Ok(match value {
            0x0 => Self::Ok,
            0x1 => Self::Error,
            0x2 => Self::Subscribe,
            0x3 => Self::Unsubscribe,
            0x4 => Self::Open,
            0x5 => Self::Close,
            0x6 => Self::Data,
            0x7 => Self::Ctrl,
            other => return Err(CodecError::UnknownType(other)),
        })
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ok => "OK",
            Self::Error => "ERROR",
            Self::Subscribe => "SUBSCRIBE",
            Self::Unsubscribe => "UNSUBSCRIBE",
            Self::Open => "OPEN",
            Self::Close => "CLOSE",
            Self::Data => "DATA",
            Self::Ctrl => "CTRL",
        };
        f.write_str(name)
    }
}

/// One frame exchanged with the relay.
///
/// The payload is always present; a frame with `size == 0` carries an empty
/// vector, never an absent one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Frame type.
    pub kind: MessageType,
    /// Channel the frame belongs to (assigned by the relay).
    pub channel_id: u16,
    /// Client the frame is from or addressed to.
    pub client_id: u16,
    /// Frame body.
    pub payload: Vec<u8>,
}

impl Message {
    /// Create a message from its parts.
    pub fn new(kind: MessageType, channel_id: u16, client_id: u16, payload: Vec<u8>) -> Self {
        Self { kind, channel_id, client_id, payload }
    }

    /// Create a message with an empty payload.
    pub fn empty(kind: MessageType, channel_id: u16, client_id: u16) -> Self {
        Self::new(kind, channel_id, client_id, Vec::new())
    }

    /// ERROR frame carrying `reason` as UTF-8 text.
    pub fn error(channel_id: u16, client_id: u16, reason: &str) -> Self {
        Self::new(MessageType::Error, channel_id, client_id, reason.as_bytes().to_vec())
    }

    /// Same frame addressed to a different client.
    pub fn readdressed(&self, client_id: u16) -> Self {
        Self { client_id, ..self.clone() }
    }

    /// Encode into wire bytes.
    ///
    /// Fails only if the payload exceeds the accepted maximum.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let mut buf = Vec::new();
        write_message(&mut buf, self)?;
        Ok(buf)
    }

    /// Decode one frame from the start of `bytes`.
    ///
    /// Trailing bytes after the end marker are ignored.
    pub fn decode(mut bytes: &[u8]) -> Result<Self, CodecError> {
        read_message(&mut bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_codes_match_wire_values() {
        for value in 0u8..=7 {
            let kind = MessageType::try_from(value).unwrap();
            assert_eq!(kind.as_u8(), value);
        }
        assert!(matches!(MessageType::try_from(8), Err(CodecError::UnknownType(8))));
        assert!(matches!(MessageType::try_from(0xFF), Err(CodecError::UnknownType(0xFF))));
    }

    #[test]
    fn error_carries_reason_text() {
        let msg = Message::error(3, 9, "client not subscribed");
        assert_eq!(msg.kind, MessageType::Error);
        assert_eq!(msg.client_id, 9);
        assert_eq!(msg.payload, b"client not subscribed");
    }

    #[test]
    fn readdressed_keeps_everything_but_client() {
        let msg = Message::new(MessageType::Data, 2, 10, b"hi".to_vec());
        let copy = msg.readdressed(11);
        assert_eq!(copy.client_id, 11);
        assert_eq!(copy.channel_id, 2);
        assert_eq!(copy.payload, b"hi");
    }

    #[test]
    fn decode_ignores_trailing_bytes() {
        let msg = Message::empty(MessageType::Close, 1, 0);
        let mut wire = msg.encode().unwrap();
        wire.extend_from_slice(b"garbage");
        assert_eq!(Message::decode(&wire).unwrap(), msg);
    }
}
