//! Codec error taxonomy.

use std::io;

use thiserror::Error;

/// Errors raised while framing or unframing a [`super::Message`].
///
/// Transport failures (`Io`, `PeerClosed`) are fatal to the session that
/// owns the stream. The remaining variants are protocol failures: the bytes
/// arrived but do not form a valid frame or payload.
#[derive(Error, Debug)]
pub enum CodecError {
    /// Hard I/O error on the underlying stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] io::Error),

    /// The peer closed the stream (zero-byte read or write).
    #[error("endpoint closed the connection")]
    PeerClosed,

    /// The frame did not start with the begin marker.
    #[error("begin marker mismatch: got {found:#06x}, expected {expected:#06x}")]
    BadBeginMagic {
        /// Marker value read from the wire.
        found: u16,
        /// Marker value the protocol requires.
        expected: u16,
    },

    /// The payload was not followed by the end marker.
    #[error("end marker mismatch: got {found:#06x}, expected {expected:#06x}")]
    BadEndMagic {
        /// Marker value read from the wire.
        found: u16,
        /// Marker value the protocol requires.
        expected: u16,
    },

    /// Type byte outside `0..=7`.
    #[error("unknown message type: {0:#04x}")]
    UnknownType(u8),

    /// Declared or actual payload exceeds the accepted maximum.
    #[error("payload too large: {size} bytes exceeds maximum {max}")]
    PayloadTooLarge {
        /// Payload size in bytes.
        size: u64,
        /// Maximum accepted size in bytes.
        max: u64,
    },

    /// A length-bounded string field does not fit its slot.
    #[error("{field} too long: {len} bytes exceeds maximum {max}")]
    FieldTooLong {
        /// Which field overflowed (e.g. "user name").
        field: &'static str,
        /// Actual length in bytes.
        len: usize,
        /// Maximum allowed length in bytes.
        max: usize,
    },
}

impl CodecError {
    /// Returns `true` for malformed-data errors, `false` for transport errors.
    pub fn is_protocol(&self) -> bool {
        !matches!(self, Self::Io(_) | Self::PeerClosed)
    }
}
