//! Hotline wire protocol: one frame envelope shared by every channel service.
//!
//! Wire format (all integers big-endian):
//!
//! ```text
//! [u16: 0x5444] [u8: type] [u16: channel_id] [u16: client_id] [u32: size]
//! [payload: size bytes] [u16: 0x4E41]
//! ```
//!
//! Frame types:
//! - `0x0` `Ok`          - relay confirms a request (channel open)
//! - `0x1` `Error`       - UTF-8 reason in the payload
//! - `0x2` `Subscribe`   - a client joined the channel; payload is its name
//! - `0x3` `Unsubscribe` - a client left; the service echoes it as an ack
//! - `0x4` `Open`        - service asks the relay for a channel; payload is the name
//! - `0x5` `Close`       - service releases its channel
//! - `0x6` `Data`        - opaque application bytes
//! - `0x7` `Ctrl`        - service-specific control message
//!
//! Reads and writes never expose short transfers: both sides loop until the
//! whole field has moved, and a zero-byte transfer means the peer is gone.
//!
//! Rust guideline compliant 2025-01

pub mod codec;
pub mod error;
pub mod message;

pub use codec::{read_message, write_message};
pub use error::CodecError;
pub use message::{Message, MessageType};
