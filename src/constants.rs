//! Wire constants and limits shared by every channel service.
//!
//! This module centralizes the magic numbers of the hotline protocol so the
//! codec, the session handshake and the services agree on them.
//!
//! # Categories
//!
//! - **Framing**: begin/end markers and payload cap
//! - **Names**: channel, client and group name limits
//! - **Polling**: readiness wait interval of the service loop

use std::time::Duration;

// ============================================================================
// Framing
// ============================================================================

/// Marker that opens every frame (`"TD"`).
pub const MAGIC_BEGIN: u16 = 0x5444;

/// Marker that closes every frame (`"NA"`).
pub const MAGIC_END: u16 = 0x4E41;

/// Size of the fixed part of a frame that precedes the payload.
///
/// `begin_magic:u16 type:u8 channel_id:u16 client_id:u16 size:u32`
pub const HEADER_LEN: usize = 2 + 1 + 2 + 2 + 4;

/// Size of the trailer that follows the payload (`end_magic:u16`).
pub const TRAILER_LEN: usize = 2;

/// Maximum accepted payload size (16 MB).
///
/// A declared size above this is rejected before any allocation so a
/// corrupted size field cannot exhaust memory.
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

// ============================================================================
// Names
// ============================================================================

/// Maximum channel name length in bytes (OPEN payload).
pub const MAX_CHANNEL_NAME: usize = 64;

/// Maximum client or group name length in bytes.
///
/// Names travel behind a one-byte length prefix, so 255 is also the wire
/// ceiling.
pub const MAX_NAME_LEN: usize = 255;

/// Maximum Unix socket path length (`sun_path` minus the terminating NUL).
pub const MAX_SOCKET_PATH: usize = 107;

// ============================================================================
// Polling
// ============================================================================

/// Default readiness wait of the service loop.
///
/// The loop wakes at least this often to observe the shutdown flag set by
/// the signal handler.
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Receive buffer for datagram sources (syslog relay).
pub const DATAGRAM_BUFFER_LEN: usize = 4096;
