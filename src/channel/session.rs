//! Channel session: the open/confirm/close handshake with the relay.
//!
//! ```text
//! Disconnected ──connect + OPEN(name)──► Opening ──OK──► Open
//!                                           │
//!                                           └─ERROR / other──► Closed (fatal)
//!
//! Open ──close()──► Closing ──CLOSE, one best-effort read──► Closed
//! ```
//!
//! Channel creation is never retried: a rejected OPEN is returned to the
//! caller, which is expected to terminate.

use std::io::{self, Read, Write};
use std::os::unix::io::{AsRawFd, RawFd};
use std::time::Duration;

use thiserror::Error;

use crate::constants::MAX_CHANNEL_NAME;
use crate::protocol::{read_message, write_message, CodecError, Message, MessageType};

use super::endpoint::{Endpoint, EndpointError};
use super::poll::wait_readable;
use super::transport::Transport;

/// How long `close()` waits for the relay to answer CLOSE.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Lifecycle state of a [`ChannelSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No transport yet.
    Disconnected,
    /// OPEN sent, waiting for the relay's answer.
    Opening,
    /// Channel confirmed; frames may flow.
    Open,
    /// CLOSE being sent.
    Closing,
    /// Transport released or channel refused.
    Closed,
}

/// Session-level failures.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The endpoint string could not be parsed.
    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    /// The transport could not be established.
    #[error("unable to connect to {endpoint}: {source}")]
    Connect {
        /// Endpoint that was dialed.
        endpoint: String,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },

    /// Channel names must be 1..=64 bytes.
    #[error("invalid channel name length {len} (must be 1..={max})")]
    InvalidChannelName {
        /// Length of the rejected name.
        len: usize,
        /// Maximum length in bytes.
        max: usize,
    },

    /// The relay answered OPEN with something other than OK.
    #[error("channel {channel} is not created: relay responded with {kind} ({reason})")]
    Rejected {
        /// Requested channel name.
        channel: String,
        /// Type of the relay's answer.
        kind: MessageType,
        /// Payload of the answer, lossily decoded.
        reason: String,
    },

    /// Frame I/O attempted outside the `Open` state.
    #[error("channel session is {0:?}, not open")]
    NotOpen(SessionState),

    /// Framing or transport failure.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// One channel opened against the relay.
///
/// Generic over the stream so tests can drive it through a socket pair;
/// production code uses [`Transport`].
#[derive(Debug)]
pub struct ChannelSession<S = Transport> {
    stream: S,
    channel: String,
    channel_id: u16,
    state: SessionState,
}

fn validate_channel_name(channel: &str) -> Result<(), SessionError> {
    if channel.is_empty() || channel.len() > MAX_CHANNEL_NAME {
        return Err(SessionError::InvalidChannelName {
            len: channel.len(),
            max: MAX_CHANNEL_NAME,
        });
    }
    Ok(())
}

impl ChannelSession<Transport> {
    /// Connect to the relay at `endpoint` and open `channel`.
    pub fn connect(endpoint: &Endpoint, channel: &str) -> Result<Self, SessionError> {
        validate_channel_name(channel)?;
        let stream = Transport::connect(endpoint).map_err(|source| SessionError::Connect {
            endpoint: endpoint.to_string(),
            source,
        })?;
        log::info!("[channel] connected to relay at {endpoint}");
        Self::open(stream, channel)
    }
}

impl<S: Read + Write + AsRawFd> ChannelSession<S> {
    /// Run the OPEN handshake over an already connected stream.
    pub fn open(stream: S, channel: &str) -> Result<Self, SessionError> {
        validate_channel_name(channel)?;
        let mut session = Self {
            stream,
            channel: channel.to_owned(),
            channel_id: 0,
            state: SessionState::Disconnected,
        };

        session.state = SessionState::Opening;
        log::debug!("[channel] request to open channel {channel}");
        let request = Message::new(MessageType::Open, 0, 0, channel.as_bytes().to_vec());
        if let Err(e) = write_message(&mut session.stream, &request) {
            session.state = SessionState::Closed;
            return Err(e.into());
        }

        let response = match read_message(&mut session.stream) {
            Ok(msg) => msg,
            Err(e) => {
                session.state = SessionState::Closed;
                return Err(e.into());
            }
        };
        if response.kind != MessageType::Ok {
            session.state = SessionState::Closed;
            return Err(SessionError::Rejected {
                channel: channel.to_owned(),
                kind: response.kind,
                reason: String::from_utf8_lossy(&response.payload).into_owned(),
            });
        }

        session.channel_id = response.channel_id;
        session.state = SessionState::Open;
        log::info!("[channel] channel created: {channel} (id {})", session.channel_id);
        Ok(session)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Channel id carried by the relay's OK.
    pub fn channel_id(&self) -> u16 {
        self.channel_id
    }

    /// Wait until the relay has a frame for us.
    pub fn wait_readable(&self, timeout: Duration) -> io::Result<bool> {
        Ok(wait_readable(&[self.stream.as_raw_fd()], timeout)?.first().copied().unwrap_or(false))
    }

    /// Read the next frame (blocking).
    pub fn read_message(&mut self) -> Result<Message, SessionError> {
        if self.state != SessionState::Open {
            return Err(SessionError::NotOpen(self.state));
        }
        Ok(read_message(&mut self.stream)?)
    }

    /// Write one frame.
    pub fn send(&mut self, msg: &Message) -> Result<(), SessionError> {
        if self.state != SessionState::Open {
            return Err(SessionError::NotOpen(self.state));
        }
        Ok(write_message(&mut self.stream, msg)?)
    }

    /// Send CLOSE, give the relay a moment to answer, release the transport.
    ///
    /// Failures are logged only; the session ends up `Closed` either way.
    pub fn close(mut self) -> SessionState {
        if self.state == SessionState::Open {
            self.state = SessionState::Closing;
            log::info!("[channel] close the channel {} ({})", self.channel, self.stream.as_raw_fd());
            let request = Message::empty(MessageType::Close, self.channel_id, 0);
            match write_message(&mut self.stream, &request) {
                Ok(()) => self.drain_close_reply(),
                Err(e) => log::error!("[channel] unable to request channel close: {e}"),
            }
        }
        self.state = SessionState::Closed;
        self.state
    }

    fn drain_close_reply(&mut self) {
        match wait_readable(&[self.stream.as_raw_fd()], CLOSE_GRACE) {
            Ok(ready) if ready.first().copied().unwrap_or(false) => {
                match read_message(&mut self.stream) {
                    Ok(reply) => log::debug!("[channel] relay answered CLOSE with {}", reply.kind),
                    Err(e) => log::debug!("[channel] no CLOSE reply: {e}"),
                }
            }
            Ok(_) => log::debug!("[channel] relay did not answer CLOSE in time"),
            Err(e) => log::debug!("[channel] wait for CLOSE reply failed: {e}"),
        }
    }
}

impl<S: AsRawFd> AsRawFd for ChannelSession<S> {
    fn as_raw_fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::net::UnixStream;
    use std::thread;

    /// Relay stub: expects OPEN, answers with `reply`, then hands the
    /// stream back for further checks.
    fn relay_answering(reply: Message) -> (UnixStream, thread::JoinHandle<(Message, UnixStream)>) {
        let (ours, mut theirs) = UnixStream::pair().unwrap();
        let handle = thread::spawn(move || {
            let open = read_message(&mut theirs).unwrap();
            write_message(&mut theirs, &reply).unwrap();
            (open, theirs)
        });
        (ours, handle)
    }

    #[test]
    fn open_confirmed_by_ok() {
        let (stream, relay) = relay_answering(Message::empty(MessageType::Ok, 5, 0));
        let session = ChannelSession::open(stream, "broadcast").unwrap();
        let (open, _) = relay.join().unwrap();

        assert_eq!(open.kind, MessageType::Open);
        assert_eq!(open.channel_id, 0);
        assert_eq!(open.client_id, 0);
        assert_eq!(open.payload, b"broadcast");
        assert_eq!(session.state(), SessionState::Open);
        assert_eq!(session.channel_id(), 5);
    }

    #[test]
    fn open_rejected_by_error() {
        let (stream, relay) = relay_answering(Message::error(0, 0, "channel exists"));
        let err = ChannelSession::open(stream, "broadcast").unwrap_err();
        relay.join().unwrap();
        match err {
            SessionError::Rejected { kind, reason, .. } => {
                assert_eq!(kind, MessageType::Error);
                assert_eq!(reason, "channel exists");
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[test]
    fn open_rejected_by_unexpected_type() {
        let (stream, relay) = relay_answering(Message::empty(MessageType::Data, 0, 0));
        let err = ChannelSession::open(stream, "broadcast").unwrap_err();
        relay.join().unwrap();
        assert!(matches!(err, SessionError::Rejected { kind: MessageType::Data, .. }));
    }

    #[test]
    fn open_fails_when_relay_hangs_up() {
        let (stream, theirs) = UnixStream::pair().unwrap();
        drop(theirs);
        let err = ChannelSession::open(stream, "broadcast").unwrap_err();
        assert!(matches!(err, SessionError::Codec(_)));
    }

    #[test]
    fn channel_name_is_bounded() {
        let (stream, _theirs) = UnixStream::pair().unwrap();
        let long = "c".repeat(MAX_CHANNEL_NAME + 1);
        let err = ChannelSession::open(stream, &long).unwrap_err();
        assert!(matches!(err, SessionError::InvalidChannelName { len: 65, .. }));
    }

    #[test]
    fn close_sends_close_frame() {
        let (stream, relay) = relay_answering(Message::empty(MessageType::Ok, 3, 0));
        let session = ChannelSession::open(stream, "syslog").unwrap();
        let (_, mut theirs) = relay.join().unwrap();

        let closer = thread::spawn(move || {
            let close = read_message(&mut theirs).unwrap();
            write_message(&mut theirs, &Message::empty(MessageType::Ok, 3, 0)).unwrap();
            close
        });
        assert_eq!(session.close(), SessionState::Closed);

        let close = closer.join().unwrap();
        assert_eq!(close.kind, MessageType::Close);
        assert_eq!(close.channel_id, 3);
        assert!(close.payload.is_empty());
    }

    #[test]
    fn close_tolerates_dead_relay() {
        let (stream, relay) = relay_answering(Message::empty(MessageType::Ok, 0, 0));
        let session = ChannelSession::open(stream, "syslog").unwrap();
        let (_, theirs) = relay.join().unwrap();
        drop(theirs);
        assert_eq!(session.close(), SessionState::Closed);
    }
}
