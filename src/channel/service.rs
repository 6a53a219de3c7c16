//! Single-threaded service loop shared by every channel service.
//!
//! ```text
//!            ┌──────────── poll(relay fd + service sources) ◄──────────┐
//!            │                                                         │
//!   relay ready ──read_message──► service.on_message(msg, sink) ───────┤
//!   source ready ───────────────► service.on_source_ready(fd, sink) ───┤
//!   shutdown flag / fatal error ──► service.drain(sink) ──► close()
//! ```
//!
//! State is only touched between two waits, one ready descriptor at a time,
//! so services own their registries outright: no locks, no sharing.

use std::io::{ErrorKind, Read, Write};
use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::protocol::Message;

use super::poll::wait_readable;
use super::session::{ChannelSession, SessionError};

/// Outbound side of a channel, as seen by a service.
pub trait MessageSink {
    /// Write one frame to the relay.
    fn send(&mut self, msg: &Message) -> Result<(), SessionError>;
}

impl<S: Read + Write + AsRawFd> MessageSink for ChannelSession<S> {
    fn send(&mut self, msg: &Message) -> Result<(), SessionError> {
        ChannelSession::send(self, msg)
    }
}

/// A channel service driven by [`run_service`].
pub trait ChannelService {
    /// Short name used as log prefix.
    fn name(&self) -> &'static str;

    /// Extra descriptors to wait on next to the relay.
    fn sources(&self) -> Vec<RawFd> {
        Vec::new()
    }

    /// Handle one frame from the relay. Never fatal.
    fn on_message(&mut self, msg: Message, sink: &mut dyn MessageSink);

    /// Handle a ready extra descriptor. An error ends the loop.
    fn on_source_ready(&mut self, fd: RawFd, sink: &mut dyn MessageSink) -> Result<()> {
        let _ = (fd, sink);
        Ok(())
    }

    /// Tear down per-client state before the channel closes.
    fn drain(&mut self, sink: &mut dyn MessageSink);
}

/// Why [`run_service`] left its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The shutdown flag was raised.
    Shutdown,
    /// The relay stream failed or hung up.
    RelayLost,
    /// The relay sent a frame that could not be parsed; the stream is out
    /// of sync.
    ProtocolError,
    /// An extra source failed.
    SourceFailed,
}

/// Drive `service` over `session` until shutdown or a fatal error, then
/// drain and close the channel.
pub fn run_service<S, T>(
    mut session: ChannelSession<S>,
    service: &mut T,
    shutdown: &AtomicBool,
    poll_interval: Duration,
) -> Result<StopReason>
where
    S: Read + Write + AsRawFd,
    T: ChannelService + ?Sized,
{
    let name = service.name();
    let reason = loop {
        if shutdown.load(Ordering::Relaxed) {
            log::info!("[{name}] shutdown requested");
            break StopReason::Shutdown;
        }

        let mut fds = vec![session.as_raw_fd()];
        fds.extend(service.sources());
        let ready = match wait_readable(&fds, poll_interval) {
            Ok(ready) => ready,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                log::error!("[{name}] error on poll(): {e}");
                break StopReason::RelayLost;
            }
        };

        if ready[0] {
            match session.read_message() {
                Ok(msg) => service.on_message(msg, &mut session),
                Err(SessionError::Codec(e)) if e.is_protocol() => {
                    log::error!("[{name}] protocol error on channel, quit: {e}");
                    break StopReason::ProtocolError;
                }
                Err(e) => {
                    log::error!("[{name}] unable to read message from channel, quit: {e}");
                    break StopReason::RelayLost;
                }
            }
            // Sources are re-polled next turn; one descriptor per pass.
            continue;
        }

        let failed = fds[1..]
            .iter()
            .zip(&ready[1..])
            .filter(|(_, is_ready)| **is_ready)
            .map(|(fd, _)| service.on_source_ready(*fd, &mut session))
            .find_map(Result::err);
        if let Some(e) = failed {
            log::error!("[{name}] source failed: {e:#}");
            break StopReason::SourceFailed;
        }
    };

    service.drain(&mut session);
    session.close();
    log::info!("[{name}] service stopped ({reason:?})");
    Ok(reason)
}

/// Connect to the relay and run `service` on `channel`.
///
/// Channel creation failures are returned, not retried.
pub fn connect_and_run<T: ChannelService + ?Sized>(
    endpoint: &super::Endpoint,
    channel: &str,
    service: &mut T,
    shutdown: &AtomicBool,
    poll_interval: Duration,
) -> Result<StopReason> {
    let session = ChannelSession::connect(endpoint, channel)
        .with_context(|| format!("unable to open channel {channel} on {endpoint}"))?;
    run_service(session, service, shutdown, poll_interval)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{read_message, write_message, MessageType};
    use std::os::unix::net::UnixStream;
    use std::thread;

    /// Echoes every frame back and records the drain.
    #[derive(Default)]
    struct Echo {
        seen: Vec<Message>,
        drained: bool,
    }

    impl ChannelService for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn on_message(&mut self, msg: Message, sink: &mut dyn MessageSink) {
            let _ = sink.send(&msg);
            self.seen.push(msg);
        }

        fn drain(&mut self, sink: &mut dyn MessageSink) {
            self.drained = true;
            let _ = sink.send(&Message::empty(MessageType::Unsubscribe, 0, 99));
        }
    }

    fn open_pair() -> (ChannelSession<UnixStream>, UnixStream) {
        let (ours, mut theirs) = UnixStream::pair().unwrap();
        let relay = thread::spawn(move || {
            read_message(&mut theirs).unwrap();
            write_message(&mut theirs, &Message::empty(MessageType::Ok, 1, 0)).unwrap();
            theirs
        });
        let session = ChannelSession::open(ours, "echo").unwrap();
        (session, relay.join().unwrap())
    }

    #[test]
    fn relay_hang_up_drains_and_stops() {
        let (session, mut relay) = open_pair();
        let msg = Message::new(MessageType::Data, 1, 4, b"hey".to_vec());
        write_message(&mut relay, &msg).unwrap();

        let peer = thread::spawn(move || {
            let echoed = read_message(&mut relay).unwrap();
            drop(relay);
            echoed
        });

        let shutdown = AtomicBool::new(false);
        let mut echo = Echo::default();
        let reason =
            run_service(session, &mut echo, &shutdown, Duration::from_millis(20)).unwrap();

        assert_eq!(reason, StopReason::RelayLost);
        assert_eq!(peer.join().unwrap(), msg);
        assert_eq!(echo.seen, vec![msg]);
        assert!(echo.drained);
    }

    #[test]
    fn garbled_frame_stops_with_protocol_error() {
        let (session, mut relay) = open_pair();
        let mut wire = Message::new(MessageType::Data, 1, 4, b"hey".to_vec()).encode().unwrap();
        wire[0] ^= 0xFF;
        relay.write_all(&wire).unwrap();

        let peer = thread::spawn(move || {
            let drained = read_message(&mut relay).unwrap();
            let close = read_message(&mut relay).unwrap();
            write_message(&mut relay, &Message::empty(MessageType::Ok, 1, 0)).unwrap();
            (drained, close)
        });

        let shutdown = AtomicBool::new(false);
        let mut echo = Echo::default();
        let reason =
            run_service(session, &mut echo, &shutdown, Duration::from_millis(20)).unwrap();
        let (drained, close) = peer.join().unwrap();

        assert_eq!(reason, StopReason::ProtocolError);
        assert!(echo.seen.is_empty());
        assert_eq!(drained.kind, MessageType::Unsubscribe);
        assert_eq!(close.kind, MessageType::Close);
    }

    #[test]
    fn shutdown_flag_drains_then_closes() {
        let (session, mut relay) = open_pair();
        let shutdown = AtomicBool::new(true);
        let mut echo = Echo::default();

        let peer = thread::spawn(move || {
            let drained = read_message(&mut relay).unwrap();
            let close = read_message(&mut relay).unwrap();
            write_message(&mut relay, &Message::empty(MessageType::Ok, 1, 0)).unwrap();
            (drained, close)
        });

        let reason =
            run_service(session, &mut echo, &shutdown, Duration::from_millis(20)).unwrap();
        let (drained, close) = peer.join().unwrap();

        assert_eq!(reason, StopReason::Shutdown);
        assert_eq!(drained.kind, MessageType::Unsubscribe);
        assert_eq!(drained.client_id, 99);
        assert_eq!(close.kind, MessageType::Close);
    }
}
