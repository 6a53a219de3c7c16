//! Syslog relay channel service.
//!
//! Listens on a Unix datagram socket (typically where local programs send
//! their syslog lines) and forwards every datagram, verbatim, as one DATA
//! frame to each subscribed client of the channel.
//!
//! ```text
//!  logger(1) ──datagram──► /run/hotline/syslog ──► SyslogRelay
//!                                                    │
//!                              DATA (one per subscriber, ascending id)
//!                                                    ▼
//!                                                  relay
//! ```

use std::collections::BTreeSet;
use std::os::unix::io::{AsRawFd, RawFd};
use std::os::unix::net::UnixDatagram;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::channel::{ChannelService, MessageSink};
use crate::constants::{DATAGRAM_BUFFER_LEN, MAX_SOCKET_PATH};
use crate::protocol::{Message, MessageType};

/// Syslog datagram fan-out service.
///
/// The socket file is removed when the relay is dropped.
#[derive(Debug)]
pub struct SyslogRelay {
    socket: UnixDatagram,
    socket_path: PathBuf,
    subscribers: BTreeSet<u16>,
    channel_id: u16,
    buf: Vec<u8>,
}

impl SyslogRelay {
    /// Bind the datagram socket at `socket_path`.
    ///
    /// A stale file at that path is removed first, and the socket is made
    /// world-writable so any local program can log to it.
    pub fn bind(socket_path: impl AsRef<Path>) -> Result<Self> {
        let socket_path = socket_path.as_ref().to_path_buf();
        let path_len = socket_path.as_os_str().len();
        if path_len > MAX_SOCKET_PATH {
            anyhow::bail!(
                "socket path too long ({path_len} bytes, max {MAX_SOCKET_PATH}): {}",
                socket_path.display()
            );
        }

        if socket_path.exists() {
            std::fs::remove_file(&socket_path)
                .with_context(|| format!("failed to remove stale socket: {}", socket_path.display()))?;
        }

        let socket = UnixDatagram::bind(&socket_path)
            .with_context(|| format!("failed to bind socket: {}", socket_path.display()))?;

        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o777);
            std::fs::set_permissions(&socket_path, perms).with_context(|| {
                format!("failed to set permissions on {}", socket_path.display())
            })?;
        }

        log::info!("[syslog] listening on {}", socket_path.display());
        Ok(Self {
            socket,
            socket_path,
            subscribers: BTreeSet::new(),
            channel_id: 0,
            buf: vec![0; DATAGRAM_BUFFER_LEN],
        })
    }

    /// Path of the bound socket.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Subscribed client ids, ascending.
    pub fn subscribers(&self) -> impl Iterator<Item = u16> + '_ {
        self.subscribers.iter().copied()
    }

    fn forward(&self, datagram: &[u8], sink: &mut dyn MessageSink) {
        let msg = Message::new(MessageType::Data, self.channel_id, 0, datagram.to_vec());
        for client in &self.subscribers {
            if let Err(e) = sink.send(&msg.readdressed(*client)) {
                log::error!("[syslog] unable to forward log to client {client}: {e}");
            }
        }
    }
}

impl ChannelService for SyslogRelay {
    fn name(&self) -> &'static str {
        "syslog"
    }

    fn sources(&self) -> Vec<RawFd> {
        vec![self.socket.as_raw_fd()]
    }

    fn on_message(&mut self, msg: Message, _sink: &mut dyn MessageSink) {
        self.channel_id = msg.channel_id;
        let client = msg.client_id;
        match msg.kind {
            MessageType::Subscribe => {
                if self.subscribers.insert(client) {
                    log::info!("[syslog] client {client} subscribed to the channel");
                } else {
                    log::info!("[syslog] client {client} is already subscribed");
                }
            }
            MessageType::Unsubscribe => {
                if self.subscribers.remove(&client) {
                    log::info!("[syslog] client {client} unsubscribed from the channel");
                } else {
                    log::warn!("[syslog] client {client} was not subscribed");
                }
            }
            other => log::info!("[syslog] client {client} sent message of type {other}, ignored"),
        }
    }

    fn on_source_ready(&mut self, fd: RawFd, sink: &mut dyn MessageSink) -> Result<()> {
        if fd != self.socket.as_raw_fd() {
            return Ok(());
        }
        let mut buf = std::mem::take(&mut self.buf);
        let received = self.socket.recv(&mut buf);
        let result = match received {
            Ok(len) => {
                log::debug!("[syslog] {len} bytes to {} subscribers", self.subscribers.len());
                self.forward(&buf[..len], sink);
                Ok(())
            }
            Err(e) => Err(e).context("unable to read syslog datagram"),
        };
        self.buf = buf;
        result
    }

    fn drain(&mut self, sink: &mut dyn MessageSink) {
        log::info!("[syslog] unsubscribing {} remaining clients", self.subscribers.len());
        for client in std::mem::take(&mut self.subscribers) {
            let msg = Message::empty(MessageType::Unsubscribe, self.channel_id, client);
            if let Err(e) = sink.send(&msg) {
                log::error!("[syslog] unable to unsubscribe client {client}: {e}");
            }
        }
    }
}

impl Drop for SyslogRelay {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            log::debug!("[syslog] could not remove {}: {e}", self.socket_path.display());
        }
    }
}
