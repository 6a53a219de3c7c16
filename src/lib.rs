//! Hotline channel services.
//!
//! A hotline relay multiplexes many end clients over one connection per
//! channel. This crate implements the channel side: the frame codec, the
//! channel handshake, a generic single-threaded service loop, and two
//! services built on it.
//!
//! # Architecture
//!
//! - **Protocol** - binary frame codec shared with the relay
//! - **Channel** - OPEN/OK/CLOSE session and the service loop
//! - **Broadcast** - client registry, groups and fan-out
//! - **Syslog relay** - forwards local syslog datagrams to subscribers
//!
//! # Modules
//!
//! - [`protocol`] - `Message`, `read_message`, `write_message`
//! - [`channel`] - `ChannelSession`, `ChannelService`, `run_service`
//! - [`broadcast`] - `BroadcastEngine`
//! - [`syslog_relay`] - `SyslogRelay`
//! - [`config`] - configuration loading
//! - [`logging`] - syslog / stderr logger setup

pub mod broadcast;
pub mod channel;
pub mod config;
pub mod constants;
pub mod logging;
pub mod protocol;
pub mod syslog_relay;

pub use broadcast::BroadcastEngine;
pub use channel::{ChannelSession, ChannelService, Endpoint};
pub use config::ServiceConfig;
pub use protocol::{Message, MessageType};
pub use syslog_relay::SyslogRelay;
