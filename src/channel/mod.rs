//! Channel plumbing between a service process and the relay.
//!
//! # Architecture
//!
//! ```text
//! Service process                                   Relay ("hotline")
//! ┌──────────────────────────┐                     ┌──────────────────┐
//! │ ChannelService           │                     │                  │
//! │  (broadcast, syslog, …)  │                     │  routes frames   │
//! │        ▲   │ MessageSink │   one connection    │  between many    │
//! │        │   ▼             │◄───────────────────►│  end clients and │
//! │ ChannelSession           │  frames (protocol)  │  this channel    │
//! │  Transport (Unix / TCP)  │                     │                  │
//! └──────────────────────────┘                     └──────────────────┘
//! ```
//!
//! - [`endpoint`]: parse the relay address string
//! - [`transport`]: the connected byte stream
//! - [`session`]: OPEN/OK/CLOSE handshake and frame I/O
//! - [`poll`]: readiness wait
//! - [`service`]: the shared single-threaded loop

pub mod endpoint;
pub mod poll;
pub mod service;
pub mod session;
pub mod transport;

pub use endpoint::{Endpoint, EndpointError};
pub use service::{connect_and_run, run_service, ChannelService, MessageSink, StopReason};
pub use session::{ChannelSession, SessionError, SessionState};
pub use transport::Transport;
