//! Broadcast channel: named groups of clients with message fan-out.
//!
//! Clients subscribe under a user name, join groups by name, and publish
//! DATA frames addressed to a group id. Every member of the group receives
//! the published bytes, the publisher included when it is itself a member.
//!
//! ```text
//!  relay ──frame──► BroadcastEngine::handle
//!                      │
//!                      ├─ SUBSCRIBE / UNSUBSCRIBE ──► ClientRegistry
//!                      ├─ CTRL ──► ControlRequest ──► join / leave / query
//!                      └─ DATA ──► members_of(group) ──► one DATA per member
//! ```
//!
//! Groups have no registry entry of their own; a group exists while at
//! least one client handle lists it.

pub mod engine;
pub mod error;
pub mod group;
pub mod registry;

pub use engine::BroadcastEngine;
pub use error::BroadcastError;
pub use group::{ControlOp, ControlRequest, GroupId};
pub use registry::{ClientHandle, ClientId, ClientRegistry, SharedHandle};
