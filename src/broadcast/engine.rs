//! Group fan-out engine.
//!
//! Dispatches every frame received on the broadcast channel:
//!
//! | Frame        | Effect                                                     |
//! |--------------|------------------------------------------------------------|
//! | SUBSCRIBE    | bind client id to a user name (payload)                    |
//! | UNSUBSCRIBE  | unbind, announce departure if last id of that user, ack    |
//! | CTRL         | group join / leave / queries, see [`super::group`]         |
//! | DATA         | `[u32 group_id][bytes]`, bytes fanned out to the members   |
//! | other        | logged and ignored                                         |
//!
//! A send failure towards one recipient is logged and the fan-out goes on.
//! Names are opaque bytes; logs show them lossily decoded.

use crate::channel::{ChannelService, MessageSink};
use crate::constants::MAX_NAME_LEN;
use crate::protocol::{CodecError, Message, MessageType};

use super::error::BroadcastError;
use super::group::{self, ControlRequest, GroupId};
use super::registry::{ClientId, ClientRegistry, Released, SharedHandle};

/// Broadcast channel state: the registry plus the channel id used for
/// frames the engine originates.
#[derive(Debug, Default)]
pub struct BroadcastEngine {
    registry: ClientRegistry,
    channel_id: u16,
}

impl BroadcastEngine {
    /// Create an engine with an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribed clients.
    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    /// Handle one inbound frame.
    pub fn handle(&mut self, msg: Message, sink: &mut dyn MessageSink) {
        self.channel_id = msg.channel_id;
        let client = msg.client_id;
        let result = match msg.kind {
            MessageType::Subscribe => {
                self.on_subscribe(client, &msg.payload, sink);
                Ok(())
            }
            MessageType::Unsubscribe => {
                log::info!("[broadcast] client {client} unsubscribes from the channel");
                self.on_unsubscribe(client, sink);
                Ok(())
            }
            MessageType::Ctrl => self.on_control(client, &msg.payload, sink),
            MessageType::Data => self.on_data(client, &msg.payload, sink),
            other => {
                log::info!("[broadcast] client {client} sent message of type {other}, ignored");
                Ok(())
            }
        };
        if let Err(e) = result {
            self.reject(client, &e, sink);
        }
    }

    fn on_subscribe(&mut self, client: ClientId, payload: &[u8], sink: &mut dyn MessageSink) {
        if payload.len() > MAX_NAME_LEN {
            log::error!("[broadcast] user name overflow from client {client} ({} bytes)", payload.len());
            return;
        }
        if self.registry.find(client).is_some() {
            log::info!("[broadcast] client {client} is already subscribed to this channel");
        }

        let subscribed = self.registry.subscribe(client, payload);
        if let Some(released) = subscribed.displaced {
            self.announce_departure(released, sink);
        }
        let name = String::from_utf8_lossy(payload);
        if subscribed.shared {
            log::info!(
                "[broadcast] client {client} subscribed as {name}, sharing its handle (refs {})",
                subscribed.handle.borrow().refs()
            );
        } else {
            log::info!("[broadcast] client {client} subscribed as {name}");
        }
    }

    fn on_unsubscribe(&mut self, client: ClientId, sink: &mut dyn MessageSink) {
        let Some(released) = self.registry.unsubscribe(client) else {
            log::warn!("[broadcast] client {client} is not subscribed, nothing to release");
            return;
        };
        self.announce_departure(released, sink);
        self.deliver(&Message::empty(MessageType::Unsubscribe, self.channel_id, client), sink);
    }

    /// Tell the remaining members of every group a user had joined that it
    /// is gone, once its last client id is released.
    fn announce_departure(&self, released: Released, sink: &mut dyn MessageSink) {
        if !released.last {
            log::debug!(
                "[broadcast] client {} released, handle still referenced",
                released.client_id
            );
            return;
        }
        let (name, groups) = {
            let handle = released.handle.borrow();
            (handle.name().to_vec(), handle.groups().keys().copied().collect::<Vec<_>>())
        };
        log::debug!(
            "[broadcast] user {} is leaving all its groups ({})",
            String::from_utf8_lossy(&name),
            groups.len()
        );
        for id in groups {
            match group::leave_notification(&name, id) {
                Ok(payload) => self.fan_out(id, MessageType::Ctrl, payload, sink),
                Err(e) => log::error!("[broadcast] unable to build leave notification: {e}"),
            }
        }
    }

    fn on_control(
        &mut self,
        client: ClientId,
        payload: &[u8],
        sink: &mut dyn MessageSink,
    ) -> Result<(), BroadcastError> {
        let handle = self
            .registry
            .find(client)
            .ok_or(BroadcastError::NotSubscribed(client))?;
        match ControlRequest::parse(payload)? {
            ControlRequest::Join { name } => self.join(client, &handle, &name, sink),
            ControlRequest::Leave(id) => self.leave(client, &handle, id, sink),
            ControlRequest::QueryUser(id) => self.query_user(client, &handle, id, sink),
            ControlRequest::QueryGroup => {
                self.query_group(client, &handle, sink);
                Ok(())
            }
        }
    }

    fn join(
        &self,
        client: ClientId,
        handle: &SharedHandle,
        group_name: &[u8],
        sink: &mut dyn MessageSink,
    ) -> Result<(), BroadcastError> {
        let id = GroupId::from_name(group_name);
        let label = String::from_utf8_lossy(group_name);
        if handle.borrow().is_member(id) {
            log::info!("[broadcast] client {client} already joined group {label} ({id})");
            return Ok(());
        }
        let payload = group::join_notification(handle.borrow().name(), id, group_name)?;
        handle.borrow_mut().join(id, group_name);
        log::info!("[broadcast] client {client} joined group {label} ({id})");
        self.fan_out(id, MessageType::Ctrl, payload, sink);
        Ok(())
    }

    fn leave(
        &self,
        client: ClientId,
        handle: &SharedHandle,
        id: GroupId,
        sink: &mut dyn MessageSink,
    ) -> Result<(), BroadcastError> {
        if !handle.borrow().is_member(id) {
            log::debug!("[broadcast] client {client} leaves group {id} it never joined");
            return Ok(());
        }
        let payload = group::leave_notification(handle.borrow().name(), id)?;
        self.fan_out(id, MessageType::Ctrl, payload, sink);
        handle.borrow_mut().leave(id);
        log::info!("[broadcast] client {client} left group {id}");
        Ok(())
    }

    fn query_user(
        &self,
        client: ClientId,
        handle: &SharedHandle,
        id: GroupId,
        sink: &mut dyn MessageSink,
    ) -> Result<(), BroadcastError> {
        if !handle.borrow().is_member(id) {
            return Err(BroadcastError::NotMember { client, group: id });
        }
        for (member, member_handle) in self.registry.member_handles(id) {
            let reply = group::query_user_reply(id, member_handle.borrow().name());
            log::debug!("[broadcast] query user of group {id} for client {client}: {member}");
            self.reply(client, reply, sink);
        }
        Ok(())
    }

    fn query_group(&self, client: ClientId, handle: &SharedHandle, sink: &mut dyn MessageSink) {
        let groups: Vec<_> =
            handle.borrow().groups().iter().map(|(id, name)| (*id, name.clone())).collect();
        if groups.is_empty() {
            log::debug!("[broadcast] client {client} has not joined any group");
        }
        for (id, name) in groups {
            self.reply(client, group::query_group_reply(id, &name), sink);
        }
    }

    fn on_data(
        &self,
        client: ClientId,
        payload: &[u8],
        sink: &mut dyn MessageSink,
    ) -> Result<(), BroadcastError> {
        let id = GroupId::read_be(payload).ok_or(BroadcastError::DataTooShort(payload.len()))?;
        let body = payload[4..].to_vec();
        log::debug!("[broadcast] client {client} publishes {} bytes to group {id}", body.len());
        self.fan_out(id, MessageType::Data, body, sink);
        Ok(())
    }

    /// Send `payload` to every member of `group`, ascending client id.
    fn fan_out(&self, group: GroupId, kind: MessageType, payload: Vec<u8>, sink: &mut dyn MessageSink) {
        let msg = Message::new(kind, self.channel_id, 0, payload);
        for member in self.registry.members_of(group) {
            self.deliver(&msg.readdressed(member), sink);
        }
    }

    fn reply(
        &self,
        client: ClientId,
        payload: Result<Vec<u8>, CodecError>,
        sink: &mut dyn MessageSink,
    ) {
        match payload {
            Ok(payload) => {
                self.deliver(&Message::new(MessageType::Ctrl, self.channel_id, client, payload), sink)
            }
            Err(e) => log::error!("[broadcast] unable to build reply for client {client}: {e}"),
        }
    }

    fn reject(&self, client: ClientId, err: &BroadcastError, sink: &mut dyn MessageSink) {
        log::warn!("[broadcast] request from client {client} rejected: {err}");
        self.deliver(&Message::error(self.channel_id, client, &err.to_string()), sink);
    }

    fn deliver(&self, msg: &Message, sink: &mut dyn MessageSink) {
        if let Err(e) = sink.send(msg) {
            log::error!("[broadcast] unable to send {} to client {}: {e}", msg.kind, msg.client_id);
        }
    }
}

impl ChannelService for BroadcastEngine {
    fn name(&self) -> &'static str {
        "broadcast"
    }

    fn on_message(&mut self, msg: Message, sink: &mut dyn MessageSink) {
        self.handle(msg, sink);
    }

    /// Release every client in ascending id order, as if each had sent
    /// UNSUBSCRIBE.
    fn drain(&mut self, sink: &mut dyn MessageSink) {
        let clients = self.registry.client_ids();
        log::info!("[broadcast] unsubscribing {} remaining clients", clients.len());
        for client in clients {
            self.on_unsubscribe(client, sink);
        }
    }
}
