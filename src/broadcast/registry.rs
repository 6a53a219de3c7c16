//! Client registry: client id -> shared, reference-counted client handle.
//!
//! Several client ids may carry the same user name (the same user connected
//! twice). They share one [`ClientHandle`], and so share one group set. The
//! handle keeps an explicit `refs` count of the ids bound to it; the engine
//! announces a user's departure only when that count reaches zero.
//!
//! User and group names are raw bytes: clients are not required to use
//! UTF-8, and names compare byte for byte.
//!
//! ```text
//! clients: { 1 → alice(refs 2, {news}) ◄─ 3
//!            2 → bob(refs 1, {news, ops}) }
//! ```
//!
//! Iteration is always in ascending client id order so fan-out and query
//! results are reproducible. Groups iterate in ascending unsigned id order.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use super::group::GroupId;

/// Client identifier assigned by the relay.
pub type ClientId = u16;

/// Handle shared by every client id subscribed under the same name.
pub type SharedHandle = Rc<RefCell<ClientHandle>>;

/// One subscribed user.
#[derive(Debug, PartialEq, Eq)]
pub struct ClientHandle {
    name: Vec<u8>,
    refs: usize,
    /// Joined groups; the name is kept for QUERY_GROUP replies.
    groups: BTreeMap<GroupId, Vec<u8>>,
}

impl ClientHandle {
    fn new(name: &[u8]) -> Self {
        Self {
            name: name.to_vec(),
            refs: 1,
            groups: BTreeMap::new(),
        }
    }

    /// User name given at SUBSCRIBE.
    pub fn name(&self) -> &[u8] {
        &self.name
    }

    /// Number of client ids bound to this handle.
    pub fn refs(&self) -> usize {
        self.refs
    }

    /// Joined groups in ascending id order.
    pub fn groups(&self) -> &BTreeMap<GroupId, Vec<u8>> {
        &self.groups
    }

    /// Whether this user has joined `group`.
    pub fn is_member(&self, group: GroupId) -> bool {
        self.groups.contains_key(&group)
    }

    /// Join `group`. Returns false if already a member.
    pub fn join(&mut self, group: GroupId, name: &[u8]) -> bool {
        if self.is_member(group) {
            return false;
        }
        self.groups.insert(group, name.to_vec());
        true
    }

    /// Leave `group`. Returns false if not a member.
    pub fn leave(&mut self, group: GroupId) -> bool {
        self.groups.remove(&group).is_some()
    }
}

/// A handle that lost one of its client ids.
#[derive(Debug)]
pub struct Released {
    /// Client id that was unbound.
    pub client_id: ClientId,
    /// The handle it was bound to.
    pub handle: SharedHandle,
    /// True when no client id references the handle any more.
    pub last: bool,
}

/// Result of [`ClientRegistry::subscribe`].
#[derive(Debug)]
pub struct Subscribed {
    /// Handle now bound to the client id.
    pub handle: SharedHandle,
    /// Whether an existing handle with the same name was reused.
    pub shared: bool,
    /// Different handle previously bound to this client id.
    pub displaced: Option<Released>,
}

/// Ordered registry of subscribed clients.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: BTreeMap<ClientId, SharedHandle>,
}

impl ClientRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `client_id` to the handle named `name`, creating it if no
    /// subscribed client carries that name yet.
    ///
    /// Re-subscribing an id under the name it already has leaves the count
    /// unchanged. Re-subscribing it under another name unbinds the old
    /// handle, which is reported in [`Subscribed::displaced`].
    pub fn subscribe(&mut self, client_id: ClientId, name: &[u8]) -> Subscribed {
        let existing = self.clients.values().find(|h| h.borrow().name == name).cloned();
        let shared = existing.is_some();
        let handle = match existing {
            Some(handle) => {
                handle.borrow_mut().refs += 1;
                handle
            }
            None => Rc::new(RefCell::new(ClientHandle::new(name))),
        };

        let displaced = self
            .clients
            .insert(client_id, Rc::clone(&handle))
            .and_then(|previous| {
                // Same id, same handle: undo the bump above.
                if Rc::ptr_eq(&previous, &handle) {
                    handle.borrow_mut().refs -= 1;
                    None
                } else {
                    Some(Self::release(client_id, previous))
                }
            });

        Subscribed {
            handle,
            shared,
            displaced,
        }
    }

    /// Unbind `client_id`. Returns `None` if it was not subscribed.
    pub fn unsubscribe(&mut self, client_id: ClientId) -> Option<Released> {
        self.clients.remove(&client_id).map(|handle| Self::release(client_id, handle))
    }

    fn release(client_id: ClientId, handle: SharedHandle) -> Released {
        let last = {
            let mut h = handle.borrow_mut();
            h.refs = h.refs.saturating_sub(1);
            h.refs == 0
        };
        Released {
            client_id,
            handle,
            last,
        }
    }

    /// Handle bound to `client_id`.
    pub fn find(&self, client_id: ClientId) -> Option<SharedHandle> {
        self.clients.get(&client_id).cloned()
    }

    /// Client ids whose handle has joined `group`, ascending.
    pub fn members_of(&self, group: GroupId) -> Vec<ClientId> {
        self.clients
            .iter()
            .filter(|(_, h)| h.borrow().is_member(group))
            .map(|(id, _)| *id)
            .collect()
    }

    /// `(client id, handle)` pairs whose handle has joined `group`, ascending.
    pub fn member_handles(&self, group: GroupId) -> Vec<(ClientId, SharedHandle)> {
        self.clients
            .iter()
            .filter(|(_, h)| h.borrow().is_member(group))
            .map(|(id, h)| (*id, Rc::clone(h)))
            .collect()
    }

    /// All subscribed client ids, ascending.
    pub fn client_ids(&self) -> Vec<ClientId> {
        self.clients.keys().copied().collect()
    }

    /// Number of subscribed client ids.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Whether no client is subscribed.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_name_shares_one_handle() {
        let mut registry = ClientRegistry::new();
        let first = registry.subscribe(1, b"alice");
        let second = registry.subscribe(2, b"alice");
        let third = registry.subscribe(3, b"alice");

        assert!(!first.shared);
        assert!(second.shared && third.shared);
        assert!(Rc::ptr_eq(&first.handle, &third.handle));
        assert_eq!(first.handle.borrow().refs(), 3);

        let r1 = registry.unsubscribe(1).unwrap();
        let r2 = registry.unsubscribe(2).unwrap();
        assert!(!r1.last && !r2.last);
        assert_eq!(first.handle.borrow().refs(), 1);
        let remaining = registry.find(3).unwrap();
        assert!(Rc::ptr_eq(&remaining, &first.handle));

        let r3 = registry.unsubscribe(3).unwrap();
        assert!(r3.last);
        assert_eq!(r3.client_id, 3);
        assert!(registry.find(3).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn shared_handle_shares_groups() {
        let mut registry = ClientRegistry::new();
        registry.subscribe(1, b"alice");
        registry.subscribe(2, b"alice");
        registry.subscribe(3, b"bob");
        let g = GroupId::from_name(b"g");

        assert!(registry.find(1).unwrap().borrow_mut().join(g, b"g"));
        assert_eq!(registry.members_of(g), vec![1, 2]);
        assert!(!registry.find(2).unwrap().borrow_mut().join(g, b"g"));
    }

    #[test]
    fn unsubscribe_unknown_is_none() {
        let mut registry = ClientRegistry::new();
        assert!(registry.unsubscribe(42).is_none());
    }

    #[test]
    fn resubscribe_same_name_keeps_count() {
        let mut registry = ClientRegistry::new();
        registry.subscribe(1, b"alice");
        let again = registry.subscribe(1, b"alice");
        assert!(again.displaced.is_none());
        assert_eq!(again.handle.borrow().refs(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn resubscribe_other_name_displaces_old_handle() {
        let mut registry = ClientRegistry::new();
        let old = registry.subscribe(1, b"alice").handle;
        let now = registry.subscribe(1, b"bob");

        let displaced = now.displaced.unwrap();
        assert!(displaced.last);
        assert!(Rc::ptr_eq(&displaced.handle, &old));
        assert_eq!(registry.find(1).unwrap().borrow().name(), b"bob");
    }

    #[test]
    fn names_compare_as_bytes() {
        let mut registry = ClientRegistry::new();
        let latin1 = registry.subscribe(1, b"caf\xE9");
        let utf8 = registry.subscribe(2, "café".as_bytes());
        let again = registry.subscribe(3, b"caf\xE9");

        assert!(!utf8.shared);
        assert!(again.shared);
        assert!(Rc::ptr_eq(&latin1.handle, &again.handle));
        assert_eq!(latin1.handle.borrow().name(), b"caf\xE9");
    }

    #[test]
    fn members_are_ascending() {
        let mut registry = ClientRegistry::new();
        let g = GroupId::from_name(b"g");
        for (id, name) in [(30, b"c"), (10, b"a"), (20, b"b")] {
            registry.subscribe(id, name).handle.borrow_mut().join(g, b"g");
        }
        registry.subscribe(5, b"nobody");

        assert_eq!(registry.members_of(g), vec![10, 20, 30]);
        assert_eq!(registry.client_ids(), vec![5, 10, 20, 30]);
        let names: Vec<_> = registry
            .member_handles(g)
            .into_iter()
            .map(|(_, h)| h.borrow().name().to_vec())
            .collect();
        assert_eq!(names, [b"a", b"b", b"c"]);
    }

    #[test]
    fn leave_reports_membership() {
        let mut handle = ClientHandle::new(b"alice");
        let g = GroupId(9);
        assert!(!handle.leave(g));
        assert!(handle.join(g, b"nine"));
        assert_eq!(handle.groups().get(&g).map(Vec::as_slice), Some(&b"nine"[..]));
        assert!(handle.leave(g));
        assert!(!handle.is_member(g));
    }
}
