//! The presence directory.
//!
//! The directory is the single mapping from identity to live connection
//! handle. At most one handle per identity at any instant: going online
//! always replaces, never appends, and removal matches by handle value,
//! so a reconnect orphans the old handle without notification.

use crate::handle::{ClientHandle, ConnectionId};
use crate::identity::Identity;
use std::collections::HashMap;
use tracing::debug;

/// The identity → connection-handle mapping.
///
/// Plain data with no interior locking; the [`Relay`](crate::Relay)
/// guards it with a single mutex covering each read-modify-write plus
/// the snapshot taken for broadcasting.
#[derive(Debug, Default)]
pub struct PresenceDirectory {
    entries: HashMap<Identity, ClientHandle>,
}

impl PresenceDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of online identities.
    #[must_use]
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Check if the directory is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bind an identity to a connection handle.
    ///
    /// Overwrite is silent and unconditional: the last writer wins and
    /// a previously bound handle is orphaned with no notification.
    /// Returns `true` if directory membership changed, i.e. the identity
    /// was not online before; callers broadcast only in that case.
    pub fn set_online(&mut self, identity: Identity, handle: ClientHandle) -> bool {
        let replaced = self.entries.insert(identity.clone(), handle);
        match replaced {
            Some(_) => {
                debug!(identity = %identity, "Directory: rebound to new connection");
                false
            }
            None => {
                debug!(identity = %identity, "Directory: went online");
                true
            }
        }
    }

    /// Look up the handle currently bound to an identity.
    #[must_use]
    pub fn lookup(&self, identity: &Identity) -> Option<&ClientHandle> {
        self.entries.get(identity)
    }

    /// Find the identity a connection is currently bound to, if any.
    #[must_use]
    pub fn identity_of(&self, connection_id: &ConnectionId) -> Option<&Identity> {
        self.entries
            .iter()
            .find(|(_, handle)| handle.id() == connection_id)
            .map(|(identity, _)| identity)
    }

    /// Remove the entry owned by the given connection.
    ///
    /// Scans all entries; O(n) in the number of online users, which is
    /// bounded by the concurrent connection count. Returns the removed
    /// identity, or `None` if the connection owns no entry (client
    /// disconnected before going online, or its handle was already
    /// reassigned). Idempotent.
    pub fn remove_by_handle(&mut self, connection_id: &ConnectionId) -> Option<Identity> {
        let identity = self.identity_of(connection_id).cloned()?;
        self.entries.remove(&identity);
        debug!(identity = %identity, connection = %connection_id, "Directory: went offline");
        Some(identity)
    }

    /// Snapshot of all currently online identities.
    #[must_use]
    pub fn identities(&self) -> Vec<String> {
        self.entries.keys().map(|i| i.as_str().to_owned()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::ClientHandle;

    fn handle(id: &str) -> ClientHandle {
        ClientHandle::channel(ConnectionId::new(id)).0
    }

    fn identity(s: &str) -> Identity {
        Identity::parse(s).unwrap()
    }

    #[test]
    fn test_last_write_wins() {
        let mut dir = PresenceDirectory::new();
        let h1 = handle("c1");
        let h2 = handle("c2");

        assert!(dir.set_online(identity("a@x.com"), h1));
        assert!(!dir.set_online(identity("a@x.com"), h2.clone()));

        assert_eq!(dir.count(), 1);
        assert_eq!(dir.lookup(&identity("a@x.com")), Some(&h2));
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let mut dir = PresenceDirectory::new();
        dir.set_online(identity("A@B.com"), handle("c1"));

        assert!(dir.lookup(&identity("a@b.com ")).is_some());
        assert_eq!(dir.identities(), vec!["a@b.com".to_string()]);
    }

    #[test]
    fn test_lookup_absent() {
        let dir = PresenceDirectory::new();
        assert!(dir.lookup(&identity("ghost@x.com")).is_none());
    }

    #[test]
    fn test_remove_by_handle() {
        let mut dir = PresenceDirectory::new();
        dir.set_online(identity("a@x.com"), handle("c1"));
        dir.set_online(identity("b@x.com"), handle("c2"));

        let removed = dir.remove_by_handle(&ConnectionId::new("c1"));
        assert_eq!(removed, Some(identity("a@x.com")));
        assert_eq!(dir.count(), 1);

        // Second call for the same handle is a clean no-op
        assert!(dir.remove_by_handle(&ConnectionId::new("c1")).is_none());
        assert_eq!(dir.count(), 1);
    }

    #[test]
    fn test_remove_unknown_handle_is_noop() {
        let mut dir = PresenceDirectory::new();
        dir.set_online(identity("a@x.com"), handle("c1"));

        assert!(dir.remove_by_handle(&ConnectionId::new("never-seen")).is_none());
        assert_eq!(dir.count(), 1);
    }

    #[test]
    fn test_remove_after_handle_reassigned() {
        let mut dir = PresenceDirectory::new();
        // c1 claims one identity, then a reconnecting c2 takes it over
        dir.set_online(identity("a@x.com"), handle("c1"));
        dir.set_online(identity("a@x.com"), handle("c2"));

        // c1's disconnect finds no entry to remove
        assert!(dir.remove_by_handle(&ConnectionId::new("c1")).is_none());
        assert_eq!(dir.count(), 1);
        assert!(dir.lookup(&identity("a@x.com")).is_some());
    }
}
