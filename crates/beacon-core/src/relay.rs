//! Event routing for the Beacon relay.
//!
//! The relay owns the presence directory and the roster of open
//! connections. Directed events are resolved through the directory and
//! forwarded 1:1 to the target's connection; a target that is offline
//! means the event is silently dropped, with no failure signal to the
//! sender. Whenever directory membership changes, the full online list
//! is broadcast to every open connection, registered or not.

use crate::directory::PresenceDirectory;
use crate::handle::{ClientHandle, ConnectionId};
use crate::identity::Identity;
use beacon_protocol::Frame;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, trace};

/// A directed event type, mapped to its forwarded counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectedEvent {
    /// `request-chat`, forwarded as `chat-requested`.
    ChatRequest,
    /// `chat-response`, forwarded as `start-chat-confirmed`.
    ChatResponse,
    /// `private-message`, forwarded as `new-message`.
    Message,
    /// `typing`, forwarded as `friend-typing`.
    Typing,
}

impl DirectedEvent {
    /// The inbound wire event name, used for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            DirectedEvent::ChatRequest => "request-chat",
            DirectedEvent::ChatResponse => "chat-response",
            DirectedEvent::Message => "private-message",
            DirectedEvent::Typing => "typing",
        }
    }

    /// Wrap a payload in the outbound frame for this event type.
    #[must_use]
    pub fn forwarded(self, payload: Value) -> Frame {
        match self {
            DirectedEvent::ChatRequest => Frame::ChatRequested(payload),
            DirectedEvent::ChatResponse => Frame::StartChatConfirmed(payload),
            DirectedEvent::Message => Frame::NewMessage(payload),
            DirectedEvent::Typing => Frame::FriendTyping(payload),
        }
    }
}

/// Relay statistics.
#[derive(Debug, Clone, Copy)]
pub struct RelayStats {
    /// Number of open connections.
    pub connections: usize,
    /// Number of identities currently online.
    pub online: usize,
}

/// Shared mutable relay state.
///
/// The directory and roster live under one lock so that each mutation
/// and the snapshot it broadcasts are consistent. The lock is never held
/// across a suspension point; actual delivery goes through unbounded
/// per-connection channels, so a slow consumer cannot block the relay.
#[derive(Debug, Default)]
struct RelayState {
    directory: PresenceDirectory,
    roster: HashMap<ConnectionId, ClientHandle>,
}

impl RelayState {
    fn recipients(&self) -> Vec<ClientHandle> {
        self.roster.values().cloned().collect()
    }
}

/// The central presence relay.
#[derive(Debug, Default)]
pub struct Relay {
    state: Mutex<RelayState>,
}

impl Relay {
    /// Create a new relay with an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, RelayState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Get relay statistics.
    #[must_use]
    pub fn stats(&self) -> RelayStats {
        let st = self.state();
        RelayStats {
            connections: st.roster.len(),
            online: st.directory.count(),
        }
    }

    /// Add a freshly opened connection to the roster.
    ///
    /// The connection holds no directory entry until it goes online, but
    /// it receives presence broadcasts from this point on.
    pub fn attach(&self, handle: ClientHandle) {
        trace!(connection = %handle.id(), "Relay: connection attached");
        self.state().roster.insert(handle.id().clone(), handle);
    }

    /// Remove a closed connection from the roster and the directory.
    ///
    /// Idempotent: a duplicate disconnect notification finds nothing to
    /// remove and triggers no broadcast. Returns the identity that went
    /// offline, if the connection had one.
    pub fn detach(&self, connection_id: &ConnectionId) -> Option<Identity> {
        let (removed, broadcast) = {
            let mut st = self.state();
            st.roster.remove(connection_id);
            let removed = st.directory.remove_by_handle(connection_id);
            let broadcast = removed
                .is_some()
                .then(|| (st.directory.identities(), st.recipients()));
            (removed, broadcast)
        };

        if let Some((identities, recipients)) = broadcast {
            Self::broadcast(&recipients, identities);
        }

        removed
    }

    /// Handle a `go-online` payload from a connection.
    ///
    /// An empty or missing identity is ignored: no state change, no
    /// error surfaced to the client. If the connection was previously
    /// bound to a different identity, that binding is removed first so
    /// no handle ever owns two entries. The online list is broadcast
    /// only when directory membership actually changed.
    pub fn go_online(&self, handle: &ClientHandle, payload: &Value) -> Option<Identity> {
        let identity = match Identity::from_payload(payload) {
            Ok(identity) => identity,
            Err(err) => {
                debug!(connection = %handle.id(), error = %err, "Ignoring go-online");
                return None;
            }
        };

        let broadcast = {
            let mut st = self.state();
            let owns_other = st
                .directory
                .identity_of(handle.id())
                .is_some_and(|previous| *previous != identity);
            let rebound = owns_other && st.directory.remove_by_handle(handle.id()).is_some();
            let joined = st.directory.set_online(identity.clone(), handle.clone());
            (joined || rebound).then(|| (st.directory.identities(), st.recipients()))
        };

        if let Some((identities, recipients)) = broadcast {
            Self::broadcast(&recipients, identities);
        }

        Some(identity)
    }

    /// Forward a directed event to the identity named in its `to` field.
    ///
    /// A missing or non-string `to`, an unknown identity, or a target
    /// whose connection is already tearing down all produce the same
    /// result: the event is dropped and the sender hears nothing.
    /// Returns `true` if the event was handed to the target's channel.
    pub fn forward(&self, event: DirectedEvent, payload: Value) -> bool {
        let target = payload
            .get("to")
            .and_then(Value::as_str)
            .and_then(|raw| Identity::parse(raw).ok());

        let Some(identity) = target else {
            debug!(event = event.name(), "Dropping directed event without usable target");
            return false;
        };

        let handle = self.state().directory.lookup(&identity).cloned();
        match handle {
            Some(handle) => {
                trace!(event = event.name(), to = %identity, "Forwarding");
                handle.send(event.forwarded(payload))
            }
            None => {
                debug!(event = event.name(), to = %identity, "Target offline, dropping");
                false
            }
        }
    }

    /// Handle a `leave-chat` payload, a bare identity string.
    ///
    /// Notifies that identity's connection that the chat ended. Same
    /// silent-drop semantics as any other directed event.
    pub fn leave_chat(&self, payload: &Value) -> bool {
        let target = payload
            .as_str()
            .and_then(|raw| Identity::parse(raw).ok());

        let Some(identity) = target else {
            debug!("Dropping leave-chat without usable target");
            return false;
        };

        let handle = self.state().directory.lookup(&identity).cloned();
        match handle {
            Some(handle) => handle.send(Frame::ChatEndedByFriend),
            None => {
                debug!(to = %identity, "Target offline, dropping leave-chat");
                false
            }
        }
    }

    /// Push a full online-list snapshot to every open connection.
    ///
    /// Sends happen outside the state lock; each broadcast carries the
    /// complete current snapshot, so a late one is safe to apply.
    fn broadcast(recipients: &[ClientHandle], identities: Vec<String>) {
        trace!(online = identities.len(), recipients = recipients.len(), "Broadcasting online list");
        for handle in recipients {
            handle.send(Frame::online_list(identities.clone()));
        }
    }
}
