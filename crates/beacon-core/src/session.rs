//! Per-connection session lifecycle.
//!
//! A session binds one transport connection to the relay. It starts
//! anonymous, becomes online after a valid `go-online`, and is closed
//! exactly once when the transport reports disconnect. All directory
//! mutations for a connection flow through its session.

use crate::handle::ClientHandle;
use crate::identity::Identity;
use crate::relay::{DirectedEvent, Relay};
use beacon_protocol::Frame;
use std::sync::Arc;
use tracing::{debug, warn};

/// Lifecycle state of one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Connection open, no directory entry yet.
    Anonymous,
    /// Directory holds an entry binding this identity to the connection.
    Online(Identity),
    /// Disconnected; any directory entry has been removed.
    Closed,
}

/// The lifecycle manager for a single connection.
pub struct Session {
    handle: ClientHandle,
    relay: Arc<Relay>,
    state: SessionState,
}

impl Session {
    /// Open a session, attaching the connection to the relay roster.
    #[must_use]
    pub fn open(relay: Arc<Relay>, handle: ClientHandle) -> Self {
        relay.attach(handle.clone());
        Self {
            handle,
            relay,
            state: SessionState::Anonymous,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// The connection handle this session manages.
    #[must_use]
    pub fn handle(&self) -> &ClientHandle {
        &self.handle
    }

    /// Process one inbound frame.
    ///
    /// Returns `true` if the frame changed relay state or was delivered
    /// to a target; `false` means it was dropped or ignored, which is
    /// never surfaced to the client.
    pub fn handle_frame(&mut self, frame: Frame) -> bool {
        if self.state == SessionState::Closed {
            debug!(connection = %self.handle.id(), "Frame after close, ignoring");
            return false;
        }

        match frame {
            Frame::GoOnline(payload) => match self.relay.go_online(&self.handle, &payload) {
                Some(identity) => {
                    self.state = SessionState::Online(identity);
                    true
                }
                None => false,
            },
            Frame::RequestChat(payload) => self.relay.forward(DirectedEvent::ChatRequest, payload),
            Frame::ChatResponse(payload) => self.relay.forward(DirectedEvent::ChatResponse, payload),
            Frame::PrivateMessage(payload) => self.relay.forward(DirectedEvent::Message, payload),
            Frame::Typing(payload) => self.relay.forward(DirectedEvent::Typing, payload),
            Frame::LeaveChat(payload) => self.relay.leave_chat(&payload),
            other => {
                warn!(
                    connection = %self.handle.id(),
                    event = other.event(),
                    "Client sent a server-to-client event, ignoring"
                );
                false
            }
        }
    }

    /// Close the session, removing any directory entry and leaving the
    /// roster. Idempotent: only the first call mutates relay state.
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.relay.detach(self.handle.id());
        self.state = SessionState::Closed;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::ConnectionId;
    use serde_json::json;

    fn session(relay: &Arc<Relay>, id: &str) -> (Session, tokio::sync::mpsc::UnboundedReceiver<Frame>) {
        let (handle, rx) = ClientHandle::channel(ConnectionId::new(id));
        (Session::open(Arc::clone(relay), handle), rx)
    }

    #[test]
    fn test_lifecycle_transitions() {
        let relay = Arc::new(Relay::new());
        let (mut session, _rx) = session(&relay, "c1");

        assert_eq!(*session.state(), SessionState::Anonymous);

        assert!(session.handle_frame(Frame::go_online("a@x.com")));
        assert_eq!(
            *session.state(),
            SessionState::Online(Identity::parse("a@x.com").unwrap())
        );

        session.close();
        assert_eq!(*session.state(), SessionState::Closed);
        assert_eq!(relay.stats().connections, 0);
        assert_eq!(relay.stats().online, 0);
    }

    #[test]
    fn test_invalid_go_online_keeps_anonymous() {
        let relay = Arc::new(Relay::new());
        let (mut session, _rx) = session(&relay, "c1");

        assert!(!session.handle_frame(Frame::GoOnline(json!({ "email": " " }))));
        assert_eq!(*session.state(), SessionState::Anonymous);
        assert_eq!(relay.stats().online, 0);
    }

    #[test]
    fn test_repeated_go_online_changes_identity() {
        let relay = Arc::new(Relay::new());
        let (mut session, _rx) = session(&relay, "c1");

        session.handle_frame(Frame::go_online("old@x.com"));
        session.handle_frame(Frame::go_online("new@x.com"));

        assert_eq!(
            *session.state(),
            SessionState::Online(Identity::parse("new@x.com").unwrap())
        );
        assert_eq!(relay.stats().online, 1);
    }

    #[test]
    fn test_close_idempotent() {
        let relay = Arc::new(Relay::new());
        let (mut session, _rx) = session(&relay, "c1");
        session.handle_frame(Frame::go_online("a@x.com"));

        session.close();
        session.close();
        assert_eq!(relay.stats().online, 0);

        // Frames after close are ignored without touching the relay
        assert!(!session.handle_frame(Frame::go_online("a@x.com")));
        assert_eq!(relay.stats().online, 0);
    }

    #[test]
    fn test_drop_detaches() {
        let relay = Arc::new(Relay::new());
        {
            let (mut session, _rx) = session(&relay, "c1");
            session.handle_frame(Frame::go_online("a@x.com"));
            assert_eq!(relay.stats().online, 1);
        }
        assert_eq!(relay.stats().online, 0);
        assert_eq!(relay.stats().connections, 0);
    }

    #[test]
    fn test_server_event_from_client_ignored() {
        let relay = Arc::new(Relay::new());
        let (mut session, _rx) = session(&relay, "c1");

        assert!(!session.handle_frame(Frame::online_list(vec!["x@y.com".into()])));
        assert!(!session.handle_frame(Frame::NewMessage(json!({ "to": "a@x.com" }))));
    }
}
