//! Frame types for the Beacon relay protocol.
//!
//! Every frame on the wire is a named event plus an optional JSON payload,
//! serialized with MessagePack. Client-to-server events carry the sender's
//! intent (go online, request a chat, send a message); server-to-client
//! events are the forwarded counterparts plus the full online-list
//! broadcast.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A protocol frame.
///
/// Frames are adjacently tagged: `{ "event": <name>, "data": <payload> }`.
/// Directed payloads carry a `to` field naming the target identity; the
/// relay forwards the payload unmodified under the mapped outbound event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum Frame {
    /// Register an identity for this connection.
    ///
    /// Payload is either `{ "email": "..." }` or a bare string.
    #[serde(rename = "go-online")]
    GoOnline(Value),

    /// Ask a peer to start a chat. Forwarded as `chat-requested`.
    #[serde(rename = "request-chat")]
    RequestChat(Value),

    /// Answer a chat request. Forwarded as `start-chat-confirmed`.
    #[serde(rename = "chat-response")]
    ChatResponse(Value),

    /// Send a message to a peer. Forwarded as `new-message`.
    #[serde(rename = "private-message")]
    PrivateMessage(Value),

    /// Typing indicator. Forwarded as `friend-typing`.
    #[serde(rename = "typing")]
    Typing(Value),

    /// End the current chat. Payload is the peer's identity string.
    #[serde(rename = "leave-chat")]
    LeaveChat(Value),

    /// A peer wants to chat with you.
    #[serde(rename = "chat-requested")]
    ChatRequested(Value),

    /// A peer answered your chat request.
    #[serde(rename = "start-chat-confirmed")]
    StartChatConfirmed(Value),

    /// A peer sent you a message.
    #[serde(rename = "new-message")]
    NewMessage(Value),

    /// A peer is typing.
    #[serde(rename = "friend-typing")]
    FriendTyping(Value),

    /// Your chat partner left. Carries no payload.
    #[serde(rename = "chat-ended-by-friend")]
    ChatEndedByFriend,

    /// Full snapshot of all online identities. Sent to every open
    /// connection whenever directory membership changes; clients treat
    /// each broadcast as authoritative full state, not a diff.
    #[serde(rename = "update-online-list")]
    UpdateOnlineList(Vec<String>),
}

impl Frame {
    /// Get the wire event name for this frame.
    #[must_use]
    pub fn event(&self) -> &'static str {
        match self {
            Frame::GoOnline(_) => "go-online",
            Frame::RequestChat(_) => "request-chat",
            Frame::ChatResponse(_) => "chat-response",
            Frame::PrivateMessage(_) => "private-message",
            Frame::Typing(_) => "typing",
            Frame::LeaveChat(_) => "leave-chat",
            Frame::ChatRequested(_) => "chat-requested",
            Frame::StartChatConfirmed(_) => "start-chat-confirmed",
            Frame::NewMessage(_) => "new-message",
            Frame::FriendTyping(_) => "friend-typing",
            Frame::ChatEndedByFriend => "chat-ended-by-friend",
            Frame::UpdateOnlineList(_) => "update-online-list",
        }
    }

    /// Whether this frame is one a client sends to the server.
    #[must_use]
    pub fn is_inbound(&self) -> bool {
        matches!(
            self,
            Frame::GoOnline(_)
                | Frame::RequestChat(_)
                | Frame::ChatResponse(_)
                | Frame::PrivateMessage(_)
                | Frame::Typing(_)
                | Frame::LeaveChat(_)
        )
    }

    /// Create a `go-online` frame for the given email.
    #[must_use]
    pub fn go_online(email: impl Into<String>) -> Self {
        Frame::GoOnline(serde_json::json!({ "email": email.into() }))
    }

    /// Create a `leave-chat` frame addressed to the given identity.
    #[must_use]
    pub fn leave_chat(identity: impl Into<String>) -> Self {
        Frame::LeaveChat(Value::String(identity.into()))
    }

    /// Create an `update-online-list` broadcast frame.
    #[must_use]
    pub fn online_list(identities: Vec<String>) -> Self {
        Frame::UpdateOnlineList(identities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_names() {
        assert_eq!(Frame::go_online("a@x.com").event(), "go-online");
        assert_eq!(Frame::ChatEndedByFriend.event(), "chat-ended-by-friend");
        assert_eq!(Frame::online_list(vec![]).event(), "update-online-list");
    }

    #[test]
    fn test_inbound_classification() {
        assert!(Frame::go_online("a@x.com").is_inbound());
        assert!(Frame::leave_chat("a@x.com").is_inbound());
        assert!(!Frame::ChatEndedByFriend.is_inbound());
        assert!(!Frame::NewMessage(json!({})).is_inbound());
    }

    #[test]
    fn test_directed_payload_passthrough() {
        let payload = json!({ "to": "b@x.com", "text": "hi" });
        let frame = Frame::PrivateMessage(payload.clone());
        match frame {
            Frame::PrivateMessage(p) => assert_eq!(p, payload),
            _ => unreachable!(),
        }
    }
}
