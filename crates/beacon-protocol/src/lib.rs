//! # beacon-protocol
//!
//! Wire protocol definitions for the Beacon chat relay.
//!
//! This crate defines the frames exchanged between clients and the relay,
//! and the length-prefixed MessagePack codec used to put them on the wire.
//!
//! ## Events
//!
//! - `go-online` - register an identity for this connection
//! - `request-chat` / `chat-response` - chat handshake, forwarded 1:1
//! - `private-message` / `typing` / `leave-chat` - in-chat events
//! - `update-online-list` - full-snapshot presence broadcast
//!
//! ## Example
//!
//! ```rust
//! use beacon_protocol::{codec, Frame};
//!
//! let frame = Frame::go_online("alice@example.com");
//!
//! let encoded = codec::encode(&frame).unwrap();
//! let decoded = codec::decode(&encoded).unwrap();
//! assert_eq!(frame, decoded);
//! ```

pub mod codec;
pub mod frames;

pub use codec::{decode, encode, ProtocolError};
pub use frames::Frame;
