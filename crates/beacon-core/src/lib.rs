//! # beacon-core
//!
//! Presence directory, event routing, and session lifecycle for the
//! Beacon chat relay.
//!
//! This crate provides the fundamental building blocks:
//!
//! - **Identity** - Normalized user-identifying token
//! - **PresenceDirectory** - The identity → connection mapping
//! - **Relay** - Directed-event routing and online-list broadcasts
//! - **Session** - Per-connection lifecycle state machine
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Connection │────▶│   Session   │────▶│    Relay    │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                                                │
//!                                                ▼
//!                                        ┌─────────────┐
//!                                        │  Directory  │
//!                                        └─────────────┘
//! ```
//!
//! The directory is mutated exclusively through sessions and read by the
//! relay's routing path; delivery is best effort, and an event addressed
//! to an offline identity is dropped without notifying the sender.

pub mod directory;
pub mod handle;
pub mod identity;
pub mod relay;
pub mod session;

pub use directory::PresenceDirectory;
pub use handle::{ClientHandle, ConnectionId};
pub use identity::{Identity, IdentityError};
pub use relay::{DirectedEvent, Relay, RelayStats};
pub use session::{Session, SessionState};
