//! # beacon-server
//!
//! Presence-tracking chat relay server.
//!
//! Exposes the configuration, HTTP/WebSocket handlers, record stores,
//! and metrics used by the `beacon` binary. The relay semantics live in
//! [`beacon_core`]; this crate is the transport and plumbing around
//! them.

pub mod config;
pub mod handlers;
pub mod metrics;
pub mod store;

pub use config::Config;
pub use handlers::{app, run_server, AppState};
