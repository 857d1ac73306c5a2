//! Connection forwarding engine
//!
//! Listens on a local port and forwards every accepted connection through a
//! secure channel to a fixed remote destination. Every socket and session the
//! engine opens is tracked so that [`Tunnel::stop`] can release all of them.
//!
//! [`Tunnel::stop`]: burrow_transport::Tunnel::stop

mod config;
mod forwarder;
mod tracker;

pub use config::{random_local_port, ForwardingSettings, MAX_LOCAL_PORT, MIN_LOCAL_PORT};
pub use forwarder::{ForwardingStats, ForwardingTunnel};
pub use tracker::{ResourceKind, ResourceTracker, TrackedResource};
