//! Tunnel configuration types
//!
//! This crate defines the value types shared by every tunnel implementation:
//! endpoint parsing with default-port substitution and the immutable
//! [`TunnelConfig`] a factory consumes.

pub mod config;
pub mod endpoint;

pub use config::{Credentials, TunnelConfig};
pub use endpoint::{
    default_port, resolve_endpoint, split_host_port, split_protocol, ConfigError, Endpoint,
    DEFAULT_PROTOCOL,
};
