//! SSH tunnel protocol
//!
//! Implements the secure channel on top of `russh`: each session is an
//! authenticated SSH connection to the intermediary, and destination streams
//! are `direct-tcpip` channels opened through it. [`register`] installs the
//! `SSH` factory into a [`TunnelRegistry`].
//!
//! [`TunnelRegistry`]: burrow_transport::TunnelRegistry

mod channel;
mod config;
mod factory;

pub use channel::SshChannel;
pub use config::SshSettings;
pub use factory::{
    build_ssh_tunnel, register, relative_remote_addr, resolve_intermediary, ssh_tunnel_factory,
    SSH_DEFAULT_PORT, SSH_PROTOCOL,
};
