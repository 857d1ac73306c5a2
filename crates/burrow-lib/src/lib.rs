//! Burrow - forward local TCP ports through authenticated tunnels
//!
//! This library re-exports the tunnel crates and adds the conveniences most
//! applications need: a registry preloaded with every built-in tunnel
//! protocol and [`fast_start`], which brings a tunnel up in one call.
//!
//! # Quick Start
//!
//! ```ignore
//! use burrow_lib::{default_registry, fast_start, TunnelConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = TunnelConfig::build(
//!         "SSH",
//!         "10.50.122.50:22",
//!         "http://192.168.1.111:80",
//!         "root",
//!         "password",
//!     )?;
//!
//!     let registry = default_registry();
//!     let tunnel = fast_start(&registry, &config).await?;
//!     println!("Local endpoint: {}", tunnel.local_endpoint());
//!
//!     tokio::signal::ctrl_c().await?;
//!     tunnel.stop().await;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **`burrow-proto`**: endpoint parsing and `TunnelConfig`
//! - **`burrow-transport`**: the `Tunnel` contract, secure-channel traits, `TunnelRegistry`
//! - **`burrow-forward`**: the connection forwarding engine
//! - **`burrow-ssh`**: SSH secure channel and the `SSH` factory

// Re-export configuration types
pub use burrow_proto::{
    default_port, resolve_endpoint, split_host_port, ConfigError, Credentials, Endpoint,
    TunnelConfig,
};

// Re-export the tunnel contract
pub use burrow_transport::{
    ChannelError, ChannelSession, ForwardStream, SecureChannel, Tunnel, TunnelError,
    TunnelFactory, TunnelRegistry, TunnelResult, TunnelState,
};

// Re-export the forwarding engine (for custom secure channels)
pub use burrow_forward::{
    random_local_port, ForwardingSettings, ForwardingStats, ForwardingTunnel, ResourceKind,
    MAX_LOCAL_PORT, MIN_LOCAL_PORT,
};

// Re-export the SSH protocol
pub use burrow_ssh::{SshChannel, SshSettings, SSH_PROTOCOL};

mod fast_start;
pub use fast_start::fast_start;

/// Registry with every built-in tunnel protocol registered
pub fn default_registry() -> TunnelRegistry {
    default_registry_with(SshSettings::default())
}

/// Like [`default_registry`], with custom SSH client settings
pub fn default_registry_with(ssh: SshSettings) -> TunnelRegistry {
    let registry = TunnelRegistry::new();
    burrow_ssh::register(&registry, ssh);
    registry
}
