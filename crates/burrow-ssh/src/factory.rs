//! `SSH` tunnel factory

use crate::channel::SshChannel;
use crate::config::SshSettings;
use burrow_forward::{ForwardingSettings, ForwardingTunnel};
use burrow_proto::{split_host_port, ConfigError, TunnelConfig};
use burrow_transport::{Tunnel, TunnelRegistry, TunnelResult};
use std::sync::Arc;

/// Registry name of the SSH tunnel protocol
pub const SSH_PROTOCOL: &str = "SSH";

/// Port used when the tunnel endpoint names no port
pub const SSH_DEFAULT_PORT: u16 = 22;

/// Resolve the SSH server `(host, port)` from `config.tunnel_endpoint`
///
/// A bare port number means the SSH server runs on the destination host.
pub fn resolve_intermediary(config: &TunnelConfig) -> Result<(String, u16), ConfigError> {
    let endpoint = config.tunnel_endpoint.trim();
    if let Ok(port) = endpoint.parse::<u16>() {
        if config.remote_addr.is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        return Ok((config.remote_addr.clone(), port));
    }

    let addr = endpoint
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(endpoint);
    if addr.contains(':') {
        split_host_port(addr, "ssh")
    } else if addr.is_empty() {
        Err(ConfigError::EmptyHost)
    } else {
        Ok((addr.to_string(), SSH_DEFAULT_PORT))
    }
}

/// The destination as seen from the SSH server: itself becomes `localhost`
pub fn relative_remote_addr(ssh_host: &str, remote_addr: &str) -> String {
    if ssh_host == remote_addr {
        "localhost".to_string()
    } else {
        remote_addr.to_string()
    }
}

/// Build a forwarding tunnel dialing through SSH
pub fn build_ssh_tunnel(
    config: &TunnelConfig,
    settings: &SshSettings,
) -> TunnelResult<ForwardingTunnel> {
    let (ssh_host, ssh_port) = resolve_intermediary(config)?;
    let remote_host = relative_remote_addr(&ssh_host, &config.remote_addr);

    let channel = SshChannel::new(ssh_host, ssh_port, config.credentials.clone(), settings);
    let forwarding = ForwardingSettings::new(
        remote_host,
        config.remote_port,
        config.tunneled_protocol.clone(),
    );

    Ok(ForwardingTunnel::new(
        config.protocol.clone(),
        forwarding,
        Arc::new(channel),
    ))
}

/// Factory registered under [`SSH_PROTOCOL`]
pub fn ssh_tunnel_factory(config: &TunnelConfig) -> TunnelResult<Arc<dyn Tunnel>> {
    let tunnel = build_ssh_tunnel(config, &SshSettings::default())?;
    Ok(Arc::new(tunnel))
}

/// Install the SSH factory, using `settings` for every tunnel it builds
pub fn register(registry: &TunnelRegistry, settings: SshSettings) {
    registry.register(SSH_PROTOCOL, move |config: &TunnelConfig| {
        let tunnel = build_ssh_tunnel(config, &settings)?;
        Ok(Arc::new(tunnel) as Arc<dyn Tunnel>)
    });
}
