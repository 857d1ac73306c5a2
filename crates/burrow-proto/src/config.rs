//! Tunnel configuration

use crate::endpoint::{split_host_port, split_protocol, ConfigError};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;

/// Username/secret pair used to authenticate against the intermediary
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }
}

impl Clone for Credentials {
    fn clone(&self) -> Self {
        Self {
            username: self.username.clone(),
            password: SecretString::from(self.password.expose_secret().to_owned()),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Description of one tunnel
///
/// Built once, never mutated, and handed to a factory by reference.
#[derive(Debug, Clone)]
pub struct TunnelConfig {
    /// Tunnel protocol, selects the factory (e.g. `SSH`)
    pub protocol: String,

    /// Intermediary `host[:port]`, or a bare port number
    pub tunnel_endpoint: String,

    pub credentials: Credentials,

    /// Final destination host, as seen from the intermediary
    pub remote_addr: String,

    pub remote_port: u16,

    /// Protocol carried through the tunnel, only used to compose endpoint URIs
    pub tunneled_protocol: String,
}

impl TunnelConfig {
    /// Build a configuration from a destination string such as
    /// `https://10.0.0.5:8443` or `10.0.0.5` (defaults to `http` on port 80)
    pub fn build(
        protocol: impl Into<String>,
        tunnel_endpoint: impl Into<String>,
        dest_endpoint: &str,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let (tunneled_protocol, remote) = split_protocol(dest_endpoint);
        let (remote_addr, remote_port) = split_host_port(remote, tunneled_protocol)?;

        Ok(Self {
            protocol: protocol.into(),
            tunnel_endpoint: tunnel_endpoint.into(),
            credentials: Credentials::new(username, password),
            remote_addr,
            remote_port,
            tunneled_protocol: tunneled_protocol.to_string(),
        })
    }
}
