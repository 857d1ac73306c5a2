//! Endpoint string parsing
//!
//! Splits `[protocol://]host[:port]` strings into their components. Missing
//! ports are filled from a static table of well-known protocol ports.

use std::fmt;
use thiserror::Error;

/// Protocol assumed when an endpoint string carries no `protocol://` prefix
pub const DEFAULT_PROTOCOL: &str = "http";

const DEFAULT_PROTOCOL_PORTS: &[(&str, u16)] = &[("http", 80), ("https", 443)];

/// Configuration errors raised while parsing endpoints
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("could not get default port for protocol {protocol}")]
    MissingDefaultPort { protocol: String },

    #[error("empty address/hostname provided")]
    EmptyHost,

    #[error("empty port provided")]
    EmptyPort,

    #[error("invalid endpoint provided: {endpoint}")]
    InvalidPort { endpoint: String },
}

/// A parsed `protocol://host:port` triple
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub protocol: String,
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    /// `host:port` without the protocol prefix
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.protocol, self.host, self.port)
    }
}

/// Look up the well-known port of a protocol (case-insensitive)
pub fn default_port(protocol: &str) -> Option<u16> {
    let protocol = protocol.to_ascii_lowercase();
    DEFAULT_PROTOCOL_PORTS
        .iter()
        .find(|(name, _)| *name == protocol)
        .map(|(_, port)| *port)
}

/// Split an optional `protocol://` prefix from an endpoint string
///
/// # Examples
///
/// ```
/// use burrow_proto::split_protocol;
///
/// assert_eq!(split_protocol("https://10.10.10.10:8888"), ("https", "10.10.10.10:8888"));
/// assert_eq!(split_protocol("10.10.10.10:8888"), ("http", "10.10.10.10:8888"));
/// ```
pub fn split_protocol(endpoint: &str) -> (&str, &str) {
    match endpoint.split_once("://") {
        Some((protocol, rest)) => (protocol, rest),
        None => (DEFAULT_PROTOCOL, endpoint),
    }
}

/// Split `host[:port]`, substituting the default port of `protocol` when the
/// port is missing
pub fn split_host_port(addr: &str, protocol: &str) -> Result<(String, u16), ConfigError> {
    let (host, port) = match addr.split_once(':') {
        Some((host, port)) => (host, port.to_string()),
        None => {
            let port = default_port(protocol).ok_or_else(|| ConfigError::MissingDefaultPort {
                protocol: protocol.to_string(),
            })?;
            (addr, port.to_string())
        }
    };

    if host.is_empty() {
        return Err(ConfigError::EmptyHost);
    }
    if port.is_empty() {
        return Err(ConfigError::EmptyPort);
    }

    let port = port.parse::<u16>().map_err(|_| ConfigError::InvalidPort {
        endpoint: addr.to_string(),
    })?;

    Ok((host.to_string(), port))
}

/// Parse `[protocol://]host[:port]` into an [`Endpoint`]
///
/// Only hostnames and IPv4 literals are supported. Nothing is resolved here.
pub fn resolve_endpoint(endpoint: &str) -> Result<Endpoint, ConfigError> {
    let (protocol, addr) = split_protocol(endpoint);
    let (host, port) = split_host_port(addr, protocol)?;
    Ok(Endpoint {
        protocol: protocol.to_string(),
        host,
        port,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ports() {
        assert_eq!(default_port("http"), Some(80));
        assert_eq!(default_port("https"), Some(443));
        assert_eq!(default_port("HTTPS"), Some(443));
        assert_eq!(default_port("ftp"), None);
    }

    #[test]
    fn test_resolve_without_protocol_or_port() {
        let endpoint = resolve_endpoint("192.168.1.111").unwrap();
        assert_eq!(endpoint.protocol, "http");
        assert_eq!(endpoint.host, "192.168.1.111");
        assert_eq!(endpoint.port, 80);
    }

    #[test]
    fn test_resolve_https_default_port() {
        let endpoint = resolve_endpoint("https://example.com").unwrap();
        assert_eq!(endpoint.protocol, "https");
        assert_eq!(endpoint.port, 443);
        assert_eq!(endpoint.to_string(), "https://example.com:443");
    }

    #[test]
    fn test_resolve_explicit_port() {
        let endpoint = resolve_endpoint("https://10.10.10.10:8888").unwrap();
        assert_eq!(endpoint.host, "10.10.10.10");
        assert_eq!(endpoint.port, 8888);
        assert_eq!(endpoint.authority(), "10.10.10.10:8888");
    }

    #[test]
    fn test_unknown_protocol_needs_port() {
        let err = resolve_endpoint("redis://cache").unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingDefaultPort {
                protocol: "redis".to_string()
            }
        );

        let endpoint = resolve_endpoint("redis://cache:6379").unwrap();
        assert_eq!(endpoint.port, 6379);
    }

    #[test]
    fn test_empty_host_and_port() {
        assert_eq!(resolve_endpoint(":8080").unwrap_err(), ConfigError::EmptyHost);
        assert_eq!(resolve_endpoint("http://").unwrap_err(), ConfigError::EmptyHost);
        assert_eq!(resolve_endpoint("host:").unwrap_err(), ConfigError::EmptyPort);
    }

    #[test]
    fn test_invalid_port() {
        assert!(matches!(
            resolve_endpoint("host:http").unwrap_err(),
            ConfigError::InvalidPort { .. }
        ));
        assert!(matches!(
            resolve_endpoint("host:70000").unwrap_err(),
            ConfigError::InvalidPort { .. }
        ));
    }
}
