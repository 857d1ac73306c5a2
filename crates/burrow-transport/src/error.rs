use burrow_proto::ConfigError;
use thiserror::Error;

/// Secure-channel errors
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("failed to connect to tunnel endpoint {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },

    #[error("authentication rejected for user {username}")]
    AuthenticationRejected { username: String },

    #[error("failed to open stream to {target}: {reason}")]
    Dial { target: String, reason: String },

    #[error("secure channel closed")]
    Closed,
}

pub type ChannelResult<T> = Result<T, ChannelError>;

/// Tunnel construction and lifecycle errors
#[derive(Debug, Error)]
pub enum TunnelError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("not supported tunnel protocol: {0}")]
    UnsupportedProtocol(String),

    #[error("failed to bind local tunnel endpoint {address}: {reason}")]
    BindFailed { address: String, reason: String },

    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),
}

pub type TunnelResult<T> = Result<T, TunnelError>;
