//! Secure-channel seam
//!
//! The forwarding engine never speaks a tunnel protocol itself. It asks a
//! [`SecureChannel`] for an authenticated session to the intermediary and
//! asks that session for byte streams to the final destination.

use crate::error::ChannelResult;
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};

/// Byte stream reached through a session
pub trait ForwardStreamIo: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> ForwardStreamIo for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

pub type ForwardStream = Box<dyn ForwardStreamIo>;

/// Establishes authenticated sessions to one intermediary endpoint
#[async_trait]
pub trait SecureChannel: Send + Sync + 'static {
    /// `host:port` of the intermediary, for logging
    fn endpoint(&self) -> &str;

    /// Perform the handshake and authentication, yielding a new session
    async fn connect(&self) -> ChannelResult<Arc<dyn ChannelSession>>;
}

/// An established secure-channel session
#[async_trait]
pub trait ChannelSession: Send + Sync {
    /// Open a byte stream to `host:port` through this session
    async fn open_stream(
        &self,
        host: &str,
        port: u16,
        origin: SocketAddr,
    ) -> ChannelResult<ForwardStream>;

    /// Close the session. Closing an already closed session is a no-op.
    async fn close(&self);

    fn is_closed(&self) -> bool;
}
