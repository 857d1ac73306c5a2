//! `russh`-backed secure channel

use crate::config::SshSettings;
use async_trait::async_trait;
use burrow_proto::Credentials;
use burrow_transport::{ChannelError, ChannelResult, ChannelSession, ForwardStream, SecureChannel};
use russh::client;
use russh::keys::{HashAlg, PublicKey};
use russh::Disconnect;
use secrecy::ExposeSecret;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Client handler that accepts any host key presented by the intermediary
struct AcceptAnyHostKey {
    endpoint: String,
}

impl client::Handler for AcceptAnyHostKey {
    type Error = russh::Error;

    async fn check_server_key(&mut self, server_public_key: &PublicKey) -> Result<bool, Self::Error> {
        debug!(
            endpoint = %self.endpoint,
            algo = %server_public_key.algorithm(),
            fp = %server_public_key.fingerprint(HashAlg::Sha256),
            "accepting tunnel endpoint host key without verification"
        );
        Ok(true)
    }
}

/// Opens password-authenticated SSH sessions to one intermediary
pub struct SshChannel {
    endpoint: String,
    host: String,
    port: u16,
    credentials: Credentials,
    config: Arc<client::Config>,
}

impl SshChannel {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        credentials: Credentials,
        settings: &SshSettings,
    ) -> Self {
        let host = host.into();
        Self {
            endpoint: format!("{}:{}", host, port),
            host,
            port,
            credentials,
            config: settings.client_config(),
        }
    }

    fn connect_error(&self, err: impl ToString) -> ChannelError {
        ChannelError::Connect {
            endpoint: self.endpoint.clone(),
            reason: err.to_string(),
        }
    }
}

#[async_trait]
impl SecureChannel for SshChannel {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn connect(&self) -> ChannelResult<Arc<dyn ChannelSession>> {
        debug!("Connecting to SSH server {}", self.endpoint);
        let handler = AcceptAnyHostKey {
            endpoint: self.endpoint.clone(),
        };
        let mut handle = client::connect(self.config.clone(), (self.host.as_str(), self.port), handler)
            .await
            .map_err(|e| self.connect_error(e))?;

        let auth = handle
            .authenticate_password(
                self.credentials.username.clone(),
                self.credentials.password.expose_secret().to_string(),
            )
            .await
            .map_err(|e| self.connect_error(e))?;
        if !auth.success() {
            let _ = handle
                .disconnect(Disconnect::ByApplication, "authentication failed", "en")
                .await;
            return Err(ChannelError::AuthenticationRejected {
                username: self.credentials.username.clone(),
            });
        }

        info!(
            "SSH session established to {} as {}",
            self.endpoint, self.credentials.username
        );
        Ok(Arc::new(SshSession {
            handle,
            closed: AtomicBool::new(false),
        }))
    }
}

/// One authenticated SSH connection
struct SshSession {
    handle: client::Handle<AcceptAnyHostKey>,
    closed: AtomicBool,
}

#[async_trait]
impl ChannelSession for SshSession {
    async fn open_stream(
        &self,
        host: &str,
        port: u16,
        origin: SocketAddr,
    ) -> ChannelResult<ForwardStream> {
        if self.is_closed() {
            return Err(ChannelError::Closed);
        }
        let channel = self
            .handle
            .channel_open_direct_tcpip(
                host,
                u32::from(port),
                origin.ip().to_string(),
                u32::from(origin.port()),
            )
            .await
            .map_err(|e| ChannelError::Dial {
                target: format!("{}:{}", host, port),
                reason: e.to_string(),
            })?;
        Ok(Box::new(channel.into_stream()))
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(err) = self
            .handle
            .disconnect(Disconnect::ByApplication, "tunnel closed", "en")
            .await
        {
            debug!(?err, "SSH session already gone while disconnecting");
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.handle.is_closed()
    }
}
