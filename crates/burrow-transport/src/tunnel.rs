use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Lifecycle of a tunnel instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelState {
    /// Configured, local port chosen, not listening yet
    Constructed,
    /// Listener bound and accepting
    Listening,
    /// Shutdown requested, resources being released
    Stopping,
    /// Terminal
    Stopped,
}

impl fmt::Display for TunnelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TunnelState::Constructed => "constructed",
            TunnelState::Listening => "listening",
            TunnelState::Stopping => "stopping",
            TunnelState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Capability contract of a running tunnel
#[async_trait]
pub trait Tunnel: Send + Sync {
    fn name(&self) -> &str;

    /// Bind the local endpoint and serve connections until stopped.
    ///
    /// Must run as its own task. Delivers exactly one readiness value on
    /// `ready`: `true` once listening, `false` if the bind failed.
    async fn start(self: Arc<Self>, ready: oneshot::Sender<bool>);

    /// Release every resource the tunnel opened. Safe to call repeatedly.
    async fn stop(&self);

    /// `carried-protocol://host:port` clients connect to
    fn local_endpoint(&self) -> String;

    /// `carried-protocol://host:port` of the final destination
    fn remote_endpoint(&self) -> String;

    fn state(&self) -> TunnelState;
}
