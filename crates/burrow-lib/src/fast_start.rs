//! One-call tunnel startup

use burrow_proto::TunnelConfig;
use burrow_transport::{Tunnel, TunnelError, TunnelRegistry, TunnelResult};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{info, warn};

/// Construct the tunnel for `config.protocol`, start it on its own task and
/// wait until the local listener is ready.
///
/// The returned tunnel keeps running until [`Tunnel::stop`] is called.
pub async fn fast_start(
    registry: &TunnelRegistry,
    config: &TunnelConfig,
) -> TunnelResult<Arc<dyn Tunnel>> {
    let factory = registry.lookup(&config.protocol)?;
    let tunnel = factory(config)?;

    let (ready_tx, ready_rx) = oneshot::channel();
    tokio::spawn(tunnel.clone().start(ready_tx));

    match ready_rx.await {
        Ok(true) => {
            info!(
                "Tunnel {} ready: {} -> {}",
                tunnel.name(),
                tunnel.local_endpoint(),
                tunnel.remote_endpoint()
            );
            Ok(tunnel)
        }
        Ok(false) | Err(_) => {
            warn!("Tunnel {} failed to start", tunnel.name());
            Err(TunnelError::BindFailed {
                address: tunnel.local_endpoint(),
                reason: "local listener could not be bound".to_string(),
            })
        }
    }
}
