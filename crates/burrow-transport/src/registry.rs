//! Tunnel factory registry
//!
//! Built once at process start, each tunnel protocol registering its
//! constructor, then shared read-only. Registration stays available at
//! runtime behind the lock.

use crate::error::{TunnelError, TunnelResult};
use crate::tunnel::Tunnel;
use burrow_proto::TunnelConfig;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Turns a configuration into a runnable tunnel
pub type TunnelFactory =
    Arc<dyn Fn(&TunnelConfig) -> TunnelResult<Arc<dyn Tunnel>> + Send + Sync>;

/// Maps tunnel protocol names to their factories
#[derive(Default)]
pub struct TunnelRegistry {
    factories: RwLock<HashMap<String, TunnelFactory>>,
}

impl TunnelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory, replacing any previous one under the same name
    pub fn register<F>(&self, protocol: impl Into<String>, factory: F)
    where
        F: Fn(&TunnelConfig) -> TunnelResult<Arc<dyn Tunnel>> + Send + Sync + 'static,
    {
        let protocol = protocol.into();
        debug!("Registering tunnel protocol {}", protocol);
        self.factories
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(protocol, Arc::new(factory));
    }

    pub fn lookup(&self, protocol: &str) -> TunnelResult<TunnelFactory> {
        self.factories
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(protocol)
            .cloned()
            .ok_or_else(|| TunnelError::UnsupportedProtocol(protocol.to_string()))
    }

    /// Look up the factory for `config.protocol` and construct the tunnel
    pub fn create(&self, config: &TunnelConfig) -> TunnelResult<Arc<dyn Tunnel>> {
        let factory = self.lookup(&config.protocol)?;
        factory(config)
    }

    /// Names of all registered protocols, sorted
    pub fn protocols(&self) -> BTreeSet<String> {
        self.factories
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }
}
