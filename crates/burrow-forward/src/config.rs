//! Forwarding engine configuration

use rand::Rng;

/// Inclusive lower bound of the random local port range
pub const MIN_LOCAL_PORT: u16 = 50000;

/// Exclusive upper bound of the random local port range
pub const MAX_LOCAL_PORT: u16 = 65000;

const DEFAULT_BIND_HOST: &str = "127.0.0.1";
const DEFAULT_BUFFER_SIZE: usize = 16 * 1024;

/// Pick a local listen port uniformly from `[MIN_LOCAL_PORT, MAX_LOCAL_PORT)`
pub fn random_local_port() -> u16 {
    rand::thread_rng().gen_range(MIN_LOCAL_PORT..MAX_LOCAL_PORT)
}

/// Where the engine listens and where it forwards to
#[derive(Debug, Clone)]
pub struct ForwardingSettings {
    /// Host the local listener binds
    pub bind_host: String,

    /// Local listener port, chosen once and never re-picked
    pub local_port: u16,

    /// Final destination host, as seen from the intermediary
    pub remote_host: String,

    pub remote_port: u16,

    /// Carried protocol, only used to compose endpoint URIs
    pub tunneled_protocol: String,

    /// Per-direction copy buffer size
    pub buffer_size: usize,
}

impl ForwardingSettings {
    /// Settings with a freshly chosen random local port
    pub fn new(
        remote_host: impl Into<String>,
        remote_port: u16,
        tunneled_protocol: impl Into<String>,
    ) -> Self {
        Self {
            bind_host: DEFAULT_BIND_HOST.to_string(),
            local_port: random_local_port(),
            remote_host: remote_host.into(),
            remote_port,
            tunneled_protocol: tunneled_protocol.into(),
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }

    pub fn with_bind_host(mut self, bind_host: impl Into<String>) -> Self {
        self.bind_host = bind_host.into();
        self
    }

    pub fn with_local_port(mut self, local_port: u16) -> Self {
        self.local_port = local_port;
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(1);
        self
    }

    pub fn local_address(&self) -> String {
        format!("{}:{}", self.bind_host, self.local_port)
    }

    pub fn remote_address(&self) -> String {
        format!("{}:{}", self.remote_host, self.remote_port)
    }
}
