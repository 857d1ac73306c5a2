//! SSH client configuration

use std::sync::Arc;
use std::time::Duration;

/// Tunables of the SSH client used for every session
#[derive(Debug, Clone)]
pub struct SshSettings {
    /// Disable Nagle on the connection to the intermediary
    pub nodelay: bool,

    /// Interval between keepalive requests, `None` disables them
    pub keepalive_interval: Option<Duration>,

    /// Unanswered keepalives before the session is dropped
    pub keepalive_max: usize,

    /// Close sessions idle for this long, `None` never does
    pub inactivity_timeout: Option<Duration>,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            nodelay: true,
            keepalive_interval: Some(Duration::from_secs(30)),
            keepalive_max: 3,
            inactivity_timeout: None,
        }
    }
}

impl SshSettings {
    pub fn with_keepalive(mut self, interval: Option<Duration>, max: usize) -> Self {
        self.keepalive_interval = interval;
        self.keepalive_max = max;
        self
    }

    pub fn with_inactivity_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.inactivity_timeout = timeout;
        self
    }

    pub(crate) fn client_config(&self) -> Arc<russh::client::Config> {
        Arc::new(russh::client::Config {
            nodelay: self.nodelay,
            inactivity_timeout: self.inactivity_timeout,
            keepalive_interval: self.keepalive_interval,
            keepalive_max: self.keepalive_max,
            ..Default::default()
        })
    }
}
