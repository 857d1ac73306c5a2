//! Tests for the tunnel abstraction layer

use super::*;
use async_trait::async_trait;
use burrow_proto::TunnelConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;

/// Mock tunnel that is always ready and never listens
struct MockTunnel {
    name: String,
    remote: String,
    stopped: AtomicBool,
}

#[async_trait]
impl Tunnel for MockTunnel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(self: Arc<Self>, ready: oneshot::Sender<bool>) {
        let _ = ready.send(true);
    }

    async fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn local_endpoint(&self) -> String {
        "http://127.0.0.1:50000".to_string()
    }

    fn remote_endpoint(&self) -> String {
        self.remote.clone()
    }

    fn state(&self) -> TunnelState {
        if self.stopped.load(Ordering::SeqCst) {
            TunnelState::Stopped
        } else {
            TunnelState::Constructed
        }
    }
}

fn mock_factory(config: &TunnelConfig) -> TunnelResult<Arc<dyn Tunnel>> {
    Ok(Arc::new(MockTunnel {
        name: config.protocol.clone(),
        remote: format!(
            "{}://{}:{}",
            config.tunneled_protocol, config.remote_addr, config.remote_port
        ),
        stopped: AtomicBool::new(false),
    }))
}

fn config(protocol: &str) -> TunnelConfig {
    TunnelConfig::build(protocol, "10.0.0.1:22", "10.0.0.2:8080", "user", "pw").unwrap()
}

#[test]
fn test_lookup_unsupported_protocol() {
    let registry = TunnelRegistry::new();
    match registry.lookup("SSH") {
        Err(TunnelError::UnsupportedProtocol(name)) => assert_eq!(name, "SSH"),
        Err(e) => panic!("unexpected error: {}", e),
        Ok(_) => panic!("lookup on empty registry should fail"),
    }
}

#[test]
fn test_register_and_create() {
    let registry = TunnelRegistry::new();
    registry.register("MOCK", mock_factory);

    let tunnel = registry.create(&config("MOCK")).unwrap();
    assert_eq!(tunnel.name(), "MOCK");
    assert_eq!(tunnel.remote_endpoint(), "http://10.0.0.2:8080");
    assert_eq!(tunnel.state(), TunnelState::Constructed);
}

#[test]
fn test_create_unknown_protocol() {
    let registry = TunnelRegistry::new();
    registry.register("MOCK", mock_factory);

    let err = registry.create(&config("SOCKS")).err().unwrap();
    assert_eq!(err.to_string(), "not supported tunnel protocol: SOCKS");
}

#[test]
fn test_protocols_are_sorted() {
    let registry = TunnelRegistry::new();
    registry.register("SSH", mock_factory);
    registry.register("MOCK", mock_factory);
    registry.register("SSH", mock_factory);

    let names: Vec<String> = registry.protocols().into_iter().collect();
    assert_eq!(names, vec!["MOCK".to_string(), "SSH".to_string()]);
}

#[test]
fn test_factory_errors_propagate() {
    let registry = TunnelRegistry::new();
    registry.register("BROKEN", |_config: &TunnelConfig| {
        Err(TunnelError::Config(burrow_proto::ConfigError::EmptyHost))
    });

    let err = registry.create(&config("BROKEN")).err().unwrap();
    assert!(matches!(err, TunnelError::Config(_)));
}

#[tokio::test]
async fn test_mock_tunnel_lifecycle() {
    let registry = TunnelRegistry::new();
    registry.register("MOCK", mock_factory);
    let tunnel = registry.create(&config("MOCK")).unwrap();

    let (tx, rx) = oneshot::channel();
    tokio::spawn(tunnel.clone().start(tx));
    assert!(rx.await.unwrap());

    tunnel.stop().await;
    tunnel.stop().await;
    assert_eq!(tunnel.state(), TunnelState::Stopped);
}

#[test]
fn test_state_display() {
    assert_eq!(TunnelState::Listening.to_string(), "listening");
    assert_eq!(TunnelState::Stopped.to_string(), "stopped");
}

#[test]
fn test_channel_error_display() {
    let err = ChannelError::Dial {
        target: "db:5432".to_string(),
        reason: "refused".to_string(),
    };
    assert_eq!(err.to_string(), "failed to open stream to db:5432: refused");

    let err: TunnelError = err.into();
    assert!(matches!(err, TunnelError::Channel(_)));
}
