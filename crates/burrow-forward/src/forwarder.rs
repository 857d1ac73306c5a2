//! Forwarding tunnel implementation
//!
//! Listens on the local endpoint. Each accepted connection gets its own
//! pipeline: a secure-channel session to the intermediary, a stream through
//! that session to the destination, and one copy task per direction.

use crate::config::ForwardingSettings;
use crate::tracker::{ResourceTracker, TrackedResource};
use async_trait::async_trait;
use burrow_transport::{SecureChannel, Tunnel, TunnelState};
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Pause after a failed accept before polling the listener again
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Point-in-time counters of a forwarding tunnel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForwardingStats {
    pub accepted: u64,
    pub pipelines_established: u64,
    pub pipelines_failed: u64,
    pub unexpected_failures: u64,
    pub bytes_to_remote: u64,
    pub bytes_to_local: u64,
}

#[derive(Default)]
struct Counters {
    accepted: AtomicU64,
    pipelines_established: AtomicU64,
    pipelines_failed: AtomicU64,
    unexpected_failures: AtomicU64,
    bytes_to_remote: AtomicU64,
    bytes_to_local: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    ToRemote,
    ToLocal,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::ToRemote => f.write_str("local->remote"),
            Direction::ToLocal => f.write_str("remote->local"),
        }
    }
}

enum CopyOutcome {
    /// Reader hit end-of-stream
    Finished(u64),
    /// I/O error on either side
    Failed(io::Error),
    /// One of the pipeline's resources was closed underneath the copy
    Aborted,
}

/// The (local socket, session, remote stream) triple of one connection
struct Pipeline {
    peer: SocketAddr,
    local: Arc<TrackedResource>,
    session: Arc<TrackedResource>,
    remote: Arc<TrackedResource>,
}

impl Pipeline {
    async fn any_closed(&self) {
        tokio::select! {
            _ = self.local.closed() => {}
            _ = self.session.closed() => {}
            _ = self.remote.closed() => {}
        }
    }

    async fn release(&self) {
        self.local.close().await;
        self.remote.close().await;
        self.session.close().await;
    }
}

/// Tunnel that forwards local TCP connections through a [`SecureChannel`]
pub struct ForwardingTunnel {
    name: String,
    settings: ForwardingSettings,
    channel: Arc<dyn SecureChannel>,
    resources: ResourceTracker,
    /// Set before any teardown so concurrent I/O errors are attributed to it
    shutdown_requested: AtomicBool,
    closed: AtomicBool,
    shutdown: CancellationToken,
    tasks: TaskTracker,
    state: Mutex<TunnelState>,
    counters: Counters,
}

impl ForwardingTunnel {
    pub fn new(
        name: impl Into<String>,
        settings: ForwardingSettings,
        channel: Arc<dyn SecureChannel>,
    ) -> Self {
        Self {
            name: name.into(),
            settings,
            channel,
            resources: ResourceTracker::new(),
            shutdown_requested: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            tasks: TaskTracker::new(),
            state: Mutex::new(TunnelState::Constructed),
            counters: Counters::default(),
        }
    }

    pub fn local_port(&self) -> u16 {
        self.settings.local_port
    }

    pub fn settings(&self) -> &ForwardingSettings {
        &self.settings
    }

    pub fn resources(&self) -> &ResourceTracker {
        &self.resources
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> ForwardingStats {
        ForwardingStats {
            accepted: self.counters.accepted.load(Ordering::Relaxed),
            pipelines_established: self.counters.pipelines_established.load(Ordering::Relaxed),
            pipelines_failed: self.counters.pipelines_failed.load(Ordering::Relaxed),
            unexpected_failures: self.counters.unexpected_failures.load(Ordering::Relaxed),
            bytes_to_remote: self.counters.bytes_to_remote.load(Ordering::Relaxed),
            bytes_to_local: self.counters.bytes_to_local.load(Ordering::Relaxed),
        }
    }

    fn set_state(&self, state: TunnelState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    fn transition(&self, from: TunnelState, to: TunnelState) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *state == from {
            *state = to;
            true
        } else {
            false
        }
    }

    async fn accept_loop(self: &Arc<Self>, listener: &TcpListener) {
        loop {
            debug!("Listening on local tunnel endpoint");
            let accepted = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    info!(peer = %peer, "Accepted connection on local tunnel endpoint");
                    self.counters.accepted.fetch_add(1, Ordering::Relaxed);

                    let local = self.resources.track_local();
                    if local.is_closed() {
                        // stop() sealed the tracker between accept and here
                        break;
                    }
                    self.tasks
                        .spawn(self.clone().forward_connection(stream, peer, local));
                }
                Err(e) => {
                    // Transient accept errors never stop the listener
                    warn!("Error accepting local tunnel connection: {}", e);
                    if !self.accept_backoff().await {
                        break;
                    }
                }
            }
        }
    }

    /// Wait out [`ACCEPT_ERROR_BACKOFF`]. Returns false if shutdown arrived first.
    async fn accept_backoff(&self) -> bool {
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => false,
            _ = tokio::time::sleep(ACCEPT_ERROR_BACKOFF) => true,
        }
    }

    async fn forward_connection(
        self: Arc<Self>,
        stream: TcpStream,
        peer: SocketAddr,
        local: Arc<TrackedResource>,
    ) {
        debug!(peer = %peer, "Connecting to tunnel endpoint {}", self.channel.endpoint());
        if let Err(e) = stream.set_nodelay(true) {
            debug!(peer = %peer, "Could not set TCP_NODELAY on local connection: {}", e);
        }

        let channel_session = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {
                local.close().await;
                return;
            }
            result = self.channel.connect() => match result {
                Ok(session) => session,
                Err(e) => {
                    warn!(peer = %peer, "Error connecting to tunnel endpoint: {}", e);
                    self.counters.pipelines_failed.fetch_add(1, Ordering::Relaxed);
                    local.close().await;
                    return;
                }
            },
        };

        let session = self.resources.track_session(channel_session.clone());
        if session.is_closed() {
            session.close().await;
            local.close().await;
            return;
        }

        debug!(
            peer = %peer,
            "Opening stream to {} through tunnel",
            self.settings.remote_address()
        );
        let remote_stream = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {
                local.close().await;
                session.close().await;
                return;
            }
            result = channel_session.open_stream(
                &self.settings.remote_host,
                self.settings.remote_port,
                peer,
            ) => match result {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(peer = %peer, "Error connecting to remote endpoint: {}", e);
                    self.counters.pipelines_failed.fetch_add(1, Ordering::Relaxed);
                    local.close().await;
                    session.close().await;
                    return;
                }
            },
        };

        let remote = self.resources.track_remote();
        let pipeline = Arc::new(Pipeline {
            peer,
            local,
            session,
            remote,
        });
        if pipeline.remote.is_closed() {
            pipeline.release().await;
            return;
        }

        self.counters
            .pipelines_established
            .fetch_add(1, Ordering::Relaxed);
        info!(peer = %peer, "Opened remote connection through tunnel, start forward traffic");

        let (local_read, local_write) = stream.into_split();
        let (remote_read, remote_write) = tokio::io::split(remote_stream);

        self.tasks.spawn(self.clone().copy_direction(
            local_read,
            remote_write,
            Direction::ToRemote,
            pipeline.clone(),
        ));
        self.tasks.spawn(self.clone().copy_direction(
            remote_read,
            local_write,
            Direction::ToLocal,
            pipeline,
        ));
    }

    async fn copy_direction<R, W>(
        self: Arc<Self>,
        mut reader: R,
        mut writer: W,
        direction: Direction,
        pipeline: Arc<Pipeline>,
    ) where
        R: AsyncRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send,
    {
        let outcome = tokio::select! {
            result = self.pump(&mut reader, &mut writer, direction) => match result {
                Ok(bytes) => CopyOutcome::Finished(bytes),
                Err(e) => CopyOutcome::Failed(e),
            },
            _ = pipeline.any_closed() => CopyOutcome::Aborted,
        };

        match outcome {
            CopyOutcome::Finished(bytes) => {
                debug!(peer = %pipeline.peer, "{} reached end of stream after {} bytes", direction, bytes);
                let _ = writer.shutdown().await;
                match direction {
                    // Client half-closed; the destination may still answer
                    Direction::ToRemote => {}
                    Direction::ToLocal => {
                        debug!(peer = %pipeline.peer, "Remote endpoint closed, releasing connection");
                        pipeline.release().await;
                    }
                }
            }
            CopyOutcome::Failed(e) => {
                if self.is_shutdown_requested() {
                    debug!(peer = %pipeline.peer, "{} stopped by tunnel shutdown: {}", direction, e);
                } else {
                    self.counters
                        .unexpected_failures
                        .fetch_add(1, Ordering::Relaxed);
                    warn!(
                        peer = %pipeline.peer,
                        "I/O copy error when forwarding through tunnel ({}): {}",
                        direction,
                        e
                    );
                }
                pipeline.release().await;
                self.closed.store(true, Ordering::SeqCst);
            }
            CopyOutcome::Aborted => {
                debug!(peer = %pipeline.peer, "{} aborted, connection resources closed", direction);
                pipeline.release().await;
            }
        }
    }

    async fn pump<R, W>(&self, reader: &mut R, writer: &mut W, direction: Direction) -> io::Result<u64>
    where
        R: AsyncRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send,
    {
        let counter = match direction {
            Direction::ToRemote => &self.counters.bytes_to_remote,
            Direction::ToLocal => &self.counters.bytes_to_local,
        };
        let mut buffer = vec![0u8; self.settings.buffer_size];
        let mut total = 0u64;

        loop {
            let n = reader.read(&mut buffer).await?;
            if n == 0 {
                return Ok(total);
            }
            writer.write_all(&buffer[..n]).await?;
            writer.flush().await?;
            total += n as u64;
            counter.fetch_add(n as u64, Ordering::Relaxed);
        }
    }
}

#[async_trait]
impl Tunnel for ForwardingTunnel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(self: Arc<Self>, ready: oneshot::Sender<bool>) {
        let local_address = self.settings.local_address();
        info!("Starting local tunnel endpoint at {}", local_address);
        info!("Setting server tunnel endpoint at {}", self.channel.endpoint());
        info!("Setting remote endpoint at {}", self.settings.remote_address());

        if self.is_shutdown_requested() {
            warn!("Tunnel {} was stopped before it started", self.name);
            let _ = ready.send(false);
            return;
        }

        // stop() waits on this token, so it only returns once the listener is dropped
        let _listener_guard = self.tasks.token();
        let listener = match TcpListener::bind((
            self.settings.bind_host.as_str(),
            self.settings.local_port,
        ))
        .await
        {
            Ok(listener) => listener,
            Err(e) => {
                warn!("Error setting tunnel listener on {}: {}", local_address, e);
                let _ = ready.send(false);
                return;
            }
        };

        if !self.transition(TunnelState::Constructed, TunnelState::Listening) {
            warn!("Tunnel {} is {}, not listening", self.name, self.state());
            let _ = ready.send(false);
            return;
        }
        let _ = ready.send(true);

        self.accept_loop(&listener).await;
        info!("Local tunnel endpoint {} closed", local_address);
    }

    async fn stop(&self) {
        info!("Closing connections established by tunnel {}", self.name);
        self.shutdown_requested.store(true, Ordering::SeqCst);
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if *state != TunnelState::Stopped {
                *state = TunnelState::Stopping;
            }
        }

        self.shutdown.cancel();
        self.resources.close_all().await;

        self.tasks.close();
        self.tasks.wait().await;

        self.closed.store(true, Ordering::SeqCst);
        self.set_state(TunnelState::Stopped);
        debug!("Tunnel {} stopped", self.name);
    }

    fn local_endpoint(&self) -> String {
        format!(
            "{}://{}",
            self.settings.tunneled_protocol,
            self.settings.local_address()
        )
    }

    fn remote_endpoint(&self) -> String {
        format!(
            "{}://{}",
            self.settings.tunneled_protocol,
            self.settings.remote_address()
        )
    }

    fn state(&self) -> TunnelState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
