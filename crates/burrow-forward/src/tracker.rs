//! Resource bookkeeping for the forwarding engine
//!
//! Every accepted local socket, every secure-channel session and every remote
//! stream gets a [`TrackedResource`]. The I/O object itself stays with the task
//! that uses it; closing the tracked resource signals that task to drop it.
//! Sessions are additionally closed directly.

use burrow_transport::ChannelSession;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    LocalSocket,
    Session,
    RemoteStream,
}

/// Handle to one resource opened by the engine
pub struct TrackedResource {
    id: u64,
    kind: ResourceKind,
    token: CancellationToken,
    session: Option<Arc<dyn ChannelSession>>,
}

impl TrackedResource {
    fn new(id: u64, kind: ResourceKind, session: Option<Arc<dyn ChannelSession>>) -> Self {
        Self {
            id,
            kind,
            token: CancellationToken::new(),
            session,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the resource has been closed
    pub async fn closed(&self) {
        self.token.cancelled().await
    }

    /// Close the resource. Idempotent.
    pub async fn close(&self) {
        self.token.cancel();
        if let Some(session) = &self.session {
            session.close().await;
        }
    }
}

#[derive(Default)]
struct Collections {
    local: Vec<Arc<TrackedResource>>,
    sessions: Vec<Arc<TrackedResource>>,
    remote: Vec<Arc<TrackedResource>>,
    sealed: bool,
}

impl Collections {
    fn list(&self, kind: ResourceKind) -> &Vec<Arc<TrackedResource>> {
        match kind {
            ResourceKind::LocalSocket => &self.local,
            ResourceKind::Session => &self.sessions,
            ResourceKind::RemoteStream => &self.remote,
        }
    }

    fn list_mut(&mut self, kind: ResourceKind) -> &mut Vec<Arc<TrackedResource>> {
        match kind {
            ResourceKind::LocalSocket => &mut self.local,
            ResourceKind::Session => &mut self.sessions,
            ResourceKind::RemoteStream => &mut self.remote,
        }
    }
}

/// Tracks every resource a tunnel opens
///
/// Collections only grow. Once [`close_all`](Self::close_all) has run the
/// tracker is sealed: anything registered afterwards comes back already
/// closed, and its owner must release it immediately.
#[derive(Default)]
pub struct ResourceTracker {
    next_id: AtomicU64,
    inner: Mutex<Collections>,
}

impl ResourceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track_local(&self) -> Arc<TrackedResource> {
        self.track(ResourceKind::LocalSocket, None)
    }

    pub fn track_session(&self, session: Arc<dyn ChannelSession>) -> Arc<TrackedResource> {
        self.track(ResourceKind::Session, Some(session))
    }

    pub fn track_remote(&self) -> Arc<TrackedResource> {
        self.track(ResourceKind::RemoteStream, None)
    }

    fn track(
        &self,
        kind: ResourceKind,
        session: Option<Arc<dyn ChannelSession>>,
    ) -> Arc<TrackedResource> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let resource = Arc::new(TrackedResource::new(id, kind, session));

        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.sealed {
            debug!("Resource {} ({:?}) registered after shutdown", id, kind);
            resource.token.cancel();
        }
        inner.list_mut(kind).push(resource.clone());
        resource
    }

    /// Snapshot of every resource of `kind` ever tracked
    pub fn snapshot(&self, kind: ResourceKind) -> Vec<Arc<TrackedResource>> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .list(kind)
            .clone()
    }

    pub fn count(&self, kind: ResourceKind) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .list(kind)
            .len()
    }

    /// Number of resources of `kind` not closed yet
    pub fn open_count(&self, kind: ResourceKind) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .list(kind)
            .iter()
            .filter(|r| !r.is_closed())
            .count()
    }

    pub fn is_sealed(&self) -> bool {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).sealed
    }

    /// Seal the tracker and close local sockets, then sessions, then remote
    /// streams, regardless of their current state
    pub async fn close_all(&self) {
        let (local, sessions, remote) = {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            inner.sealed = true;
            (
                inner.local.clone(),
                inner.sessions.clone(),
                inner.remote.clone(),
            )
        };

        debug!(
            "Closing {} local sockets, {} sessions, {} remote streams",
            local.len(),
            sessions.len(),
            remote.len()
        );

        for resource in local.iter().chain(sessions.iter()).chain(remote.iter()) {
            resource.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use burrow_transport::{ChannelError, ChannelResult, ForwardStream};
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicBool, AtomicUsize};

    #[derive(Default)]
    struct CountingSession {
        closed: AtomicBool,
        close_calls: AtomicUsize,
    }

    #[async_trait]
    impl ChannelSession for CountingSession {
        async fn open_stream(
            &self,
            _host: &str,
            _port: u16,
            _origin: SocketAddr,
        ) -> ChannelResult<ForwardStream> {
            Err(ChannelError::Closed)
        }

        async fn close(&self) {
            self.close_calls.fetch_add(1, Ordering::SeqCst);
            self.closed.store(true, Ordering::SeqCst);
        }

        fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }
    }

    #[tokio::test]
    async fn test_track_and_close_all() {
        let tracker = ResourceTracker::new();
        let session = Arc::new(CountingSession::default());

        let local = tracker.track_local();
        let tracked_session = tracker.track_session(session.clone());
        let remote = tracker.track_remote();

        assert_eq!(tracker.count(ResourceKind::LocalSocket), 1);
        assert_eq!(tracker.open_count(ResourceKind::Session), 1);
        assert_ne!(local.id(), remote.id());
        assert_eq!(tracked_session.kind(), ResourceKind::Session);

        tracker.close_all().await;

        assert!(local.is_closed());
        assert!(tracked_session.is_closed());
        assert!(remote.is_closed());
        assert!(session.is_closed());
        assert_eq!(tracker.open_count(ResourceKind::RemoteStream), 0);
        // Collections are never compacted
        assert_eq!(tracker.count(ResourceKind::RemoteStream), 1);
    }

    #[tokio::test]
    async fn test_close_all_twice() {
        let tracker = ResourceTracker::new();
        let session = Arc::new(CountingSession::default());
        tracker.track_session(session.clone());

        tracker.close_all().await;
        tracker.close_all().await;

        assert!(session.is_closed());
        assert_eq!(session.close_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_close_already_closed_resource() {
        let tracker = ResourceTracker::new();
        let local = tracker.track_local();

        local.close().await;
        assert!(local.is_closed());

        tracker.close_all().await;
        assert!(local.is_closed());
    }

    #[tokio::test]
    async fn test_track_after_seal_is_closed() {
        let tracker = ResourceTracker::new();
        tracker.close_all().await;
        assert!(tracker.is_sealed());

        let late = tracker.track_local();
        assert!(late.is_closed());
        assert_eq!(tracker.count(ResourceKind::LocalSocket), 1);
    }

    #[tokio::test]
    async fn test_closed_future_resolves() {
        let tracker = ResourceTracker::new();
        let remote = tracker.track_remote();

        let waiter = {
            let remote = remote.clone();
            tokio::spawn(async move { remote.closed().await })
        };

        remote.close().await;
        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("closed() should resolve")
            .unwrap();
    }
}
