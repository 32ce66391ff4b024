//! One agent connection: a serialized write path plus a close signal.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use mission_protocol::Frame;
use tokio::sync::Mutex;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::TransportError;

/// Upper bound on the best-effort close handshake.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// A boxed future returned by [`FrameSink`] methods.
pub type SinkFuture<'a> = Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>>;

/// Write half of a transport that carries [`Frame`]s.
pub trait FrameSink: Send + 'static {
    /// Writes one frame.
    fn send_frame(&mut self, frame: Frame) -> SinkFuture<'_>;

    /// Closes the transport.
    fn close(&mut self) -> SinkFuture<'_>;
}

/// An established duplex channel to the agent.
///
/// Writes are serialized through an internal lock. [`close`](Self::close)
/// fires a cancellation signal first, so a write stuck on a dead peer is
/// abandoned instead of holding up the close.
pub struct Connection {
    id: u64,
    peer: String,
    sink: Mutex<Box<dyn FrameSink>>,
    online: AtomicBool,
    cancel: CancellationToken,
}

impl Connection {
    pub fn new(peer: impl Into<String>, sink: impl FrameSink) -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            peer: peer.into(),
            sink: Mutex::new(Box::new(sink)),
            online: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        })
    }

    /// Process-unique identity of this connection.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Remote address as reported at accept time.
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// `true` between install and close.
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire) && !self.cancel.is_cancelled()
    }

    pub(crate) fn mark_online(&self) {
        self.online.store(true, Ordering::Release);
    }

    pub(crate) fn mark_offline(&self) {
        self.online.store(false, Ordering::Release);
    }

    /// Resolves once the connection has been closed locally.
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    /// Writes one frame.
    pub async fn send(&self, frame: Frame) -> Result<(), TransportError> {
        let mut sink = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(TransportError::Closed),
            sink = self.sink.lock() => sink,
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(TransportError::Closed),
            result = sink.send_frame(frame) => result,
        }
    }

    /// Marks the connection offline, aborts pending writes and closes the
    /// transport. Calling it again is a no-op.
    pub async fn close(&self) {
        self.mark_offline();
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();

        let mut sink = self.sink.lock().await;
        match tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(id = self.id, "close error: {e}"),
            Err(_) => tracing::debug!(id = self.id, "close timed out"),
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("online", &self.is_online())
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{RecordingSink, StalledSink};
    use super::*;

    #[test]
    fn ids_are_unique() {
        let a = Connection::new("a", RecordingSink::default());
        let b = Connection::new("b", RecordingSink::default());
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn new_connection_is_not_online_until_marked() {
        let conn = Connection::new("peer", RecordingSink::default());
        assert!(!conn.is_online());
        conn.mark_online();
        assert!(conn.is_online());
    }

    #[tokio::test]
    async fn send_reaches_sink() {
        let sink = RecordingSink::default();
        let conn = Connection::new("peer", sink.clone());
        conn.send(Frame::Heartbeat).await.unwrap();
        assert_eq!(sink.frames(), vec![Frame::Heartbeat]);
    }

    #[tokio::test]
    async fn send_after_close_fails() {
        let sink = RecordingSink::default();
        let conn = Connection::new("peer", sink.clone());
        conn.mark_online();
        conn.close().await;

        assert!(!conn.is_online());
        assert!(sink.is_closed());
        assert!(matches!(
            conn.send(Frame::Heartbeat).await,
            Err(TransportError::Closed)
        ));
        assert!(sink.frames().is_empty());
    }

    #[tokio::test]
    async fn close_aborts_stalled_write() {
        let conn = Connection::new("peer", StalledSink);
        let writer = {
            let conn = Arc::clone(&conn);
            tokio::spawn(async move { conn.send(Frame::Chunk(vec![1, 2, 3])).await })
        };
        tokio::task::yield_now().await;

        conn.close().await;
        let result = tokio::time::timeout(Duration::from_secs(2), writer)
            .await
            .expect("write should be abandoned")
            .unwrap();
        assert!(matches!(result, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let conn = Connection::new("peer", RecordingSink::default());
        conn.close().await;
        conn.close().await;
        assert!(!conn.is_online());
    }
}
