use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

/// Outbound backlog per session before frames start being dropped.
const SESSION_BUFFER: usize = 64;

/// Frames relayed through the hub. Payloads are opaque here; message
/// semantics belong to the modules that register handlers against the layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

#[derive(thiserror::Error, Debug)]
pub enum RealtimeError {
    #[error("unknown session {0}")]
    UnknownSession(Uuid),
    #[error("session {0} closed")]
    SessionClosed(Uuid),
}

struct Session {
    tx: mpsc::Sender<Frame>,
    origin: Option<String>,
    connected_at: Instant,
}

/// Returned on deregistration for the connection-close log line.
#[derive(Debug)]
pub struct SessionSummary {
    pub origin: Option<String>,
    pub connected_for: Duration,
}

/// Registry of live messaging sessions. One instance per process, shared by
/// every connection handler through `AppContext`.
#[derive(Clone, Default)]
pub struct Hub {
    inner: Arc<RwLock<HashMap<Uuid, Session>>>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new session and returns its id together with the receiving
    /// half of its outbound queue.
    pub async fn register(&self, origin: Option<String>) -> (Uuid, mpsc::Receiver<Frame>) {
        let sid = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(SESSION_BUFFER);
        let session = Session {
            tx,
            origin,
            connected_at: Instant::now(),
        };
        self.inner.write().await.insert(sid, session);
        (sid, rx)
    }

    pub async fn deregister(&self, sid: Uuid) -> Option<SessionSummary> {
        self.inner.write().await.remove(&sid).map(|s| SessionSummary {
            origin: s.origin,
            connected_for: s.connected_at.elapsed(),
        })
    }

    /// Queues a frame for a single session.
    pub async fn send_to(&self, sid: Uuid, frame: Frame) -> Result<(), RealtimeError> {
        let tx = {
            let sessions = self.inner.read().await;
            sessions
                .get(&sid)
                .ok_or(RealtimeError::UnknownSession(sid))?
                .tx
                .clone()
        };
        tx.send(frame)
            .await
            .map_err(|_| RealtimeError::SessionClosed(sid))
    }

    /// Fans a frame out to every live session and returns the number of
    /// sessions it was queued for. A session with a full backlog loses the
    /// frame rather than stalling the fan-out; its connection stays open.
    pub async fn broadcast(&self, frame: Frame) -> usize {
        let sessions = self.inner.read().await;
        let mut delivered = 0;
        for (sid, session) in sessions.iter() {
            match session.tx.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(%sid, "session backlog full, dropping frame");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracing::debug!(%sid, "session gone, skipping");
                }
            }
        }
        delivered
    }

    pub async fn session_count(&self) -> usize {
        self.inner.read().await.len()
    }
}
