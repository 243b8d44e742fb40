//! Per-host session table and broadcast fan-out (§4.3).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::future::join_all;
use futures_util::StreamExt;
use tokio::sync::RwLock;

use crate::frame::Opcode;
use crate::session::{ByteStream, ReadyState, Session};

/// A concurrency-safe mapping from session-id to a live `Session`.
///
/// Mutation (`add`/`remove`) takes the write lock only long enough to
/// touch the map; broadcasts take a read lock just long enough to clone
/// the current values into a `Vec` snapshot, then release it before any
/// `.await` that depends on peer I/O (§5: no lock held across a
/// suspension point).
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<dyn Session>>>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub async fn add(&self, session: Arc<dyn Session>) {
        let id = session.id().to_owned();
        self.sessions.write().await.insert(id, session);
    }

    pub async fn remove(&self, session_id: &str) -> bool {
        self.sessions.write().await.remove(session_id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    async fn snapshot(&self) -> Vec<Arc<dyn Session>> {
        self.sessions.read().await.values().cloned().collect()
    }

    /// Fans a single complete message out to every session in the current
    /// snapshot, in parallel. Resolves to the conjunction of per-session
    /// results (vacuously `true` for an empty registry).
    pub async fn broadcast(&self, opcode: Opcode, data: Bytes) -> bool {
        let snapshot = self.snapshot().await;
        let results = join_all(
            snapshot
                .iter()
                .map(|session| session.send(opcode, data.clone())),
        )
        .await;
        results.into_iter().all(|ok| ok)
    }

    /// Fans a streamed message out to every session. The registry
    /// materializes `stream` into an owned chunk list exactly once (it is
    /// a single forward cursor) so every session gets an independent
    /// reader over the same bytes.
    pub async fn broadcast_stream(&self, opcode: Opcode, stream: ByteStream) -> bool {
        let chunks: Vec<Bytes> = stream.collect().await;
        let snapshot = self.snapshot().await;
        let results = join_all(snapshot.iter().map(|session| {
            let chunks = chunks.clone();
            async move {
                let per_session: ByteStream = Box::pin(futures_util::stream::iter(chunks));
                session.send_stream(opcode, per_session).await
            }
        }))
        .await;
        results.into_iter().all(|ok| ok)
    }

    /// Sends the pre-serialized ping `frame` to every `Open` session and
    /// correlates the pong reply within `timeout`. Sessions that are not
    /// `Open` at dispatch time are recorded as `false` without being sent
    /// anything.
    pub async fn broadping(&self, frame: Bytes, timeout: Duration) -> HashMap<String, bool> {
        let snapshot = self.snapshot().await;
        let results = join_all(snapshot.iter().map(|session| {
            let frame = frame.clone();
            async move {
                let replied = if session.ready_state() == ReadyState::Open {
                    session.ping(frame, timeout).await
                } else {
                    false
                };
                (session.id().to_owned(), replied)
            }
        }))
        .await;
        results.into_iter().collect()
    }

    /// Sends `close_frame` (if non-empty) to every session and waits up to
    /// `timeout` for an orderly close, then empties the registry.
    pub async fn stop(&self, close_frame: Option<Bytes>, timeout: Duration) {
        let snapshot = self.snapshot().await;
        join_all(snapshot.iter().map(|session| {
            let close_frame = close_frame.clone();
            async move {
                session
                    .close(close_frame.unwrap_or_default(), timeout)
                    .await;
            }
        }))
        .await;
        self.sessions.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wsrelay_testutils::MockSession;

    #[tokio::test]
    async fn broadcast_to_empty_registry_is_vacuously_true() {
        let registry = SessionRegistry::new();
        assert!(registry.broadcast(Opcode::Text, Bytes::from("hi")).await);
    }

    #[tokio::test]
    async fn broadcast_reaches_every_open_session() {
        let registry = SessionRegistry::new();
        let a = Arc::new(MockSession::open("a"));
        let b = Arc::new(MockSession::open("b"));
        registry.add(a.clone()).await;
        registry.add(b.clone()).await;

        let ok = registry.broadcast(Opcode::Text, Bytes::from("hi")).await;
        assert!(ok);
        assert_eq!(a.sent_texts().await, vec!["hi".to_owned()]);
        assert_eq!(b.sent_texts().await, vec!["hi".to_owned()]);
    }

    #[tokio::test]
    async fn broadcast_reports_false_when_any_session_fails() {
        let registry = SessionRegistry::new();
        let ok_session = Arc::new(MockSession::open("ok"));
        let failing = Arc::new(MockSession::failing("bad"));
        registry.add(ok_session).await;
        registry.add(failing).await;

        let ok = registry.broadcast(Opcode::Binary, Bytes::from("x")).await;
        assert!(!ok);
    }

    #[tokio::test]
    async fn broadcast_stream_reassembles_to_original_bytes_per_session() {
        let registry = SessionRegistry::new();
        let a = Arc::new(MockSession::open("a"));
        registry.add(a.clone()).await;

        let chunks = vec![Bytes::from("abc"), Bytes::from("def")];
        let stream: ByteStream = Box::pin(futures_util::stream::iter(chunks));
        let ok = registry.broadcast_stream(Opcode::Binary, stream).await;
        assert!(ok);
        assert_eq!(a.sent_binary_concat().await, b"abcdef".to_vec());
    }

    #[tokio::test]
    async fn broadping_records_false_for_non_open_sessions_without_sending() {
        let registry = SessionRegistry::new();
        let open = Arc::new(MockSession::open("open-1"));
        let closed = Arc::new(MockSession::closed("closed-1"));
        registry.add(open.clone()).await;
        registry.add(closed.clone()).await;

        let results = registry
            .broadping(Bytes::from_static(crate::frame::EMPTY_UNMASKED_PING), Duration::from_millis(50))
            .await;

        assert_eq!(results.get("open-1"), Some(&true));
        assert_eq!(results.get("closed-1"), Some(&false));
        assert_eq!(closed.ping_count().await, 0, "non-open sessions are never pinged");
    }

    #[tokio::test]
    async fn stop_closes_every_session_and_empties_registry() {
        let registry = SessionRegistry::new();
        let a = Arc::new(MockSession::open("a"));
        registry.add(a.clone()).await;

        registry
            .stop(Some(Bytes::from_static(b"bye")), Duration::from_millis(50))
            .await;

        assert!(a.was_closed().await);
        assert!(registry.is_empty().await);
    }
}
