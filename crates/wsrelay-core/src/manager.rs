//! The service-manager: path registry, lifecycle, and broadcast fan-out
//! (§4.1). This is the component the rest of the crate exists to support.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::future::join_all;
use futures_util::StreamExt;

use crate::frame::{make_close_frame, make_ping_frame, Opcode, CLOSE_STATUS_AWAY, EMPTY_UNMASKED_PING};
use crate::host::{BehaviorFactory, ServiceHost};
use crate::path;
use crate::session::ByteStream;
use crate::state::{State, StateCell};

const DEFAULT_WAIT_TIME: Duration = Duration::from_secs(1);

/// Owns the path→host table and the manager-level lifecycle. All mutating
/// operations are safe to call from multiple tasks concurrently.
pub struct ServiceManager {
    fragment_size: usize,
    keep_clean: bool,
    state: StateCell,
    wait_time_ms: AtomicU64,
    hosts: tokio::sync::RwLock<HashMap<String, Arc<ServiceHost>>>,
}

impl ServiceManager {
    pub fn new(fragment_size: usize, keep_clean: bool) -> Self {
        Self {
            fragment_size,
            keep_clean,
            state: StateCell::new(State::Ready),
            wait_time_ms: AtomicU64::new(DEFAULT_WAIT_TIME.as_millis() as u64),
            hosts: tokio::sync::RwLock::new(HashMap::new()),
        }
    }

    pub fn state(&self) -> State {
        self.state.get()
    }

    pub fn wait_time(&self) -> Duration {
        Duration::from_millis(self.wait_time_ms.load(Ordering::SeqCst))
    }

    pub fn fragment_size(&self) -> usize {
        self.fragment_size
    }

    pub fn keep_clean(&self) -> bool {
        self.keep_clean
    }

    /// Rejects a zero duration. Otherwise updates the manager's wait-time
    /// and, if it actually changed, propagates it to every host snapshot.
    pub async fn set_wait_time(&self, wait_time: Duration) -> bool {
        if wait_time.is_zero() {
            return false;
        }
        let new_ms = wait_time.as_millis() as u64;
        let old_ms = self.wait_time_ms.swap(new_ms, Ordering::SeqCst);
        if old_ms != new_ms {
            for host in self.hosts.read().await.values() {
                host.set_wait_time(wait_time);
            }
        }
        true
    }

    pub async fn path_count(&self) -> usize {
        self.hosts.read().await.len()
    }

    pub async fn paths(&self) -> Vec<String> {
        self.hosts.read().await.keys().cloned().collect()
    }

    /// Sum of session counts across hosts, while the manager is in Start;
    /// zero otherwise (there is nothing meaningfully "live" outside Start).
    pub async fn session_count(&self) -> usize {
        if self.state.get() != State::Start {
            return 0;
        }
        let snapshot = self.snapshot_hosts().await;
        let mut total = 0;
        for host in &snapshot {
            total += host.session_count().await;
        }
        total
    }

    async fn snapshot_hosts(&self) -> Vec<Arc<ServiceHost>> {
        self.hosts.read().await.values().cloned().collect()
    }

    /// Registers a host at `path` bound to `behavior_factory`. A duplicate
    /// path (after normalization) is a silent no-op returning `false`. The
    /// contains-check and the insert happen under one write-lock
    /// acquisition, so a concurrently-observed collision at commit time is
    /// structurally unreachable rather than a race to guard against.
    pub async fn add(&self, raw_path: &str, behavior_factory: BehaviorFactory) -> bool {
        if matches!(self.state.get(), State::ShuttingDown | State::Stop) {
            return false;
        }
        let Ok(normalized) = path::validate_and_normalize(raw_path) else {
            return false;
        };

        let mut hosts = self.hosts.write().await;
        if hosts.contains_key(&normalized) {
            return false;
        }

        let host = Arc::new(ServiceHost::new(
            normalized.clone(),
            self.fragment_size,
            self.wait_time(),
            self.keep_clean,
            behavior_factory,
        ));
        if self.state.get() == State::Start {
            host.start().await;
        }

        let previous = hosts.insert(normalized, host);
        debug_assert!(
            previous.is_none(),
            "insert race: path collided under a single write-lock acquisition"
        );
        true
    }

    /// Detaches the host at `path`. If it was Started, its sessions receive
    /// a Close(1001, "Away") before the host is dropped.
    pub async fn remove(&self, raw_path: &str) -> bool {
        let normalized = path::normalize(raw_path);
        let removed = self.hosts.write().await.remove(&normalized);
        let Some(host) = removed else {
            return false;
        };
        if host.state() == State::Start {
            let close_frame = make_close_frame(CLOSE_STATUS_AWAY, "Away");
            host.stop(Some(close_frame), self.wait_time()).await;
        }
        true
    }

    /// Looks up the host serving `path`. Rejects (returns `None`) unless
    /// the manager is Started and `path` passes validation.
    pub async fn try_get(&self, raw_path: &str) -> Option<Arc<ServiceHost>> {
        if self.state.get() != State::Start {
            return None;
        }
        let normalized = path::validate_and_normalize(raw_path).ok()?;
        self.hosts.read().await.get(&normalized).cloned()
    }

    /// Starts every currently registered host, then transitions to Start.
    /// A no-op if the manager has already left Ready.
    pub async fn start(&self) {
        if self.state.get() != State::Ready {
            return;
        }
        let snapshot = self.snapshot_hosts().await;
        join_all(snapshot.iter().map(|host| host.start())).await;
        self.state.advance_to(State::Start);
    }

    /// Enters ShuttingDown, closes every host's sessions in parallel
    /// (optionally sending a close frame built from `close_args`, optionally
    /// honoring the configured wait-time), empties the host table, then
    /// enters Stop.
    ///
    /// §6 reserves status 1001 ("Away") for host *removal* (see
    /// [`Self::remove`]); the close code emitted by `stop` is the caller's
    /// choice via `close_args`, defaulting to 1001/"Away" only when
    /// `send_close` is true and no explicit `close_args` was given.
    pub async fn stop(&self, close_args: Option<(u16, &str)>, send_close: bool, wait: bool) {
        self.state.advance_to(State::ShuttingDown);

        let close_frame = if send_close {
            let (code, reason) = close_args.unwrap_or((CLOSE_STATUS_AWAY, "Away"));
            Some(make_close_frame(code, reason))
        } else {
            None
        };
        let timeout = if wait {
            self.wait_time()
        } else {
            Duration::ZERO
        };

        let mut hosts = self.hosts.write().await;
        let snapshot: Vec<Arc<ServiceHost>> = hosts.values().cloned().collect();
        hosts.clear();
        drop(hosts);

        join_all(
            snapshot
                .iter()
                .map(|host| host.stop(close_frame.clone(), timeout)),
        )
        .await;

        self.state.advance_to(State::Stop);
    }

    /// Broadcasts `data` as a single Binary message if it fits under the
    /// fragment-size threshold, otherwise switches to the stream-oriented
    /// path. Returns the conjunction of per-host results; `false` while not
    /// Started.
    pub async fn broadcast_bytes(&self, data: Bytes) -> bool {
        self.broadcast_opcode(Opcode::Binary, data).await
    }

    /// Same as [`Self::broadcast_bytes`] but for UTF-8 text, sent as a Text
    /// frame.
    pub async fn broadcast_text(&self, text: &str) -> bool {
        self.broadcast_opcode(Opcode::Text, Bytes::copy_from_slice(text.as_bytes()))
            .await
    }

    async fn broadcast_opcode(&self, opcode: Opcode, data: Bytes) -> bool {
        if self.state.get() != State::Start {
            return false;
        }
        let snapshot = self.snapshot_hosts().await;
        let fragment_size = self.fragment_size;
        let results = join_all(snapshot.iter().map(|host| {
            let data = data.clone();
            async move {
                if self.state.get() != State::Start {
                    return true;
                }
                if data.len() <= fragment_size {
                    host.sessions().broadcast(opcode, data).await
                } else {
                    let stream = chunk_bytes(data, fragment_size);
                    host.sessions().broadcast_stream(opcode, stream).await
                }
            }
        }))
        .await;
        results.into_iter().all(|ok| ok)
    }

    /// Broadcasts a caller-provided stream as a Binary message, materialized
    /// into owned chunks once so every host (and every session within it)
    /// gets an independent reader over the same bytes.
    pub async fn broadcast_stream(&self, stream: ByteStream) -> bool {
        if self.state.get() != State::Start {
            return false;
        }
        let chunks: Vec<Bytes> = stream.collect().await;
        let snapshot = self.snapshot_hosts().await;
        let results = join_all(snapshot.iter().map(|host| {
            let chunks = chunks.clone();
            async move {
                if self.state.get() != State::Start {
                    return true;
                }
                let per_host: ByteStream = Box::pin(futures_util::stream::iter(chunks));
                host.sessions().broadcast_stream(Opcode::Binary, per_host).await
            }
        }))
        .await;
        results.into_iter().all(|ok| ok)
    }

    /// Pings every Open session of every started host with an empty,
    /// pre-serialized frame, returning `{ path → { session-id → replied } }`.
    pub async fn broadping(&self) -> HashMap<String, HashMap<String, bool>> {
        self.broadping_with_frame(Bytes::from_static(EMPTY_UNMASKED_PING))
            .await
    }

    /// Same as [`Self::broadping`] but with a textual payload. An empty
    /// string degenerates to [`Self::broadping`]; a payload over the
    /// 125-byte control-frame ceiling yields an empty mapping and sends
    /// nothing.
    pub async fn broadping_text(&self, text: &str) -> HashMap<String, HashMap<String, bool>> {
        if text.is_empty() {
            return self.broadping().await;
        }
        let Some(frame) = make_ping_frame(text.as_bytes(), false) else {
            return HashMap::new();
        };
        self.broadping_with_frame(frame).await
    }

    async fn broadping_with_frame(&self, frame: Bytes) -> HashMap<String, HashMap<String, bool>> {
        if self.state.get() != State::Start {
            return HashMap::new();
        }
        let wait = self.wait_time();
        let snapshot = self.snapshot_hosts().await;
        let results = join_all(snapshot.iter().map(|host| {
            let frame = frame.clone();
            async move {
                if self.state.get() != State::Start {
                    return None;
                }
                let inner = host.sessions().broadping(frame, wait).await;
                Some((host.path().to_owned(), inner))
            }
        }))
        .await;
        results.into_iter().flatten().collect()
    }
}

fn chunk_bytes(data: Bytes, chunk_size: usize) -> ByteStream {
    let mut chunks = Vec::new();
    let mut offset = 0;
    while offset < data.len() {
        let end = (offset + chunk_size).min(data.len());
        chunks.push(data.slice(offset..end));
        offset = end;
    }
    Box::pin(futures_util::stream::iter(chunks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;
    use wsrelay_testutils::MockSession;

    fn factory() -> BehaviorFactory {
        Arc::new(|| Box::new(()) as Box<dyn Any + Send>)
    }

    #[tokio::test]
    async fn duplicate_add_after_normalization_is_a_no_op() {
        let manager = ServiceManager::new(1024, false);
        assert!(manager.add("/chat", factory()).await);
        assert!(!manager.add("/chat/", factory()).await);
        assert_eq!(manager.paths().await, vec!["/chat".to_owned()]);
    }

    #[tokio::test]
    async fn broadcast_before_start_is_a_no_op() {
        let manager = ServiceManager::new(1024, false);
        manager.add("/chat", factory()).await;
        assert!(!manager.broadcast_text("hi").await);
    }

    #[tokio::test]
    async fn broadcast_after_start_reaches_every_session() {
        let manager = ServiceManager::new(1024, false);
        manager.add("/chat", factory()).await;
        manager.start().await;

        let host = manager.try_get("/chat").await.unwrap();
        let a = Arc::new(MockSession::open("a"));
        let b = Arc::new(MockSession::open("b"));
        host.sessions().add(a.clone()).await;
        host.sessions().add(b.clone()).await;

        assert!(manager.broadcast_text("hi").await);
        assert_eq!(a.sent_texts().await, vec!["hi".to_owned()]);
        assert_eq!(b.sent_texts().await, vec!["hi".to_owned()]);
    }

    #[tokio::test]
    async fn broadcast_over_fragment_size_takes_the_stream_path_and_reassembles() {
        let manager = ServiceManager::new(4, false);
        manager.add("/chat", factory()).await;
        manager.start().await;
        let host = manager.try_get("/chat").await.unwrap();
        let session = Arc::new(MockSession::open("a"));
        host.sessions().add(session.clone()).await;

        let payload = Bytes::from(vec![7u8; 10]);
        assert!(manager.broadcast_bytes(payload.clone()).await);
        assert_eq!(session.sent_binary_concat().await, payload.to_vec());
    }

    #[tokio::test]
    async fn broadping_with_oversized_payload_returns_empty_and_sends_nothing() {
        let manager = ServiceManager::new(1024, false);
        manager.add("/chat", factory()).await;
        manager.start().await;
        let host = manager.try_get("/chat").await.unwrap();
        let session = Arc::new(MockSession::open("a"));
        host.sessions().add(session.clone()).await;

        let oversized = "x".repeat(126);
        let result = manager.broadping_text(&oversized).await;
        assert!(result.is_empty());
        assert_eq!(session.ping_count().await, 0);
    }

    #[tokio::test]
    async fn broadping_mixed_open_and_closed_sessions() {
        let manager = ServiceManager::new(1024, false);
        manager.add("/chat", factory()).await;
        manager.start().await;
        let host = manager.try_get("/chat").await.unwrap();
        host.sessions().add(Arc::new(MockSession::open("s1"))).await;
        host.sessions().add(Arc::new(MockSession::closed("s2"))).await;

        let result = manager.broadping().await;
        let inner = &result["/chat"];
        assert_eq!(inner["s1"], true);
        assert_eq!(inner["s2"], false);
    }

    #[tokio::test]
    async fn remove_started_host_closes_its_sessions() {
        let manager = ServiceManager::new(1024, false);
        manager.add("/chat", factory()).await;
        manager.start().await;
        let host = manager.try_get("/chat").await.unwrap();
        let session = Arc::new(MockSession::open("a"));
        host.sessions().add(session.clone()).await;

        assert!(manager.remove("/chat").await);
        assert!(session.was_closed().await);
        assert!(!manager.remove("/chat").await, "already removed");
    }

    #[tokio::test]
    async fn state_never_regresses_through_full_lifecycle() {
        let manager = ServiceManager::new(1024, false);
        assert_eq!(manager.state(), State::Ready);
        manager.start().await;
        assert_eq!(manager.state(), State::Start);
        manager.stop(None, true, false).await;
        assert_eq!(manager.state(), State::Stop);
        assert_eq!(manager.path_count().await, 0);

        assert!(!manager.add("/late", factory()).await);
        assert!(!manager.broadcast_text("late").await);
    }

    #[tokio::test]
    async fn stop_sends_the_caller_chosen_close_code_not_a_hardcoded_one() {
        let manager = ServiceManager::new(1024, false);
        manager.add("/chat", factory()).await;
        manager.start().await;
        let host = manager.try_get("/chat").await.unwrap();
        let session = Arc::new(MockSession::open("a"));
        host.sessions().add(session.clone()).await;

        manager
            .stop(Some((4000, "app shutting down")), true, false)
            .await;

        let frame = session.close_frame().await.expect("close frame sent");
        let code = u16::from_be_bytes([frame[2], frame[3]]);
        assert_eq!(code, 4000);
        assert_eq!(&frame[4..], b"app shutting down");
    }
}
