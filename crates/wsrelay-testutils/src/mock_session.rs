//! In-memory `Session` double used by `wsrelay-core`'s own test suite and by
//! `services/acceptor`'s integration tests, mirroring the fixture style a
//! mock server/client pair would give a transport-level test — except the
//! transport here is just a `Vec` behind a lock, since the registry's
//! contract is entirely in terms of the `Session` trait.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use wsrelay_core::{ByteStream, Opcode, ReadyState, Session};

struct Inner {
    ready_state: ReadyState,
    fail_sends: bool,
    sent: Vec<(Opcode, Bytes)>,
    ping_count: usize,
    closed: bool,
    close_frame: Option<Bytes>,
}

/// A `Session` double with inspectable sent frames and a scriptable
/// ready-state / failure mode, for exercising `SessionRegistry` without a
/// real socket.
pub struct MockSession {
    id: String,
    inner: Mutex<Inner>,
}

impl MockSession {
    fn new(id: &str, ready_state: ReadyState, fail_sends: bool) -> Self {
        Self {
            id: id.to_owned(),
            inner: Mutex::new(Inner {
                ready_state,
                fail_sends,
                sent: Vec::new(),
                ping_count: 0,
                closed: false,
                close_frame: None,
            }),
        }
    }

    /// An `Open` session that accepts every send/ping.
    pub fn open(id: &str) -> Self {
        Self::new(id, ReadyState::Open, false)
    }

    /// An `Open` session whose sends and pings always fail, as if the
    /// underlying socket had gone away without a clean close.
    pub fn failing(id: &str) -> Self {
        Self::new(id, ReadyState::Open, true)
    }

    /// A session already past `Open`, e.g. mid-teardown. The registry must
    /// never ping these even though they're still in the map.
    pub fn closed(id: &str) -> Self {
        Self::new(id, ReadyState::Closed, false)
    }

    pub async fn sent_texts(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        inner
            .sent
            .iter()
            .filter(|(opcode, _)| *opcode == Opcode::Text)
            .map(|(_, data)| String::from_utf8_lossy(data).into_owned())
            .collect()
    }

    pub async fn sent_binary_concat(&self) -> Vec<u8> {
        let inner = self.inner.lock().unwrap();
        inner
            .sent
            .iter()
            .filter(|(opcode, _)| matches!(opcode, Opcode::Binary | Opcode::Continuation))
            .flat_map(|(_, data)| data.to_vec())
            .collect()
    }

    pub async fn ping_count(&self) -> usize {
        self.inner.lock().unwrap().ping_count
    }

    pub async fn was_closed(&self) -> bool {
        self.inner.lock().unwrap().closed
    }

    /// The raw close frame bytes the session was closed with, if any — lets
    /// tests confirm the close *code* a caller chose actually reached the
    /// wire rather than just that a close happened.
    pub async fn close_frame(&self) -> Option<Bytes> {
        self.inner.lock().unwrap().close_frame.clone()
    }
}

#[async_trait]
impl Session for MockSession {
    fn id(&self) -> &str {
        &self.id
    }

    fn ready_state(&self) -> ReadyState {
        self.inner.lock().unwrap().ready_state
    }

    async fn send(&self, opcode: Opcode, data: Bytes) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_sends {
            return false;
        }
        inner.sent.push((opcode, data));
        true
    }

    async fn send_stream(&self, opcode: Opcode, mut stream: ByteStream) -> bool {
        let fail = self.inner.lock().unwrap().fail_sends;
        if fail {
            return false;
        }
        while let Some(chunk) = stream.next().await {
            self.inner.lock().unwrap().sent.push((opcode, chunk));
        }
        true
    }

    async fn ping(&self, _frame: Bytes, _timeout: Duration) -> bool {
        let mut inner = self.inner.lock().unwrap();
        inner.ping_count += 1;
        !inner.fail_sends
    }

    async fn close(&self, close_frame: Bytes, _timeout: Duration) {
        let mut inner = self.inner.lock().unwrap();
        inner.closed = true;
        if !close_frame.is_empty() {
            inner.close_frame = Some(close_frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_session_accepts_send_and_ping() {
        let session = MockSession::open("s1");
        assert!(session.send(Opcode::Text, Bytes::from("hi")).await);
        assert!(session.ping(Bytes::new(), Duration::from_millis(10)).await);
        assert_eq!(session.sent_texts().await, vec!["hi".to_owned()]);
        assert_eq!(session.ping_count().await, 1);
    }

    #[tokio::test]
    async fn failing_session_reports_false_without_panicking() {
        let session = MockSession::failing("s2");
        assert!(!session.send(Opcode::Binary, Bytes::from("x")).await);
        assert!(!session.ping(Bytes::new(), Duration::from_millis(10)).await);
    }

    #[tokio::test]
    async fn closed_session_reports_closed_ready_state() {
        let session = MockSession::closed("s3");
        assert_eq!(session.ready_state(), ReadyState::Closed);
    }
}
