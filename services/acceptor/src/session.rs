//! Adapts an upgraded `axum` WebSocket into the core's `Session` trait
//! (§4.5), grounded in the teacher's `ws_forwarder_handler` /
//! `handle_forwarder_socket` split: one task owns the socket, the `Session`
//! side only ever pushes frames into a sink guarded by a lock.
//!
//! `wsrelay_core::frame` pre-serializes ping/close frames once and hands
//! the same [`Bytes`] to every session in a fan-out; this module is the
//! "enclosing acceptor" the frame module's doc comment defers decoding to.
//! Since those frames are always unmasked server→client frames built by
//! our own encoder, pulling the payload back out is a fixed, two-branch
//! read of the length field — no general-purpose parser needed.

use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket};
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{Mutex, Notify};
use tracing::{debug, warn};
use wsrelay_core::{ByteStream, Opcode, ReadyState, Session};

/// Extracts the payload out of a frame built by `wsrelay_core::frame`.
/// Valid only for frames this crate produced: unmasked, FIN=1.
fn control_payload(frame: &Bytes) -> Bytes {
    let len_field = frame[1] & 0x7F;
    let (len, header_len) = match len_field {
        126 => (u16::from_be_bytes([frame[2], frame[3]]) as usize, 4),
        127 => {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&frame[2..10]);
            (u64::from_be_bytes(buf) as usize, 10)
        }
        n => (n as usize, 2),
    };
    frame.slice(header_len..header_len + len)
}

fn parse_close_payload(payload: &Bytes) -> (u16, String) {
    if payload.len() < 2 {
        return (1000, String::new());
    }
    let code = u16::from_be_bytes([payload[0], payload[1]]);
    let reason = String::from_utf8_lossy(&payload[2..]).into_owned();
    (code, reason)
}

fn ready_state_from_u8(v: u8) -> ReadyState {
    match v {
        0 => ReadyState::Connecting,
        1 => ReadyState::Open,
        2 => ReadyState::Closing,
        _ => ReadyState::Closed,
    }
}

/// A live connection accepted through `axum`'s upgrade, registered into
/// exactly one host's [`wsrelay_core::SessionRegistry`].
pub struct TungsteniteSession {
    id: String,
    ready_state: AtomicU8,
    sink: Mutex<SplitSink<WebSocket, Message>>,
    pong: Notify,
    peer_closed: Notify,
}

impl TungsteniteSession {
    pub fn new(id: String, socket: WebSocket) -> (std::sync::Arc<Self>, SplitStream<WebSocket>) {
        let (sink, stream) = socket.split();
        let session = std::sync::Arc::new(Self {
            id,
            ready_state: AtomicU8::new(ReadyState::Open as u8),
            sink: Mutex::new(sink),
            pong: Notify::new(),
            peer_closed: Notify::new(),
        });
        (session, stream)
    }

    /// Drives the read half until the peer closes or the socket errors,
    /// replying to pings and notifying [`Session::ping`] on pongs.
    pub async fn run_read_loop(self: std::sync::Arc<Self>, mut stream: SplitStream<WebSocket>) {
        while let Some(next) = stream.next().await {
            match next {
                Ok(Message::Ping(payload)) => {
                    let mut sink = self.sink.lock().await;
                    if sink.send(Message::Pong(payload)).await.is_err() {
                        break;
                    }
                }
                Ok(Message::Pong(_)) => self.pong.notify_one(),
                Ok(Message::Close(_)) => break,
                Ok(Message::Text(_) | Message::Binary(_)) => {
                    debug!(session_id = %self.id, "ignoring inbound application message");
                }
                Err(err) => {
                    warn!(session_id = %self.id, error = %err, "read error, closing session");
                    break;
                }
            }
        }
        self.ready_state
            .store(ReadyState::Closed as u8, Ordering::SeqCst);
        self.peer_closed.notify_waiters();
    }
}

#[async_trait]
impl Session for TungsteniteSession {
    fn id(&self) -> &str {
        &self.id
    }

    fn ready_state(&self) -> ReadyState {
        ready_state_from_u8(self.ready_state.load(Ordering::SeqCst))
    }

    async fn send(&self, opcode: Opcode, data: Bytes) -> bool {
        let msg = match opcode {
            Opcode::Text => Message::Text(Utf8Bytes::from(String::from_utf8_lossy(&data).into_owned())),
            _ => Message::Binary(data),
        };
        self.sink.lock().await.send(msg).await.is_ok()
    }

    async fn send_stream(&self, opcode: Opcode, mut stream: ByteStream) -> bool {
        let mut sink = self.sink.lock().await;
        while let Some(chunk) = stream.next().await {
            let msg = match opcode {
                Opcode::Text => Message::Text(Utf8Bytes::from(String::from_utf8_lossy(&chunk).into_owned())),
                _ => Message::Binary(chunk),
            };
            if sink.send(msg).await.is_err() {
                return false;
            }
        }
        true
    }

    async fn ping(&self, frame: Bytes, timeout: Duration) -> bool {
        let payload = control_payload(&frame);
        {
            let mut sink = self.sink.lock().await;
            if sink.send(Message::Ping(payload)).await.is_err() {
                return false;
            }
        }
        tokio::time::timeout(timeout, self.pong.notified())
            .await
            .is_ok()
    }

    async fn close(&self, close_frame: Bytes, timeout: Duration) {
        self.ready_state
            .store(ReadyState::Closing as u8, Ordering::SeqCst);
        if !close_frame.is_empty() {
            let payload = control_payload(&close_frame);
            let (code, reason) = parse_close_payload(&payload);
            let mut sink = self.sink.lock().await;
            let _ = sink
                .send(Message::Close(Some(CloseFrame {
                    code,
                    reason: Utf8Bytes::from(reason),
                })))
                .await;
        }
        let _ = tokio::time::timeout(timeout, self.peer_closed.notified()).await;
        self.ready_state
            .store(ReadyState::Closed as u8, Ordering::SeqCst);
    }
}
