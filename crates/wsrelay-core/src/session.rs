//! The capability-only session surface the registry depends on (§3).
//!
//! The registry and host never know anything about the underlying
//! transport — only that a `Session` can send, ping, close, and report its
//! id and ready-state. The acceptor binary (an external collaborator, §4.5)
//! owns the concrete implementation that talks to a real socket.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::Stream;

use crate::frame::Opcode;

/// A connection's place in the WebSocket connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// A stream of owned chunks used by the stream-oriented broadcast/send
/// paths. Each chunk becomes one continuation frame at the transport layer.
pub type ByteStream = Pin<Box<dyn Stream<Item = Bytes> + Send>>;

/// Capability surface a live WebSocket session exposes to the registry.
///
/// Implementations are responsible for actually writing bytes to a socket;
/// the core only calls these methods and interprets their return values.
#[async_trait]
pub trait Session: Send + Sync {
    /// Opaque session id, unique within its host's registry.
    fn id(&self) -> &str;

    /// Current ready-state, sampled at call time.
    fn ready_state(&self) -> ReadyState;

    /// Sends one complete application message as a single frame.
    /// Returns `false` if the send failed (e.g. the peer disconnected).
    async fn send(&self, opcode: Opcode, data: Bytes) -> bool;

    /// Sends one application message as a sequence of continuation frames
    /// drawn from `stream`. Returns `false` if any chunk fails to send.
    async fn send_stream(&self, opcode: Opcode, stream: ByteStream) -> bool;

    /// Sends a pre-serialized Ping frame and waits up to `timeout` for the
    /// matching Pong. Returns `false` on send failure or timeout.
    async fn ping(&self, frame: Bytes, timeout: Duration) -> bool;

    /// Sends a pre-serialized Close frame (if not empty) and waits up to
    /// `timeout` for the peer's own Close frame / socket shutdown.
    async fn close(&self, close_frame: Bytes, timeout: Duration);
}
