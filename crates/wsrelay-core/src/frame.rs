//! Minimal RFC 6455 frame codec (§2 item 1, the "Frame Codec" collaborator).
//!
//! The core only needs three factories plus one constant, because it never
//! decodes frames itself — decoding is the enclosing acceptor's job. A
//! server never masks its own frames (RFC 6455 §5.1 only requires
//! client-to-server masking), so a close/ping frame built here is
//! byte-identical for every peer and can be serialized exactly once and
//! shared across every session in a broadcast fan-out.

use bytes::{BufMut, Bytes, BytesMut};
use rand::RngCore;

/// Opcodes the core needs to build data and control frames for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Text,
    Binary,
    Continuation,
    Close,
    Ping,
    Pong,
}

impl Opcode {
    fn wire_value(self) -> u8 {
        match self {
            Opcode::Continuation => 0x0,
            Opcode::Text => 0x1,
            Opcode::Binary => 0x2,
            Opcode::Close => 0x8,
            Opcode::Ping => 0x9,
            Opcode::Pong => 0xA,
        }
    }
}

/// The WebSocket control-frame payload ceiling (RFC 6455 §5.5): 125 bytes.
pub const CONTROL_FRAME_PAYLOAD_MAX: usize = 125;

/// Close status 1001 ("Away"), used when a host with live sessions is removed.
pub const CLOSE_STATUS_AWAY: u16 = 1001;

/// A fully serialized, zero-length, unmasked Ping frame (`FIN | opcode=0x9`,
/// mask bit unset, zero-length payload). Shared by every call to the
/// zero-argument `broadping()` so the bytes are built exactly once.
pub static EMPTY_UNMASKED_PING: &[u8] = &[0x89, 0x00];

/// Serializes one complete frame: FIN bit always set (the core never emits
/// fragmented frames itself — fragmentation here means "pick the streaming
/// broadcast path", not "set FIN=0"), the given opcode, and an optional
/// 4-byte mask applied to the payload per RFC 6455 §5.3.
///
/// This is the `serialize-frame` factory from §2.
pub fn serialize_frame(opcode: Opcode, payload: &[u8], masked: bool) -> Bytes {
    let mut buf = BytesMut::with_capacity(payload.len() + 14);
    let first_byte = 0x80 | opcode.wire_value(); // FIN=1
    buf.put_u8(first_byte);

    let mask_bit = if masked { 0x80 } else { 0x00 };
    let len = payload.len();
    if len <= 125 {
        buf.put_u8(mask_bit | len as u8);
    } else if len <= u16::MAX as usize {
        buf.put_u8(mask_bit | 126);
        buf.put_u16(len as u16);
    } else {
        buf.put_u8(mask_bit | 127);
        buf.put_u64(len as u64);
    }

    if masked {
        let mut key = [0u8; 4];
        rand::thread_rng().fill_bytes(&mut key);
        buf.put_slice(&key);
        buf.extend(payload.iter().enumerate().map(|(i, b)| b ^ key[i % 4]));
    } else {
        buf.put_slice(payload);
    }

    buf.freeze()
}

/// Builds a Close frame (status code + UTF-8 reason) per §6's close-status
/// contract. Server-to-client, so always unmasked.
pub fn make_close_frame(code: u16, reason: &str) -> Bytes {
    let mut payload = Vec::with_capacity(2 + reason.len());
    payload.extend_from_slice(&code.to_be_bytes());
    payload.extend_from_slice(reason.as_bytes());
    serialize_frame(Opcode::Close, &payload, false)
}

/// Builds a Ping frame. `masked` exists for API completeness / interop
/// testing; the manager always calls this with `masked = false` since it
/// only ever sends server-to-client frames.
///
/// Returns `None` if `payload` exceeds the control-frame ceiling
/// (`InvalidControlData`, §7).
pub fn make_ping_frame(payload: &[u8], masked: bool) -> Option<Bytes> {
    if payload.len() > CONTROL_FRAME_PAYLOAD_MAX {
        return None;
    }
    Some(serialize_frame(Opcode::Ping, payload, masked))
}
