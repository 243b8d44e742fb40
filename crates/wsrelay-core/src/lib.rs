//! Service-manager and session-broadcast core for a multi-endpoint
//! WebSocket server.
//!
//! This crate owns no socket. It is the part of a WebSocket server that
//! decides which path a connection belongs to, fans a message out to every
//! session on that path, and tracks each endpoint's lifecycle state. The
//! transport-facing half (accepting TCP connections, performing the HTTP
//! upgrade, reading frames off the wire) lives in an external collaborator
//! such as the `acceptor` binary in this workspace, which only needs to
//! implement [`Session`] and call into [`ServiceManager`].

mod error;
mod frame;
mod host;
mod manager;
mod path;
mod registry;
mod session;
mod state;

pub use error::BroadcastRejection;
pub use frame::{
    make_close_frame, make_ping_frame, serialize_frame, Opcode, CLOSE_STATUS_AWAY,
    CONTROL_FRAME_PAYLOAD_MAX, EMPTY_UNMASKED_PING,
};
pub use host::{BehaviorFactory, ServiceHost};
pub use manager::ServiceManager;
pub use path::{normalize, validate, validate_and_normalize, PathError};
pub use registry::SessionRegistry;
pub use session::{ByteStream, ReadyState, Session};
pub use state::{State, StateCell};
