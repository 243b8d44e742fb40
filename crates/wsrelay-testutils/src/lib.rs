//! Shared test fixtures: an in-memory `Session` double for unit-level
//! registry/host/manager tests, and a raw-socket client for driving a real
//! listener end to end, mirroring the teacher's `rt-test-utils` shape
//! (`MockWsServer`/`MockWsClient`).

mod mock_session;
mod mock_ws_peer;

pub use mock_session::MockSession;
pub use mock_ws_peer::MockWsPeer;
