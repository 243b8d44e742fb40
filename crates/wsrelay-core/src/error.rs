//! Error kinds the core surfaces (§7).
//!
//! Ordinary operational violations never propagate as `Result` past the
//! manager's public API — they collapse to `bool`/`Option`/empty-map, per
//! the propagation policy in §7. This module only exists for the one place
//! where Rust's `Result` is genuinely the idiomatic fit: path validation,
//! re-exported here for convenience alongside the other error kinds a
//! caller embedding this crate may want to match on.

pub use crate::path::PathError;

/// Reasons a broadcast/broadping call can be rejected before any I/O
/// happens. These never leave the crate as an `Err` — `ServiceManager`
/// collapses them to `false`/an empty map, but they are useful for
/// `tracing` diagnostics at the rejection site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BroadcastRejection {
    #[error("manager is not in the Start state")]
    NotStarted,
    #[error("ping payload exceeds the 125-byte control-frame ceiling")]
    InvalidControlData,
}
