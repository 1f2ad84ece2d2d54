//! Replication Runtime trait boundary (§6 of the design).
//!
//! This crate does not implement a consensus protocol. It defines the
//! contract the kernel's external collaborator must satisfy — linearizable
//! command/query application plus reliable, in-order, per-session event
//! delivery — so that a production deployment can plug in a real
//! consensus-backed implementation without touching the kernel or client.

use ensemble_kernel::{Command, Query, QueryReply};
use ensemble_types::{GroupEvent, LogicalTime, SessionId};

use crate::RuntimeError;

/// Deterministic logical clock driving the kernel's expiration timers.
///
/// Unlike a wall clock, every replica applying the same log must observe
/// the same `LogicalTime` for a given command, so `now` is threaded through
/// `submit_command` rather than read ambiently by the kernel.
pub trait Clock: Send + Sync {
    fn now(&self) -> LogicalTime;
}

/// Per-session event delivery: reliable, in-order, at-most-once over a
/// session's lifetime. Delivery to an inactive session is a silent no-op
/// (§7) — the session-recovery mechanism belongs to the runtime, not here.
pub trait EventSink: Send + Sync {
    fn publish(&self, session: SessionId, event: GroupEvent);
}

/// The contract a replicated log must satisfy for the kernel to run atop it.
///
/// Commands are linearizable per session; queries read the current
/// committed state without appending to the log.
pub trait ReplicationRuntime: Send + Sync {
    /// Submits a command for commit, returning its synchronous reply once
    /// applied. Implementations must preserve per-session FIFO ordering of
    /// both command completion and published events.
    async fn submit_command(
        &self,
        session: SessionId,
        cmd: Command,
    ) -> Result<ensemble_kernel::CommandReply, RuntimeError>;

    /// Answers a read-only query against the current committed state.
    async fn submit_query(&self, query: Query) -> QueryReply;
}
