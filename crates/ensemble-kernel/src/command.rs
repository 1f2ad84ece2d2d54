//! Commands and queries accepted by the group state machine.
//!
//! Commands are applied through [`crate::kernel::apply_committed`] in strict
//! log order; queries are answered by [`crate::kernel::apply_query`] without
//! mutating state. Both are submitted through the Replication Runtime, which
//! supplies the [`LogIndex`], [`SessionId`], and [`LogicalTime`] context a
//! pure kernel cannot observe on its own.

use bytes::Bytes;
use ensemble_types::MemberId;
use serde::{Deserialize, Serialize};

/// A command submitted to the group state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Create a member, or rebind a persistent member's session.
    Join {
        member_id: MemberId,
        address: Option<String>,
        persistent: bool,
    },

    /// Remove a member immediately, regardless of persistence.
    Leave { member_id: MemberId },

    /// Register the issuing session as a listener; the kernel replies with
    /// a snapshot of currently-bound members.
    Listen,

    /// Set a property, scoped globally or to a member.
    SetProperty {
        member: Option<MemberId>,
        name: String,
        value: Bytes,
    },

    /// Remove a property, scoped globally or to a member.
    RemoveProperty {
        member: Option<MemberId>,
        name: String,
    },

    /// Enqueue a task for delivery to a member.
    Submit {
        member: MemberId,
        payload: Bytes,
    },

    /// Acknowledge (or fail) the member's current head-of-line task.
    Ack {
        member_id: MemberId,
        task_index: ensemble_types::LogIndex,
        succeeded: bool,
    },

    /// Notifies the kernel that a session has ended; the kernel walks every
    /// member bound to it per the close semantics in §4.1.
    SessionClosed { session: ensemble_types::SessionId },

    /// Advances the kernel's logical clock and fires any expiration timers
    /// that have come due. Submitted periodically by the Replication
    /// Runtime, never by application code.
    Tick,
}

/// A read-only query answered without appending to the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Query {
    /// Read a property's current value, scoped globally or to a member.
    GetProperty {
        member: Option<MemberId>,
        name: String,
    },
}
