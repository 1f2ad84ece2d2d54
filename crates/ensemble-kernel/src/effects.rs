//! Effects produced by the kernel.
//!
//! Effects represent actions the runtime must carry out after a command is
//! applied: publishing an event to a session, or scheduling the next tick so
//! an expiration timer fires. The kernel is pure — it produces effects but
//! never executes them.

use ensemble_types::{GroupEvent, LogicalTime, SessionId};
use serde::{Deserialize, Serialize};

/// An effect to be executed by the runtime after [`crate::kernel::apply_committed`]
/// returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    /// Publish an event to one session. Delivery is reliable and in-order
    /// per session, but silently dropped if the session is inactive (§7).
    Publish {
        session: SessionId,
        event: GroupEvent,
    },

    /// Ask the runtime to submit a `Tick` command no later than `at`, so the
    /// next due expiration fires. The runtime may coalesce overlapping
    /// requests; it must never fire earlier than requested.
    ScheduleTick { at: LogicalTime },
}
