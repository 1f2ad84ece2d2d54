//! # ensemble-kernel: functional core of the group-coordination system
//!
//! The kernel is the pure, deterministic heart of the system. It receives
//! committed commands and produces state changes plus effects to execute.
//!
//! ## Key principles
//!
//! - **No IO**: the kernel never touches disk, network, or any external resource
//! - **No clocks**: logical time is supplied by the caller, never read directly
//! - **No randomness**: same input always produces the same output
//! - **Pure functions**: `apply_committed(state, ctx, command) -> (state, effects, reply)`
//!
//! ## Architecture
//!
//! - [`command`]: commands and queries (`Join`, `Submit`, `GetProperty`, ...)
//! - [`effects`]: effects for the runtime to execute (`Publish`, `ScheduleTick`)
//! - [`state`]: the authoritative member table, property table, and task queues
//! - [`kernel`]: `apply_committed`/`apply_query`, tying it all together
//!
//! ## Example
//!
//! ```ignore
//! use ensemble_kernel::{Command, CommandContext, apply_committed, State};
//!
//! let state = State::new();
//! let ctx = CommandContext::new(index, session, now, expiration_ms);
//! let cmd = Command::Join { member_id: "m1".into(), address: None, persistent: false };
//!
//! match apply_committed(state, ctx, cmd) {
//!     Ok((new_state, effects, reply)) => {
//!         // Execute effects via the runtime, return reply to the caller...
//!     }
//!     Err(e) => {
//!         // Handle error...
//!     }
//! }
//! ```

pub mod command;
pub mod effects;
pub mod kernel;
pub mod state;

#[cfg(test)]
mod tests;

pub use command::{Command, Query};
pub use effects::Effect;
pub use kernel::{
    CommandContext, CommandReply, KernelError, QueryReply, apply_committed, apply_committed_batch,
    apply_query,
};
pub use state::{Member, State, Task};
