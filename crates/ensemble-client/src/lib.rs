//! # ensemble-client: client-side membership, election, and task routing
//!
//! - [`mirror`]: the idempotent member mirror (§4.6)
//! - [`election`]: deterministic leader election over the mirror (§4.3)
//! - [`task_router`]: per-member task submission and completion (§4.4)
//! - [`subgroup`]: consistent-hash and partition derived views (§4.5)
//! - [`client`]: [`GroupClient`], tying the above to a Replication Runtime

mod client;
mod election;
mod error;
mod mirror;
mod subgroup;
mod task_router;

pub use client::GroupClient;
pub use election::{ElectionEngine, LeaderChange};
pub use error::ClientError;
pub use mirror::GroupMirror;
pub use subgroup::{HashRingSubGroup, PartitionMigration, PartitionSubGroup, Partitioner, RoundRobinPartitioner, SubGroup};
pub use task_router::{TaskOutcome, TaskRouter};
