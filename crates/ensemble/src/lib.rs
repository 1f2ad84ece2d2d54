//! # ensemble
//!
//! Replicated group coordination atop an externally-provided Replication
//! Runtime: membership management, deterministic leader election, and
//! per-member task queues.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                            ensemble                              │
//! │  ┌───────────┐   ┌────────────┐   ┌─────────────┐   ┌────────┐ │
//! │  │  kernel   │ → │  runtime   │ → │   client    │ → │ caller │ │
//! │  │ (pure FSM)│   │(replication│   │  (mirror +  │   │  code  │ │
//! │  │           │   │  boundary) │   │  election)  │   │        │ │
//! │  └───────────┘   └────────────┘   └─────────────┘   └────────┘ │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! The kernel ([`ensemble_kernel`]) is the pure, deterministic state
//! machine: no IO, no clocks, no randomness. The runtime
//! ([`ensemble_runtime`]) defines (and, via [`InMemoryRuntime`],
//! implements) the contract a replicated log must satisfy to host it. The
//! client ([`ensemble_client`]) maintains a local mirror, runs leader
//! election, and routes per-member tasks.
//!
//! # Quick start
//!
//! ```ignore
//! use ensemble::{GroupClient, InMemoryRuntime};
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let runtime = Arc::new(InMemoryRuntime::new(5_000));
//! let (session, events) = runtime.open_session();
//! let mut client = GroupClient::connect(runtime, session, events).await;
//!
//! let info = client.join("worker-1".into(), None, true).await?;
//! println!("joined as {info:?}, leader is {:?}", client.leader());
//! # Ok(())
//! # }
//! ```

pub use ensemble_client::{
    ClientError, ElectionEngine, GroupClient, GroupMirror, HashRingSubGroup, LeaderChange,
    PartitionMigration, PartitionSubGroup, Partitioner, RoundRobinPartitioner, SubGroup,
    TaskOutcome, TaskRouter,
};
pub use ensemble_kernel::{
    Command, CommandContext, CommandReply, Effect, KernelError, Query, QueryReply, State,
    apply_committed, apply_committed_batch, apply_query,
};
pub use ensemble_runtime::{Clock, EventSink, EventStream, InMemoryRuntime, ReplicationRuntime, RuntimeError};
pub use ensemble_types::{
    GroupEvent, GroupMemberInfo, GroupTask, LogIndex, LogicalTime, MemberId, SessionId, TaskReceipt,
    Term,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn end_to_end_join_elects_leader() {
        let runtime = Arc::new(InMemoryRuntime::new(0));
        let (session, events) = runtime.open_session();
        let mut client = GroupClient::connect(runtime.clone(), session, events).await;

        let info = client.join(MemberId::new("w1"), None, false).await.unwrap();
        assert_eq!(info.member_id, MemberId::new("w1"));
        assert_eq!(client.leader(), Some(&MemberId::new("w1")));

        client.leave(MemberId::new("w1")).await.unwrap();
        client.process_next().await.unwrap();
        assert!(client.mirror().is_empty());
    }
}
