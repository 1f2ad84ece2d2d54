//! # ensemble-runtime: the Replication Runtime boundary
//!
//! This crate defines the contract between the pure kernel and whatever
//! replicated log actually carries commands to commit ([`traits::ReplicationRuntime`],
//! [`traits::Clock`], [`traits::EventSink`]), plus a deterministic single-process
//! reference implementation ([`memory::InMemoryRuntime`]) good enough to drive
//! the CLI and the scenario harness without a real consensus protocol.

pub mod memory;
pub mod traits;

pub use memory::{EventStream, InMemoryRuntime, SystemLogicalClock};
pub use traits::{Clock, EventSink, ReplicationRuntime};

/// Errors surfaced by a `ReplicationRuntime` implementation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error(transparent)]
    Kernel(#[from] ensemble_kernel::KernelError),
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use ensemble_kernel::{Command, CommandReply};
    use ensemble_types::MemberId;

    use super::*;

    #[tokio::test]
    async fn join_then_listen_observes_the_join() {
        let runtime = InMemoryRuntime::new(5_000);
        let (listener, mut events) = runtime.open_session();
        runtime
            .submit_command(listener, Command::Listen)
            .await
            .unwrap();

        let (joiner, _joiner_events) = runtime.open_session();
        runtime
            .submit_command(
                joiner,
                Command::Join {
                    member_id: MemberId::new("m1"),
                    address: None,
                    persistent: false,
                },
            )
            .await
            .unwrap();

        let event = events.recv().await.expect("listener sees the join");
        assert!(matches!(event, ensemble_types::GroupEvent::Join(..)));
    }

    #[tokio::test]
    async fn submit_delivers_task_to_bound_member() {
        let runtime = InMemoryRuntime::new(0);
        let (worker, mut worker_events) = runtime.open_session();
        runtime
            .submit_command(
                worker,
                Command::Join {
                    member_id: MemberId::new("w1"),
                    address: None,
                    persistent: false,
                },
            )
            .await
            .unwrap();

        let (submitter, _rx) = runtime.open_session();
        let reply = runtime
            .submit_command(
                submitter,
                Command::Submit {
                    member: MemberId::new("w1"),
                    payload: Bytes::from_static(b"job"),
                },
            )
            .await
            .unwrap();
        assert!(matches!(reply, CommandReply::Submitted(_)));

        let event = worker_events.recv().await.expect("worker receives the task");
        assert!(matches!(event, ensemble_types::GroupEvent::Task(_)));
    }

    #[tokio::test]
    async fn closing_a_session_leaves_its_ephemeral_members() {
        let runtime = InMemoryRuntime::new(0);
        let (listener, mut events) = runtime.open_session();
        runtime
            .submit_command(listener, Command::Listen)
            .await
            .unwrap();

        let (worker, _rx) = runtime.open_session();
        runtime
            .submit_command(
                worker,
                Command::Join {
                    member_id: MemberId::new("w1"),
                    address: None,
                    persistent: false,
                },
            )
            .await
            .unwrap();
        events.recv().await.unwrap(); // the join

        runtime.close_session(worker).await.unwrap();
        let event = events.recv().await.expect("listener sees the leave");
        assert!(matches!(event, ensemble_types::GroupEvent::Leave(_)));
    }
}
