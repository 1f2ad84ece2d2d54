//! Per-member task submission and future completion (§4.4).

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use ensemble_kernel::{Command, CommandReply};
use ensemble_runtime::ReplicationRuntime;
use ensemble_types::{LogIndex, MemberId, SessionId};
use tokio::sync::oneshot;

use crate::error::ClientError;

/// The outcome of a submitted task, delivered when the member acks or fails
/// it (or is removed while it is outstanding).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Acked,
    Failed,
}

/// Routes task submissions to the Replication Runtime and completes the
/// caller's future when the matching `ack`/`fail` event arrives.
///
/// At-most-one task in flight per member is enforced by the state machine
/// (§4.1); this router may have many members' tasks outstanding at once.
pub struct TaskRouter<R> {
    runtime: Arc<R>,
    session: SessionId,
    pending: HashMap<LogIndex, oneshot::Sender<TaskOutcome>>,
}

impl<R: ReplicationRuntime> TaskRouter<R> {
    pub fn new(runtime: Arc<R>, session: SessionId) -> Self {
        Self {
            runtime,
            session,
            pending: HashMap::new(),
        }
    }

    /// Submits a task to `member`, returning a future that resolves once
    /// the Replication Runtime reports its ack/fail. Fails synchronously
    /// (without registering a pending future) if the submit command itself
    /// is rejected — e.g. an unknown member.
    pub async fn submit(
        &mut self,
        member: MemberId,
        payload: Bytes,
    ) -> Result<oneshot::Receiver<TaskOutcome>, ClientError> {
        let reply = self
            .runtime
            .submit_command(self.session, Command::Submit { member, payload })
            .await?;
        let CommandReply::Submitted(index) = reply else {
            unreachable!("Submit command always replies Submitted");
        };
        let (tx, rx) = oneshot::channel();
        self.pending.insert(index, tx);
        Ok(rx)
    }

    /// Called by the event-processing loop on a received `ack` event.
    pub fn complete_ack(&mut self, index: LogIndex) {
        if let Some(tx) = self.pending.remove(&index) {
            let _ = tx.send(TaskOutcome::Acked);
        }
    }

    /// Called by the event-processing loop on a received `fail` event.
    pub fn complete_fail(&mut self, index: LogIndex) {
        if let Some(tx) = self.pending.remove(&index) {
            let _ = tx.send(TaskOutcome::Failed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ensemble_runtime::InMemoryRuntime;
    use ensemble_types::MemberId;

    #[tokio::test]
    async fn submit_to_unknown_member_fails_without_registering() {
        let runtime = Arc::new(InMemoryRuntime::new(0));
        let mut router = TaskRouter::new(runtime, SessionId::new(1));
        let err = router
            .submit(MemberId::new("ghost"), Bytes::from_static(b"x"))
            .await;
        assert!(err.is_err());
        assert!(router.pending.is_empty());
    }

    #[tokio::test]
    async fn ack_completes_the_matching_future() {
        let runtime = Arc::new(InMemoryRuntime::new(0));
        let (worker_session, _events) = runtime.open_session();
        runtime
            .submit_command(
                worker_session,
                Command::Join {
                    member_id: MemberId::new("w1"),
                    address: None,
                    persistent: false,
                },
            )
            .await
            .unwrap();

        let (submitter, _rx) = runtime.open_session();
        let mut router = TaskRouter::new(runtime, submitter);
        let future = router
            .submit(MemberId::new("w1"), Bytes::from_static(b"job"))
            .await
            .unwrap();

        router.complete_ack(LogIndex::new(2));
        assert_eq!(future.await.unwrap(), TaskOutcome::Acked);
    }
}
