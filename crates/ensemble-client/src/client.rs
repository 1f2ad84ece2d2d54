//! `GroupClient`: glue tying the mirror, election, task routing, and
//! sub-groups to a concrete Replication Runtime (§4.6).

use std::sync::Arc;

use bytes::Bytes;
use ensemble_kernel::{Command, CommandReply, Query, QueryReply};
use ensemble_runtime::{EventStream, ReplicationRuntime};
use ensemble_types::{GroupEvent, GroupMemberInfo, MemberId, SessionId};
use tokio::sync::oneshot;

use crate::election::{ElectionEngine, LeaderChange};
use crate::error::ClientError;
use crate::mirror::GroupMirror;
use crate::subgroup::SubGroup;
use crate::task_router::{TaskOutcome, TaskRouter};

/// A pending local `Join`, gated on observing the matching session's own
/// `join` event before its future resolves (§9's join-completion
/// resolution): a `join` for the same member under a *different* session is
/// an ordinary mirror update, never "my join completed."
struct PendingJoin {
    member_id: MemberId,
    session: SessionId,
    tx: oneshot::Sender<GroupMemberInfo>,
}

/// Subscribes to a group's event stream, maintains a local mirror of the
/// membership, and drives election + sub-group composition as events
/// arrive.
pub struct GroupClient<R> {
    runtime: Arc<R>,
    session: SessionId,
    events: EventStream,
    mirror: GroupMirror,
    election: ElectionEngine,
    task_router: TaskRouter<R>,
    subgroups: Vec<Box<dyn SubGroup>>,
    pending_join: Option<PendingJoin>,
}

impl<R: ReplicationRuntime> GroupClient<R> {
    /// Opens a session against `runtime` and bootstraps the mirror via
    /// `Listen`. The returned client owns the event-processing loop; call
    /// [`GroupClient::process_next`] (or [`GroupClient::run`]) to drive it.
    pub async fn connect(runtime: Arc<R>, session: SessionId, events: EventStream) -> Self {
        let mut client = Self {
            runtime: runtime.clone(),
            session,
            events,
            mirror: GroupMirror::new(),
            election: ElectionEngine::new(),
            task_router: TaskRouter::new(runtime, session),
            subgroups: Vec::new(),
            pending_join: None,
        };
        if let Ok(CommandReply::Listening(snapshot)) =
            client.runtime.submit_command(session, Command::Listen).await
        {
            client.mirror.bootstrap(snapshot);
        }
        client
    }

    pub fn register_subgroup(&mut self, subgroup: Box<dyn SubGroup>) {
        self.subgroups.push(subgroup);
    }

    pub fn mirror(&self) -> &GroupMirror {
        &self.mirror
    }

    pub fn leader(&self) -> Option<&MemberId> {
        self.election.leader()
    }

    /// Joins the group as `member_id`, returning the envelope once the
    /// client has itself observed the corresponding `join` event — not
    /// merely once the command commits (§5's ordering guarantee).
    pub async fn join(
        &mut self,
        member_id: MemberId,
        address: Option<String>,
        persistent: bool,
    ) -> Result<GroupMemberInfo, ClientError> {
        let (tx, rx) = oneshot::channel();
        self.pending_join = Some(PendingJoin {
            member_id: member_id.clone(),
            session: self.session,
            tx,
        });
        self.runtime
            .submit_command(
                self.session,
                Command::Join {
                    member_id,
                    address,
                    persistent,
                },
            )
            .await?;
        loop {
            self.process_next().await?;
            if let Ok(info) = rx.try_recv() {
                return Ok(info);
            }
        }
    }

    pub async fn leave(&mut self, member_id: MemberId) -> Result<(), ClientError> {
        self.runtime
            .submit_command(self.session, Command::Leave { member_id })
            .await?;
        Ok(())
    }

    pub async fn set_property(
        &mut self,
        member: Option<MemberId>,
        name: String,
        value: Bytes,
    ) -> Result<(), ClientError> {
        self.runtime
            .submit_command(self.session, Command::SetProperty { member, name, value })
            .await?;
        Ok(())
    }

    pub async fn get_property(
        &self,
        member: Option<MemberId>,
        name: String,
    ) -> Result<Option<Bytes>, ClientError> {
        let QueryReply::Property(value) = self
            .runtime
            .submit_query(Query::GetProperty { member, name })
            .await;
        Ok(value)
    }

    /// Submits a task to `member`, resolving once the corresponding
    /// `ack`/`fail` event is processed.
    pub async fn submit(
        &mut self,
        member: MemberId,
        payload: Bytes,
    ) -> Result<TaskOutcome, ClientError> {
        let rx = self.task_router.submit(member, payload).await?;
        loop {
            self.process_next().await?;
            if let Ok(outcome) = rx.try_recv() {
                return Ok(outcome);
            }
        }
    }

    /// Drains and applies exactly one event from the runtime, or blocks
    /// until one arrives. Application code normally drives this via
    /// [`GroupClient::run`] rather than calling it directly.
    pub async fn process_next(&mut self) -> Result<(), ClientError> {
        let Some(event) = self.events.recv().await else {
            return Ok(());
        };
        self.apply_event(event);
        Ok(())
    }

    /// Runs the event-processing loop until the stream closes.
    pub async fn run(&mut self) -> Result<(), ClientError> {
        while let Some(event) = self.events.recv().await {
            self.apply_event(event);
        }
        Ok(())
    }

    fn apply_event(&mut self, event: GroupEvent) {
        match event {
            GroupEvent::Join(info, event_session) => {
                if let Some(pending) = &self.pending_join {
                    if pending.member_id == info.member_id && pending.session == event_session {
                        if let Some(pending) = self.pending_join.take() {
                            let _ = pending.tx.send(info.clone());
                        }
                    }
                }
                if let Some(updated) = self.mirror.merge_join(info.clone()) {
                    let change = self.election.on_join(&updated);
                    self.dispatch_leader_change(change);
                    for sub in &mut self.subgroups {
                        sub.on_join(&updated);
                    }
                }
            }
            GroupEvent::Leave(member_id) => {
                if self.mirror.remove(&member_id).is_some() {
                    let remaining: Vec<_> = self.mirror.ordered().cloned().collect();
                    let change = self.election.on_leave(&member_id, remaining.into_iter());
                    self.dispatch_leader_change(change);
                    for sub in &mut self.subgroups {
                        sub.on_leave(&member_id);
                    }
                }
            }
            GroupEvent::Ack(index) => self.task_router.complete_ack(index),
            GroupEvent::Fail(index) => self.task_router.complete_fail(index),
            GroupEvent::Task(_) => {
                // Task delivery to the bound member is handled by the
                // embedding application; the client only routes submitter
                // futures, not inbound task execution.
            }
        }
    }

    fn dispatch_leader_change(&self, change: Option<LeaderChange>) {
        if let Some(change) = change {
            tracing::debug!(term = change.term.as_u64(), leader = ?change.leader, "leader changed");
        }
    }
}
