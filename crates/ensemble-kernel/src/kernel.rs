//! The kernel — pure functional core of the group-coordination system.
//!
//! The kernel applies committed commands to produce new state and effects.
//! It is completely pure: no IO, no clocks, no randomness. Every piece of
//! context a real system would normally reach for (the command's log
//! position, the issuing session, the current logical time) is supplied by
//! the caller instead, which is what keeps replicas deterministic.
//!
//! # Example
//!
//! ```ignore
//! let state = State::new();
//! let ctx = CommandContext::new(LogIndex::new(1), session, LogicalTime::ZERO, 0);
//! let cmd = Command::Join { member_id: "m1".into(), address: None, persistent: false };
//!
//! let (new_state, effects, _reply) = apply_committed(state, ctx, cmd)?;
//! // Runtime executes effects...
//! ```

use ensemble_types::{GroupEvent, GroupMemberInfo, GroupTask, LogIndex, LogicalTime, MemberId, SessionId};

use crate::command::{Command, Query};
use crate::effects::Effect;
use crate::state::{State, Task};

/// Context a pure kernel cannot derive on its own, supplied by the
/// Replication Runtime for every applied command.
#[derive(Debug, Clone, Copy)]
pub struct CommandContext {
    /// Log position of this command — becomes a new member's `index`, and
    /// the reply address for a submitted task.
    pub index: LogIndex,
    /// The session that issued the command.
    pub session: SessionId,
    /// The state machine's logical clock at the time of application.
    pub now: LogicalTime,
    /// Configured expiration duration for persistent members (§6), in
    /// logical-clock milliseconds. `0` means leave immediately on close.
    pub expiration_ms: u64,
}

impl CommandContext {
    pub fn new(index: LogIndex, session: SessionId, now: LogicalTime, expiration_ms: u64) -> Self {
        Self {
            index,
            session,
            now,
            expiration_ms,
        }
    }
}

/// The synchronous result of applying one command, returned to the caller
/// independently of any events fanned out to listeners (§5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandReply {
    Joined(GroupMemberInfo),
    Left,
    Listening(Vec<GroupMemberInfo>),
    PropertySet,
    PropertyRemoved,
    Submitted(LogIndex),
    Acked,
    SessionClosed,
    Ticked,
}

/// Applies a committed command to the state, producing new state, effects,
/// and the command's own synchronous reply.
pub fn apply_committed(
    state: State,
    ctx: CommandContext,
    cmd: Command,
) -> Result<(State, Vec<Effect>, CommandReply), KernelError> {
    let mut effects = Vec::new();

    match cmd {
        Command::Join {
            member_id,
            address,
            persistent,
        } => match state.get_member(&member_id) {
            None => {
                let (new_state, member) =
                    state.with_new_member(member_id, ctx.index, address, persistent, ctx.session);
                let info = member.to_info();
                for listener in new_state.listeners() {
                    effects.push(Effect::Publish {
                        session: listener,
                        event: GroupEvent::Join(info.clone(), ctx.session),
                    });
                }
                Ok((new_state, effects, CommandReply::Joined(info)))
            }
            Some(existing) if existing.persistent => {
                let new_state = state.with_rebound_member(&member_id, address, ctx.session);
                // Precondition above guaranteed the member exists.
                let info = new_state.get_member(&member_id).unwrap().to_info();
                for listener in new_state.listeners() {
                    effects.push(Effect::Publish {
                        session: listener,
                        event: GroupEvent::Join(info.clone(), ctx.session),
                    });
                }
                Ok((new_state, effects, CommandReply::Joined(info)))
            }
            Some(_) => Err(KernelError::EphemeralExists(member_id)),
        },

        Command::Leave { member_id } => {
            let (new_state, removed) = state.without_member(&member_id);
            let member = removed.ok_or_else(|| KernelError::UnknownMember(member_id.clone()))?;

            for (submitter, index) in State::tasks_to_fail(&member) {
                effects.push(Effect::Publish {
                    session: submitter,
                    event: GroupEvent::Fail(index),
                });
            }
            for listener in new_state.listeners() {
                effects.push(Effect::Publish {
                    session: listener,
                    event: GroupEvent::Leave(member_id.clone()),
                });
            }
            Ok((new_state, effects, CommandReply::Left))
        }

        Command::Listen => {
            let new_state = state.add_listener(ctx.session);
            let snapshot: Vec<GroupMemberInfo> =
                new_state.bound_members().map(|m| m.to_info()).collect();
            Ok((new_state, effects, CommandReply::Listening(snapshot)))
        }

        Command::SetProperty {
            member,
            name,
            value,
        } => {
            if let Some(id) = &member {
                if !state.member_exists(id) {
                    return Err(KernelError::UnknownMember(id.clone()));
                }
            }
            let new_state = state.with_property(member.as_ref(), name, value);
            Ok((new_state, effects, CommandReply::PropertySet))
        }

        Command::RemoveProperty { member, name } => {
            if let Some(id) = &member {
                if !state.member_exists(id) {
                    return Err(KernelError::UnknownMember(id.clone()));
                }
            }
            let new_state = state.without_property(member.as_ref(), &name);
            Ok((new_state, effects, CommandReply::PropertyRemoved))
        }

        Command::Submit { member, payload } => {
            if !state.member_exists(&member) {
                return Err(KernelError::UnknownMember(member));
            }
            let task_index = ctx.index;
            let task = Task {
                index: task_index,
                submitter_session: ctx.session,
                payload,
            };
            let (new_state, promoted) = state.with_enqueued_task(&member, task);
            if let Some(promoted) = promoted {
                if let Some(bound) = new_state.get_member(&member).and_then(|m| m.bound_session) {
                    effects.push(Effect::Publish {
                        session: bound,
                        event: GroupEvent::Task(GroupTask {
                            index: promoted.index,
                            member_id: member.clone(),
                            payload: promoted.payload,
                        }),
                    });
                }
            }
            Ok((new_state, effects, CommandReply::Submitted(task_index)))
        }

        Command::Ack {
            member_id,
            task_index,
            succeeded,
        } => {
            let (new_state, submitter, promoted) = state.with_acked_task(&member_id, task_index);
            // A mismatched or duplicate ack is silently ignored (§4.1): the
            // task it names is no longer (or never was) head-of-line.
            if let Some(submitter_session) = submitter {
                let event = if succeeded {
                    GroupEvent::Ack(task_index)
                } else {
                    GroupEvent::Fail(task_index)
                };
                effects.push(Effect::Publish {
                    session: submitter_session,
                    event,
                });
                if let Some(promoted) = promoted {
                    if let Some(bound) =
                        new_state.get_member(&member_id).and_then(|m| m.bound_session)
                    {
                        effects.push(Effect::Publish {
                            session: bound,
                            event: GroupEvent::Task(GroupTask {
                                index: promoted.index,
                                member_id: member_id.clone(),
                                payload: promoted.payload,
                            }),
                        });
                    }
                }
            }
            Ok((new_state, effects, CommandReply::Acked))
        }

        Command::SessionClosed { session } => {
            let bound_ids = state.member_ids_bound_to(session);
            let mut new_state = state.close_session(session);
            let mut left_ids = Vec::new();

            for member_id in bound_ids {
                let Some(member) = new_state.get_member(&member_id).cloned() else {
                    continue;
                };
                if member.persistent {
                    let (s, epoch) = new_state.with_unbound_member(&member_id);
                    new_state = s;
                    let epoch = epoch.expect("member existed above");
                    if ctx.expiration_ms == 0 {
                        let (s2, removed) = new_state.without_member(&member_id);
                        new_state = s2;
                        if let Some(m) = removed {
                            for (submitter, index) in State::tasks_to_fail(&m) {
                                effects.push(Effect::Publish {
                                    session: submitter,
                                    event: GroupEvent::Fail(index),
                                });
                            }
                        }
                        left_ids.push(member_id);
                    } else {
                        let fire_at = ctx.now.plus_millis(ctx.expiration_ms);
                        new_state = new_state.with_scheduled_expiration(
                            member_id.clone(),
                            epoch,
                            fire_at,
                        );
                        effects.push(Effect::ScheduleTick { at: fire_at });
                    }
                } else {
                    let (s, removed) = new_state.without_member(&member_id);
                    new_state = s;
                    if let Some(m) = removed {
                        for (submitter, index) in State::tasks_to_fail(&m) {
                            effects.push(Effect::Publish {
                                session: submitter,
                                event: GroupEvent::Fail(index),
                            });
                        }
                    }
                    left_ids.push(member_id);
                }
            }

            // Deferred until every affected member has been closed, so no
            // session observes a `leave` before the fails it implied.
            for member_id in left_ids {
                for listener in new_state.listeners() {
                    effects.push(Effect::Publish {
                        session: listener,
                        event: GroupEvent::Leave(member_id.clone()),
                    });
                }
            }

            Ok((new_state, effects, CommandReply::SessionClosed))
        }

        Command::Tick => {
            let (state, expired) = state.fire_due_expirations(ctx.now);
            let mut new_state = state;
            let mut left_ids = Vec::new();

            for member_id in expired {
                let (s, removed) = new_state.without_member(&member_id);
                new_state = s;
                if let Some(m) = removed {
                    for (submitter, index) in State::tasks_to_fail(&m) {
                        effects.push(Effect::Publish {
                            session: submitter,
                            event: GroupEvent::Fail(index),
                        });
                    }
                    left_ids.push(member_id);
                }
            }
            for member_id in left_ids {
                for listener in new_state.listeners() {
                    effects.push(Effect::Publish {
                        session: listener,
                        event: GroupEvent::Leave(member_id.clone()),
                    });
                }
            }
            if let Some(next) = new_state.next_scheduled_expiration() {
                effects.push(Effect::ScheduleTick { at: next });
            }

            Ok((new_state, effects, CommandReply::Ticked))
        }
    }
}

/// Applies a sequence of committed commands in order, short-circuiting on
/// the first error. Effects from every command are concatenated in order.
pub fn apply_committed_batch(
    mut state: State,
    commands: Vec<(CommandContext, Command)>,
) -> Result<(State, Vec<Effect>, Vec<CommandReply>), KernelError> {
    let mut all_effects = Vec::new();
    let mut replies = Vec::with_capacity(commands.len());
    for (ctx, cmd) in commands {
        let (new_state, mut effects, reply) = apply_committed(state, ctx, cmd)?;
        state = new_state;
        all_effects.append(&mut effects);
        replies.push(reply);
    }
    Ok((state, all_effects, replies))
}

/// Answers a read-only query without mutating state.
pub fn apply_query(state: &State, query: Query) -> QueryReply {
    match query {
        Query::GetProperty { member, name } => {
            QueryReply::Property(state.get_property(member.as_ref(), &name).cloned())
        }
    }
}

/// The result of a read-only query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryReply {
    Property(Option<bytes::Bytes>),
}

/// Errors that can occur when applying commands to the kernel (§7).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    #[error("member '{0}' already exists and is not persistent")]
    EphemeralExists(MemberId),

    #[error("unknown member '{0}'")]
    UnknownMember(MemberId),
}
