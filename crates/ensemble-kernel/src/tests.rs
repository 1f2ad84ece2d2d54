use bytes::Bytes;
use ensemble_types::{LogIndex, LogicalTime, MemberId, SessionId};
use test_case::test_case;

use crate::command::Command;
use crate::kernel::{CommandContext, CommandReply, KernelError, apply_committed};
use crate::state::State;

fn ctx(index: u64, session: u64, now: u64, expiration_ms: u64) -> CommandContext {
    CommandContext::new(
        LogIndex::new(index),
        SessionId::new(session),
        LogicalTime::new(now),
        expiration_ms,
    )
}

fn join(member: &str, persistent: bool) -> Command {
    Command::Join {
        member_id: MemberId::new(member),
        address: None,
        persistent,
    }
}

#[test]
fn join_creates_member_and_returns_info() {
    let state = State::new();
    let (state, effects, reply) =
        apply_committed(state, ctx(1, 1, 0, 0), join("m1", false)).unwrap();

    assert!(state.member_exists(&MemberId::new("m1")));
    assert!(effects.is_empty(), "no listeners yet, nothing to publish");
    match reply {
        CommandReply::Joined(info) => assert_eq!(info.member_id, MemberId::new("m1")),
        other => panic!("unexpected reply: {other:?}"),
    }
}

#[test]
fn join_publishes_to_existing_listeners_only() {
    let state = State::new();
    let (state, _, _) = apply_committed(state, ctx(1, 1, 0, 0), Command::Listen).unwrap();
    let (_, effects, _) = apply_committed(state, ctx(2, 2, 0, 0), join("m1", false)).unwrap();

    assert_eq!(effects.len(), 1, "exactly the one listening session hears it");
}

#[test]
fn ephemeral_rejoin_under_same_id_fails() {
    let state = State::new();
    let (state, _, _) = apply_committed(state, ctx(1, 1, 0, 0), join("m1", false)).unwrap();
    let err = apply_committed(state, ctx(2, 2, 0, 0), join("m1", false)).unwrap_err();

    assert_eq!(err, KernelError::EphemeralExists(MemberId::new("m1")));
}

#[test]
fn persistent_rejoin_rebinds_without_error() {
    let state = State::new();
    let (state, _, _) = apply_committed(state, ctx(1, 1, 0, 0), join("p1", true)).unwrap();
    let (state, _, reply) = apply_committed(state, ctx(2, 2, 0, 0), join("p1", true)).unwrap();

    match reply {
        CommandReply::Joined(info) => assert_eq!(info.index, LogIndex::new(1), "original creation index is retained"),
        other => panic!("unexpected reply: {other:?}"),
    }
    assert_eq!(
        state.get_member(&MemberId::new("p1")).unwrap().bound_session,
        Some(SessionId::new(2))
    );
}

#[test]
fn leave_fails_pending_task_before_publishing_leave() {
    let state = State::new();
    let (state, _, _) = apply_committed(state, ctx(1, 1, 0, 0), join("w1", false)).unwrap();
    let (state, _, _) = apply_committed(
        state,
        ctx(2, 2, 0, 0),
        Command::Submit {
            member: MemberId::new("w1"),
            payload: Bytes::from_static(b"work"),
        },
    )
    .unwrap();
    let (_, effects, _) = apply_committed(
        state,
        ctx(3, 3, 0, 0),
        Command::Leave {
            member_id: MemberId::new("w1"),
        },
    )
    .unwrap();

    // The fail to the submitter must precede any leave fan-out.
    assert!(matches!(
        effects[0],
        crate::effects::Effect::Publish {
            event: ensemble_types::GroupEvent::Fail(_),
            ..
        }
    ));
}

#[test]
fn leave_unknown_member_is_an_error() {
    let state = State::new();
    let err = apply_committed(
        state,
        ctx(1, 1, 0, 0),
        Command::Leave {
            member_id: MemberId::new("ghost"),
        },
    )
    .unwrap_err();

    assert_eq!(err, KernelError::UnknownMember(MemberId::new("ghost")));
}

#[test]
fn properties_round_trip_set_get_remove() {
    let state = State::new();
    let (state, _, _) = apply_committed(
        state,
        ctx(1, 1, 0, 0),
        Command::SetProperty {
            member: None,
            name: "region".into(),
            value: Bytes::from_static(b"us-east"),
        },
    )
    .unwrap();

    assert_eq!(
        state.get_property(None, "region"),
        Some(&Bytes::from_static(b"us-east"))
    );

    let (state, _, _) = apply_committed(
        state,
        ctx(2, 1, 0, 0),
        Command::RemoveProperty {
            member: None,
            name: "region".into(),
        },
    )
    .unwrap();

    assert_eq!(state.get_property(None, "region"), None);
}

#[test_case(true; "succeeded")]
#[test_case(false; "failed")]
fn ack_completes_task_and_promotes_backlog(succeeded: bool) {
    let state = State::new();
    let (state, _, _) = apply_committed(state, ctx(1, 1, 0, 0), join("w1", false)).unwrap();
    let (state, _, _) = apply_committed(
        state,
        ctx(2, 2, 0, 0),
        Command::Submit {
            member: MemberId::new("w1"),
            payload: Bytes::from_static(b"t1"),
        },
    )
    .unwrap();
    let (state, _, _) = apply_committed(
        state,
        ctx(3, 2, 0, 0),
        Command::Submit {
            member: MemberId::new("w1"),
            payload: Bytes::from_static(b"t2"),
        },
    )
    .unwrap();

    let (state, effects, _) = apply_committed(
        state,
        ctx(4, 1, 0, 0),
        Command::Ack {
            member_id: MemberId::new("w1"),
            task_index: LogIndex::new(2),
            succeeded,
        },
    )
    .unwrap();

    assert_eq!(
        state.get_member(&MemberId::new("w1")).unwrap().pending_task.as_ref().unwrap().index,
        LogIndex::new(3),
        "t2 is promoted to head-of-line"
    );
    assert_eq!(effects.len(), 2, "reply to submitter plus the promoted task event");
}

#[test]
fn duplicate_ack_is_ignored() {
    let state = State::new();
    let (state, _, _) = apply_committed(state, ctx(1, 1, 0, 0), join("w1", false)).unwrap();
    let (state, _, _) = apply_committed(
        state,
        ctx(2, 2, 0, 0),
        Command::Submit {
            member: MemberId::new("w1"),
            payload: Bytes::from_static(b"t1"),
        },
    )
    .unwrap();
    let (state, _, _) = apply_committed(
        state,
        ctx(3, 1, 0, 0),
        Command::Ack {
            member_id: MemberId::new("w1"),
            task_index: LogIndex::new(2),
            succeeded: true,
        },
    )
    .unwrap();

    let (_, effects, reply) = apply_committed(
        state,
        ctx(4, 1, 0, 0),
        Command::Ack {
            member_id: MemberId::new("w1"),
            task_index: LogIndex::new(2),
            succeeded: true,
        },
    )
    .unwrap();

    assert!(effects.is_empty());
    assert_eq!(reply, CommandReply::Acked);
}

#[test]
fn session_close_defers_ephemeral_member_immediately() {
    let state = State::new();
    let (state, _, _) = apply_committed(state, ctx(1, 2, 0, 0), join("e1", false)).unwrap();
    let (state, _, _) = apply_committed(state, ctx(2, 3, 0, 0), Command::Listen).unwrap();

    let (state, effects, _) = apply_committed(
        state,
        ctx(3, 2, 0, 0),
        Command::SessionClosed {
            session: SessionId::new(2),
        },
    )
    .unwrap();

    assert!(!state.member_exists(&MemberId::new("e1")));
    assert_eq!(effects.len(), 1);
}

#[test]
fn session_close_schedules_expiration_for_persistent_member() {
    let state = State::new();
    let (state, _, _) = apply_committed(state, ctx(1, 2, 0, 0), join("p1", true)).unwrap();

    let (state, effects, _) = apply_committed(
        state,
        ctx(2, 2, 0, 5_000),
        Command::SessionClosed {
            session: SessionId::new(2),
        },
    )
    .unwrap();

    assert!(state.member_exists(&MemberId::new("p1")), "member persists through expiration window");
    assert!(matches!(effects[0], crate::effects::Effect::ScheduleTick { .. }));
}

#[test]
fn rejoin_before_expiration_cancels_the_timer() {
    let state = State::new();
    let (state, _, _) = apply_committed(state, ctx(1, 2, 0, 0), join("p1", true)).unwrap();
    let (state, _, _) = apply_committed(
        state,
        ctx(2, 2, 0, 5_000),
        Command::SessionClosed {
            session: SessionId::new(2),
        },
    )
    .unwrap();
    let (state, _, _) = apply_committed(state, ctx(3, 5, 3_000, 5_000), join("p1", true)).unwrap();

    let (state, _, _) =
        apply_committed(state, ctx(4, 0, 5_100, 5_000), Command::Tick).unwrap();

    assert!(
        state.member_exists(&MemberId::new("p1")),
        "rebinding bumped the epoch, so the stale timer must not evict the member"
    );
}

#[test]
fn expiration_fires_and_publishes_leave() {
    let state = State::new();
    let (state, _, _) = apply_committed(state, ctx(1, 2, 0, 0), join("p1", true)).unwrap();
    let (state, _, _) = apply_committed(state, ctx(2, 3, 0, 0), Command::Listen).unwrap();
    let (state, _, _) = apply_committed(
        state,
        ctx(3, 2, 0, 5_000),
        Command::SessionClosed {
            session: SessionId::new(2),
        },
    )
    .unwrap();

    let (state, effects, _) =
        apply_committed(state, ctx(4, 0, 5_000, 5_000), Command::Tick).unwrap();

    assert!(!state.member_exists(&MemberId::new("p1")));
    assert!(matches!(
        effects[0],
        crate::effects::Effect::Publish {
            event: ensemble_types::GroupEvent::Leave(_),
            ..
        }
    ));
}

#[test]
fn listen_snapshot_is_ordered_by_creation_index() {
    let state = State::new();
    let (state, _, _) = apply_committed(state, ctx(1, 1, 0, 0), join("b", false)).unwrap();
    let (state, _, _) = apply_committed(state, ctx(2, 2, 0, 0), join("a", false)).unwrap();

    let (_, _, reply) = apply_committed(state, ctx(3, 3, 0, 0), Command::Listen).unwrap();
    match reply {
        CommandReply::Listening(snapshot) => {
            let ids: Vec<_> = snapshot.iter().map(|m| m.member_id.as_str()).collect();
            assert_eq!(ids, vec!["b", "a"], "ordered by index, not lexicographically");
        }
        other => panic!("unexpected reply: {other:?}"),
    }
}

mod invariants {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn at_most_one_pending_task_per_member(task_count in 1usize..20) {
            let mut state = State::new();
            let (s, _, _) = apply_committed(state, ctx(1, 1, 0, 0), join("w1", false)).unwrap();
            state = s;
            let mut next_index = 2u64;
            for _ in 0..task_count {
                let (s, _, _) = apply_committed(
                    state,
                    ctx(next_index, 2, 0, 0),
                    Command::Submit {
                        member: MemberId::new("w1"),
                        payload: Bytes::from_static(b"x"),
                    },
                )
                .unwrap();
                state = s;
                next_index += 1;
            }

            let member = state.get_member(&MemberId::new("w1")).unwrap();
            prop_assert!(member.pending_task.is_some());
            prop_assert!(member.task_backlog.len() == task_count.saturating_sub(1));
        }
    }
}
