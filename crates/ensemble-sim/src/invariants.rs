//! Property tests for the invariants in §8: unique membership, at-most-one
//! task in flight, ordered delivery, and election convergence.

use std::collections::HashSet;

use bytes::Bytes;
use ensemble_client::ElectionEngine;
use ensemble_kernel::{Command, CommandReply};
use ensemble_types::{GroupEvent, GroupMemberInfo, LogIndex, MemberId, SessionId};
use proptest::prelude::*;
use test_case::test_case;

use crate::Sim;

fn member_ids(n: usize) -> Vec<MemberId> {
    (0..n).map(|i| MemberId::new(format!("m{i}"))).collect()
}

proptest! {
    /// At any point in a random join/leave history, every currently-bound
    /// member id is unique in `State` — a `BTreeMap` already guarantees
    /// this structurally, but the property also checks that our tally of
    /// "currently joined" members (tracked independently of the kernel)
    /// matches the kernel's own count, so a bug that silently double-counts
    /// or drops a member would show up here.
    #[test]
    fn unique_membership_matches_an_independent_tally(
        ops in proptest::collection::vec(0usize..3, 1..40)
    ) {
        let ids = member_ids(4);
        let mut sim = Sim::new(0);
        let mut session = SessionId::new(1);
        let mut joined: HashSet<MemberId> = HashSet::new();

        for (step, op) in ops.into_iter().enumerate() {
            let id = ids[step % ids.len()].clone();
            session = SessionId::new(session.as_u64() + 1);
            match op {
                0 => {
                    if sim
                        .submit(session, Command::Join { member_id: id.clone(), address: None, persistent: false })
                        .is_ok()
                    {
                        joined.insert(id);
                    }
                }
                _ => {
                    if sim.submit(session, Command::Leave { member_id: id.clone() }).is_ok() {
                        joined.remove(&id);
                    }
                }
            }
        }

        prop_assert_eq!(sim.state().member_count(), joined.len());
        for id in &joined {
            prop_assert!(sim.state().member_exists(id));
        }
    }

    /// Submitting N tasks to one member and acking the head-of-line task
    /// one at a time always delivers `Task` events to the owner in strictly
    /// increasing log-index order, regardless of how many tasks are
    /// in-flight at once (at most one ever is) or which acks succeed.
    #[test]
    fn tasks_are_delivered_in_strictly_increasing_index_order(
        count in 1usize..12,
        outcomes in proptest::collection::vec(any::<bool>(), 0..12),
    ) {
        let mut sim = Sim::new(0);
        let owner = SessionId::new(1);
        let submitter = SessionId::new(2);
        sim.submit(owner, Command::Join { member_id: MemberId::new("w"), address: None, persistent: false }).unwrap();

        let mut submitted = Vec::new();
        for i in 0..count {
            let reply = sim
                .submit(
                    submitter,
                    Command::Submit { member: MemberId::new("w"), payload: Bytes::from(vec![i as u8]) },
                )
                .unwrap();
            match reply {
                CommandReply::Submitted(index) => submitted.push(index),
                other => prop_assert!(false, "unexpected reply: {other:?}"),
            }
        }

        for (i, succeeded) in outcomes.into_iter().take(count).enumerate() {
            let index = submitted[i];
            sim.submit(
                owner,
                Command::Ack { member_id: MemberId::new("w"), task_index: index, succeeded },
            )
            .unwrap();
        }

        let delivered: Vec<LogIndex> = sim
            .events_for(owner)
            .iter()
            .filter_map(|e| match e {
                GroupEvent::Task(t) => Some(t.index),
                _ => None,
            })
            .collect();

        prop_assert_eq!(&delivered, &submitted);
        for pair in delivered.windows(2) {
            prop_assert!(pair[0] < pair[1]);
        }
    }

    /// Two `ElectionEngine` instances fed the identical join/leave sequence
    /// converge to the same leader and term — the election function has no
    /// hidden randomness or ordering dependence beyond the input sequence.
    #[test]
    fn election_convergence_across_independent_engines(
        indices in proptest::collection::vec(1u64..20, 1..10),
    ) {
        let members: Vec<GroupMemberInfo> = indices
            .iter()
            .enumerate()
            .map(|(i, idx)| GroupMemberInfo::new(MemberId::new(format!("m{i}")), LogIndex::new(*idx), None, false))
            .collect();

        let mut engine_a = ElectionEngine::new();
        let mut engine_b = ElectionEngine::new();
        for m in &members {
            engine_a.on_join(m);
            engine_b.on_join(m);
        }

        prop_assert_eq!(engine_a.leader(), engine_b.leader());
        prop_assert_eq!(engine_a.term(), engine_b.term());
        let min_index = indices.iter().min().copied().unwrap();
        let expected_leader = members.iter().find(|m| m.index.as_u64() == min_index).unwrap();
        prop_assert_eq!(engine_a.leader(), Some(&expected_leader.member_id));
    }
}

#[test_case(true, true; "both acks succeed")]
#[test_case(true, false; "first succeeds, second fails")]
#[test_case(false, true; "first fails, second succeeds")]
#[test_case(false, false; "both acks fail")]
fn at_most_one_task_in_flight_regardless_of_ack_outcome(first_ok: bool, second_ok: bool) {
    let mut sim = Sim::new(0);
    let owner = SessionId::new(1);
    let submitter = SessionId::new(2);
    sim.submit(
        owner,
        Command::Join { member_id: MemberId::new("w"), address: None, persistent: false },
    )
    .unwrap();

    let mut indices = Vec::new();
    for i in 0..3u8 {
        match sim
            .submit(
                submitter,
                Command::Submit { member: MemberId::new("w"), payload: Bytes::from(vec![i]) },
            )
            .unwrap()
        {
            CommandReply::Submitted(index) => indices.push(index),
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    let member = sim.state().get_member(&MemberId::new("w")).unwrap();
    assert_eq!(member.pending_task.as_ref().map(|t| t.index), Some(indices[0]));
    assert_eq!(member.task_backlog.len(), 2);

    sim.submit(
        owner,
        Command::Ack { member_id: MemberId::new("w"), task_index: indices[0], succeeded: first_ok },
    )
    .unwrap();
    let member = sim.state().get_member(&MemberId::new("w")).unwrap();
    assert_eq!(member.pending_task.as_ref().map(|t| t.index), Some(indices[1]));
    assert_eq!(member.task_backlog.len(), 1);

    sim.submit(
        owner,
        Command::Ack { member_id: MemberId::new("w"), task_index: indices[1], succeeded: second_ok },
    )
    .unwrap();
    let member = sim.state().get_member(&MemberId::new("w")).unwrap();
    assert_eq!(member.pending_task.as_ref().map(|t| t.index), Some(indices[2]));
    assert!(member.task_backlog.is_empty());
}
