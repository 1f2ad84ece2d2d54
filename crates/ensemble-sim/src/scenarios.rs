//! The six end-to-end scenarios (§8), reproduced against [`Sim`] — and, for
//! the one scenario that is purely a client-side concern, against
//! [`ensemble_client::ElectionEngine`] directly.

use bytes::Bytes;
use ensemble_kernel::{Command, CommandReply};
use ensemble_types::{GroupEvent, GroupMemberInfo, LogIndex, LogicalTime, MemberId, SessionId};

use crate::Sim;

fn join(member: &str, persistent: bool) -> Command {
    Command::Join {
        member_id: MemberId::new(member),
        address: None,
        persistent,
    }
}

#[test]
fn scenario_1_two_clients_one_ephemeral_member() {
    let mut sim = Sim::new(5_000);
    let c1 = SessionId::new(1);
    let c2 = SessionId::new(2);

    sim.submit(c1, join("m1", false)).unwrap();
    let reply = sim.submit(c2, Command::Listen).unwrap();
    match reply {
        CommandReply::Listening(snapshot) => {
            assert_eq!(snapshot.len(), 1);
            assert_eq!(snapshot[0].member_id, MemberId::new("m1"));
        }
        other => panic!("unexpected reply: {other:?}"),
    }

    sim.submit(c1, Command::SessionClosed { session: c1 }).unwrap();

    assert_eq!(sim.state().member_count(), 0);
    assert_eq!(
        sim.events_for(c2),
        &[GroupEvent::Leave(MemberId::new("m1"))]
    );
}

#[test]
fn scenario_2_persistent_revival_within_expiration() {
    let mut sim = Sim::new(5_000);
    let c2 = SessionId::new(2);
    let c1 = SessionId::new(1);
    let c1_prime = SessionId::new(3);

    sim.submit(c2, Command::Listen).unwrap();
    sim.submit(c1, join("p1", true)).unwrap();
    sim.submit(c1, Command::SessionClosed { session: c1 }).unwrap();

    sim.advance_to(LogicalTime::new(3_000));
    sim.submit(c1_prime, join("p1", true)).unwrap();

    let events = sim.events_for(c2);
    assert_eq!(events.len(), 2, "two joins, no leave: {events:?}");
    assert!(matches!(events[0], GroupEvent::Join(..)));
    assert!(matches!(events[1], GroupEvent::Join(..)));
    assert!(sim.state().member_exists(&MemberId::new("p1")));
}

#[test]
fn scenario_3_persistent_expiration_without_rejoin() {
    let mut sim = Sim::new(5_000);
    let c2 = SessionId::new(2);
    let c1 = SessionId::new(1);

    sim.submit(c2, Command::Listen).unwrap();
    sim.submit(c1, join("p1", true)).unwrap();
    sim.submit(c1, Command::SessionClosed { session: c1 }).unwrap();

    sim.advance_to(LogicalTime::new(5_000));

    let events = sim.events_for(c2);
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], GroupEvent::Join(..)));
    assert_eq!(events[1], GroupEvent::Leave(MemberId::new("p1")));
    assert!(!sim.state().member_exists(&MemberId::new("p1")));
}

#[test]
fn scenario_4_task_queueing_and_ordering() {
    let mut sim = Sim::new(0);
    let c1 = SessionId::new(1);
    let c2 = SessionId::new(2);

    sim.submit(c1, join("w1", false)).unwrap();

    let t1 = submit_index(&mut sim, c2, "t1");
    let t2 = submit_index(&mut sim, c2, "t2");
    let t3 = submit_index(&mut sim, c2, "t3");

    ack(&mut sim, c1, "w1", t1, true);
    ack(&mut sim, c1, "w1", t2, false);

    assert_eq!(
        sim.events_for(c1),
        &[
            GroupEvent::Task(task("w1", t1, "t1")),
            GroupEvent::Task(task("w1", t2, "t2")),
            GroupEvent::Task(task("w1", t3, "t3")),
        ]
    );
    assert_eq!(
        sim.events_for(c2),
        &[GroupEvent::Ack(t1), GroupEvent::Fail(t2)]
    );
}

#[test]
fn scenario_5_election_stability() {
    use ensemble_client::ElectionEngine;

    let mut engine = ElectionEngine::new();
    let a = member_info("a", 1);
    let b = member_info("b", 2);
    let c = member_info("c", 3);

    engine.on_join(&a);
    engine.on_join(&b);
    engine.on_join(&c);
    assert_eq!(engine.leader(), Some(&MemberId::new("a")));

    let initial_term = engine.term();
    let change = engine
        .on_leave(&MemberId::new("a"), vec![b.clone(), c.clone()].into_iter())
        .unwrap();
    assert_eq!(change.leader, Some(MemberId::new("b")));
    assert!(engine.term() > initial_term);

    // "a" rejoins under a new, higher index: it must not displace "b".
    let a_rejoined = member_info("a", 4);
    let change = engine.on_join(&a_rejoined);
    assert!(change.is_none());
    assert_eq!(engine.leader(), Some(&MemberId::new("b")));
}

#[test]
fn scenario_6_task_forced_fail_on_leave() {
    let mut sim = Sim::new(0);
    let c1 = SessionId::new(1);
    let c2 = SessionId::new(2);

    sim.submit(c2, Command::Listen).unwrap();
    sim.submit(c1, join("w1", false)).unwrap();
    let t = submit_index(&mut sim, c2, "payload");

    sim.submit(c1, Command::SessionClosed { session: c1 }).unwrap();

    assert_eq!(
        sim.events_for(c2),
        &[GroupEvent::Fail(t), GroupEvent::Leave(MemberId::new("w1"))],
        "the fail must precede the leave on every session observing both"
    );
}

fn member_info(id: &str, index: u64) -> GroupMemberInfo {
    GroupMemberInfo::new(MemberId::new(id), LogIndex::new(index), None, false)
}

fn task(member: &str, index: LogIndex, payload: &str) -> ensemble_types::GroupTask {
    ensemble_types::GroupTask {
        index,
        member_id: MemberId::new(member),
        payload: Bytes::from(payload.as_bytes().to_vec()),
    }
}

fn submit_index(sim: &mut Sim, session: SessionId, payload: &str) -> LogIndex {
    match sim
        .submit(
            session,
            Command::Submit {
                member: MemberId::new("w1"),
                payload: Bytes::from(payload.as_bytes().to_vec()),
            },
        )
        .unwrap()
    {
        CommandReply::Submitted(index) => index,
        other => panic!("unexpected reply: {other:?}"),
    }
}

fn ack(sim: &mut Sim, session: SessionId, member: &str, task_index: LogIndex, succeeded: bool) {
    sim.submit(
        session,
        Command::Ack {
            member_id: MemberId::new(member),
            task_index,
            succeeded,
        },
    )
    .unwrap();
}
