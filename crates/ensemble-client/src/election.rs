//! Deterministic client-side leader election (§4.3).
//!
//! The leader is the surviving member with the lowest creation `index`; all
//! clients observing the same commit order agree without coordination. This
//! is a view-sequence counter local to each client, not a replication-layer
//! term — it exists purely so listeners can detect "the leader changed."

use ensemble_types::{GroupMemberInfo, MemberId, Term};

/// A leader-change notification delivered to registered listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderChange {
    pub term: Term,
    pub leader: Option<MemberId>,
}

/// Tracks the deterministically-elected leader of a member mirror.
#[derive(Debug, Clone, Default)]
pub struct ElectionEngine {
    leader: Option<GroupMemberInfo>,
    term: Term,
}

impl ElectionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn leader(&self) -> Option<&MemberId> {
        self.leader.as_ref().map(|m| &m.member_id)
    }

    pub fn term(&self) -> Term {
        self.term
    }

    /// Called after the mirror observes a join. Re-elects if the new member
    /// outranks the current leader (or none is set). Returns the change, if
    /// the leader's identity moved.
    pub fn on_join(&mut self, member: &GroupMemberInfo) -> Option<LeaderChange> {
        let should_elect = match &self.leader {
            None => true,
            Some(current) => member.index < current.index,
        };
        if should_elect {
            self.elect(Some(member.clone()))
        } else {
            None
        }
    }

    /// Called after the mirror observes a leave. Re-elects from the
    /// remaining ordered candidate set if the departing member was leader.
    pub fn on_leave(
        &mut self,
        left: &MemberId,
        remaining: impl Iterator<Item = GroupMemberInfo>,
    ) -> Option<LeaderChange> {
        if self.leader.as_ref().map(|m| &m.member_id) != Some(left) {
            return None;
        }
        let next = remaining.min_by_key(|m| m.index);
        self.elect(next)
    }

    fn elect(&mut self, candidate: Option<GroupMemberInfo>) -> Option<LeaderChange> {
        let changed_identity = self.leader.as_ref().map(|m| &m.member_id)
            != candidate.as_ref().map(|m| &m.member_id);
        self.leader = candidate;
        if !changed_identity {
            return None;
        }
        // An empty candidate set emits no term (§4.3); the next join starts
        // fresh at the next sequence number.
        let Some(leader) = &self.leader else {
            return None;
        };
        self.term = self.term.next();
        Some(LeaderChange {
            term: self.term,
            leader: Some(leader.member_id.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ensemble_types::LogIndex;

    fn info(id: &str, index: u64) -> GroupMemberInfo {
        GroupMemberInfo::new(MemberId::new(id), LogIndex::new(index), None, false)
    }

    #[test]
    fn first_join_elects_leader() {
        let mut engine = ElectionEngine::new();
        let change = engine.on_join(&info("m1", 1)).unwrap();
        assert_eq!(change.leader, Some(MemberId::new("m1")));
        assert_eq!(engine.leader(), Some(&MemberId::new("m1")));
    }

    #[test]
    fn lower_index_join_displaces_leader() {
        let mut engine = ElectionEngine::new();
        engine.on_join(&info("m2", 5));
        let change = engine.on_join(&info("m1", 1)).unwrap();
        assert_eq!(change.leader, Some(MemberId::new("m1")));
    }

    #[test]
    fn higher_index_join_does_not_displace() {
        let mut engine = ElectionEngine::new();
        engine.on_join(&info("m1", 1));
        let change = engine.on_join(&info("m2", 5));
        assert!(change.is_none());
        assert_eq!(engine.leader(), Some(&MemberId::new("m1")));
    }

    #[test]
    fn leader_leaving_reelects_from_remaining() {
        let mut engine = ElectionEngine::new();
        engine.on_join(&info("m1", 1));
        engine.on_join(&info("m2", 2));
        let change = engine
            .on_leave(&MemberId::new("m1"), vec![info("m2", 2)].into_iter())
            .unwrap();
        assert_eq!(change.leader, Some(MemberId::new("m2")));
    }

    #[test]
    fn last_member_leaving_emits_no_term() {
        let mut engine = ElectionEngine::new();
        engine.on_join(&info("m1", 1));
        let change = engine.on_leave(&MemberId::new("m1"), std::iter::empty());
        assert!(change.is_none());
        assert!(engine.leader().is_none());
    }
}
