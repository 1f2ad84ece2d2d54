//! The client-side member mirror (§4.6).
//!
//! Mutated only from the event-processing context; merges are idempotent so
//! replaying the same `join` twice (or receiving one out of a reconnect) is
//! harmless.

use std::collections::BTreeMap;

use ensemble_types::{GroupMemberInfo, MemberId};

/// A local, read-mostly copy of the base group's membership.
#[derive(Debug, Clone, Default)]
pub struct GroupMirror {
    members: BTreeMap<MemberId, GroupMemberInfo>,
}

impl GroupMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the mirror with a freshly observed snapshot (from `Listen`),
    /// merging each entry rather than overwriting wholesale so events
    /// observed between the snapshot request and its reply are not lost.
    pub fn bootstrap(&mut self, snapshot: Vec<GroupMemberInfo>) {
        for info in snapshot {
            self.merge_join(info);
        }
    }

    /// Idempotently applies a `join`: a member already present is updated
    /// only if the incoming record is newer (higher `index`); an unknown
    /// member is inserted. Returns the newly-stored info when the mirror
    /// changed.
    pub fn merge_join(&mut self, info: GroupMemberInfo) -> Option<GroupMemberInfo> {
        match self.members.get(&info.member_id) {
            Some(existing) if existing.index >= info.index => None,
            _ => {
                self.members.insert(info.member_id.clone(), info.clone());
                Some(info)
            }
        }
    }

    pub fn remove(&mut self, member_id: &MemberId) -> Option<GroupMemberInfo> {
        self.members.remove(member_id)
    }

    pub fn get(&self, member_id: &MemberId) -> Option<&GroupMemberInfo> {
        self.members.get(member_id)
    }

    /// Members ordered by creation index — the order election and any
    /// observable fan-out must reuse (§4.1, §4.3).
    pub fn ordered(&self) -> impl Iterator<Item = &GroupMemberInfo> {
        let mut values: Vec<&GroupMemberInfo> = self.members.values().collect();
        values.sort_by_key(|m| m.index);
        values.into_iter()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
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
    fn stale_join_is_ignored() {
        let mut mirror = GroupMirror::new();
        mirror.merge_join(info("m1", 5));
        let changed = mirror.merge_join(info("m1", 3));
        assert!(changed.is_none());
        assert_eq!(mirror.get(&MemberId::new("m1")).unwrap().index, LogIndex::new(5));
    }

    #[test]
    fn newer_join_updates_in_place() {
        let mut mirror = GroupMirror::new();
        mirror.merge_join(info("m1", 1));
        let changed = mirror.merge_join(info("m1", 2));
        assert!(changed.is_some());
        assert_eq!(mirror.get(&MemberId::new("m1")).unwrap().index, LogIndex::new(2));
    }

    #[test]
    fn ordered_by_index_not_lexicographic() {
        let mut mirror = GroupMirror::new();
        mirror.merge_join(info("z", 1));
        mirror.merge_join(info("a", 2));
        let ids: Vec<_> = mirror.ordered().map(|m| m.member_id.as_str()).collect();
        assert_eq!(ids, vec!["z", "a"]);
    }
}
