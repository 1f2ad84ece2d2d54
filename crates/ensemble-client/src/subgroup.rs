//! Derived membership views fanned out from the base group (§4.5).
//!
//! A sub-group is a pure function of the membership set plus two hooks the
//! base group calls after updating its own mirror but before returning from
//! the event handler. Both built-in sub-groups implement [`SubGroup`]; their
//! internal ring/partition algorithms are pluggable and out of scope beyond
//! this composition contract.

use ensemble_types::{GroupMemberInfo, MemberId};

/// Emitted by the partition sub-group when membership changes force a
/// partition to move to a different replica set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionMigration {
    pub partition: u32,
    pub source: Option<MemberId>,
    pub target: MemberId,
}

/// A derived view over the base group's membership, updated in lock-step
/// with the base group's own mirror.
pub trait SubGroup: Send {
    fn on_join(&mut self, member: &GroupMemberInfo);
    fn on_leave(&mut self, member_id: &MemberId);
}

/// Consistent-hash ring over the membership, `virtual_nodes` positions per
/// member keyed by a pluggable hasher.
pub struct HashRingSubGroup<H> {
    virtual_nodes: u32,
    hasher: H,
    ring: std::collections::BTreeMap<u64, MemberId>,
}

impl<H> HashRingSubGroup<H>
where
    H: Fn(&str) -> u64,
{
    pub fn new(virtual_nodes: u32, hasher: H) -> Self {
        Self {
            virtual_nodes,
            hasher,
            ring: std::collections::BTreeMap::new(),
        }
    }

    /// The member owning `key`, walking the ring clockwise from its hash.
    pub fn member_for(&self, key: &str) -> Option<&MemberId> {
        let point = (self.hasher)(key);
        self.ring
            .range(point..)
            .next()
            .or_else(|| self.ring.iter().next())
            .map(|(_, id)| id)
    }
}

impl<H> SubGroup for HashRingSubGroup<H>
where
    H: Fn(&str) -> u64 + Send,
{
    fn on_join(&mut self, member: &GroupMemberInfo) {
        for v in 0..self.virtual_nodes {
            let point = (self.hasher)(&format!("{}#{v}", member.member_id));
            self.ring.insert(point, member.member_id.clone());
        }
    }

    fn on_leave(&mut self, member_id: &MemberId) {
        self.ring.retain(|_, id| id != member_id);
    }
}

/// Partitioned sub-group: `partitions` buckets, each replicated
/// `replication_factor` times via a pluggable [`Partitioner`].
pub trait Partitioner: Send {
    /// Assigns replicas for `partition` from the ordered candidate set.
    fn assign(
        &self,
        partition: u32,
        replication_factor: u32,
        members: &[MemberId],
    ) -> Vec<MemberId>;
}

/// Assigns replicas by striding through the ordered member list, so
/// consecutive partitions spread evenly before wrapping.
pub struct RoundRobinPartitioner;

impl Partitioner for RoundRobinPartitioner {
    fn assign(
        &self,
        partition: u32,
        replication_factor: u32,
        members: &[MemberId],
    ) -> Vec<MemberId> {
        if members.is_empty() {
            return Vec::new();
        }
        (0..replication_factor)
            .map(|r| {
                let offset = (partition as usize + r as usize) % members.len();
                members[offset].clone()
            })
            .collect()
    }
}

pub struct PartitionSubGroup<P> {
    partition_count: u32,
    replication_factor: u32,
    partitioner: P,
    members: Vec<MemberId>,
    assignments: Vec<Vec<MemberId>>,
    pub migrations: Vec<PartitionMigration>,
}

impl<P: Partitioner> PartitionSubGroup<P> {
    pub fn new(partition_count: u32, replication_factor: u32, partitioner: P) -> Self {
        Self {
            partition_count,
            replication_factor,
            partitioner,
            members: Vec::new(),
            assignments: vec![Vec::new(); partition_count as usize],
            migrations: Vec::new(),
        }
    }

    pub fn assignment(&self, partition: u32) -> &[MemberId] {
        &self.assignments[partition as usize]
    }

    fn reassign(&mut self) {
        for partition in 0..self.partition_count {
            let new = self
                .partitioner
                .assign(partition, self.replication_factor, &self.members);
            let old = std::mem::replace(&mut self.assignments[partition as usize], new.clone());
            for target in &new {
                if !old.contains(target) {
                    self.migrations.push(PartitionMigration {
                        partition,
                        source: old.first().cloned(),
                        target: target.clone(),
                    });
                }
            }
        }
    }
}

impl<P: Partitioner> SubGroup for PartitionSubGroup<P> {
    fn on_join(&mut self, member: &GroupMemberInfo) {
        if !self.members.contains(&member.member_id) {
            self.members.push(member.member_id.clone());
            self.members.sort();
        }
        self.reassign();
    }

    fn on_leave(&mut self, member_id: &MemberId) {
        self.members.retain(|id| id != member_id);
        self.reassign();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ensemble_types::LogIndex;

    fn info(id: &str) -> GroupMemberInfo {
        GroupMemberInfo::new(MemberId::new(id), LogIndex::new(1), None, false)
    }

    #[test]
    fn hash_ring_assigns_every_key_to_a_member() {
        let mut ring = HashRingSubGroup::new(8, |s: &str| {
            s.bytes().fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64))
        });
        ring.on_join(&info("a"));
        ring.on_join(&info("b"));
        assert!(ring.member_for("key1").is_some());
    }

    #[test]
    fn hash_ring_drops_member_on_leave() {
        let mut ring = HashRingSubGroup::new(4, |s: &str| {
            s.bytes().fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64))
        });
        ring.on_join(&info("a"));
        ring.on_leave(&MemberId::new("a"));
        assert!(ring.member_for("key1").is_none());
    }

    #[test]
    fn partition_sub_group_assigns_replication_factor_members() {
        let mut sub = PartitionSubGroup::new(4, 2, RoundRobinPartitioner);
        sub.on_join(&info("a"));
        sub.on_join(&info("b"));
        sub.on_join(&info("c"));
        assert_eq!(sub.assignment(0).len(), 2);
    }

    #[test]
    fn partition_sub_group_emits_migration_on_join() {
        let mut sub = PartitionSubGroup::new(2, 1, RoundRobinPartitioner);
        sub.on_join(&info("a"));
        assert!(!sub.migrations.is_empty());
    }
}
