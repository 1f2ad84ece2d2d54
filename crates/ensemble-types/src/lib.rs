//! # ensemble-types: Core types for the group-coordination core
//!
//! Shared value types used across the coordination system:
//! - Identity ([`MemberId`], [`SessionId`], [`LogIndex`], [`Term`])
//! - Time ([`LogicalTime`])
//! - Membership envelopes ([`GroupMemberInfo`])
//! - Task routing ([`GroupTask`], `TaskReceipt`)
//! - The wire event enum ([`GroupEvent`]) published from server to sessions

use std::fmt::{Debug, Display};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

// ============================================================================
// Identity - Copy (cheap values)
// ============================================================================

/// Unique, client-chosen identifier for a member within a group.
///
/// The state machine never mints member ids; callers supply one (or a
/// previously-observed one, for persistent-member revival).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MemberId(String);

impl MemberId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for MemberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for MemberId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for MemberId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<MemberId> for String {
    fn from(id: MemberId) -> Self {
        id.0
    }
}

/// Identifier of a client's subscription session to the replicated group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(u64);

impl SessionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session:{}", self.0)
    }
}

impl From<u64> for SessionId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<SessionId> for u64 {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

/// Position of a committed command within the replicated log.
///
/// Used both as the creation-order tiebreaker for election (§4.3) and as
/// the reply address for outstanding tasks.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct LogIndex(u64);

impl LogIndex {
    pub const ZERO: LogIndex = LogIndex(0);

    pub fn new(index: u64) -> Self {
        Self(index)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the next log index.
    pub fn next(self) -> Self {
        LogIndex(self.0 + 1)
    }
}

impl Display for LogIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for LogIndex {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<LogIndex> for u64 {
    fn from(index: LogIndex) -> Self {
        index.0
    }
}

/// Client-view leader term: a sequence number that advances whenever the
/// deterministically-elected leader changes identity (§4.3).
///
/// This is distinct from any replication-protocol term; it is purely a
/// view-change counter maintained by `ElectionEngine`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Term(u64);

impl Term {
    pub const INITIAL: Term = Term(0);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    pub fn next(self) -> Self {
        Term(self.0 + 1)
    }
}

impl Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "term:{}", self.0)
    }
}

impl Default for Term {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl From<u64> for Term {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Term> for u64 {
    fn from(term: Term) -> Self {
        term.0
    }
}

// ============================================================================
// Logical time - drives deterministic expiration timers (§4.1, §5)
// ============================================================================

/// A tick of the state machine's logical clock.
///
/// The kernel never reads a wall clock; every command that can observe time
/// carries a `LogicalTime` supplied by the Replication Runtime, so replicas
/// applying the same log arrive at identical timer decisions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct LogicalTime(u64);

impl LogicalTime {
    pub const ZERO: LogicalTime = LogicalTime(0);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns this time advanced by `delta_ms` milliseconds.
    pub fn plus_millis(self, delta_ms: u64) -> Self {
        LogicalTime(self.0 + delta_ms)
    }
}

impl Display for LogicalTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

impl From<u64> for LogicalTime {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<LogicalTime> for u64 {
    fn from(time: LogicalTime) -> Self {
        time.0
    }
}

// ============================================================================
// Membership envelope - Clone (contains an optional String address)
// ============================================================================

/// Opaque envelope describing a member, used in every cross-plane message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMemberInfo {
    pub member_id: MemberId,
    pub index: LogIndex,
    pub address: Option<String>,
    pub persistent: bool,
}

impl GroupMemberInfo {
    pub fn new(member_id: MemberId, index: LogIndex, address: Option<String>, persistent: bool) -> Self {
        Self {
            member_id,
            index,
            address,
            persistent,
        }
    }
}

// ============================================================================
// Task routing
// ============================================================================

/// A task delivered to a member, carrying enough identity to ack/fail it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupTask {
    pub index: LogIndex,
    pub member_id: MemberId,
    pub payload: Bytes,
}

/// Reply address for a completed task, delivered back to the submitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskReceipt {
    pub index: LogIndex,
    pub member_id: SessionId,
}

// ============================================================================
// Wire events - published from the state machine to listening sessions
// ============================================================================

/// Events published by the state machine to active sessions (§6).
///
/// Every session observes the subset addressed to it (directly, or via
/// `Listen`'s broadcast set) in commit order; see `SessionRegistry`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupEvent {
    /// A member joined, or rebound after a session change. Carries the
    /// session that issued the `join`/`rebind` command, so a client racing
    /// another session to (re)bind the same `memberId` can tell its own
    /// join apart from one that merely updated the mirror.
    Join(GroupMemberInfo, SessionId),
    /// A member left the group.
    Leave(MemberId),
    /// A task was promoted to head-of-line for its member.
    Task(GroupTask),
    /// A previously submitted task was acknowledged successfully.
    Ack(LogIndex),
    /// A previously submitted task failed or was force-failed.
    Fail(LogIndex),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_id_round_trips_through_string() {
        let id = MemberId::new("worker-1");
        assert_eq!(id.as_str(), "worker-1");
        let s: String = id.into();
        assert_eq!(s, "worker-1");
    }

    #[test]
    fn log_index_ordering_is_numeric() {
        assert!(LogIndex::new(1) < LogIndex::new(2));
        assert_eq!(LogIndex::new(5).next(), LogIndex::new(6));
    }

    #[test]
    fn term_defaults_to_initial_and_increments() {
        assert_eq!(Term::default(), Term::INITIAL);
        assert_eq!(Term::INITIAL.next(), Term::new(1));
    }

    #[test]
    fn group_event_serializes_as_json() {
        let event = GroupEvent::Join(
            GroupMemberInfo::new(MemberId::new("m1"), LogIndex::new(1), None, false),
            SessionId::new(1),
        );
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"Join\""));
    }
}
