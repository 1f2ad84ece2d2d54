//! Kernel state management.
//!
//! The kernel maintains the authoritative member table, property table,
//! per-member task queues, the active-listener set, and pending expiration
//! timers. State transitions are done by taking ownership and returning a
//! new state (builder pattern), avoiding unnecessary clones of the
//! underlying `BTreeMap`s.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use bytes::Bytes;
use ensemble_types::{LogIndex, LogicalTime, MemberId, SessionId};
use serde::{Deserialize, Serialize};

/// A single outstanding task, either head-of-line or backlogged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub index: LogIndex,
    pub submitter_session: SessionId,
    pub payload: Bytes,
}

/// A member of the group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub member_id: MemberId,
    pub index: LogIndex,
    pub address: Option<String>,
    pub persistent: bool,
    pub bound_session: Option<SessionId>,
    /// Incremented every time the member is (re)bound to a session. Used to
    /// invalidate a scheduled expiration timer issued for a stale binding —
    /// see `State::fire_due_expirations`.
    pub bind_epoch: u64,
    pub properties: BTreeMap<String, Bytes>,
    pub pending_task: Option<Task>,
    pub task_backlog: VecDeque<Task>,
}

impl Member {
    fn new(
        member_id: MemberId,
        index: LogIndex,
        address: Option<String>,
        persistent: bool,
        session: SessionId,
    ) -> Self {
        Self {
            member_id,
            index,
            address,
            persistent,
            bound_session: Some(session),
            bind_epoch: 0,
            properties: BTreeMap::new(),
            pending_task: None,
            task_backlog: VecDeque::new(),
        }
    }

    pub fn to_info(&self) -> ensemble_types::GroupMemberInfo {
        ensemble_types::GroupMemberInfo::new(
            self.member_id.clone(),
            self.index,
            self.address.clone(),
            self.persistent,
        )
    }
}

/// The kernel's in-memory state.
///
/// Uses a builder pattern — mutators take ownership of `self` and return
/// `self` — so the pure core never clones state it doesn't need to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct State {
    members: BTreeMap<MemberId, Member>,
    global_properties: BTreeMap<String, Bytes>,
    /// Sessions that have called `Listen` and are currently receiving the
    /// broadcast event set (join/leave of every member). Direct task/ack/fail
    /// events bypass this set and go straight to the owning/submitting
    /// session regardless of listener status.
    listeners: BTreeSet<SessionId>,
    /// Sessions considered active; a session leaving this set is what
    /// triggers `Command::SessionClosed` handling.
    active_sessions: BTreeSet<SessionId>,
    /// Expirations due at a given logical time, keyed by the bind epoch the
    /// timer was scheduled under. On fire, an entry is honored only if the
    /// member's current `bind_epoch` still matches — a later rejoin bumps
    /// the epoch and implicitly cancels the stale timer.
    scheduled_expirations: BTreeMap<LogicalTime, Vec<(MemberId, u64)>>,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Member accessors
    // ========================================================================

    pub fn get_member(&self, id: &MemberId) -> Option<&Member> {
        self.members.get(id)
    }

    pub fn member_exists(&self, id: &MemberId) -> bool {
        self.members.contains_key(id)
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Members bound to an active session, ordered by creation index — the
    /// order election and any deterministic fan-out must reuse (§4.1).
    pub fn bound_members(&self) -> impl Iterator<Item = &Member> {
        let mut members: Vec<&Member> = self
            .members
            .values()
            .filter(|m| m.bound_session.is_some())
            .collect();
        members.sort_by_key(|m| m.index);
        members.into_iter()
    }

    pub fn listeners(&self) -> impl Iterator<Item = SessionId> + '_ {
        self.listeners.iter().copied()
    }

    pub fn is_listener(&self, session: SessionId) -> bool {
        self.listeners.contains(&session)
    }

    pub fn is_active(&self, session: SessionId) -> bool {
        self.active_sessions.contains(&session)
    }

    // ========================================================================
    // Member mutators (pub(crate) — callers go through `apply_committed`)
    // ========================================================================

    pub(crate) fn with_new_member(
        mut self,
        member_id: MemberId,
        index: LogIndex,
        address: Option<String>,
        persistent: bool,
        session: SessionId,
    ) -> (Self, Member) {
        let member = Member::new(member_id.clone(), index, address, persistent, session);
        self.active_sessions.insert(session);
        self.members.insert(member_id, member.clone());
        (self, member)
    }

    /// Rebinds an existing persistent member to a new session, bumping its
    /// epoch so any scheduled expiration for the old binding is ignored.
    pub(crate) fn with_rebound_member(
        mut self,
        id: &MemberId,
        address: Option<String>,
        session: SessionId,
    ) -> Self {
        if let Some(member) = self.members.get_mut(id) {
            member.address = address;
            member.bound_session = Some(session);
            member.bind_epoch += 1;
        }
        self.active_sessions.insert(session);
        self
    }

    pub(crate) fn without_member(mut self, id: &MemberId) -> (Self, Option<Member>) {
        let removed = self.members.remove(id);
        (self, removed)
    }

    /// Nulls a persistent member's session binding without removing it,
    /// returning the bumped epoch to schedule its expiration timer against.
    pub(crate) fn with_unbound_member(mut self, id: &MemberId) -> (Self, Option<u64>) {
        if let Some(member) = self.members.get_mut(id) {
            member.bound_session = None;
            member.bind_epoch += 1;
            return (self, Some(member.bind_epoch));
        }
        (self, None)
    }

    pub(crate) fn member_ids_bound_to(&self, session: SessionId) -> Vec<MemberId> {
        self.members
            .values()
            .filter(|m| m.bound_session == Some(session))
            .map(|m| m.member_id.clone())
            .collect()
    }

    pub(crate) fn add_listener(mut self, session: SessionId) -> Self {
        self.listeners.insert(session);
        self.active_sessions.insert(session);
        self
    }

    pub(crate) fn close_session(mut self, session: SessionId) -> Self {
        self.listeners.remove(&session);
        self.active_sessions.remove(&session);
        self
    }

    // ========================================================================
    // Properties
    // ========================================================================

    pub fn get_property(&self, member: Option<&MemberId>, name: &str) -> Option<&Bytes> {
        match member {
            Some(id) => self.members.get(id)?.properties.get(name),
            None => self.global_properties.get(name),
        }
    }

    pub(crate) fn with_property(
        mut self,
        member: Option<&MemberId>,
        name: String,
        value: Bytes,
    ) -> Self {
        match member {
            Some(id) => {
                if let Some(m) = self.members.get_mut(id) {
                    m.properties.insert(name, value);
                }
            }
            None => {
                self.global_properties.insert(name, value);
            }
        }
        self
    }

    pub(crate) fn without_property(mut self, member: Option<&MemberId>, name: &str) -> Self {
        match member {
            Some(id) => {
                if let Some(m) = self.members.get_mut(id) {
                    m.properties.remove(name);
                }
            }
            None => {
                self.global_properties.remove(name);
            }
        }
        self
    }

    // ========================================================================
    // Task queue
    // ========================================================================

    /// Enqueues a task for `member`, promoting it to head-of-line if the
    /// member currently has none. Returns the promoted task, if any.
    pub(crate) fn with_enqueued_task(
        mut self,
        member: &MemberId,
        task: Task,
    ) -> (Self, Option<Task>) {
        let Some(m) = self.members.get_mut(member) else {
            return (self, None);
        };
        if m.pending_task.is_none() {
            m.pending_task = Some(task.clone());
            (self, Some(task))
        } else {
            m.task_backlog.push_back(task);
            (self, None)
        }
    }

    /// Clears the member's head-of-line task if its index matches, promoting
    /// the next backlog entry. Returns `(submitter, promoted)`.
    pub(crate) fn with_acked_task(
        mut self,
        member: &MemberId,
        task_index: LogIndex,
    ) -> (Self, Option<SessionId>, Option<Task>) {
        let Some(m) = self.members.get_mut(member) else {
            return (self, None, None);
        };
        let Some(pending) = &m.pending_task else {
            return (self, None, None);
        };
        if pending.index != task_index {
            return (self, None, None);
        }
        let completed = m.pending_task.take().unwrap();
        let promoted = m.task_backlog.pop_front();
        m.pending_task = promoted.clone();
        (self, Some(completed.submitter_session), promoted)
    }

    /// Drains every task (pending + backlog) owned by a removed member,
    /// returning `(submitter, index)` pairs to force-fail, in submission
    /// order.
    pub(crate) fn tasks_to_fail(member: &Member) -> Vec<(SessionId, LogIndex)> {
        let mut drained = Vec::new();
        if let Some(pending) = &member.pending_task {
            drained.push((pending.submitter_session, pending.index));
        }
        for task in &member.task_backlog {
            drained.push((task.submitter_session, task.index));
        }
        drained
    }

    // ========================================================================
    // Expiration scheduling (§4.1 session close semantics)
    // ========================================================================

    pub(crate) fn with_scheduled_expiration(
        mut self,
        member_id: MemberId,
        epoch: u64,
        fire_at: LogicalTime,
    ) -> Self {
        self.scheduled_expirations
            .entry(fire_at)
            .or_default()
            .push((member_id, epoch));
        self
    }

    /// Pops every timer due at or before `now`, validating each against the
    /// member's current epoch. Returns the members that should actually
    /// leave (epoch still matches, and the member is still unbound).
    pub(crate) fn fire_due_expirations(mut self, now: LogicalTime) -> (Self, Vec<MemberId>) {
        let due_keys: Vec<LogicalTime> = self
            .scheduled_expirations
            .range(..=now)
            .map(|(k, _)| *k)
            .collect();

        let mut expired = Vec::new();
        for key in due_keys {
            if let Some(entries) = self.scheduled_expirations.remove(&key) {
                for (member_id, epoch) in entries {
                    if let Some(member) = self.members.get(&member_id) {
                        if member.bind_epoch == epoch && member.bound_session.is_none() {
                            expired.push(member_id);
                        }
                    }
                }
            }
        }
        (self, expired)
    }

    pub fn next_scheduled_expiration(&self) -> Option<LogicalTime> {
        self.scheduled_expirations.keys().next().copied()
    }
}
