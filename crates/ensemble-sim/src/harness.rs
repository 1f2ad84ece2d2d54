//! Deterministic, logical-time-driven harness that drives the kernel
//! directly — no real sleeping, no real sockets (§10.5).

use std::collections::HashMap;

use ensemble_kernel::{
    Command, CommandContext, CommandReply, Effect, KernelError, State, apply_committed,
};
use ensemble_types::{GroupEvent, LogIndex, LogicalTime, SessionId};

/// Applies committed commands to a single in-process `State`, recording
/// every event published to each session in commit order.
///
/// Unlike [`ensemble_runtime::InMemoryRuntime`], `Sim` never sleeps and
/// never self-schedules ticks: a scenario advances logical time explicitly
/// with [`Sim::advance_to`], which is what makes it suitable for
/// reproducing the fixed-seed scenarios in §8 without wall-clock flakiness.
pub struct Sim {
    state: State,
    next_index: u64,
    now: LogicalTime,
    expiration_ms: u64,
    events: HashMap<SessionId, Vec<GroupEvent>>,
}

impl Sim {
    pub fn new(expiration_ms: u64) -> Self {
        Self {
            state: State::new(),
            next_index: 1,
            now: LogicalTime::ZERO,
            expiration_ms,
            events: HashMap::new(),
        }
    }

    /// Submits `cmd` under `session` at the current logical time, assigning
    /// it the next log index and recording any published effects.
    pub fn submit(
        &mut self,
        session: SessionId,
        cmd: Command,
    ) -> Result<CommandReply, KernelError> {
        let ctx = CommandContext::new(
            LogIndex::new(self.next_index),
            session,
            self.now,
            self.expiration_ms,
        );
        self.next_index += 1;
        self.apply(ctx, cmd)
    }

    /// Advances the logical clock to `at` and submits a `Tick`, firing any
    /// expiration timers now due. A no-op if `at` is not past the current
    /// time.
    pub fn advance_to(&mut self, at: LogicalTime) {
        if at <= self.now {
            return;
        }
        self.now = at;
        let ctx = CommandContext::new(
            LogIndex::new(self.next_index),
            SessionId::new(0),
            self.now,
            self.expiration_ms,
        );
        self.next_index += 1;
        self.apply(ctx, Command::Tick).expect("tick never fails");
    }

    fn apply(&mut self, ctx: CommandContext, cmd: Command) -> Result<CommandReply, KernelError> {
        let state = std::mem::take(&mut self.state);
        let (new_state, effects, reply) = apply_committed(state, ctx, cmd)?;
        self.state = new_state;
        for effect in effects {
            if let Effect::Publish { session, event } = effect {
                self.events.entry(session).or_default().push(event);
            }
            // `ScheduleTick` is advisory here: scenarios call `advance_to`
            // explicitly instead of having the harness self-schedule.
        }
        Ok(reply)
    }

    /// Events observed by `session` so far, in commit order.
    pub fn events_for(&self, session: SessionId) -> &[GroupEvent] {
        self.events.get(&session).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn state(&self) -> &State {
        &self.state
    }
}
