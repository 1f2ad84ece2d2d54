//! `InMemoryRuntime`: a deterministic, single-process reference
//! implementation of [`ReplicationRuntime`].
//!
//! It applies every command through the pure kernel under a single mutex
//! (there is only one replica, so no consensus is needed), fans out effects
//! over per-session channels, and drives expiration ticks with `tokio::time`.
//! It is sufficient to exercise the whole core in tests and the demo CLI; a
//! production deployment replaces it with a consensus-backed implementation
//! of the same trait.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use ensemble_kernel::{Command, CommandContext, CommandReply, Query, State, apply_committed, apply_query};
use ensemble_types::{GroupEvent, LogIndex, LogicalTime, SessionId};
use tokio::sync::mpsc;

use crate::traits::{Clock, ReplicationRuntime};
use crate::RuntimeError;

/// Wall-clock-derived logical clock, relative to process start.
///
/// Built on `tokio::time::Instant` so tests using `tokio::time::pause`
/// control expiration timing deterministically.
pub struct SystemLogicalClock {
    start: tokio::time::Instant,
}

impl SystemLogicalClock {
    pub fn new() -> Self {
        Self {
            start: tokio::time::Instant::now(),
        }
    }
}

impl Default for SystemLogicalClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemLogicalClock {
    fn now(&self) -> LogicalTime {
        LogicalTime::new(self.start.elapsed().as_millis() as u64)
    }
}

/// A handle to a session's inbound event stream.
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<GroupEvent>,
}

impl EventStream {
    pub async fn recv(&mut self) -> Option<GroupEvent> {
        self.rx.recv().await
    }
}

struct Inner {
    state: tokio::sync::Mutex<State>,
    next_index: AtomicU64,
    next_session: AtomicU64,
    sessions: Mutex<HashMap<SessionId, mpsc::UnboundedSender<GroupEvent>>>,
    clock: SystemLogicalClock,
    expiration_ms: u64,
}

/// Deterministic single-process `ReplicationRuntime`. Cheaply cloneable —
/// clones share the same state and session table.
#[derive(Clone)]
pub struct InMemoryRuntime {
    inner: Arc<Inner>,
}

impl InMemoryRuntime {
    pub fn new(expiration_ms: u64) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: tokio::sync::Mutex::new(State::new()),
                next_index: AtomicU64::new(1),
                next_session: AtomicU64::new(1),
                sessions: Mutex::new(HashMap::new()),
                clock: SystemLogicalClock::new(),
                expiration_ms,
            }),
        }
    }

    /// Opens a new session and returns its id plus the event stream clients
    /// should poll. Mirrors the Replication Runtime's session-open contract
    /// (§6); nothing is committed to the log by opening a session alone.
    pub fn open_session(&self) -> (SessionId, EventStream) {
        let id = SessionId::new(self.inner.next_session.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.sessions.lock().unwrap().insert(id, tx);
        (id, EventStream { rx })
    }

    /// Closes a session, walking every member bound to it per §4.1.
    pub async fn close_session(&self, session: SessionId) -> Result<(), RuntimeError> {
        self.inner.sessions.lock().unwrap().remove(&session);
        self.submit_command(session, Command::SessionClosed { session })
            .await?;
        Ok(())
    }

    /// Builds the context for a command once the state lock is already
    /// held, so the `LogIndex` it assigns is issued atomically with the
    /// command's position in apply order — two concurrent `submit_command`
    /// calls can never apply out of index order.
    fn next_context_locked(&self, session: SessionId) -> CommandContext {
        let index = LogIndex::new(self.inner.next_index.fetch_add(1, Ordering::Relaxed));
        CommandContext::new(index, session, self.inner.clock.now(), self.inner.expiration_ms)
    }

    fn dispatch_effects(&self, effects: Vec<ensemble_kernel::Effect>) {
        for effect in effects {
            match effect {
                ensemble_kernel::Effect::Publish { session, event } => {
                    let sessions = self.inner.sessions.lock().unwrap();
                    if let Some(tx) = sessions.get(&session) {
                        // An inactive/closed session simply drops the send
                        // (§7) — there is no one left to notify.
                        let _ = tx.send(event);
                    }
                }
                ensemble_kernel::Effect::ScheduleTick { at } => {
                    let runtime = self.clone();
                    tokio::spawn(async move {
                        runtime.sleep_until(at).await;
                        let _ = runtime
                            .submit_command(SessionId::new(0), Command::Tick)
                            .await;
                    });
                }
            }
        }
    }

    async fn sleep_until(&self, at: LogicalTime) {
        let now = self.inner.clock.now();
        if at.as_u64() > now.as_u64() {
            tokio::time::sleep(std::time::Duration::from_millis(at.as_u64() - now.as_u64())).await;
        }
    }
}

impl Default for InMemoryRuntime {
    fn default() -> Self {
        Self::new(0)
    }
}

impl ReplicationRuntime for InMemoryRuntime {
    async fn submit_command(
        &self,
        session: SessionId,
        cmd: Command,
    ) -> Result<CommandReply, RuntimeError> {
        let mut guard = self.inner.state.lock().await;
        let ctx = self.next_context_locked(session);
        let state = std::mem::take(&mut *guard);
        let (new_state, effects, reply) = apply_committed(state, ctx, cmd)?;
        *guard = new_state;
        drop(guard);

        tracing::debug!(index = ctx.index.as_u64(), ?session, "applied command");
        self.dispatch_effects(effects);
        Ok(reply)
    }

    async fn submit_query(&self, query: Query) -> ensemble_kernel::QueryReply {
        let guard = self.inner.state.lock().await;
        apply_query(&guard, query)
    }
}
