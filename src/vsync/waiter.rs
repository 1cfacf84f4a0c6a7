use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use crate::foundation::error::{EmbedError, EmbedResult};
use crate::vsync::{FrameTiming, VsyncRegistry, VsyncSource, VsyncToken, WaiterKey};

type Completion = Box<dyn FnOnce(FrameTiming) + Send>;

/// Where a waiter is in its wait cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaiterPhase {
    Idle,
    /// A vsync was requested and its completion is stored.
    Awaiting,
    /// The completion is running.
    Firing,
}

struct WaiterState {
    phase: WaiterPhase,
    seq: u64,
    completion: Option<Completion>,
    firing_thread: Option<ThreadId>,
}

pub(crate) struct WaiterShared {
    state: Mutex<WaiterState>,
    idle: Condvar,
}

impl WaiterShared {
    fn lock(&self) -> MutexGuard<'_, WaiterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn fire(&self, seq: u64, timing: FrameTiming) -> bool {
        let completion = {
            let mut state = self.lock();
            if state.phase != WaiterPhase::Awaiting || state.seq != seq {
                tracing::trace!(seq, current = state.seq, phase = ?state.phase, "stale vsync");
                return false;
            }
            let Some(completion) = state.completion.take() else {
                return false;
            };
            state.phase = WaiterPhase::Firing;
            state.firing_thread = Some(thread::current().id());
            completion
        };

        tracing::trace!(seq, start = timing.frame_start_nanos(), "vsync fired");
        let _idle = FiringGuard { shared: self };
        completion(timing);
        true
    }
}

/// Returns the waiter to `Idle` after a fire, also when the completion unwinds.
struct FiringGuard<'a> {
    shared: &'a WaiterShared,
}

impl Drop for FiringGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        state.phase = WaiterPhase::Idle;
        state.firing_thread = None;
        drop(state);
        self.shared.idle.notify_all();
    }
}

/// Single pending vsync wait for one render thread.
///
/// Dropping the waiter releases its registry slot. A fire for it that arrives later returns
/// `false` from [`VsyncRegistry::on_vsync`] and runs nothing.
pub struct VsyncWaiter {
    registry: Arc<VsyncRegistry>,
    source: Arc<dyn VsyncSource>,
    key: WaiterKey,
    shared: Arc<WaiterShared>,
}

impl VsyncWaiter {
    pub fn new(registry: Arc<VsyncRegistry>, source: Arc<dyn VsyncSource>) -> Self {
        let shared = Arc::new(WaiterShared {
            state: Mutex::new(WaiterState {
                phase: WaiterPhase::Idle,
                seq: 0,
                completion: None,
                firing_thread: None,
            }),
            idle: Condvar::new(),
        });
        let key = registry.register(Arc::downgrade(&shared));
        Self {
            registry,
            source,
            key,
            shared,
        }
    }

    /// Request one vsync and run `completion` on the thread that fires it.
    ///
    /// Fails while a wait is pending, or when called from inside the running completion. A call
    /// from another thread during a fire blocks until the fire finished.
    pub fn await_vsync(
        &self,
        completion: impl FnOnce(FrameTiming) + Send + 'static,
    ) -> EmbedResult<VsyncToken> {
        let mut state = self.shared.lock();
        loop {
            match state.phase {
                WaiterPhase::Idle => break,
                WaiterPhase::Awaiting => {
                    return Err(EmbedError::contract(
                        "await_vsync called while a vsync is already pending",
                    ));
                }
                WaiterPhase::Firing => {
                    if state.firing_thread == Some(thread::current().id()) {
                        return Err(EmbedError::contract(
                            "await_vsync called from inside the vsync completion",
                        ));
                    }
                    state = self
                        .shared
                        .idle
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }

        state.seq = state.seq.wrapping_add(1);
        state.phase = WaiterPhase::Awaiting;
        state.completion = Some(Box::new(completion));
        let token = VsyncToken {
            key: self.key,
            seq: state.seq,
        };
        drop(state);

        self.source.request_vsync(token);
        Ok(token)
    }

    /// Abandon the pending wait. Its token becomes stale. Returns `false` when nothing was pending.
    pub fn cancel(&self) -> bool {
        let mut state = self.shared.lock();
        if state.phase != WaiterPhase::Awaiting {
            return false;
        }
        state.phase = WaiterPhase::Idle;
        state.seq = state.seq.wrapping_add(1);
        state.completion = None;
        true
    }

    pub fn phase(&self) -> WaiterPhase {
        self.shared.lock().phase
    }

    pub fn is_awaiting(&self) -> bool {
        self.phase() == WaiterPhase::Awaiting
    }
}

impl Drop for VsyncWaiter {
    fn drop(&mut self) {
        self.registry.unregister(self.key);
    }
}

impl std::fmt::Debug for VsyncWaiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VsyncWaiter")
            .field("key", &self.key)
            .field("phase", &self.phase())
            .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/vsync/waiter.rs"]
mod tests;
