//! Cross-thread vsync handoff.
//!
//! The host fires vsync from any thread with the [`VsyncToken`] it was handed. Tokens resolve
//! through a generation-checked [`VsyncRegistry`] to weak waiter state, so a fire that races
//! with waiter teardown, or repeats an already consumed wait, does nothing.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use slotmap::SlotMap;

use crate::foundation::error::{EmbedError, EmbedResult};

mod waiter;

pub use waiter::{VsyncWaiter, WaiterPhase};

use waiter::WaiterShared;

slotmap::new_key_type! {
    /// Registry slot of one waiter.
    pub struct WaiterKey;
}

/// Correlates a host vsync fire with the wait that requested it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VsyncToken {
    key: WaiterKey,
    seq: u64,
}

impl VsyncToken {
    /// Per-wait sequence number. Increases with every wait of the same waiter.
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// Timestamps of one vsync, in nanoseconds on the host's monotonic clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameTiming {
    frame_start_nanos: u64,
    frame_target_nanos: u64,
}

impl FrameTiming {
    pub fn new(frame_start_nanos: u64, frame_target_nanos: u64) -> EmbedResult<Self> {
        if frame_target_nanos < frame_start_nanos {
            return Err(EmbedError::validation(format!(
                "frame target {frame_target_nanos}ns precedes frame start {frame_start_nanos}ns"
            )));
        }
        Ok(Self {
            frame_start_nanos,
            frame_target_nanos,
        })
    }

    pub fn frame_start_nanos(&self) -> u64 {
        self.frame_start_nanos
    }

    /// Deadline by which the frame should be presented.
    pub fn frame_target_nanos(&self) -> u64 {
        self.frame_target_nanos
    }

    /// Time budget of the frame.
    pub fn budget_nanos(&self) -> u64 {
        self.frame_target_nanos - self.frame_start_nanos
    }
}

/// Host vsync signal.
pub trait VsyncSource: Send + Sync {
    /// Ask for exactly one vsync. The host later calls [`VsyncRegistry::on_vsync`] with `token`.
    fn request_vsync(&self, token: VsyncToken);
}

/// Maps tokens to live waiters.
#[derive(Default)]
pub struct VsyncRegistry {
    slots: Mutex<SlotMap<WaiterKey, Weak<WaiterShared>>>,
}

impl VsyncRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Deliver a vsync fired by the host. Safe from any thread.
    ///
    /// Returns `true` when the token matched a pending wait and its completion ran. Tokens of
    /// dropped waiters, stale or duplicate tokens, and invalid timings return `false`.
    pub fn on_vsync(
        &self,
        token: VsyncToken,
        frame_start_nanos: u64,
        frame_target_nanos: u64,
    ) -> bool {
        let timing = match FrameTiming::new(frame_start_nanos, frame_target_nanos) {
            Ok(timing) => timing,
            Err(err) => {
                tracing::warn!(seq = token.seq, error = %err, "ignoring vsync with invalid timing");
                return false;
            }
        };

        let shared = {
            let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.get(token.key).and_then(Weak::upgrade)
        };
        let Some(shared) = shared else {
            tracing::trace!(seq = token.seq, "vsync for a released waiter");
            return false;
        };
        shared.fire(token.seq, timing)
    }

    /// Number of live waiters.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn register(&self, shared: Weak<WaiterShared>) -> WaiterKey {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(shared)
    }

    fn unregister(&self, key: WaiterKey) {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

impl std::fmt::Debug for VsyncRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VsyncRegistry")
            .field("waiters", &self.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/vsync/registry.rs"]
mod tests;
