//! Debugger pause and single-step gate.
//!
//! [`PauseState`] is written by input handling between iterations and read by
//! the clock on every accumulation call. While paused, the clock keeps being
//! called so its bookkeeping stays consistent, but no new logic tick is
//! released until a single step is requested.

use serde::{Deserialize, Serialize};

use crate::clock::SimulationClock;

/// Process-wide pause flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseState {
    /// The simulation is held by the frame stepper.
    pub paused: bool,
    /// Single-shot request to release one tick while paused. Must be cleared
    /// with [`consume_step`](Self::consume_step) after the tick ran.
    pub step: bool,
}

impl PauseState {
    /// Whether the clock is frozen: paused, no step pending, and the last
    /// accumulation call already produced a tick.
    pub fn debug_paused(&self, clock: &SimulationClock) -> bool {
        self.paused && !self.step && clock.old_tick_count() < clock.tick_count()
    }

    /// Flip the pause flag. Unpausing drops any pending step.
    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
        if !self.paused {
            self.step = false;
        }
        tracing::debug!(paused = self.paused, "pause_toggled");
    }

    /// Ask for one tick to run while paused. Ignored when not paused.
    pub fn request_step(&mut self) {
        if self.paused {
            self.step = true;
        }
    }

    /// Clear the single-shot step flag, returning whether it was set.
    pub fn consume_step(&mut self) -> bool {
        std::mem::take(&mut self.step)
    }
}
