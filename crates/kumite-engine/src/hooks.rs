//! Per-frame callbacks into the game layer.
//!
//! The scheduler calls these in a fixed order every iteration. Every method
//! has a no-op default so a headless run needs no hooks at all.

use kumite_sim::machine::RoundEvent;
use kumite_sim::round::{Assertions, RoundContext};
use kumite_sim::state::MatchState;

use crate::sync::InputFrame;

/// Which half of a tick [`FrameHooks::world_tick`] is called for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldPhase {
    /// Character and world update; runs when a logic tick was released.
    Main,
    /// Collision resolution and other work that must see the finished tick;
    /// runs when the next call will release a tick.
    PostLogic,
}

/// Game-layer callbacks, in the order the scheduler invokes them.
pub trait FrameHooks {
    /// Present the frame drawn on the previous iteration.
    fn present(&mut self) {}

    /// Local input for this iteration, before synchronization.
    fn poll_input(&mut self) -> InputFrame {
        InputFrame::default()
    }

    /// Tick the round announcer and lifebars. Returns whether round control
    /// is active; while it is not, the round stays in its pre-round phase.
    fn round_control_tick(&mut self, _round: &RoundContext) -> bool {
        true
    }

    /// Update characters and world. Characters raise `assertions` for the
    /// round logic; they are cleared once the round has consumed them.
    fn world_tick(
        &mut self,
        _phase: WorldPhase,
        _state: &mut MatchState,
        _input: &InputFrame,
        _assertions: &mut Assertions,
    ) {
    }

    /// A lifecycle transition happened this tick.
    fn on_round_event(&mut self, _event: RoundEvent, _state: &MatchState) {}

    fn camera(&mut self, _round: &RoundContext) {}

    /// Draw, interpolating `interpolation` of the way to the next tick.
    /// Not called on skipped frames.
    fn draw(&mut self, _interpolation: f64) {}

    /// Debug overlay; only called while debug drawing is enabled.
    fn debug_draw(&mut self, _state: &MatchState) {}

    /// Script and extension callbacks, after drawing.
    fn run_scripts(&mut self, _state: &MatchState) {}
}

/// Hooks that do nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl FrameHooks for NoHooks {}
