//! Fixed-step tick accumulator with a variable step size.
//!
//! The [`SimulationClock`] decouples logic ticks from render frames. Every
//! render iteration calls [`add_frame_time`](SimulationClock::add_frame_time)
//! once with the *requested* step size for the following call (game speed,
//! turbo, slow motion). The fractional accumulator advances by the step that
//! was requested on the previous call, and an integer logic tick is produced
//! whenever the accumulator crosses an integer boundary.
//!
//! At most one logic tick is produced per call. When a large step overshoots
//! more than one boundary, the pending ticks are flushed one per call and
//! those calls report `false` so the caller does not feed new input into them.
//!
//! # Example
//!
//! ```
//! use kumite_sim::clock::SimulationClock;
//! use kumite_sim::pause::PauseState;
//!
//! let mut clock = SimulationClock::new();
//! let pause = PauseState::default();
//!
//! for _ in 0..60 {
//!     clock.add_frame_time(1.0, &pause);
//! }
//! assert_eq!(clock.tick_count(), 60);
//! assert!(clock.tick_frame(&pause));
//! ```

use serde::{Deserialize, Serialize};

use crate::pause::PauseState;

/// Step size a fresh clock applies on its first call (normal speed).
pub const DEFAULT_STEP: f64 = 1.0;

// ---------------------------------------------------------------------------
// SimulationClock
// ---------------------------------------------------------------------------

/// Deterministic tick accumulator.
///
/// All fields are plain data so the clock can be copied verbatim into a
/// rollback snapshot.
///
/// # Invariants
///
/// - `tick_count` never decreases except through [`reset_round`](Self::reset_round).
/// - `tick_count_f >= last_tick`.
/// - `next_add_time > 0` (the caller clamps the requested speed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationClock {
    /// Logic tick index within the round.
    tick_count: i64,
    /// `tick_count` before the last accumulation step.
    old_tick_count: i64,
    /// Fractional accumulator.
    tick_count_f: f64,
    /// Accumulator value at the last integer crossing.
    last_tick: f64,
    /// Step applied on the next call (current game speed).
    next_add_time: f64,
    /// Step applied on the previous call; zero while frozen.
    old_next_add_time: f64,
    /// Number of accumulation calls this round, frozen ones included.
    abs_tick: i64,
    /// Logic ticks over the whole match. Not reset between rounds.
    match_tick: i64,
}

impl Default for SimulationClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulationClock {
    /// Create a clock at tick 0 running at [`DEFAULT_STEP`].
    pub fn new() -> Self {
        Self::with_step(DEFAULT_STEP)
    }

    /// Create a clock at tick 0 whose first call advances by `step`.
    pub fn with_step(step: f64) -> Self {
        debug_assert!(step > 0.0 && step.is_finite(), "step must be positive and finite");
        Self {
            tick_count: 0,
            old_tick_count: 0,
            tick_count_f: 0.0,
            last_tick: 0.0,
            next_add_time: step,
            old_next_add_time: step,
            abs_tick: 0,
            match_tick: 0,
        }
    }

    /// Advance the accumulator by the previously requested step and store
    /// `speed` as the step for the next call.
    ///
    /// Returns `false` only when a tick left pending by an earlier overshoot
    /// was flushed; no new input should be consumed for that call. While the
    /// debugger holds the simulation (see [`PauseState::debug_paused`]) the
    /// accumulator is left untouched and `true` is returned.
    pub fn add_frame_time(&mut self, speed: f64, pause: &PauseState) -> bool {
        debug_assert!(speed > 0.0 && speed.is_finite(), "speed must be positive and finite");
        self.abs_tick += 1;

        if pause.debug_paused(self) {
            self.old_next_add_time = 0.0;
            return true;
        }

        self.old_tick_count = self.tick_count;
        if floor_tick(self.tick_count_f) > self.tick_count {
            self.advance_tick();
            tracing::trace!(tick = self.tick_count, "clock_flushed_pending_tick");
            return false;
        }

        self.tick_count_f += self.next_add_time;
        if floor_tick(self.tick_count_f) > self.tick_count {
            self.advance_tick();
            self.last_tick = self.tick_count_f;
        }
        self.old_next_add_time = self.next_add_time;
        self.next_add_time = speed;
        true
    }

    /// Whether a new logic tick was crossed by the last call and the
    /// simulation is not frozen. True once per tick.
    pub fn tick_frame(&self, pause: &PauseState) -> bool {
        (!pause.paused || pause.step) && self.old_tick_count < self.tick_count
    }

    /// Whether the next call will cross a tick boundary. Post-logic work
    /// (collision resolution, camera) runs when this holds.
    pub fn tick_next_frame(&self, pause: &PauseState) -> bool {
        floor_tick(self.tick_count_f + self.next_add_time) > self.tick_count
            && (!pause.paused || pause.step || self.old_tick_count >= self.tick_count)
    }

    /// Progress toward the next logic tick in `[0, 1]`, for sub-frame
    /// render interpolation.
    pub fn tick_interpolation(&self, pause: &PauseState) -> f64 {
        if self.tick_next_frame(pause) {
            return 1.0;
        }
        (self.tick_count_f - self.last_tick + self.next_add_time).clamp(0.0, 1.0)
    }

    /// Reset per-round counters. The current step (game speed) survives.
    pub fn reset_round(&mut self) {
        self.tick_count = 0;
        self.old_tick_count = 0;
        self.tick_count_f = 0.0;
        self.last_tick = 0.0;
        self.abs_tick = 0;
    }

    fn advance_tick(&mut self) {
        self.tick_count += 1;
        self.match_tick += 1;
    }

    // -- accessors ----------------------------------------------------------

    /// Logic tick index within the round.
    pub fn tick_count(&self) -> i64 {
        self.tick_count
    }

    /// `tick_count` as it was before the last accumulation step.
    pub fn old_tick_count(&self) -> i64 {
        self.old_tick_count
    }

    /// The fractional accumulator.
    pub fn tick_count_f(&self) -> f64 {
        self.tick_count_f
    }

    /// Accumulator value at the last integer crossing.
    pub fn last_tick(&self) -> f64 {
        self.last_tick
    }

    /// Step the next call will apply.
    pub fn next_add_time(&self) -> f64 {
        self.next_add_time
    }

    /// Step applied by the previous call, `0.0` when it was frozen.
    pub fn old_next_add_time(&self) -> f64 {
        self.old_next_add_time
    }

    /// Accumulation calls this round, including frozen ones.
    pub fn abs_tick(&self) -> i64 {
        self.abs_tick
    }

    /// Logic ticks since the match started.
    pub fn match_tick(&self) -> i64 {
        self.match_tick
    }
}

fn floor_tick(value: f64) -> i64 {
    value.floor() as i64
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
