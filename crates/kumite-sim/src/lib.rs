//! Kumite Sim -- deterministic match clock and round lifecycle.
//!
//! This crate holds the pure, single-threaded part of a fighting-game match:
//!
//! - [`clock::SimulationClock`]: fixed-step tick accumulator driven by a
//!   variable game speed.
//! - [`pause::PauseState`]: debugger pause and single-step gate.
//! - [`outcome`]: the win-condition evaluator (KO, double KO, time over,
//!   draws, perfect rounds, win triggers).
//! - [`machine::RoundStateMachine`]: intro, fight, post-outcome and round
//!   over phases driven by the signed intro counter.
//! - [`state::MatchState`] and [`snapshot::SimSnapshot`]: owned state and
//!   hashed rollback snapshots.
//!
//! Nothing here touches the wall clock or threads; the driver lives in
//! `kumite-engine`.
//!
//! # Quick Start
//!
//! ```
//! use kumite_sim::prelude::*;
//!
//! let config = MatchConfig::default();
//! let roster = Roster::versus(Fighter::new(Side::P1, 1000), Fighter::new(Side::P2, 1000));
//! let mut state = MatchState::new(roster, &config);
//! let machine = RoundStateMachine::new(config.timing.clone(), config.ko.clone());
//!
//! let input = StepInput { round_control_active: true, ..Default::default() };
//! for _ in 0..config.timing.intro_start() {
//!     let pause = state.pause;
//!     state.clock.add_frame_time(1.0, &pause);
//!     if state.clock.tick_frame(&pause) {
//!         machine.step(&mut state.round, &mut state.roster, &input);
//!     }
//! }
//! assert_eq!(state.round.intro, 0);
//! assert!(state.roster.fighters[0].control);
//! ```

#![deny(unsafe_code)]

pub mod clock;
pub mod config;
pub mod machine;
pub mod outcome;
pub mod pause;
pub mod roster;
pub mod round;
pub mod score;
pub mod snapshot;
pub mod state;

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::clock::SimulationClock;
    pub use crate::config::{
        ConfigError, KoRules, MatchConfig, PacerConfig, RoundTiming, SpeedConfig,
    };
    pub use crate::machine::{RoundEvent, RoundStateMachine, StepInput, StepReport};
    pub use crate::outcome::{apply_outcome, evaluate, RoundOutcome};
    pub use crate::pause::PauseState;
    pub use crate::roster::{Fighter, HitAttr, HitRecord, Roster, Side, TeamMode};
    pub use crate::round::{Assertions, FinishType, RoundContext, RoundPhase, WinType};
    pub use crate::score::MatchScore;
    pub use crate::snapshot::{SimSnapshot, SnapshotError};
    pub use crate::state::MatchState;
}
