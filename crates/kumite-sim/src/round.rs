//! Per-round state: the intro counter, the timer, and the latched outcome.
//!
//! The intro counter is a signed countdown that encodes the round phase:
//! positive values are pre-fight, zero is the point where control is
//! granted, and negative values count through the post-outcome sequence.
//! [`RoundContext::phase`] derives a readable [`RoundPhase`] from it.

use serde::{Deserialize, Serialize};

use crate::config::RoundTiming;
use crate::roster::Side;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// How the round ended. Latched once it leaves `NotYet`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinishType {
    #[default]
    NotYet,
    Ko,
    DoubleKo,
    TimeOver,
    TimeOverDraw,
}

impl FinishType {
    /// Whether the finish has no winner.
    pub fn is_draw(self) -> bool {
        matches!(self, FinishType::DoubleKo | FinishType::TimeOverDraw)
    }

    /// Whether the finish came from fighters falling.
    pub fn is_ko(self) -> bool {
        matches!(self, FinishType::Ko | FinishType::DoubleKo)
    }
}

/// Win classification, used for scoring and UI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WinType {
    #[default]
    Normal,
    Special,
    Hyper,
    Time,
    Draw,
}

/// Round phase derived from the intro counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    PreRound,
    Announce,
    Fighting,
    PostOutcomeControlled,
    PostOutcomeLocked,
    RoundOver,
}

// ---------------------------------------------------------------------------
// Assertions
// ---------------------------------------------------------------------------

/// Per-tick flags raised by character logic. The driver clears them after
/// every logic tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assertions {
    /// Hold the round in the intro.
    pub intro: bool,
    /// Stop the round timer.
    pub timer_freeze: bool,
    /// Stall the end of the round by one tick.
    pub round_not_over: bool,
    /// Ignore skip requests during win poses.
    pub round_not_skip: bool,
    /// A pause with a frozen background is running (super pause).
    pub pause_background: bool,
}

impl Assertions {
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

// ---------------------------------------------------------------------------
// RoundContext
// ---------------------------------------------------------------------------

/// Mutable state of the current round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundContext {
    /// Round number, starting at 1.
    pub round: i32,
    /// Signed phase countdown.
    pub intro: i32,
    /// Remaining round time in ticks, `-1` for infinite.
    pub time: i32,
    pub finish: FinishType,
    /// Set exactly when `finish` is `Ko` or `TimeOver`.
    pub win_team: Option<Side>,
    pub win_type: [WinType; 2],
    pub win_trigger: [WinType; 2],
    pub perfect: [bool; 2],
    /// A win this round ends the match for that side.
    pub decisive_round: [bool; 2],
    pub waitdown: i32,
    pub wintime: i32,
    pub slowtime: i32,
    pub shuttertime: i32,
    pub fade_in_time: i32,
    pub fade_out_time: i32,
    pub winskipped: bool,
}

impl RoundContext {
    /// A fresh round with counters taken from `timing`.
    pub fn new(round: i32, timing: &RoundTiming) -> Self {
        Self {
            round,
            intro: timing.intro_start(),
            time: timing.round_time,
            finish: FinishType::NotYet,
            win_team: None,
            win_type: [WinType::Normal; 2],
            win_trigger: [WinType::Normal; 2],
            perfect: [false; 2],
            decisive_round: [false; 2],
            waitdown: timing.waitdown_time,
            wintime: timing.over_wintime,
            slowtime: 0,
            shuttertime: 0,
            fade_in_time: timing.fadein_time,
            fade_out_time: timing.fadeout_time,
            winskipped: false,
        }
    }

    /// Whether an outcome has been latched.
    pub fn is_finished(&self) -> bool {
        self.finish != FinishType::NotYet
    }

    /// Derive the phase. `round_control_active` comes from the round-control
    /// hook (announcer/lifebar).
    pub fn phase(&self, round_control_active: bool, timing: &RoundTiming) -> RoundPhase {
        if !round_control_active || self.intro > timing.ctrl_time + 1 {
            RoundPhase::PreRound
        } else if self.intro > 0 {
            RoundPhase::Announce
        } else if self.intro >= 0 || !self.is_finished() {
            RoundPhase::Fighting
        } else if self.intro <= timing.over_boundary() {
            RoundPhase::RoundOver
        } else if self.intro <= timing.lock_boundary() {
            RoundPhase::PostOutcomeLocked
        } else {
            RoundPhase::PostOutcomeControlled
        }
    }
}
