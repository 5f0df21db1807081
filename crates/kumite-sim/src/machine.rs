//! Round lifecycle state machine.
//!
//! [`RoundStateMachine::step`] runs once per released logic tick (when
//! [`SimulationClock::tick_frame`](crate::clock::SimulationClock::tick_frame)
//! holds). Each step:
//!
//! 1. Counts the intro down. The tick where `intro == ctrl_time` is the
//!    single fight-start transition (positions reset); `intro == 0` grants
//!    control.
//! 2. Runs the round timer while `intro == 0`.
//! 3. Evaluates and latches the outcome.
//! 4. Once an outcome is latched, drives the post-outcome countdown: skip
//!    requests, the readiness gate before the lock, win poses, fade-out, and
//!    the round-not-over stall.
//!
//! Skip requests count only once `intro` has reached the lock boundary
//! (`-over_waittime`). A press while the fighters still have post-outcome
//! control is dropped, not queued.
//!
//! The machine holds configuration only; all mutable round state lives in
//! [`RoundContext`] and [`Roster`] so it can be snapshotted for rollback.

use crate::config::{KoRules, RoundTiming};
use crate::outcome::{apply_outcome, evaluate, RoundOutcome};
use crate::roster::Roster;
use crate::round::{Assertions, FinishType, RoundContext};

// ---------------------------------------------------------------------------
// Step input / report
// ---------------------------------------------------------------------------

/// External facts for one step.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepInput {
    /// Round control (announcer/lifebar) is running. While false the round
    /// is held in the pre-round phase.
    pub round_control_active: bool,
    pub assertions: Assertions,
    /// Any button was pressed this tick.
    pub skip_requested: bool,
}

/// Lifecycle transitions observed during a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundEvent {
    /// Positions were reset; the fight is starting.
    FightStarted,
    /// Players received control.
    ControlGranted,
    /// An outcome was latched.
    OutcomeLatched(FinishType),
    /// The intro was held because fighters were not ready.
    WaitingForFighters,
    /// Win, lose and draw poses were requested.
    WinPosesStarted,
    /// The player skipped the win sequence.
    Skipped,
    /// The round reached its end.
    RoundOver,
}

/// Outcome of one [`RoundStateMachine::step`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepReport {
    pub events: Vec<RoundEvent>,
    /// What the evaluator reported this tick, latched or not.
    pub evaluated: Option<RoundOutcome>,
}

impl StepReport {
    /// Whether `event` was emitted.
    pub fn has(&self, event: RoundEvent) -> bool {
        self.events.contains(&event)
    }
}

// ---------------------------------------------------------------------------
// RoundStateMachine
// ---------------------------------------------------------------------------

/// Drives a [`RoundContext`] through its phases.
#[derive(Debug, Clone)]
pub struct RoundStateMachine {
    timing: RoundTiming,
    rules: KoRules,
}

impl RoundStateMachine {
    pub fn new(timing: RoundTiming, rules: KoRules) -> Self {
        Self { timing, rules }
    }

    pub fn timing(&self) -> &RoundTiming {
        &self.timing
    }

    pub fn rules(&self) -> &KoRules {
        &self.rules
    }

    /// Advance the round by one logic tick.
    pub fn step(
        &self,
        round: &mut RoundContext,
        roster: &mut Roster,
        input: &StepInput,
    ) -> StepReport {
        let mut report = StepReport::default();
        if !input.round_control_active {
            return report;
        }

        if round.fade_in_time > 0 {
            round.fade_in_time -= 1;
        }

        self.step_intro(round, roster, &input.assertions, &mut report);
        self.step_timer(round, &input.assertions);

        if round.intro <= 0 {
            let outcome = evaluate(round, roster, &self.rules);
            report.evaluated = Some(outcome);
            if apply_outcome(round, outcome, roster) {
                if round.finish.is_ko() {
                    round.slowtime = self.timing.slow_time;
                    round.shuttertime = self.timing.shutter_time;
                }
                report.events.push(RoundEvent::OutcomeLatched(round.finish));
            }
        }

        if round.is_finished() {
            self.step_post_outcome(round, roster, input, &mut report);
        }
        report
    }

    fn step_intro(
        &self,
        round: &mut RoundContext,
        roster: &mut Roster,
        flags: &Assertions,
        report: &mut StepReport,
    ) {
        let ctrl_time = self.timing.ctrl_time;
        if round.intro > ctrl_time {
            round.intro -= 1;
            if flags.intro && round.intro <= ctrl_time {
                round.intro = ctrl_time + 1;
            }
        } else if round.intro > 0 {
            if round.intro == ctrl_time {
                let moved = roster.reset_positions();
                tracing::info!(round = round.round, moved, "fight_started");
                report.events.push(RoundEvent::FightStarted);
            }
            round.intro -= 1;
            if round.intro == 0 {
                roster.grant_control();
                tracing::info!(round = round.round, "control_granted");
                report.events.push(RoundEvent::ControlGranted);
            }
        }
    }

    fn step_timer(&self, round: &mut RoundContext, flags: &Assertions) {
        if round.intro == 0 && round.time > 0 && !flags.timer_freeze && !flags.pause_background {
            round.time -= 1;
        }
    }

    fn step_post_outcome(
        &self,
        round: &mut RoundContext,
        roster: &mut Roster,
        input: &StepInput,
        report: &mut StepReport,
    ) {
        let lock = self.timing.lock_boundary();
        let over = self.timing.over_boundary();
        let fadeout = self.timing.fadeout_boundary();

        if round.slowtime > 0 {
            round.slowtime -= 1;
        }
        if round.shuttertime > 0 {
            round.shuttertime -= 1;
        }

        if input.skip_requested
            && !input.assertions.round_not_skip
            && !round.winskipped
            && round.intro <= lock
        {
            round.intro = round.intro.min(fadeout);
            round.winskipped = true;
            if round.wintime > 0 {
                round.wintime = 1;
            }
            tracing::debug!(round = round.round, intro = round.intro, "win_sequence_skipped");
            report.events.push(RoundEvent::Skipped);
        }

        // Readiness gate: the intro may not reach the lock until every
        // fighter is in a terminal pose, or the waitdown budget runs out.
        if round.intro - 1 == lock && !roster.all_ready() {
            if round.waitdown > 0 {
                round.waitdown -= 1;
                report.events.push(RoundEvent::WaitingForFighters);
                return;
            }
            tracing::warn!(round = round.round, "fighters_not_ready_lock_forced");
        }

        round.intro -= 1;

        if round.intro <= lock && round.wintime > 0 {
            round.wintime -= 1;
            if round.wintime == 0 {
                roster.start_win_poses(round.win_team, round.finish == FinishType::TimeOver);
                report.events.push(RoundEvent::WinPosesStarted);
            }
        }

        if round.intro <= fadeout && round.fade_out_time > 0 {
            round.fade_out_time -= 1;
        }

        if round.intro <= over {
            if input.assertions.round_not_over {
                round.intro += 1;
            } else if round.intro == over {
                tracing::info!(
                    round = round.round,
                    finish = ?round.finish,
                    win_team = ?round.win_team,
                    "round_over"
                );
                report.events.push(RoundEvent::RoundOver);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
