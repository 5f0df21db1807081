//! The match scheduler: one pacer iteration at a time.
//!
//! The [`Scheduler`] owns the [`MatchState`] and drives it forward. Each
//! iteration of [`run_iteration`](Scheduler::run_iteration) runs, in this
//! order:
//!
//! 1. Present the previous frame (unless it was skipped).
//! 2. Drain the cross-thread [`TaskQueue`] completely.
//! 3. Pace against the wall clock; stop if shutdown was requested.
//! 4. Apply queued [`ExternalRequest`]s.
//! 5. Confirm this frame's input through the [`SyncGate`]. A desync ends the
//!    match.
//! 6. Advance the [`SimulationClock`](kumite_sim::clock::SimulationClock).
//! 7. Tick round control, then, when a logic tick was released, the world
//!    and the [`RoundStateMachine`]. The single-step flag and the assertions
//!    are cleared once the tick has consumed them.
//! 8. Post-logic world tick, camera, draw (unless skipped), debug overlay,
//!    scripts.
//! 9. On round over, settle the score and start the next round or end the
//!    match.
//!
//! Steps 2, 5 and 6 must keep that order: work queued by loader threads has
//! to be visible before the logic that may reference it.
//!
//! [`advance_headless`](Scheduler::advance_headless) runs steps 4 and 6-9
//! with already-confirmed input and no pacing, for replay verification and
//! rollback re-simulation.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use kumite_sim::config::{ConfigError, MatchConfig};
use kumite_sim::machine::{RoundEvent, RoundStateMachine, StepInput};
use kumite_sim::pause::PauseState;
use kumite_sim::roster::Roster;
use kumite_sim::round::{Assertions, RoundPhase};
use kumite_sim::snapshot::SimSnapshot;
use kumite_sim::state::MatchState;

use crate::hooks::{FrameHooks, NoHooks, WorldPhase};
use crate::pacer::{ShutdownSignal, WallClockPacer};
use crate::replay::{ReplayLog, ReplayRecorder};
use crate::sync::{DesyncError, InputFrame, LocalSync, SyncGate};
use crate::task_queue::{TaskQueue, TaskSender};

// ---------------------------------------------------------------------------
// Requests and outcomes
// ---------------------------------------------------------------------------

/// Requests from outside the simulation, applied at the next iteration
/// boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalRequest {
    /// Run the current round again from the start; the score is kept.
    RoundReset,
    /// Tear the match down and start over from round 1.
    MatchReload,
}

/// What the caller should do after an iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IterationOutcome {
    Continue,
    /// The score ended the match.
    MatchOver,
    /// Input synchronization failed; the match cannot continue.
    Desynced(DesyncError),
    /// Shutdown was requested.
    Shutdown,
}

/// Timing and bookkeeping for the last iteration.
#[derive(Debug, Clone, Default)]
pub struct IterationDiagnostics {
    pub tasks_drained: usize,
    pub frame_skip: bool,
    /// A logic tick was released.
    pub ticked: bool,
    pub events: Vec<RoundEvent>,
    pub total_time: Duration,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Owns the match and runs it one iteration at a time.
pub struct Scheduler {
    config: MatchConfig,
    state: MatchState,
    /// Roster as it was before round 1, for match reloads.
    initial_roster: Roster,
    machine: RoundStateMachine,
    pacer: WallClockPacer,
    queue: TaskQueue,
    sync: Box<dyn SyncGate>,
    hooks: Box<dyn FrameHooks>,
    /// Raised by characters during the world tick, consumed by the round.
    assertions: Assertions,
    requests: VecDeque<ExternalRequest>,
    recorder: Option<ReplayRecorder>,
    debug_draw: bool,
    round_control_active: bool,
    last_frame_skip: bool,
    /// Set once the match ended; later iterations report it again.
    halted: Option<IterationOutcome>,
    last_diagnostics: IterationDiagnostics,
}

impl Scheduler {
    /// Create a scheduler for a new match.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting in `config`.
    pub fn new(
        config: MatchConfig,
        roster: Roster,
        sync: impl SyncGate + 'static,
        hooks: impl FrameHooks + 'static,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let state = MatchState::new(roster.clone(), &config);
        let machine = RoundStateMachine::new(config.timing.clone(), config.ko.clone());
        let pacer = WallClockPacer::new(config.pacer.clone());
        let queue = TaskQueue::bounded(config.task_queue_capacity);

        tracing::info!(
            fighters = roster.fighters.len(),
            match_wins = config.match_wins,
            target_fps = config.pacer.target_fps,
            "scheduler_created"
        );

        Ok(Self {
            config,
            state,
            initial_roster: roster,
            machine,
            pacer,
            queue,
            sync: Box::new(sync),
            hooks: Box::new(hooks),
            assertions: Assertions::default(),
            requests: VecDeque::new(),
            recorder: None,
            debug_draw: false,
            round_control_active: false,
            last_frame_skip: false,
            halted: None,
            last_diagnostics: IterationDiagnostics::default(),
        })
    }

    /// Offline scheduler with no game-layer hooks.
    pub fn headless(config: MatchConfig, roster: Roster) -> Result<Self, ConfigError> {
        Self::new(config, roster, LocalSync, NoHooks)
    }

    /// Use `queue` (typically the one a loader already fed) instead of a
    /// fresh one.
    pub fn with_task_queue(mut self, queue: TaskQueue) -> Self {
        self.queue = queue;
        self
    }

    // -- iteration ----------------------------------------------------------

    /// Run one pacer iteration.
    pub fn run_iteration(&mut self) -> IterationOutcome {
        let start = Instant::now();

        if !self.last_frame_skip {
            self.hooks.present();
        }
        let tasks_drained = self.queue.drain();

        if !self.pacer.pace() {
            tracing::info!(frame = self.state.frame, "shutdown_requested");
            return IterationOutcome::Shutdown;
        }
        let frame_skip = self.pacer.frame_skip();
        self.last_frame_skip = frame_skip;

        self.apply_requests();
        if let Some(outcome) = &self.halted {
            return outcome.clone();
        }

        let frame = self.state.frame;
        let mut input = self.hooks.poll_input();
        if let Err(error) = self.sync.synchronize(frame, &mut input) {
            tracing::warn!(frame, %error, "desync_detected");
            let outcome = IterationOutcome::Desynced(error);
            self.halted = Some(outcome.clone());
            return outcome;
        }
        self.record(frame, &input);

        let outcome = self.simulate(input, frame_skip);
        self.last_diagnostics.tasks_drained = tasks_drained;
        self.last_diagnostics.frame_skip = frame_skip;
        self.last_diagnostics.total_time = start.elapsed();
        outcome
    }

    /// Advance one frame with already-confirmed `input`, without pacing,
    /// synchronization or drawing.
    pub fn advance_headless(&mut self, input: InputFrame) -> IterationOutcome {
        let start = Instant::now();
        let tasks_drained = self.queue.drain();

        self.apply_requests();
        if let Some(outcome) = &self.halted {
            return outcome.clone();
        }

        let frame = self.state.frame;
        self.record(frame, &input);

        let outcome = self.simulate(input, true);
        self.last_diagnostics.tasks_drained = tasks_drained;
        self.last_diagnostics.frame_skip = true;
        self.last_diagnostics.total_time = start.elapsed();
        outcome
    }

    /// Iterate until the outcome is anything but `Continue`.
    pub fn run(&mut self) -> IterationOutcome {
        tracing::info!(round = self.state.round.round, "scheduler_started");
        loop {
            let outcome = self.run_iteration();
            if outcome != IterationOutcome::Continue {
                tracing::info!(
                    outcome = ?outcome,
                    frame = self.state.frame,
                    match_tick = self.state.clock.match_tick(),
                    pacer = ?self.pacer.stats(),
                    "scheduler_stopped"
                );
                return outcome;
            }
        }
    }

    /// Queue a request for the next iteration boundary.
    pub fn request(&mut self, request: ExternalRequest) {
        tracing::debug!(request = ?request, "external_request_queued");
        self.requests.push_back(request);
    }

    fn apply_requests(&mut self) {
        while let Some(request) = self.requests.pop_front() {
            match request {
                ExternalRequest::RoundReset => {
                    self.state.reset_round(&self.config);
                }
                ExternalRequest::MatchReload => {
                    let accel = self.state.accel;
                    self.state = MatchState::new(self.initial_roster.clone(), &self.config);
                    self.state.accel = accel;
                    self.machine =
                        RoundStateMachine::new(self.config.timing.clone(), self.config.ko.clone());
                    self.pacer.reset();
                    self.halted = None;
                    tracing::info!("match_reloaded");
                }
            }
            self.assertions.clear();
        }
    }

    fn record(&mut self, frame: u64, input: &InputFrame) {
        if let Some(recorder) = self.recorder.as_mut() {
            let hash = recorder
                .wants_checkpoint(frame)
                .then(|| self.state.state_hash());
            recorder.record_frame(frame, input, hash);
        }
    }

    /// Steps 6-9 of an iteration.
    fn simulate(&mut self, input: InputFrame, frame_skip: bool) -> IterationOutcome {
        self.state.frame += 1;
        let speed = self
            .config
            .speed
            .effective_speed(self.state.round.slowtime, self.state.accel);
        let pause = self.state.pause;
        // A flushed call releases a tick an earlier call paid for; no world
        // or round logic runs on it.
        let fresh = self.state.clock.add_frame_time(speed, &pause);

        self.round_control_active = self.hooks.round_control_tick(&self.state.round);

        let ticked = fresh && self.state.clock.tick_frame(&pause);
        let mut events = Vec::new();
        if ticked {
            self.hooks.world_tick(
                WorldPhase::Main,
                &mut self.state,
                &input,
                &mut self.assertions,
            );
            let step = StepInput {
                round_control_active: self.round_control_active,
                assertions: self.assertions,
                skip_requested: input.any_pressed(),
            };
            let report = self
                .machine
                .step(&mut self.state.round, &mut self.state.roster, &step);
            self.state.pause.consume_step();
            self.assertions.clear();
            for event in &report.events {
                self.hooks.on_round_event(*event, &self.state);
            }
            events = report.events;
        } else if !fresh {
            tracing::trace!(frame = self.state.frame, "logic_skipped_on_flush");
        }

        if fresh && self.state.clock.tick_next_frame(&self.state.pause) {
            self.hooks.world_tick(
                WorldPhase::PostLogic,
                &mut self.state,
                &input,
                &mut self.assertions,
            );
        }
        self.hooks.camera(&self.state.round);
        if !frame_skip {
            self.hooks
                .draw(self.state.clock.tick_interpolation(&self.state.pause));
        }
        if self.debug_draw {
            self.hooks.debug_draw(&self.state);
        }
        self.hooks.run_scripts(&self.state);

        let round_over = events.contains(&RoundEvent::RoundOver);
        self.last_diagnostics.ticked = ticked;
        self.last_diagnostics.events = events;

        if round_over && self.state.conclude_round(&self.config) {
            self.halted = Some(IterationOutcome::MatchOver);
            return IterationOutcome::MatchOver;
        }
        IterationOutcome::Continue
    }

    // -- recording and rollback ---------------------------------------------

    /// Start recording confirmed input, with a state checkpoint every
    /// `checkpoint_interval` frames. Replaces any recording in progress.
    pub fn start_recording(&mut self, checkpoint_interval: u64) {
        self.recorder = Some(ReplayRecorder::new(
            self.capture_snapshot(),
            checkpoint_interval,
        ));
        tracing::info!(frame = self.state.frame, checkpoint_interval, "recording_started");
    }

    /// Stop recording and return the log, if a recording was running.
    pub fn finish_recording(&mut self) -> Option<ReplayLog> {
        let log = self.recorder.take()?.finish();
        tracing::info!(total_frames = log.total_frames, "recording_finished");
        Some(log)
    }

    pub fn capture_snapshot(&self) -> SimSnapshot {
        self.state.capture_snapshot()
    }

    /// Restore the match from `snapshot`. On a hash mismatch nothing is
    /// changed.
    ///
    /// A recording in progress is cut back to the restored frame, so the
    /// re-simulated frames replace the ones rolled back. A snapshot outside
    /// the recorded range ends the recording.
    pub fn restore_from_snapshot(&mut self, snapshot: &SimSnapshot) -> Result<(), anyhow::Error> {
        self.state.restore_from_snapshot(snapshot)?;
        self.assertions.clear();
        self.halted = None;

        let frame = self.state.frame;
        if let Some(recorder) = self.recorder.as_mut() {
            if !recorder.rewind_to(frame) {
                self.recorder = None;
                tracing::warn!(frame, "recording_dropped_on_restore");
            }
        }
        Ok(())
    }

    // -- debug controls -----------------------------------------------------

    pub fn toggle_pause(&mut self) {
        self.state.pause.toggle_pause();
    }

    /// Release one logic tick while paused.
    pub fn request_step(&mut self) {
        self.state.pause.request_step();
    }

    /// Fast-forward multiplier applied on top of the game speed. Part of the
    /// match state, so snapshots and replays carry it.
    pub fn set_accel(&mut self, accel: f64) {
        self.state.accel = accel;
    }

    pub fn set_debug_draw(&mut self, enabled: bool) {
        self.debug_draw = enabled;
    }

    // -- accessors ----------------------------------------------------------

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    /// Mutable access to the match state, for setup and tests.
    pub fn state_mut(&mut self) -> &mut MatchState {
        &mut self.state
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn machine(&self) -> &RoundStateMachine {
        &self.machine
    }

    pub fn pause(&self) -> PauseState {
        self.state.pause
    }

    /// The current round phase as of the last iteration.
    pub fn phase(&self) -> RoundPhase {
        self.state
            .round
            .phase(self.round_control_active, self.machine.timing())
    }

    /// Producer handle for loader threads.
    pub fn task_sender(&self) -> TaskSender {
        self.queue.sender()
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.pacer.shutdown_signal()
    }

    pub fn pacer(&self) -> &WallClockPacer {
        &self.pacer
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_some()
    }

    pub fn last_diagnostics(&self) -> &IterationDiagnostics {
        &self.last_diagnostics
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
