//! Wall-clock frame pacing.
//!
//! The [`WallClockPacer`] keeps render iterations on a fixed schedule of
//! `1 / target_fps` and decides, per iteration, whether the frame is
//! presented or skipped. The decision itself is the pure
//! [`WallClockPacer::plan`], so it can be tested against synthetic
//! instants; [`WallClockPacer::pace`] is the single sleep point.
//!
//! Per iteration, with `diff = next_scheduled - now` and
//! `wait = 1 / target_fps`:
//!
//! | Condition | Result |
//! |-----------|--------|
//! | `0 <= diff < wait + slack` | sleep `diff`, present |
//! | nothing presented for `stall_threshold` | present, re-anchor the schedule |
//! | `diff >= wait + slack` | present without sleeping, re-anchor |
//! | `-late_tolerance <= diff < 0` | present |
//! | `diff < -late_tolerance` | skip the frame |
//! | `diff < -resync_threshold` | skip and re-anchor the schedule |
//!
//! Re-anchoring drops the catch-up debt instead of chasing it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use kumite_sim::config::PacerConfig;

// ---------------------------------------------------------------------------
// ShutdownSignal
// ---------------------------------------------------------------------------

/// Cloneable flag another thread sets to stop the scheduler.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal(Arc<AtomicBool>);

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// PacePlan
// ---------------------------------------------------------------------------

/// Why an iteration was classified the way it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaceKind {
    /// Ahead of schedule; sleep until the scheduled time.
    Early,
    /// Scheduled time was unreasonably far ahead; schedule re-anchored.
    Rebased,
    /// Nothing was presented for too long; bookkeeping reset.
    Stalled,
    /// Slightly late, within tolerance.
    Late,
    /// Too late; the frame is not drawn.
    Skipped,
    /// Far too late; the frame is not drawn and the schedule re-anchored.
    Resynced,
}

/// The decision for one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacePlan {
    pub kind: PaceKind,
    pub sleep: Duration,
    pub frame_skip: bool,
    /// Schedule for the following iteration.
    pub next_scheduled: Instant,
}

/// Counters over the pacer's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacerStats {
    pub iterations: u64,
    pub skipped: u64,
    pub resyncs: u64,
    pub stalls: u64,
}

// ---------------------------------------------------------------------------
// WallClockPacer
// ---------------------------------------------------------------------------

/// Fixed-rate pacer for render iterations.
#[derive(Debug)]
pub struct WallClockPacer {
    config: PacerConfig,
    next_scheduled: Option<Instant>,
    last_presented: Option<Instant>,
    frame_skip: bool,
    shutdown: ShutdownSignal,
    stats: PacerStats,
}

impl WallClockPacer {
    pub fn new(config: PacerConfig) -> Self {
        Self {
            config,
            next_scheduled: None,
            last_presented: None,
            frame_skip: false,
            shutdown: ShutdownSignal::new(),
            stats: PacerStats::default(),
        }
    }

    /// Duration of one frame at the target rate.
    pub fn wait(&self) -> Duration {
        self.config.frame_duration()
    }

    /// Classify an iteration happening at `now`.
    pub fn plan(&self, now: Instant) -> PacePlan {
        let wait = self.wait();
        let next = self.next_scheduled.unwrap_or(now);
        let last_presented = self.last_presented.unwrap_or(now);
        plan_iteration(&self.config, wait, next, last_presented, now)
    }

    /// Pace one iteration: sleep if early, record whether the frame is
    /// skipped, and report whether the scheduler should keep running.
    pub fn pace(&mut self) -> bool {
        let plan = self.plan(Instant::now());
        if plan.sleep > Duration::ZERO {
            thread::sleep(plan.sleep);
        }
        self.commit(&plan, Instant::now());
        !self.shutdown.is_requested()
    }

    /// Apply a plan. `presented_at` is the instant the iteration resumed.
    pub fn commit(&mut self, plan: &PacePlan, presented_at: Instant) {
        self.stats.iterations += 1;
        self.frame_skip = plan.frame_skip;
        self.next_scheduled = Some(plan.next_scheduled);
        if !plan.frame_skip {
            self.last_presented = Some(presented_at);
        }

        match plan.kind {
            PaceKind::Early | PaceKind::Late => {}
            PaceKind::Rebased => {
                tracing::debug!(wait_ms = self.wait().as_millis() as u64, "pacer_rebased");
            }
            PaceKind::Stalled => {
                self.stats.stalls += 1;
                tracing::warn!(
                    stall_threshold_ms = self.config.stall_threshold_ms,
                    "pacer_stall_recovered"
                );
            }
            PaceKind::Skipped => {
                self.stats.skipped += 1;
                tracing::debug!(iteration = self.stats.iterations, "frame_skipped");
            }
            PaceKind::Resynced => {
                self.stats.skipped += 1;
                self.stats.resyncs += 1;
                tracing::debug!(iteration = self.stats.iterations, "pacer_resynced");
            }
        }
    }

    /// Whether the last paced iteration is not drawn.
    pub fn frame_skip(&self) -> bool {
        self.frame_skip
    }

    /// Handle that stops [`pace`](Self::pace) from reporting `true`.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    pub fn stats(&self) -> PacerStats {
        self.stats
    }

    pub fn config(&self) -> &PacerConfig {
        &self.config
    }

    /// Forget the schedule; the next iteration is treated as on time.
    pub fn reset(&mut self) {
        self.next_scheduled = None;
        self.last_presented = None;
        self.frame_skip = false;
    }
}

fn plan_iteration(
    config: &PacerConfig,
    wait: Duration,
    next: Instant,
    last_presented: Instant,
    now: Instant,
) -> PacePlan {
    let slack = Duration::from_millis(config.sleep_slack_ms);
    let on_time = |kind, sleep, next_scheduled| PacePlan {
        kind,
        sleep,
        frame_skip: false,
        next_scheduled,
    };

    let ahead = next.checked_duration_since(now);
    if let Some(diff) = ahead {
        if diff < wait + slack {
            return on_time(PaceKind::Early, diff, next + wait);
        }
    }

    if now.saturating_duration_since(last_presented)
        > Duration::from_millis(config.stall_threshold_ms)
    {
        return on_time(PaceKind::Stalled, Duration::ZERO, now + wait);
    }

    if ahead.is_some() {
        return on_time(PaceKind::Rebased, Duration::ZERO, now + wait);
    }

    let behind = now.saturating_duration_since(next);
    if behind <= Duration::from_millis(config.late_tolerance_ms) {
        return on_time(PaceKind::Late, Duration::ZERO, next + wait);
    }

    if behind > Duration::from_millis(config.resync_threshold_ms) {
        PacePlan {
            kind: PaceKind::Resynced,
            sleep: Duration::ZERO,
            frame_skip: true,
            next_scheduled: now + wait,
        }
    } else {
        PacePlan {
            kind: PaceKind::Skipped,
            sleep: Duration::ZERO,
            frame_skip: true,
            next_scheduled: next + wait,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn config() -> PacerConfig {
        PacerConfig {
            target_fps: 50, // 20ms frames keep the arithmetic exact
            ..Default::default()
        }
    }

    /// A pacer whose schedule sits at `next` with a frame presented at
    /// `presented`.
    fn pacer_at(next: Instant, presented: Instant) -> WallClockPacer {
        let mut pacer = WallClockPacer::new(config());
        pacer.next_scheduled = Some(next);
        pacer.last_presented = Some(presented);
        pacer
    }

    // -- 1. On schedule -----------------------------------------------------

    #[test]
    fn first_iteration_is_on_time() {
        let pacer = WallClockPacer::new(config());
        let now = Instant::now();
        let plan = pacer.plan(now);
        assert_eq!(plan.kind, PaceKind::Early);
        assert_eq!(plan.sleep, Duration::ZERO);
        assert!(!plan.frame_skip);
        assert_eq!(plan.next_scheduled, now + ms(20));
    }

    #[test]
    fn early_iteration_sleeps_until_schedule() {
        let now = Instant::now();
        let pacer = pacer_at(now + ms(5), now);
        let plan = pacer.plan(now);
        assert_eq!(plan.kind, PaceKind::Early);
        assert_eq!(plan.sleep, ms(5));
        assert_eq!(plan.next_scheduled, now + ms(25));
    }

    #[test]
    fn far_ahead_schedule_is_rebased() {
        let now = Instant::now();
        let pacer = pacer_at(now + ms(500), now);
        let plan = pacer.plan(now);
        assert_eq!(plan.kind, PaceKind::Rebased);
        assert_eq!(plan.sleep, Duration::ZERO);
        assert!(!plan.frame_skip);
        assert_eq!(plan.next_scheduled, now + ms(20));
    }

    // -- 2. Late ------------------------------------------------------------

    #[test]
    fn slightly_late_is_presented() {
        let start = Instant::now();
        let now = start + ms(30);
        let pacer = pacer_at(now - ms(10), now - ms(20));
        let plan = pacer.plan(now);
        assert_eq!(plan.kind, PaceKind::Late);
        assert!(!plan.frame_skip);
        assert_eq!(plan.next_scheduled, now + ms(10));
    }

    #[test]
    fn late_beyond_tolerance_skips_frame() {
        let start = Instant::now();
        let now = start + ms(200);
        let pacer = pacer_at(now - ms(40), now - ms(60));
        let plan = pacer.plan(now);
        assert_eq!(plan.kind, PaceKind::Skipped);
        assert!(plan.frame_skip);
        // Catch-up continues from the old schedule.
        assert_eq!(plan.next_scheduled, now - ms(20));
    }

    #[test]
    fn very_late_resynchronizes() {
        let start = Instant::now();
        let now = start + ms(400);
        let pacer = pacer_at(now - ms(200), now - ms(100));
        let plan = pacer.plan(now);
        assert_eq!(plan.kind, PaceKind::Resynced);
        assert!(plan.frame_skip);
        assert_eq!(plan.next_scheduled, now + ms(20));
    }

    // -- 3. Stall -----------------------------------------------------------

    #[test]
    fn stall_resets_bookkeeping() {
        let start = Instant::now();
        let now = start + ms(1000);
        let pacer = pacer_at(now - ms(600), now - ms(600));
        let plan = pacer.plan(now);
        assert_eq!(plan.kind, PaceKind::Stalled);
        assert!(!plan.frame_skip);
        assert_eq!(plan.next_scheduled, now + ms(20));
    }

    // -- 4. Commit and shutdown ---------------------------------------------

    #[test]
    fn commit_tracks_skips_and_presentation() {
        let start = Instant::now();
        let now = start + ms(400);
        let mut pacer = pacer_at(now - ms(200), now - ms(100));
        let plan = pacer.plan(now);
        pacer.commit(&plan, now);
        assert!(pacer.frame_skip());
        assert_eq!(pacer.last_presented, Some(now - ms(100)));
        assert_eq!(
            pacer.stats(),
            PacerStats {
                iterations: 1,
                skipped: 1,
                resyncs: 1,
                stalls: 0
            }
        );

        let plan = pacer.plan(now);
        pacer.commit(&plan, now);
        assert!(!pacer.frame_skip());
        assert_eq!(pacer.last_presented, Some(now));
    }

    #[test]
    fn pace_reports_shutdown() {
        let mut pacer = WallClockPacer::new(PacerConfig {
            target_fps: 1000,
            ..Default::default()
        });
        assert!(pacer.pace());
        pacer.shutdown_signal().request();
        assert!(!pacer.pace());
    }

    #[test]
    fn steady_pacing_holds_target_rate() {
        let mut pacer = WallClockPacer::new(PacerConfig {
            target_fps: 200,
            ..Default::default()
        });
        let start = Instant::now();
        for _ in 0..20 {
            pacer.pace();
        }
        // 19 waits of 5ms after the first on-time iteration.
        assert!(start.elapsed() >= ms(90));
    }

    // -- 5. Plan properties -------------------------------------------------

    proptest! {
        /// Frames are only skipped once the schedule is further behind than
        /// the late tolerance, and a resync always re-anchors on `now`.
        #[test]
        fn skip_and_resync_bounds(offset_ms in -500i64..500, age_ms in 0u64..1000) {
            let config = config();
            let wait = config.frame_duration();
            let now = Instant::now() + Duration::from_secs(5);
            let next = if offset_ms >= 0 {
                now + ms(offset_ms.unsigned_abs())
            } else {
                now - ms(offset_ms.unsigned_abs())
            };
            let presented = now - ms(age_ms);

            let plan = plan_iteration(&config, wait, next, presented, now);
            let behind = now.saturating_duration_since(next);

            if plan.frame_skip {
                prop_assert!(behind > ms(config.late_tolerance_ms));
                prop_assert!(age_ms <= config.stall_threshold_ms);
            }
            if plan.kind == PaceKind::Resynced {
                prop_assert!(behind > ms(config.resync_threshold_ms));
                prop_assert_eq!(plan.next_scheduled, now + wait);
            }
            prop_assert!(plan.sleep < wait + ms(config.sleep_slack_ms));
        }
    }
}
