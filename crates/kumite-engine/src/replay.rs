//! Deterministic replay with input recording and checkpoint verification.
//!
//! A [`ReplayRecorder`] captures the confirmed [`InputFrame`] of every frame
//! plus periodic state hash checkpoints, producing a [`ReplayLog`]. The log can
//! be played back live through [`ReplaySync`](crate::sync::ReplaySync), or
//! verified headlessly with [`replay`]: the initial snapshot is restored, the
//! recorded inputs are fed frame by frame, and state hashes are compared at
//! each checkpoint.
//!
//! # Recording and verifying
//!
//! ```
//! use kumite_engine::prelude::*;
//!
//! let config = MatchConfig::default();
//! let roster = Roster::versus(Fighter::new(Side::P1, 1000), Fighter::new(Side::P2, 1000));
//! let mut scheduler = Scheduler::headless(config, roster).unwrap();
//!
//! scheduler.start_recording(10); // checkpoint every 10 frames
//! for frame in 0..100u32 {
//!     scheduler.advance_headless(InputFrame::new(frame % 7, 0));
//! }
//! let log = scheduler.finish_recording().unwrap();
//!
//! let result = replay(&mut scheduler, &log).unwrap();
//! assert!(result.completed);
//! assert!(result.first_divergence.is_none());
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use kumite_sim::snapshot::SimSnapshot;

use crate::scheduler::Scheduler;
use crate::sync::InputFrame;

// ---------------------------------------------------------------------------
// ReplayLog
// ---------------------------------------------------------------------------

/// A complete replay log: initial snapshot + ordered sequence of inputs and
/// checkpoints.
///
/// The log is fully serializable to JSON for storage, transmission, or
/// regression test fixtures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayLog {
    /// Match state at the start of recording. Replay begins by restoring it.
    pub initial_snapshot: SimSnapshot,

    /// Number of frames recorded. Replay runs exactly this many frames from
    /// the initial snapshot, regardless of how many entries exist.
    pub total_frames: u64,

    /// Inputs and checkpoints in frame order.
    pub entries: Vec<ReplayEntry>,
}

impl ReplayLog {
    /// Frame counter of the initial snapshot.
    pub fn start_frame(&self) -> u64 {
        self.initial_snapshot.state.frame
    }

    /// BLAKE3 hex digest of the serialized log, for naming fixtures and
    /// comparing recordings.
    pub fn content_hash(&self) -> String {
        let json_bytes =
            serde_json::to_vec(self).expect("ReplayLog should always be JSON-serializable");
        blake3::hash(&json_bytes).to_hex().to_string()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

// ---------------------------------------------------------------------------
// ReplayEntry
// ---------------------------------------------------------------------------

/// A single entry in a [`ReplayLog`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReplayEntry {
    /// Confirmed input for a frame. Frames with no buttons held are omitted.
    Input { frame: u64, input: InputFrame },
    /// State hash taken before the frame was simulated.
    Checkpoint { frame: u64, state_hash: String },
}

impl ReplayEntry {
    pub fn frame(&self) -> u64 {
        match self {
            ReplayEntry::Input { frame, .. } | ReplayEntry::Checkpoint { frame, .. } => *frame,
        }
    }
}

// ---------------------------------------------------------------------------
// ReplayResult
// ---------------------------------------------------------------------------

/// The outcome of replaying a [`ReplayLog`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayResult {
    /// Whether every recorded frame was replayed without divergence.
    pub completed: bool,
    pub frames_replayed: u64,
    /// The first checkpoint whose hash did not match. `None` when the run
    /// was deterministic.
    pub first_divergence: Option<ReplayDivergence>,
}

/// Details about a determinism failure detected during replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayDivergence {
    pub frame: u64,
    pub expected_hash: String,
    pub actual_hash: String,
}

// ---------------------------------------------------------------------------
// ReplayRecorder
// ---------------------------------------------------------------------------

/// Records a run into a [`ReplayLog`].
///
/// Call [`record_frame`](Self::record_frame) once per confirmed frame, before
/// that frame is simulated. Frames must be strictly increasing.
#[derive(Debug)]
pub struct ReplayRecorder {
    log: ReplayLog,
    /// A value of 0 checkpoints every frame a hash is supplied for.
    checkpoint_interval: u64,
    frames_recorded: u64,
    last_frame: Option<u64>,
}

impl ReplayRecorder {
    pub fn new(snapshot: SimSnapshot, checkpoint_interval: u64) -> Self {
        Self {
            log: ReplayLog {
                initial_snapshot: snapshot,
                total_frames: 0,
                entries: Vec::new(),
            },
            checkpoint_interval,
            frames_recorded: 0,
            last_frame: None,
        }
    }

    /// Whether `frame` falls on the checkpoint interval. Lets the caller skip
    /// hashing on other frames.
    pub fn wants_checkpoint(&self, frame: u64) -> bool {
        self.checkpoint_interval == 0 || frame % self.checkpoint_interval == 0
    }

    /// Record one frame.
    ///
    /// # Panics
    ///
    /// Panics if `frame` is not strictly greater than the previous frame.
    pub fn record_frame(&mut self, frame: u64, input: &InputFrame, state_hash: Option<String>) {
        if let Some(prev) = self.last_frame {
            assert!(
                frame > prev,
                "ReplayRecorder::record_frame: frame {frame} is not strictly greater than previous frame {prev}"
            );
        }
        self.last_frame = Some(frame);
        self.frames_recorded += 1;

        if !input.is_empty() {
            self.log.entries.push(ReplayEntry::Input {
                frame,
                input: *input,
            });
        }

        if let Some(hash) = state_hash {
            if self.wants_checkpoint(frame) {
                self.log.entries.push(ReplayEntry::Checkpoint {
                    frame,
                    state_hash: hash,
                });
            }
        }
    }

    /// Cut the recording back to `frame` after a rollback: entries at or
    /// after `frame` are dropped and recording resumes from there.
    ///
    /// Returns `false`, leaving the recording untouched, when `frame` lies
    /// outside the recorded range (before the initial snapshot or past the
    /// next frame to record).
    pub fn rewind_to(&mut self, frame: u64) -> bool {
        let start = self.log.start_frame();
        let next = self.last_frame.map_or(start, |last| last + 1);
        if frame < start || frame > next {
            return false;
        }
        self.log.entries.retain(|entry| entry.frame() < frame);
        self.frames_recorded = frame - start;
        self.last_frame = (frame > start).then(|| frame - 1);
        true
    }

    pub fn frames_recorded(&self) -> u64 {
        self.frames_recorded
    }

    /// Finish recording and return the completed [`ReplayLog`].
    pub fn finish(mut self) -> ReplayLog {
        self.log.total_frames = self.frames_recorded;
        self.log
    }
}

// ---------------------------------------------------------------------------
// replay()
// ---------------------------------------------------------------------------

/// Replay a [`ReplayLog`] on `scheduler`, verifying determinism at each
/// checkpoint.
///
/// The log is validated before the scheduler is touched: duplicate entries
/// or a frame range overflow return an error with the scheduler unmodified.
/// Replay stops at the first divergence.
///
/// # Errors
///
/// Malformed logs, and initial snapshots that fail hash verification.
pub fn replay(scheduler: &mut Scheduler, log: &ReplayLog) -> Result<ReplayResult, anyhow::Error> {
    let mut input_map: BTreeMap<u64, InputFrame> = BTreeMap::new();
    let mut checkpoint_map: BTreeMap<u64, &str> = BTreeMap::new();

    for entry in &log.entries {
        match entry {
            ReplayEntry::Input { frame, input } => {
                if input_map.insert(*frame, *input).is_some() {
                    anyhow::bail!("replay log contains duplicate Input entry at frame {frame}");
                }
            }
            ReplayEntry::Checkpoint { frame, state_hash } => {
                if checkpoint_map.insert(*frame, state_hash).is_some() {
                    anyhow::bail!(
                        "replay log contains duplicate Checkpoint entry at frame {frame}"
                    );
                }
            }
        }
    }

    let start_frame = log.start_frame();
    let total_frames = log.total_frames;
    let end_frame = start_frame.checked_add(total_frames).ok_or_else(|| {
        anyhow::anyhow!(
            "frame range overflow: start_frame ({start_frame}) + total_frames ({total_frames}) exceeds u64::MAX"
        )
    })?;

    scheduler
        .restore_from_snapshot(&log.initial_snapshot)
        .map_err(|e| anyhow::anyhow!("failed to restore initial snapshot for replay: {e}"))?;

    let mut frames_replayed: u64 = 0;
    for frame in start_frame..end_frame {
        if let Some(expected_hash) = checkpoint_map.get(&frame) {
            let actual_hash = scheduler.state().state_hash();
            if actual_hash != *expected_hash {
                tracing::warn!(frame, "replay_diverged");
                return Ok(ReplayResult {
                    completed: false,
                    frames_replayed,
                    first_divergence: Some(ReplayDivergence {
                        frame,
                        expected_hash: (*expected_hash).to_owned(),
                        actual_hash,
                    }),
                });
            }
        }

        let input = input_map.get(&frame).copied().unwrap_or_default();
        scheduler.advance_headless(input);
        frames_replayed += 1;
    }

    tracing::info!(frames_replayed, "replay_completed");
    Ok(ReplayResult {
        completed: true,
        frames_replayed,
        first_divergence: None,
    })
}
