//! Input synchronization gates.
//!
//! Once per scheduler iteration, after the task queue is drained and before
//! the clock advances, a [`SyncGate`] turns the local input into the
//! *confirmed* input for that frame. Offline play passes it through
//! ([`LocalSync`]), replay playback substitutes recorded input
//! ([`ReplaySync`]), and netplay exchanges input with a peer
//! ([`LockstepSync`]).
//!
//! A [`DesyncError`] is never retried: the scheduler stops advancing and
//! reports the match as ended.

use std::collections::BTreeMap;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use serde::{Deserialize, Serialize};

use kumite_sim::roster::Side;

use crate::replay::{ReplayEntry, ReplayLog};

// ---------------------------------------------------------------------------
// InputFrame
// ---------------------------------------------------------------------------

/// Button state of both sides for one frame. Bit meaning is left to the
/// game layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InputFrame {
    pub buttons: [u32; 2],
}

impl InputFrame {
    pub fn new(p1: u32, p2: u32) -> Self {
        Self { buttons: [p1, p2] }
    }

    /// Whether any button on either side is held.
    pub fn any_pressed(&self) -> bool {
        self.buttons.iter().any(|&b| b != 0)
    }

    pub fn is_empty(&self) -> bool {
        !self.any_pressed()
    }

    pub fn side(&self, side: Side) -> u32 {
        self.buttons[side.index()]
    }
}

// ---------------------------------------------------------------------------
// DesyncError
// ---------------------------------------------------------------------------

/// Synchronization failed; the match cannot continue.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DesyncError {
    /// Replay data has no entry for the requested frame.
    #[error("no recorded input for frame {frame} (recording covers {start}..{end})")]
    MissingFrame { frame: u64, start: u64, end: u64 },

    /// The peer's confirmed frame drifted past the tolerance.
    #[error("peer confirmed frame {remote} while local is at {local} (tolerance {tolerance})")]
    TickDivergence {
        local: u64,
        remote: u64,
        tolerance: u64,
    },

    /// The peer stopped responding or hung up.
    #[error("peer disconnected")]
    Disconnected,
}

// ---------------------------------------------------------------------------
// SyncGate
// ---------------------------------------------------------------------------

/// Confirms the input for one frame.
///
/// `input` holds the local input on entry and the confirmed input on
/// successful return.
pub trait SyncGate {
    fn synchronize(&mut self, frame: u64, input: &mut InputFrame) -> Result<(), DesyncError>;
}

/// Offline play: local input is authoritative.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalSync;

impl SyncGate for LocalSync {
    fn synchronize(&mut self, _frame: u64, _input: &mut InputFrame) -> Result<(), DesyncError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ReplaySync
// ---------------------------------------------------------------------------

/// Replaces local input with the input recorded in a [`ReplayLog`].
#[derive(Debug, Clone)]
pub struct ReplaySync {
    inputs: BTreeMap<u64, InputFrame>,
    start: u64,
    end: u64,
}

impl ReplaySync {
    pub fn from_log(log: &ReplayLog) -> Self {
        let start = log.start_frame();
        let inputs = log
            .entries
            .iter()
            .filter_map(|entry| match entry {
                ReplayEntry::Input { frame, input } => Some((*frame, *input)),
                ReplayEntry::Checkpoint { .. } => None,
            })
            .collect();
        Self {
            inputs,
            start,
            end: start.saturating_add(log.total_frames),
        }
    }

    /// Whether `frame` is past the recording.
    pub fn is_exhausted(&self, frame: u64) -> bool {
        frame >= self.end
    }
}

impl SyncGate for ReplaySync {
    fn synchronize(&mut self, frame: u64, input: &mut InputFrame) -> Result<(), DesyncError> {
        if frame < self.start || frame >= self.end {
            return Err(DesyncError::MissingFrame {
                frame,
                start: self.start,
                end: self.end,
            });
        }
        // Frames without an entry had no buttons held.
        *input = self.inputs.get(&frame).copied().unwrap_or_default();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Lockstep netplay
// ---------------------------------------------------------------------------

/// One side's contribution to a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerMessage {
    pub frame: u64,
    pub buttons: u32,
}

/// Transport between two lockstep peers.
pub trait PeerLink {
    fn send(&mut self, message: PeerMessage) -> Result<(), DesyncError>;
    fn recv(&mut self) -> Result<PeerMessage, DesyncError>;
}

/// Exchanges local input with a peer every frame.
///
/// Each side sends its own buttons tagged with its frame number and waits
/// for the peer's. Frames further apart than `tolerance` are a desync.
#[derive(Debug)]
pub struct LockstepSync<L: PeerLink> {
    link: L,
    local: Side,
    tolerance: u64,
    confirmed: u64,
}

impl<L: PeerLink> LockstepSync<L> {
    pub fn new(link: L, local: Side, tolerance: u64) -> Self {
        Self {
            link,
            local,
            tolerance,
            confirmed: 0,
        }
    }

    /// Frames confirmed with the peer so far.
    pub fn confirmed(&self) -> u64 {
        self.confirmed
    }
}

impl<L: PeerLink> SyncGate for LockstepSync<L> {
    fn synchronize(&mut self, frame: u64, input: &mut InputFrame) -> Result<(), DesyncError> {
        let local = self.local.index();
        let remote_side = self.local.opponent().index();

        self.link.send(PeerMessage {
            frame,
            buttons: input.buttons[local],
        })?;
        let remote = self.link.recv()?;

        if frame.abs_diff(remote.frame) > self.tolerance {
            return Err(DesyncError::TickDivergence {
                local: frame,
                remote: remote.frame,
                tolerance: self.tolerance,
            });
        }

        input.buttons[remote_side] = remote.buttons;
        self.confirmed += 1;
        Ok(())
    }
}

/// In-process [`PeerLink`] over a pair of bounded channels.
#[derive(Debug)]
pub struct ChannelLink {
    tx: Sender<PeerMessage>,
    rx: Receiver<PeerMessage>,
    timeout: Duration,
}

impl ChannelLink {
    /// Two connected ends. A `recv` that waits longer than `timeout` counts
    /// as a disconnect.
    pub fn pair(timeout: Duration) -> (Self, Self) {
        let (a_tx, b_rx) = bounded(64);
        let (b_tx, a_rx) = bounded(64);
        (
            Self {
                tx: a_tx,
                rx: a_rx,
                timeout,
            },
            Self {
                tx: b_tx,
                rx: b_rx,
                timeout,
            },
        )
    }
}

impl PeerLink for ChannelLink {
    fn send(&mut self, message: PeerMessage) -> Result<(), DesyncError> {
        self.tx.send(message).map_err(|_| DesyncError::Disconnected)
    }

    fn recv(&mut self) -> Result<PeerMessage, DesyncError> {
        match self.rx.recv_timeout(self.timeout) {
            Ok(message) => Ok(message),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                Err(DesyncError::Disconnected)
            }
        }
    }
}
