//! Rollback snapshots with BLAKE3 hashing.
//!
//! Provides [`SimSnapshot`] -- a serializable copy of the full
//! [`MatchState`] (clock, round, pause flags, roster, score) with a BLAKE3
//! content hash for integrity verification and desync detection.
//!
//! # Usage
//!
//! ```
//! use kumite_sim::prelude::*;
//!
//! let config = MatchConfig::default();
//! let roster = Roster::versus(Fighter::new(Side::P1, 1000), Fighter::new(Side::P2, 1000));
//! let mut state = MatchState::new(roster, &config);
//!
//! let snapshot = state.capture_snapshot();
//! assert_eq!(snapshot.hash.len(), 64); // BLAKE3 hex digest
//!
//! let pause = state.pause;
//! state.clock.add_frame_time(1.0, &pause);
//! assert_ne!(state.state_hash(), snapshot.hash);
//!
//! state.restore_from_snapshot(&snapshot).unwrap();
//! assert_eq!(state.state_hash(), snapshot.hash);
//! ```

use serde::{Deserialize, Serialize};

use crate::state::MatchState;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A snapshot failed verification.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// The stored hash does not match the snapshot contents.
    #[error(
        "snapshot hash mismatch: recorded {recorded} but recomputed {recomputed}. \
         The snapshot may be corrupted or tampered with."
    )]
    HashMismatch {
        recorded: String,
        recomputed: String,
    },
}

// ---------------------------------------------------------------------------
// SimSnapshot
// ---------------------------------------------------------------------------

/// A serializable snapshot of the full simulation state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimSnapshot {
    /// Complete match state at the time of capture.
    pub state: MatchState,
    /// BLAKE3 hex digest (64 lowercase hex chars) of the serialized state.
    pub hash: String,
}

impl SimSnapshot {
    /// Logic tick since match start at the time of capture.
    pub fn match_tick(&self) -> i64 {
        self.state.clock.match_tick()
    }

    /// Recompute the hash and compare it with the stored one.
    pub fn verify(&self) -> Result<(), SnapshotError> {
        let recomputed = compute_hash(&self.state);
        if recomputed != self.hash {
            return Err(SnapshotError::HashMismatch {
                recorded: self.hash.clone(),
                recomputed,
            });
        }
        Ok(())
    }
}

/// Compute the BLAKE3 hex digest of the match state.
///
/// The state is serialized to canonical JSON (struct fields in declaration
/// order, no maps) so the hash is stable across runs and platforms.
fn compute_hash(state: &MatchState) -> String {
    let json_bytes =
        serde_json::to_vec(state).expect("MatchState should always be JSON-serializable");
    blake3::hash(&json_bytes).to_hex().to_string()
}

// ---------------------------------------------------------------------------
// MatchState snapshot/restore methods
// ---------------------------------------------------------------------------

impl MatchState {
    /// Capture a complete snapshot of the simulation state.
    pub fn capture_snapshot(&self) -> SimSnapshot {
        SimSnapshot {
            state: self.clone(),
            hash: compute_hash(self),
        }
    }

    /// Restore the simulation state from a previously captured snapshot.
    ///
    /// The snapshot hash is verified first; on mismatch the state is left
    /// untouched.
    pub fn restore_from_snapshot(&mut self, snapshot: &SimSnapshot) -> Result<(), SnapshotError> {
        snapshot.verify()?;
        *self = snapshot.state.clone();
        tracing::debug!(
            match_tick = self.clock.match_tick(),
            frame = self.frame,
            "state_restored"
        );
        Ok(())
    }

    /// BLAKE3 hex digest of the current state.
    pub fn state_hash(&self) -> String {
        compute_hash(self)
    }
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    fn state() -> MatchState {
        let roster = Roster::versus(Fighter::new(Side::P1, 1000), Fighter::new(Side::P2, 1000));
        MatchState::new(roster, &MatchConfig::default())
    }

    #[test]
    fn identical_states_hash_identically() {
        assert_eq!(state().state_hash(), state().state_hash());
    }

    #[test]
    fn hash_covers_roster() {
        let a = state();
        let mut b = state();
        b.roster.fighters[0].apply_damage(1);
        assert_ne!(a.state_hash(), b.state_hash());
    }

    #[test]
    fn hash_covers_accel() {
        let a = state();
        let mut b = state();
        b.accel = 2.0;
        assert_ne!(a.state_hash(), b.state_hash());

        let mut restored = state();
        restored.restore_from_snapshot(&b.capture_snapshot()).unwrap();
        assert_eq!(restored.accel, 2.0);
    }

    #[test]
    fn tampered_snapshot_is_rejected() {
        let mut live = state();
        let mut snapshot = live.capture_snapshot();
        snapshot.state.round.time = 1;

        let before = live.state_hash();
        let err = live.restore_from_snapshot(&snapshot).unwrap_err();
        assert!(matches!(err, SnapshotError::HashMismatch { .. }));
        assert_eq!(live.state_hash(), before);
    }

    #[test]
    fn snapshot_survives_json_round_trip() {
        let mut live = state();
        let pause = live.pause;
        for _ in 0..7 {
            live.clock.add_frame_time(0.3, &pause);
        }
        let snapshot = live.capture_snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        let parsed: SimSnapshot = serde_json::from_str(&json).unwrap();
        parsed.verify().unwrap();
        assert_eq!(parsed, snapshot);
    }
}
