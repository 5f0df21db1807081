//! Kumite Engine -- paced match driver on top of `kumite-sim`.
//!
//! This crate runs a [`kumite_sim`] match against the wall clock: a
//! [`pacer::WallClockPacer`] holds iterations at the target frame rate, a
//! bounded [`task_queue::TaskQueue`] carries work from loader threads to the
//! simulation thread, a [`sync::SyncGate`] confirms each frame's input, and
//! the [`scheduler::Scheduler`] ties them together in a fixed per-iteration
//! order. Replays are recorded and verified with [`replay`].
//!
//! # Quick Start
//!
//! ```
//! use kumite_engine::prelude::*;
//!
//! let roster = Roster::versus(Fighter::new(Side::P1, 1000), Fighter::new(Side::P2, 1000));
//! let mut scheduler = Scheduler::headless(MatchConfig::default(), roster).unwrap();
//!
//! for _ in 0..120 {
//!     assert_eq!(scheduler.advance_headless(InputFrame::default()), IterationOutcome::Continue);
//! }
//! assert_eq!(scheduler.state().clock.match_tick(), 120);
//! assert_eq!(scheduler.phase(), RoundPhase::Fighting);
//! ```

#![deny(unsafe_code)]

pub mod hooks;
pub mod loader;
pub mod pacer;
pub mod replay;
pub mod scheduler;
pub mod sync;
pub mod task_queue;
pub mod telemetry;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

/// Re-export the simulation crate for convenience.
pub use kumite_sim;

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    pub use kumite_sim::prelude::*;

    pub use crate::hooks::{FrameHooks, NoHooks, WorldPhase};
    pub use crate::loader::{LoadContext, LoadError, LoadStatus, Loader};
    pub use crate::pacer::{PaceKind, PacePlan, PacerStats, ShutdownSignal, WallClockPacer};
    pub use crate::replay::{
        replay, ReplayDivergence, ReplayEntry, ReplayLog, ReplayRecorder, ReplayResult,
    };
    pub use crate::scheduler::{
        ExternalRequest, IterationDiagnostics, IterationOutcome, Scheduler,
    };
    pub use crate::sync::{
        ChannelLink, DesyncError, InputFrame, LocalSync, LockstepSync, PeerLink, PeerMessage,
        ReplaySync, SyncGate,
    };
    pub use crate::task_queue::{QueueClosed, Task, TaskQueue, TaskSender};
    pub use crate::telemetry::init_tracing;
}
