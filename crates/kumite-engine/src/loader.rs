//! Background asset loading with cooperative cancellation.
//!
//! A [`Loader`] runs one job on its own thread and publishes a five-state
//! [`LoadStatus`] through an atomic. Work that must happen on the simulation
//! thread (GPU uploads and the like) is sent through the job's
//! [`TaskSender`]; [`Loader::wait`] drains the queue while it polls, so those
//! tasks run before the match starts.
//!
//! Cancellation is cooperative: [`Loader::cancel`] stores
//! [`LoadStatus::Cancel`] and then blocks on an acknowledgment channel until
//! the loader thread notices and exits. Jobs check
//! [`LoadContext::is_cancelled`] between units of work.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver};

use crate::task_queue::{TaskQueue, TaskSender};

// ---------------------------------------------------------------------------
// LoadStatus
// ---------------------------------------------------------------------------

/// Loader lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LoadStatus {
    NotYet = 0,
    Loading = 1,
    Complete = 2,
    Error = 3,
    Cancel = 4,
}

impl LoadStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => LoadStatus::NotYet,
            1 => LoadStatus::Loading,
            2 => LoadStatus::Complete,
            3 => LoadStatus::Error,
            _ => LoadStatus::Cancel,
        }
    }

    /// Whether the loader thread has stopped changing the status.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            LoadStatus::Complete | LoadStatus::Error | LoadStatus::Cancel
        )
    }
}

#[derive(Debug, Clone, Default)]
struct SharedStatus(Arc<AtomicU8>);

impl SharedStatus {
    fn get(&self) -> LoadStatus {
        LoadStatus::from_u8(self.0.load(Ordering::SeqCst))
    }

    fn set(&self, status: LoadStatus) {
        self.0.store(status as u8, Ordering::SeqCst);
    }

    /// Move from `from` to `to`; fails if another party changed it first.
    fn transition(&self, from: LoadStatus, to: LoadStatus) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

// ---------------------------------------------------------------------------
// LoadError
// ---------------------------------------------------------------------------

/// Match setup could not complete.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("load failed: {0}")]
    Failed(String),

    #[error("load cancelled")]
    Cancelled,

    #[error("loader thread panicked")]
    Panicked,
}

// ---------------------------------------------------------------------------
// LoadContext
// ---------------------------------------------------------------------------

/// Handed to the job running on the loader thread.
#[derive(Debug, Clone)]
pub struct LoadContext {
    status: SharedStatus,
    sender: TaskSender,
}

impl LoadContext {
    /// Whether a cancel was requested. Jobs should return promptly when set.
    pub fn is_cancelled(&self) -> bool {
        self.status.get() == LoadStatus::Cancel
    }

    /// Queue for work that must run on the simulation thread.
    pub fn sender(&self) -> &TaskSender {
        &self.sender
    }
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// A load job running on a background thread, producing a `T`.
pub struct Loader<T> {
    status: SharedStatus,
    ack: Receiver<()>,
    handle: Option<JoinHandle<Result<T, LoadError>>>,
    poll_interval: Duration,
}

impl<T: Send + 'static> Loader<T> {
    /// Start `job` on a new thread.
    pub fn spawn<F>(job: F, sender: TaskSender, poll_interval: Duration) -> Self
    where
        F: FnOnce(&LoadContext) -> anyhow::Result<T> + Send + 'static,
    {
        let status = SharedStatus::default();
        let (ack_tx, ack) = bounded::<()>(1);
        let context = LoadContext {
            status: status.clone(),
            sender,
        };

        let handle = thread::spawn(move || {
            let outcome = run_job(job, &context);
            // The receiver may already be gone if nobody cancels.
            let _ = ack_tx.send(());
            outcome
        });

        Self {
            status,
            ack,
            handle: Some(handle),
            poll_interval,
        }
    }

    pub fn status(&self) -> LoadStatus {
        self.status.get()
    }

    /// Poll until the job finishes, draining `queue` on every poll. Returns
    /// the job's output.
    pub fn wait(mut self, queue: &TaskQueue) -> Result<T, LoadError> {
        loop {
            queue.drain();
            if self.status().is_terminal() {
                break;
            }
            thread::sleep(self.poll_interval);
        }

        let result = self.join();
        queue.drain();
        match &result {
            Ok(_) => tracing::info!("load_complete"),
            Err(error) => tracing::warn!(%error, "load_failed"),
        }
        result
    }

    /// Ask the job to stop and block until the loader thread acknowledges.
    pub fn cancel(mut self) {
        let requested = self.status.transition(LoadStatus::NotYet, LoadStatus::Cancel)
            || self.status.transition(LoadStatus::Loading, LoadStatus::Cancel);
        if requested {
            tracing::info!("load_cancel_requested");
        }
        // Err means the thread already exited and dropped its sender.
        let _ = self.ack.recv();
        let _ = self.join();
        tracing::info!(status = ?self.status(), "load_cancelled");
    }

    fn join(&mut self) -> Result<T, LoadError> {
        match self.handle.take() {
            Some(handle) => handle.join().unwrap_or(Err(LoadError::Panicked)),
            None => Err(LoadError::Cancelled),
        }
    }
}

impl<T> std::fmt::Debug for Loader<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader")
            .field("status", &self.status.get())
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

fn run_job<T, F>(job: F, context: &LoadContext) -> Result<T, LoadError>
where
    F: FnOnce(&LoadContext) -> anyhow::Result<T>,
{
    if !context.status.transition(LoadStatus::NotYet, LoadStatus::Loading) {
        return Err(LoadError::Cancelled);
    }

    match catch_unwind(AssertUnwindSafe(|| job(context))) {
        Ok(Ok(value)) => {
            if context.status.transition(LoadStatus::Loading, LoadStatus::Complete) {
                Ok(value)
            } else {
                Err(LoadError::Cancelled)
            }
        }
        Ok(Err(error)) => {
            if context.status.transition(LoadStatus::Loading, LoadStatus::Error) {
                Err(LoadError::Failed(format!("{error:#}")))
            } else {
                Err(LoadError::Cancelled)
            }
        }
        Err(_) => {
            context.status.set(LoadStatus::Error);
            Err(LoadError::Panicked)
        }
    }
}
