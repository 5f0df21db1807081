//! Cross-thread task queue drained on the simulation thread.
//!
//! Loader threads cannot touch render-side state directly. They package that
//! work as closures and [`submit`](TaskSender::submit) them; the scheduler
//! calls [`TaskQueue::drain`] exactly once per iteration, before
//! synchronization and before any simulation logic, so everything a loader
//! queued is visible to the tick that follows.
//!
//! The queue is bounded but sized so that producers never block under normal
//! load. A full queue logs a warning and then blocks the producer until the
//! next drain.

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};

/// Work to run on the thread that owns the queue.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// The receiving side was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("task queue closed")]
pub struct QueueClosed;

// ---------------------------------------------------------------------------
// TaskQueue
// ---------------------------------------------------------------------------

/// Bounded multi-producer, single-consumer task queue.
pub struct TaskQueue {
    sender: Sender<Task>,
    receiver: Receiver<Task>,
    capacity: usize,
}

impl TaskQueue {
    /// Create a queue holding at most `capacity` pending tasks.
    pub fn bounded(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity.max(1));
        Self {
            sender,
            receiver,
            capacity: capacity.max(1),
        }
    }

    /// A producer handle for another thread.
    pub fn sender(&self) -> TaskSender {
        TaskSender {
            inner: self.sender.clone(),
        }
    }

    /// Run every pending task, including tasks queued by tasks run during
    /// this drain. Returns how many ran.
    pub fn drain(&self) -> usize {
        let mut ran = 0;
        loop {
            match self.receiver.try_recv() {
                Ok(task) => {
                    task();
                    ran += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        if ran > 0 {
            tracing::trace!(ran, "task_queue_drained");
        }
        ran
    }

    /// Tasks currently waiting.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("pending", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// TaskSender
// ---------------------------------------------------------------------------

/// Cloneable producer handle.
#[derive(Clone)]
pub struct TaskSender {
    inner: Sender<Task>,
}

impl TaskSender {
    /// Queue `task` for the owning thread.
    pub fn submit<F>(&self, task: F) -> Result<(), QueueClosed>
    where
        F: FnOnce() + Send + 'static,
    {
        match self.inner.try_send(Box::new(task)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(task)) => {
                tracing::warn!(
                    capacity = self.inner.capacity().unwrap_or_default(),
                    "task_queue_saturated"
                );
                self.inner.send(task).map_err(|_| QueueClosed)
            }
            Err(TrySendError::Disconnected(_)) => Err(QueueClosed),
        }
    }
}

impl std::fmt::Debug for TaskSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskSender")
            .field("pending", &self.inner.len())
            .finish()
    }
}
