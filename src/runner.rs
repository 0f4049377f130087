//! Task runner: background work off the request path.
//!
//! A capability contract rather than a fixed scheduler. The tokio-backed
//! runner moves work onto the blocking pool; the inline runner executes
//! synchronously on submit, which keeps tests deterministic.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A deferrable unit of work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

pub trait TaskRunner: Send + Sync {
    /// Schedule work for execution. The returned handle can cancel work
    /// that has not started yet.
    fn submit(&self, job: Job) -> TaskHandle;
}

/// Handle to submitted work.
#[derive(Clone)]
pub struct TaskHandle {
    cancelled: Arc<AtomicBool>,
}

impl TaskHandle {
    fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation. Work that already ran is unaffected; queued
    /// work observes the flag and becomes a no-op.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Runs jobs on tokio's blocking pool. Requires an ambient runtime.
#[derive(Default)]
pub struct TokioTaskRunner;

impl TokioTaskRunner {
    pub fn new() -> Self {
        Self
    }
}

impl TaskRunner for TokioTaskRunner {
    fn submit(&self, job: Job) -> TaskHandle {
        let handle = TaskHandle::new();
        let flag = handle.cancelled.clone();

        tokio::task::spawn_blocking(move || {
            if !flag.load(Ordering::SeqCst) {
                job();
            }
        });

        handle
    }
}

/// Runs jobs synchronously on the submitting thread.
#[derive(Default)]
pub struct InlineTaskRunner;

impl InlineTaskRunner {
    pub fn new() -> Self {
        Self
    }
}

impl TaskRunner for InlineTaskRunner {
    fn submit(&self, job: Job) -> TaskHandle {
        let handle = TaskHandle::new();
        job();
        handle
    }
}

/// Queues jobs until the caller drains them. Lets tests observe the state
/// between ingest and extraction completion.
#[derive(Default)]
pub struct ManualTaskRunner {
    queue: parking_lot::Mutex<Vec<(TaskHandle, Job)>>,
}

impl ManualTaskRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Run every queued job that has not been cancelled.
    pub fn drain(&self) -> usize {
        let jobs: Vec<_> = self.queue.lock().drain(..).collect();
        let mut ran = 0;
        for (handle, job) in jobs {
            if !handle.is_cancelled() {
                job();
                ran += 1;
            }
        }
        ran
    }
}

impl TaskRunner for ManualTaskRunner {
    fn submit(&self, job: Job) -> TaskHandle {
        let handle = TaskHandle::new();
        self.queue.lock().push((handle.clone(), job));
        handle
    }
}
