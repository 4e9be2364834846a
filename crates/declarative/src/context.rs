//! Provider context and progress traits
//!
//! Provider calls never read ambient global state: everything a task needs
//! to reach its cloud (the handle, cancellation, the run deadline) is carried
//! by a [`ProviderContext`] built once per run and passed to every
//! `find`/`render`.

use crate::error::Interrupted;
use crate::report::ChangeReport;
use crate::task::TaskKey;
use crate::types::{Mode, Outcome};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Shared cancellation flag for one run
///
/// Clones observe the same flag, so a handle kept by the caller (e.g. a
/// signal handler) can stop a run that is in progress.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; idempotent
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Context passed to every provider call
#[derive(Debug)]
pub struct ProviderContext<C> {
    cloud: C,
    cancel: Cancellation,
    deadline: Option<Instant>,
}

impl<C> ProviderContext<C> {
    /// Create a context with no deadline and a fresh cancellation flag
    pub fn new(cloud: C) -> Self {
        Self {
            cloud,
            cancel: Cancellation::new(),
            deadline: None,
        }
    }

    /// Share an existing cancellation flag
    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.cancel = cancel;
        self
    }

    /// Bound the whole run by `timeout`, starting now
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// The provider handle
    pub fn cloud(&self) -> &C {
        &self.cloud
    }

    pub fn cancellation(&self) -> &Cancellation {
        &self.cancel
    }

    /// Time left before the deadline, if one was set
    ///
    /// Providers should use this as the timeout for blocking network calls.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Fail fast if the run was cancelled or its deadline passed
    ///
    /// Long-running provider calls should call this between steps and
    /// propagate the error with `?`.
    pub fn checkpoint(&self) -> Result<(), Interrupted> {
        if self.cancel.is_cancelled() {
            return Err(Interrupted::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(Interrupted::DeadlineExceeded),
            _ => Ok(()),
        }
    }
}

/// Progress callback for execution
///
/// All calls are made from the coordinating thread, never from workers.
pub trait ProgressCallback: Send {
    /// Called once before any task is dispatched
    fn on_run_start(&mut self, total: usize, mode: Mode);

    /// Called when a task is handed to a worker
    fn on_task_start(&mut self, key: &TaskKey);

    /// Called when a task reaches its final outcome (including skips)
    fn on_task_complete(&mut self, key: &TaskKey, outcome: &Outcome);

    /// Called once after every task is settled
    fn on_run_complete(&mut self, report: &ChangeReport);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_run_start(&mut self, _total: usize, _mode: Mode) {}
    fn on_task_start(&mut self, _key: &TaskKey) {}
    fn on_task_complete(&mut self, _key: &TaskKey, _outcome: &Outcome) {}
    fn on_run_complete(&mut self, _report: &ChangeReport) {}
}
