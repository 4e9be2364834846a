//! Error types for graph construction and task reconciliation

use crate::task::TaskKey;
use thiserror::Error;

/// Errors raised while assembling the task set into a graph
///
/// All of these abort the run before any task is discovered.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// Two tasks share the same kind and name
    #[error("duplicate task {0}")]
    Duplicate(TaskKey),

    /// A task lists itself among its references
    #[error("task {0} references itself")]
    SelfReference(TaskKey),

    /// A task references a key that is not part of the task set
    #[error("task {task} references unknown task {missing}")]
    Dangling { task: TaskKey, missing: TaskKey },
}

/// The dependency relation contains a cycle
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("dependency cycle between tasks: {}", join_keys(.tasks))]
pub struct DependencyCycleError {
    /// Tasks that lie on (or between) the cycles, in key order
    pub tasks: Vec<TaskKey>,
}

/// Any error that prevents a graph from being built
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Cycle(#[from] DependencyCycleError),
}

/// Failure of a task's `find`
#[derive(Error, Debug)]
pub enum FindError {
    /// The provider refused to read the resource
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Any other discovery failure
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FindError {
    /// Check whether discovery failed because of missing permissions
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::AccessDenied(_))
    }
}

/// Run-level interruption observed at a provider checkpoint
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    #[error("run cancelled")]
    Cancelled,

    #[error("run deadline exceeded")]
    DeadlineExceeded,
}

/// Per-task failure; marks the task `Failed` and skips its dependents
#[derive(Error, Debug)]
pub enum TaskError {
    /// `find` failed and the lifecycle does not tolerate it
    #[error("discovery failed: {0}")]
    Discovery(#[source] FindError),

    /// The lifecycle requires the resource to exist already
    #[error("required resource does not exist")]
    Missing,

    /// The lifecycle requires the resource to match exactly
    #[error("resource diverges from desired state ({0})")]
    Diverged(String),

    /// `render` failed
    #[error("apply failed: {0:#}")]
    Apply(#[source] anyhow::Error),

    /// The run was cancelled or timed out while the task was in flight
    #[error(transparent)]
    Interrupted(#[from] Interrupted),
}

impl TaskError {
    /// Build a discovery error, surfacing interruptions as such
    pub(crate) fn from_find(err: FindError) -> Self {
        if let FindError::Other(inner) = &err
            && let Some(interrupted) = inner.downcast_ref::<Interrupted>()
        {
            return Self::Interrupted(*interrupted);
        }
        Self::Discovery(err)
    }

    /// Build an apply error, surfacing interruptions as such
    pub(crate) fn from_render(err: anyhow::Error) -> Self {
        match err.downcast_ref::<Interrupted>() {
            Some(interrupted) => Self::Interrupted(*interrupted),
            None => Self::Apply(err),
        }
    }
}

/// Failure to start an execution
#[derive(Error, Debug)]
pub enum ExecuteError {
    #[error("failed to create worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

fn join_keys(keys: &[TaskKey]) -> String {
    keys.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
