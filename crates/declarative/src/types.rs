//! Core types for task execution

use crate::task::TaskKey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a run mutates infrastructure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Dry run: discover and diff, never mutate
    Plan,
    /// Converge real infrastructure
    Apply,
}

impl Mode {
    pub fn is_dry_run(self) -> bool {
        matches!(self, Self::Plan)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plan => write!(f, "plan"),
            Self::Apply => write!(f, "apply"),
        }
    }
}

/// Execution state of a single task
///
/// `Pending → Resolved → Discovering → Evaluated → Applying → Applied`,
/// with `Skipped` and `Failed` reachable as terminal states. In plan mode a
/// task that evaluated cleanly stays in `Evaluated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskState {
    Pending,
    Resolved,
    Discovering,
    Evaluated,
    Applying,
    Applied,
    Skipped,
    Failed,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Applied | Self::Skipped | Self::Failed)
    }
}

/// Why a task was never discovered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "task", rename_all = "snake_case")]
pub enum SkipReason {
    /// A dependency failed or was itself skipped
    Dependency(TaskKey),
    /// The run was cancelled before the task was dispatched
    Cancelled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dependency(key) => write!(f, "dependency {key} did not converge"),
            Self::Cancelled => write!(f, "run cancelled"),
        }
    }
}

/// User-visible result of one task in one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// Apply mode: render changed real infrastructure
    Applied,
    /// Plan mode: render reported it would change something
    WouldApply,
    /// Nothing to do
    NoOp,
    /// Divergence detected but deliberately not corrected
    Warned,
    /// Never discovered
    Skipped { because: SkipReason },
    /// Discovery, policy or render failed
    Failed { cause: String },
}

impl Outcome {
    /// Whether the task changed (or would change) real state
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Applied | Self::WouldApply)
    }

    /// Whether dependents may proceed past this task
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. } | Self::Skipped { .. })
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Applied => write!(f, "applied"),
            Self::WouldApply => write!(f, "would apply"),
            Self::NoOp => write!(f, "no changes"),
            Self::Warned => write!(f, "warned"),
            Self::Skipped { because } => write!(f, "skipped: {because}"),
            Self::Failed { cause } => write!(f, "failed: {cause}"),
        }
    }
}

/// Options for execution
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Don't make changes, just report what would happen
    pub dry_run: bool,
    /// Number of parallel workers
    pub jobs: usize,
}

impl ExecuteOptions {
    pub fn mode(&self) -> Mode {
        if self.dry_run { Mode::Plan } else { Mode::Apply }
    }

    pub fn plan() -> Self {
        Self {
            dry_run: true,
            ..Self::default()
        }
    }
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            jobs: 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_classification() {
        assert!(Outcome::Applied.is_change());
        assert!(Outcome::WouldApply.is_change());
        assert!(!Outcome::Warned.is_change());
        assert!(Outcome::Warned.is_success());
        assert!(
            !Outcome::Skipped {
                because: SkipReason::Cancelled
            }
            .is_success()
        );
        assert!(!Outcome::Failed { cause: "x".into() }.is_success());
    }

    #[test]
    fn test_terminal_states() {
        assert!(TaskState::Applied.is_terminal());
        assert!(TaskState::Skipped.is_terminal());
        assert!(TaskState::Failed.is_terminal());
        assert!(!TaskState::Evaluated.is_terminal());
        assert!(!TaskState::Pending.is_terminal());
    }

    #[test]
    fn test_options_mode() {
        assert_eq!(ExecuteOptions::default().mode(), Mode::Apply);
        assert_eq!(ExecuteOptions::plan().mode(), Mode::Plan);
        assert!(Mode::Plan.is_dry_run());
    }
}
