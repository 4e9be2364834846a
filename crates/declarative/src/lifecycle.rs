//! Lifecycle policy: how a task reacts to missing, present, or unreadable
//! actual state

use crate::context::ProviderContext;
use crate::error::TaskError;
use crate::task::{FieldChange, Resource, Task};
use crate::types::TaskState;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Per-task policy, fixed when the task is built
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lifecycle {
    /// Create or update to match desired state
    #[default]
    Sync,
    /// Must already exist; divergence is reported, never corrected
    ExistsAndWarnIfChanges,
    /// Like `Sync`, but a permission failure on discovery is assumed compliant
    ExistsAndWarnIfInsufficientAccess,
    /// Must already exist and match exactly
    ExistsAndValidates,
    /// Neither discovered nor rendered
    Ignore,
}

impl Lifecycle {
    pub const ALL: [Self; 5] = [
        Self::Sync,
        Self::ExistsAndWarnIfChanges,
        Self::ExistsAndWarnIfInsufficientAccess,
        Self::ExistsAndValidates,
        Self::Ignore,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sync => "Sync",
            Self::ExistsAndWarnIfChanges => "ExistsAndWarnIfChanges",
            Self::ExistsAndWarnIfInsufficientAccess => "ExistsAndWarnIfInsufficientAccess",
            Self::ExistsAndValidates => "ExistsAndValidates",
            Self::Ignore => "Ignore",
        }
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Lifecycle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|l| l.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown lifecycle '{s}'"))
    }
}

/// What discovery found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discovery {
    NotFound,
    Matches,
    Diverges,
    AccessDenied,
    Failed,
}

/// Why a task fails under its policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    Missing,
    Diverged,
    DiscoveryFailed,
}

/// Result of combining a discovery with a lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Create,
    Update,
    NoOp,
    Warn,
    AssumeCompliant,
    Fail(Violation),
}

/// The lifecycle decision table
pub fn decide(lifecycle: Lifecycle, discovery: Discovery) -> Decision {
    use Discovery as D;
    use Lifecycle as L;

    match (lifecycle, discovery) {
        (L::Ignore, _) => Decision::NoOp,
        (_, D::Matches) => Decision::NoOp,

        (L::Sync | L::ExistsAndWarnIfInsufficientAccess, D::NotFound) => Decision::Create,
        (L::ExistsAndWarnIfChanges | L::ExistsAndValidates, D::NotFound) => {
            Decision::Fail(Violation::Missing)
        }

        (L::Sync | L::ExistsAndWarnIfInsufficientAccess, D::Diverges) => Decision::Update,
        (L::ExistsAndWarnIfChanges, D::Diverges) => Decision::Warn,
        (L::ExistsAndValidates, D::Diverges) => Decision::Fail(Violation::Diverged),

        (L::ExistsAndWarnIfInsufficientAccess, D::AccessDenied) => Decision::AssumeCompliant,
        (_, D::AccessDenied | D::Failed) => Decision::Fail(Violation::DiscoveryFailed),
    }
}

/// What the task did (or would do)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Update,
    NoOp,
    Warn,
    AssumeCompliant,
}

/// Successful evaluation of a task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub action: Action,
    /// Whether render changed (or, in a dry run, would change) anything
    pub changed: bool,
    /// Field differences found during discovery
    pub changes: Vec<FieldChange>,
}

impl Evaluation {
    fn unchanged(action: Action, changes: Vec<FieldChange>) -> Self {
        Self {
            action,
            changed: false,
            changes,
        }
    }
}

/// Discover, decide, and render a single task
pub(crate) fn reconcile<R: Resource>(
    task: &Task<R>,
    ctx: &ProviderContext<R::Cloud>,
    dry_run: bool,
    observe: &mut dyn FnMut(TaskState),
) -> Result<Evaluation, TaskError> {
    let lifecycle = task.lifecycle();
    if lifecycle == Lifecycle::Ignore {
        observe(TaskState::Evaluated);
        return Ok(Evaluation::unchanged(Action::NoOp, Vec::new()));
    }

    ctx.checkpoint()?;
    observe(TaskState::Discovering);

    let desired = task.desired();
    let actual = match desired.find(task.name(), ctx) {
        Ok(actual) => actual,
        Err(err) => {
            let discovery = if err.is_access_denied() {
                Discovery::AccessDenied
            } else {
                Discovery::Failed
            };
            observe(TaskState::Evaluated);
            return match decide(lifecycle, discovery) {
                Decision::AssumeCompliant => {
                    log::warn!("{}: {err}; assuming compliant", task.key());
                    Ok(Evaluation::unchanged(Action::AssumeCompliant, Vec::new()))
                }
                _ => Err(TaskError::from_find(err)),
            };
        }
    };

    let changes = actual
        .as_ref()
        .map(|actual| desired.changes(actual))
        .unwrap_or_default();
    let discovery = match &actual {
        None => Discovery::NotFound,
        Some(_) if changes.is_empty() => Discovery::Matches,
        Some(_) => Discovery::Diverges,
    };

    let decision = decide(lifecycle, discovery);
    log::debug!("{}: {discovery:?} under {lifecycle} -> {decision:?}", task.key());
    observe(TaskState::Evaluated);

    let action = match decision {
        Decision::Create => Action::Create,
        Decision::Update => Action::Update,
        Decision::NoOp => return Ok(Evaluation::unchanged(Action::NoOp, changes)),
        Decision::AssumeCompliant => {
            return Ok(Evaluation::unchanged(Action::AssumeCompliant, changes));
        }
        Decision::Warn => {
            log::warn!(
                "{} diverges from desired state and will not be changed: {}",
                task.key(),
                summarize(&changes)
            );
            return Ok(Evaluation::unchanged(Action::Warn, changes));
        }
        Decision::Fail(Violation::Diverged) => {
            return Err(TaskError::Diverged(summarize(&changes)));
        }
        // discovery succeeded, so absence is the only remaining violation
        Decision::Fail(_) => return Err(TaskError::Missing),
    };

    ctx.checkpoint()?;
    if !dry_run {
        observe(TaskState::Applying);
    }
    let changed = desired
        .render(task.name(), actual.as_ref(), ctx, dry_run)
        .map_err(TaskError::from_render)?;

    Ok(Evaluation {
        action,
        changed,
        changes,
    })
}

fn summarize(changes: &[FieldChange]) -> String {
    changes
        .iter()
        .map(|c| c.field.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
