//! Task model for declarative infrastructure
//!
//! A task is one unit of desired state. Concrete resource types only supply
//! a payload implementing [`Resource`]; the generic [`Task`] wrapper adds the
//! name, the lifecycle, and the dependency set derived from the payload's
//! references. The executor works with type-erased [`AnyTask`] objects so a
//! single graph can mix resource kinds.

use crate::context::ProviderContext;
use crate::error::{FindError, TaskError};
use crate::lifecycle::{self, Evaluation, Lifecycle};
use crate::types::TaskState;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::marker::PhantomData;

/// Identity of a task within one run
///
/// Keys order by kind, then name. That order is the deterministic tie-break
/// used when several tasks become ready at once.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskKey {
    pub kind: String,
    pub name: String,
}

impl TaskKey {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}

/// Typed reference from one resource to another task
///
/// References are weak: they only name the target and are used to discover
/// dependency edges. The graph owns every task.
pub struct TaskRef<R> {
    name: String,
    _target: PhantomData<fn() -> R>,
}

impl<R: Resource> TaskRef<R> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            _target: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Key of the referenced task
    pub fn key(&self) -> TaskKey {
        TaskKey::new(R::KIND, &self.name)
    }
}

impl<R> Clone for TaskRef<R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            _target: PhantomData,
        }
    }
}

impl<R> PartialEq for TaskRef<R> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl<R> Eq for TaskRef<R> {}

impl<R> fmt::Debug for TaskRef<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TaskRef").field(&self.name).finish()
    }
}

// Serialized as the bare target name.
impl<R> Serialize for TaskRef<R> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name)
    }
}

impl<'de, R> Deserialize<'de> for TaskRef<R> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self {
            name,
            _target: PhantomData,
        })
    }
}

/// One field that differs between actual and desired state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub from: String,
    pub to: String,
}

impl FieldChange {
    /// Scalar values, shown as they print
    pub fn new(field: impl Into<String>, from: impl fmt::Display, to: impl fmt::Display) -> Self {
        Self {
            field: field.into(),
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Structured values, shown in their multi-line debug form
    pub fn debug(field: impl Into<String>, from: impl fmt::Debug, to: impl fmt::Debug) -> Self {
        Self {
            field: field.into(),
            from: format!("{from:#?}"),
            to: format!("{to:#?}"),
        }
    }
}

/// Payload of a concrete resource kind
///
/// The implementing value *is* the desired state. `find` returns the actual
/// state as another value of the same type so the two can be compared.
///
/// # Contract
///
/// - `find` must not change anything.
/// - `render` must be idempotent: rendering the same actual/desired pair
///   twice, with no outside change in between, changes nothing the second
///   time.
pub trait Resource: Send + Sync + fmt::Debug + Clone + PartialEq + 'static {
    /// Provider handle type shared by every task of a run
    type Cloud: Send + Sync;

    /// Resource type category, e.g. "Network" or "Subnet"
    const KIND: &'static str;

    /// Keys of every task this payload references
    ///
    /// Include references held in collections. Duplicates are fine.
    fn references(&self) -> Vec<TaskKey> {
        Vec::new()
    }

    /// Discover the actual state, or `None` if the resource does not exist
    fn find(&self, name: &str, ctx: &ProviderContext<Self::Cloud>)
    -> Result<Option<Self>, FindError>;

    /// Converge towards `self`, returning whether anything changed
    ///
    /// With `dry_run` set, report whether something *would* change and do
    /// nothing else.
    fn render(
        &self,
        name: &str,
        actual: Option<&Self>,
        ctx: &ProviderContext<Self::Cloud>,
        dry_run: bool,
    ) -> anyhow::Result<bool>;

    /// Field-level differences between `actual` and `self`
    ///
    /// An empty list means the resource matches. The default reports the
    /// whole value as a single change.
    fn changes(&self, actual: &Self) -> Vec<FieldChange> {
        if self == actual {
            Vec::new()
        } else {
            vec![FieldChange::debug("*", actual, self)]
        }
    }
}

/// A named, lifecycle-tagged unit of desired state
#[derive(Debug, Clone)]
pub struct Task<R: Resource> {
    name: String,
    lifecycle: Lifecycle,
    desired: R,
    dependencies: BTreeSet<TaskKey>,
}

impl<R: Resource> Task<R> {
    /// Create a task with the `Sync` lifecycle
    pub fn new(name: impl Into<String>, desired: R) -> Self {
        let dependencies = desired.references().into_iter().collect();
        Self {
            name: name.into(),
            lifecycle: Lifecycle::Sync,
            desired,
            dependencies,
        }
    }

    /// Set the lifecycle while building the task
    pub fn with_lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(&self) -> TaskKey {
        TaskKey::new(R::KIND, &self.name)
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn desired(&self) -> &R {
        &self.desired
    }

    pub fn dependencies(&self) -> &BTreeSet<TaskKey> {
        &self.dependencies
    }

    /// Type-erase for storage in a graph
    pub fn boxed(self) -> BoxedTask<R::Cloud> {
        Box::new(self)
    }
}

/// Object-safe view of a task used by the graph and the executor
pub trait AnyTask<C>: Send + Sync + fmt::Debug {
    fn key(&self) -> TaskKey;

    fn lifecycle(&self) -> Lifecycle;

    fn dependencies(&self) -> &BTreeSet<TaskKey>;

    /// Human-readable description for reports
    fn description(&self) -> String;

    /// Discover, decide per lifecycle, and render if needed
    ///
    /// `observe` is told about each state the task passes through.
    fn reconcile(
        &self,
        ctx: &ProviderContext<C>,
        dry_run: bool,
        observe: &mut dyn FnMut(TaskState),
    ) -> Result<Evaluation, TaskError>;
}

impl<R: Resource> AnyTask<R::Cloud> for Task<R> {
    fn key(&self) -> TaskKey {
        Task::key(self)
    }

    fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    fn dependencies(&self) -> &BTreeSet<TaskKey> {
        &self.dependencies
    }

    fn description(&self) -> String {
        format!("{} {}", R::KIND, self.name)
    }

    fn reconcile(
        &self,
        ctx: &ProviderContext<R::Cloud>,
        dry_run: bool,
        observe: &mut dyn FnMut(TaskState),
    ) -> Result<Evaluation, TaskError> {
        lifecycle::reconcile(self, ctx, dry_run, observe)
    }
}

/// A boxed task for type-erased storage
pub type BoxedTask<C> = Box<dyn AnyTask<C>>;
