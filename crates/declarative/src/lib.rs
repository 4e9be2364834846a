//! # Declarative
//!
//! A dependency-ordered reconciliation engine for cloud resources.
//!
//! Callers describe desired infrastructure as a set of named tasks. The
//! engine resolves the references between them into a DAG, discovers the
//! actual state of each resource, decides what to do according to the
//! task's lifecycle, and renders changes in dependency order on a bounded
//! worker pool. Every run produces a [`ChangeReport`].
//!
//! ## Core Concepts
//!
//! - **Resource**: a kind of cloud object that can be found and rendered
//! - **Task**: a named, desired resource plus its [`Lifecycle`]
//! - **TaskGraph**: validated dependency graph with a deterministic order
//! - **Executor**: walks the graph in plan (dry-run) or apply mode
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{ExecuteOptions, NoProgress, ProviderContext, Task, TaskGraph, execute};
//!
//! let graph = TaskGraph::build(vec![
//!     Task::new("main", network).boxed(),
//!     Task::new("main-a", subnet).boxed(),
//! ])?;
//! let ctx = ProviderContext::new(cloud);
//! let run = execute(&graph, &ctx, &ExecuteOptions::plan(), &mut NoProgress)?;
//! println!("{}", serde_json::to_string_pretty(&run.report)?);
//! ```
//!
//! ## Provider Traits
//!
//! - [`Resource`]: find and render one kind of object
//! - [`ProgressCallback`]: receives progress updates
//!
//! The engine never talks to a cloud itself; the `Cloud` associated type
//! of each resource is whatever handle the provider needs.

pub mod context;
pub mod error;
pub mod executor;
pub mod graph;
pub mod lifecycle;
pub mod report;
pub mod task;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export main types at crate root
pub use context::{Cancellation, NoProgress, ProgressCallback, ProviderContext};
pub use error::{
    BuildError, DependencyCycleError, ExecuteError, FindError, GraphError, Interrupted, TaskError,
};
pub use executor::{Execution, Trace, Transition, execute};
pub use graph::TaskGraph;
pub use lifecycle::{Action, Decision, Discovery, Evaluation, Lifecycle, Violation, decide};
pub use report::{ChangeReport, ReportEntry, ReportError, ReportSummary, RunOutcome};
pub use task::{AnyTask, BoxedTask, FieldChange, Resource, Task, TaskKey, TaskRef};
pub use types::{ExecuteOptions, Mode, Outcome, SkipReason, TaskState};
