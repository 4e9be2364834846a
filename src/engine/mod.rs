//! Execution engine for kforge
//!
//! The engine orchestrates:
//! 1. Planning - Build the task set and node bundles from the cluster document
//! 2. Running - Plan or apply the task graph on the local provider
//! 3. Displaying - Render the change report with field-level diffs

pub mod differ;
pub mod executor;
pub mod planner;

pub use executor::{RunOptions, plan_and_apply, run};
pub use planner::{Model, build};
