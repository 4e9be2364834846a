//! Dependency resolver - builds the task DAG and its topological order

use crate::error::{BuildError, DependencyCycleError, GraphError};
use crate::task::{BoxedTask, TaskKey};
use std::collections::{BTreeSet, HashMap};

/// Immutable dependency graph over the tasks of one run
///
/// Tasks are stored sorted by [`TaskKey`], so a task's index doubles as its
/// tie-break rank.
pub struct TaskGraph<C> {
    tasks: Vec<BoxedTask<C>>,
    keys: Vec<TaskKey>,
    index: HashMap<TaskKey, usize>,
    /// task -> tasks it depends on
    dependencies: Vec<Vec<usize>>,
    /// task -> tasks that depend on it
    dependents: Vec<Vec<usize>>,
    order: Vec<usize>,
}

impl<C> TaskGraph<C> {
    /// Build the graph, validating references and acyclicity
    pub fn build(mut tasks: Vec<BoxedTask<C>>) -> Result<Self, GraphError> {
        tasks.sort_by_key(|t| t.key());
        let keys: Vec<TaskKey> = tasks.iter().map(|t| t.key()).collect();

        let mut index = HashMap::with_capacity(keys.len());
        for (i, key) in keys.iter().enumerate() {
            if index.insert(key.clone(), i).is_some() {
                return Err(BuildError::Duplicate(key.clone()).into());
            }
        }

        let mut dependencies = vec![Vec::new(); tasks.len()];
        let mut dependents = vec![Vec::new(); tasks.len()];
        for (i, task) in tasks.iter().enumerate() {
            for dep in task.dependencies() {
                if dep == &keys[i] {
                    return Err(BuildError::SelfReference(dep.clone()).into());
                }
                let Some(&j) = index.get(dep) else {
                    return Err(BuildError::Dangling {
                        task: keys[i].clone(),
                        missing: dep.clone(),
                    }
                    .into());
                };
                dependencies[i].push(j);
                dependents[j].push(i);
            }
        }

        let order = topological_order(&keys, &dependencies, &dependents)?;
        log::debug!("Resolved {} tasks into dependency order", order.len());

        Ok(Self {
            tasks,
            keys,
            index,
            dependencies,
            dependents,
            order,
        })
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn task(&self, i: usize) -> &BoxedTask<C> {
        &self.tasks[i]
    }

    pub fn key(&self, i: usize) -> &TaskKey {
        &self.keys[i]
    }

    pub fn index_of(&self, key: &TaskKey) -> Option<usize> {
        self.index.get(key).copied()
    }

    /// Indices of the tasks `i` depends on
    pub fn dependencies(&self, i: usize) -> &[usize] {
        &self.dependencies[i]
    }

    /// Indices of the tasks that depend on `i`
    pub fn dependents(&self, i: usize) -> &[usize] {
        &self.dependents[i]
    }

    /// Task indices in deterministic topological order
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Task keys in deterministic topological order
    pub fn keys_in_order(&self) -> impl Iterator<Item = &TaskKey> {
        self.order.iter().map(|&i| &self.keys[i])
    }
}

/// Kahn's algorithm; among ready tasks the lowest index (key) goes first
fn topological_order(
    keys: &[TaskKey],
    dependencies: &[Vec<usize>],
    dependents: &[Vec<usize>],
) -> Result<Vec<usize>, DependencyCycleError> {
    let mut in_degree: Vec<usize> = dependencies.iter().map(Vec::len).collect();
    let mut ready: BTreeSet<usize> = (0..keys.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(keys.len());

    while let Some(i) = ready.pop_first() {
        order.push(i);
        for &d in &dependents[i] {
            in_degree[d] -= 1;
            if in_degree[d] == 0 {
                ready.insert(d);
            }
        }
    }

    if order.len() == keys.len() {
        return Ok(order);
    }

    // Whatever is left sits on a cycle or downstream of one. Peel off the
    // downstream tasks: they have no remaining dependents.
    let mut remaining: BTreeSet<usize> = (0..keys.len()).filter(|&i| in_degree[i] > 0).collect();
    loop {
        let leaves: Vec<usize> = remaining
            .iter()
            .copied()
            .filter(|&i| !dependents[i].iter().any(|d| remaining.contains(d)))
            .collect();
        if leaves.is_empty() {
            break;
        }
        for leaf in leaves {
            remaining.remove(&leaf);
        }
    }

    Err(DependencyCycleError {
        tasks: remaining.into_iter().map(|i| keys[i].clone()).collect(),
    })
}
