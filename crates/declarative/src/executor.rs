//! Execution engine - walks the task graph with a bounded worker pool
//!
//! The calling thread coordinates: it hands every task whose dependencies
//! have settled successfully to a rayon pool, waits for completions on a
//! channel, and releases (or skips) dependents. Workers write their own
//! report entries; the coordinator only writes entries for skipped tasks.

use crate::context::{ProgressCallback, ProviderContext};
use crate::error::ExecuteError;
use crate::graph::TaskGraph;
use crate::lifecycle::Action;
use crate::report::{ChangeReport, ReportEntry};
use crate::task::TaskKey;
use crate::types::{ExecuteOptions, Mode, Outcome, SkipReason, TaskState};
use std::collections::{BTreeSet, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError, mpsc};

/// One recorded state change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Run-wide sequence number; later transitions have larger numbers
    pub seq: u64,
    pub state: TaskState,
}

/// State history of every task in a run
#[derive(Debug)]
pub struct Trace {
    seq: AtomicU64,
    tasks: Vec<Mutex<Vec<Transition>>>,
}

impl Trace {
    fn new(len: usize) -> Self {
        Self {
            seq: AtomicU64::new(0),
            tasks: (0..len).map(|_| Mutex::new(Vec::new())).collect(),
        }
    }

    fn record(&self, i: usize, state: TaskState) {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        log::trace!("task #{i} -> {state:?}");
        self.tasks[i]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Transition { seq, state });
    }

    /// Transitions of task `i`, oldest first
    pub fn transitions(&self, i: usize) -> Vec<Transition> {
        self.tasks[i]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Latest state of task `i`
    pub fn state(&self, i: usize) -> TaskState {
        self.transitions(i)
            .last()
            .map_or(TaskState::Pending, |t| t.state)
    }
}

/// Result of one run
#[derive(Debug)]
pub struct Execution {
    pub report: ChangeReport,
    pub trace: Trace,
    keys: Vec<TaskKey>,
}

impl Execution {
    fn position(&self, key: &TaskKey) -> Option<usize> {
        self.keys.iter().position(|k| k == key)
    }

    /// Final state of a task
    pub fn state(&self, key: &TaskKey) -> Option<TaskState> {
        self.position(key).map(|i| self.trace.state(i))
    }

    /// Full transition history of a task
    pub fn transitions(&self, key: &TaskKey) -> Vec<Transition> {
        self.position(key)
            .map(|i| self.trace.transitions(i))
            .unwrap_or_default()
    }
}

/// Run every task in the graph
///
/// Graph errors cannot occur here: they were caught when the graph was
/// built. Task errors are contained in the report; the only error returned
/// is a failure to start the worker pool.
pub fn execute<C, P>(
    graph: &TaskGraph<C>,
    ctx: &ProviderContext<C>,
    opts: &ExecuteOptions,
    progress: &mut P,
) -> Result<Execution, ExecuteError>
where
    C: Sync,
    P: ProgressCallback,
{
    let mode = opts.mode();
    let report = ChangeReport::new(mode, graph.keys_in_order().cloned().collect());
    let trace = Trace::new(graph.len());

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.jobs.max(1))
        .build()?;

    log::info!("Starting {mode} of {} tasks with {} workers", graph.len(), opts.jobs.max(1));
    progress.on_run_start(graph.len(), mode);

    {
        let report = &report;
        let trace = &trace;
        let mut coordinator = Coordinator::new(graph, report, trace, progress);
        let (tx, rx) = mpsc::channel::<(usize, Outcome)>();

        pool.in_place_scope(|scope| {
            let mut in_flight = 0usize;
            loop {
                while let Some(i) = coordinator.ready.pop_first() {
                    if ctx.checkpoint().is_err() {
                        coordinator.skip(i, SkipReason::Cancelled);
                        continue;
                    }
                    coordinator.progress.on_task_start(graph.key(i));
                    in_flight += 1;
                    let tx = tx.clone();
                    scope.spawn(move |_| {
                        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                            run_task(graph, i, ctx, mode, report, trace)
                        }))
                        .unwrap_or_else(|_| {
                            settle(graph, i, report, trace, Outcome::Failed {
                                cause: "task panicked".to_string(),
                            }, Vec::new(), TaskState::Failed)
                        });
                        if let Err(e) = tx.send((i, outcome)) {
                            log::debug!("Coordinator gone before task {i} reported: {e}");
                        }
                    });
                }

                if in_flight == 0 {
                    break;
                }
                let Ok((i, outcome)) = rx.recv() else {
                    break;
                };
                in_flight -= 1;
                coordinator.complete(i, &outcome);
            }
        });

        coordinator.skip_unsettled();
        coordinator.progress.on_run_complete(report);
    }

    let summary = report.summary();
    log::info!(
        "Finished {mode}: {} changed, {} unchanged, {} warned, {} skipped, {} failed",
        summary.total_changes(),
        summary.no_op,
        summary.warned,
        summary.skipped,
        summary.failed
    );

    Ok(Execution {
        report,
        trace,
        keys: (0..graph.len()).map(|i| graph.key(i).clone()).collect(),
    })
}

/// Bookkeeping owned by the coordinating thread
struct Coordinator<'a, C, P> {
    graph: &'a TaskGraph<C>,
    report: &'a ChangeReport,
    trace: &'a Trace,
    progress: &'a mut P,
    /// dependencies not yet settled successfully, per task
    waiting_on: Vec<usize>,
    settled: Vec<bool>,
    ready: BTreeSet<usize>,
}

impl<'a, C, P: ProgressCallback> Coordinator<'a, C, P> {
    fn new(
        graph: &'a TaskGraph<C>,
        report: &'a ChangeReport,
        trace: &'a Trace,
        progress: &'a mut P,
    ) -> Self {
        let waiting_on: Vec<usize> = (0..graph.len())
            .map(|i| graph.dependencies(i).len())
            .collect();
        let mut ready = BTreeSet::new();
        for &i in graph.order() {
            trace.record(i, TaskState::Pending);
            if waiting_on[i] == 0 {
                trace.record(i, TaskState::Resolved);
                ready.insert(i);
            }
        }
        Self {
            graph,
            report,
            trace,
            progress,
            waiting_on,
            settled: vec![false; graph.len()],
            ready,
        }
    }

    fn complete(&mut self, i: usize, outcome: &Outcome) {
        self.settled[i] = true;
        self.progress.on_task_complete(self.graph.key(i), outcome);

        if !outcome.is_success() {
            self.skip_dependents_of(i);
            return;
        }
        for &d in self.graph.dependents(i) {
            self.waiting_on[d] -= 1;
            if self.waiting_on[d] == 0 && !self.settled[d] {
                self.trace.record(d, TaskState::Resolved);
                self.ready.insert(d);
            }
        }
    }

    /// Skip everything downstream of a task that did not converge
    fn skip_dependents_of(&mut self, root: usize) {
        let mut queue = VecDeque::from([root]);
        while let Some(cause) = queue.pop_front() {
            for &d in self.graph.dependents(cause) {
                if self.settled[d] {
                    continue;
                }
                let because = SkipReason::Dependency(self.graph.key(cause).clone());
                self.skip(d, because);
                queue.push_back(d);
            }
        }
    }

    fn skip(&mut self, i: usize, because: SkipReason) {
        self.settled[i] = true;
        self.ready.remove(&i);
        log::warn!("Skipping {}: {because}", self.graph.key(i));
        let outcome = settle(
            self.graph,
            i,
            self.report,
            self.trace,
            Outcome::Skipped { because },
            Vec::new(),
            TaskState::Skipped,
        );
        self.progress.on_task_complete(self.graph.key(i), &outcome);
    }

    /// Anything never dispatched is skipped; only happens on cancellation
    fn skip_unsettled(&mut self) {
        let unsettled: Vec<usize> = self
            .graph
            .order()
            .iter()
            .copied()
            .filter(|&i| !self.settled[i])
            .collect();
        for i in unsettled {
            self.skip(i, SkipReason::Cancelled);
        }
    }
}

/// Reconcile one task on a worker thread
fn run_task<C>(
    graph: &TaskGraph<C>,
    i: usize,
    ctx: &ProviderContext<C>,
    mode: Mode,
    report: &ChangeReport,
    trace: &Trace,
) -> Outcome {
    let task = graph.task(i);
    let key = graph.key(i);

    match task.reconcile(ctx, mode.is_dry_run(), &mut |state| trace.record(i, state)) {
        Ok(evaluation) => {
            let outcome = match (evaluation.action, evaluation.changed, mode) {
                (Action::Warn, _, _) => Outcome::Warned,
                (_, true, Mode::Apply) => Outcome::Applied,
                (_, true, Mode::Plan) => Outcome::WouldApply,
                (_, false, _) => Outcome::NoOp,
            };
            let state = match mode {
                Mode::Apply => TaskState::Applied,
                Mode::Plan => TaskState::Evaluated,
            };
            log::info!("{key}: {outcome}");
            settle(graph, i, report, trace, outcome, evaluation.changes, state)
        }
        Err(err) => {
            log::error!("{key}: {err}");
            settle(
                graph,
                i,
                report,
                trace,
                Outcome::Failed {
                    cause: err.to_string(),
                },
                Vec::new(),
                TaskState::Failed,
            )
        }
    }
}

/// Record a task's final state and its report entry
fn settle<C>(
    graph: &TaskGraph<C>,
    i: usize,
    report: &ChangeReport,
    trace: &Trace,
    outcome: Outcome,
    changes: Vec<crate::task::FieldChange>,
    state: TaskState,
) -> Outcome {
    if state.is_terminal() {
        trace.record(i, state);
    }
    let entry = ReportEntry {
        key: graph.key(i).clone(),
        description: graph.task(i).description(),
        outcome: outcome.clone(),
        changes,
        state,
    };
    if let Err(err) = report.record(entry) {
        log::error!("{err}");
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Cancellation, NoProgress};
    use crate::lifecycle::Lifecycle;
    use crate::report::RunOutcome;
    use crate::testing::{FakeCloud, Dummy};

    fn key(name: &str) -> TaskKey {
        TaskKey::new("Dummy", name)
    }

    fn chain() -> TaskGraph<FakeCloud> {
        TaskGraph::build(vec![
            Dummy::task("network", &[]),
            Dummy::task("subnet", &["network"]),
            Dummy::task("instance", &["subnet"]),
        ])
        .unwrap()
    }

    fn run(graph: &TaskGraph<FakeCloud>, ctx: &ProviderContext<FakeCloud>, opts: ExecuteOptions) -> Execution {
        execute(graph, ctx, &opts, &mut NoProgress).unwrap()
    }

    fn first_seq(exec: &Execution, name: &str, state: TaskState) -> u64 {
        exec.transitions(&key(name))
            .into_iter()
            .find(|t| t.state == state)
            .map(|t| t.seq)
            .unwrap()
    }

    #[test]
    fn test_plan_reports_would_create_without_mutating() {
        let graph = chain();
        let ctx = ProviderContext::new(FakeCloud::default());
        let exec = run(&graph, &ctx, ExecuteOptions::plan());

        let outcomes: Vec<_> = exec.report.entries().map(|e| (e.key.name.clone(), e.outcome.clone())).collect();
        assert_eq!(
            outcomes,
            vec![
                ("network".to_string(), Outcome::WouldApply),
                ("subnet".to_string(), Outcome::WouldApply),
                ("instance".to_string(), Outcome::WouldApply),
            ]
        );
        assert_eq!(exec.report.outcome(), RunOutcome::ChangesPending);
        assert!(ctx.cloud().existing.lock().unwrap().is_empty());
        assert_eq!(exec.state(&key("instance")), Some(TaskState::Evaluated));
    }

    #[test]
    fn test_apply_then_reapply_is_idempotent() {
        let graph = chain();
        let ctx = ProviderContext::new(FakeCloud::default());

        let first = run(&graph, &ctx, ExecuteOptions::default());
        assert_eq!(first.report.summary().applied, 3);
        assert_eq!(first.report.outcome(), RunOutcome::Converged);
        for name in ["network", "subnet", "instance"] {
            assert_eq!(first.state(&key(name)), Some(TaskState::Applied));
        }
        let renders: Vec<_> = ctx
            .cloud()
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("render:"))
            .collect();
        assert_eq!(renders, vec!["render:network", "render:subnet", "render:instance"]);

        let second = run(&graph, &ctx, ExecuteOptions::default());
        assert_eq!(second.report.summary().total_changes(), 0);
        assert_eq!(second.report.summary().no_op, 3);
    }

    #[test]
    fn test_dependencies_settle_before_discovery() {
        let graph = TaskGraph::build(vec![
            Dummy::task("a", &[]),
            Dummy::task("b", &[]),
            Dummy::task("c", &["a", "b"]),
            Dummy::task("d", &["c"]),
            Dummy::task("e", &["a"]),
        ])
        .unwrap();
        let ctx = ProviderContext::new(FakeCloud::default());
        let exec = run(&graph, &ctx, ExecuteOptions { dry_run: false, jobs: 8 });

        for (task, dep) in [("c", "a"), ("c", "b"), ("d", "c"), ("e", "a")] {
            assert!(
                first_seq(&exec, dep, TaskState::Applied) < first_seq(&exec, task, TaskState::Discovering),
                "{dep} must be applied before {task} is discovered"
            );
        }
    }

    #[test]
    fn test_failure_skips_dependents_transitively() {
        let graph = TaskGraph::build(vec![
            Dummy::task("network", &[]),
            Dummy::task("subnet", &["network"]),
            Dummy::task("instance", &["subnet"]),
            Dummy::task("lb", &["instance"]),
            Dummy::task("dns", &[]),
        ])
        .unwrap();
        let cloud = FakeCloud {
            fail_render: ["subnet".to_string()].into(),
            ..FakeCloud::default()
        };
        let ctx = ProviderContext::new(cloud);
        let exec = run(&graph, &ctx, ExecuteOptions::default());

        assert_eq!(exec.state(&key("subnet")), Some(TaskState::Failed));
        assert_eq!(exec.state(&key("instance")), Some(TaskState::Skipped));
        assert_eq!(exec.state(&key("lb")), Some(TaskState::Skipped));
        assert_eq!(exec.state(&key("network")), Some(TaskState::Applied));
        assert_eq!(exec.state(&key("dns")), Some(TaskState::Applied));
        assert_eq!(exec.report.outcome(), RunOutcome::Error);

        let instance = exec.report.get(&key("instance")).unwrap();
        assert_eq!(
            instance.outcome,
            Outcome::Skipped {
                because: SkipReason::Dependency(key("subnet"))
            }
        );
        let lb = exec.report.get(&key("lb")).unwrap();
        assert_eq!(
            lb.outcome,
            Outcome::Skipped {
                because: SkipReason::Dependency(key("instance"))
            }
        );
        assert!(exec.report.get(&key("subnet")).unwrap().error().unwrap().contains("provider rejected subnet"));

        // skipped tasks are never discovered
        assert!(!ctx.cloud().calls().iter().any(|c| c == "find:instance" || c == "find:lb"));
        assert!(!exec.transitions(&key("instance")).iter().any(|t| t.state == TaskState::Discovering));
    }

    #[test]
    fn test_warn_lifecycle_does_not_render() {
        let graph = TaskGraph::build(vec![
            Dummy::valued("shared", &[], 7)
                .with_lifecycle(Lifecycle::ExistsAndWarnIfChanges)
                .boxed(),
            Dummy::task("subnet", &["shared"]),
        ])
        .unwrap();
        let ctx = ProviderContext::new(FakeCloud::with_existing(&[("shared", 3)]));
        let exec = run(&graph, &ctx, ExecuteOptions::default());

        let shared = exec.report.get(&TaskKey::new("Dummy", "shared")).unwrap();
        assert_eq!(shared.outcome, Outcome::Warned);
        assert_eq!(shared.changes.len(), 1);
        assert_eq!(exec.report.get(&key("subnet")).unwrap().outcome, Outcome::Applied);
        assert_eq!(ctx.cloud().existing.lock().unwrap()["shared"], 3);
    }

    #[test]
    fn test_missing_required_resource_fails() {
        let graph = TaskGraph::build(vec![
            Dummy::valued("shared", &[], 1)
                .with_lifecycle(Lifecycle::ExistsAndWarnIfChanges)
                .boxed(),
            Dummy::task("subnet", &["shared"]),
        ])
        .unwrap();
        let ctx = ProviderContext::new(FakeCloud::default());
        let exec = run(&graph, &ctx, ExecuteOptions::plan());

        assert!(matches!(
            exec.report.get(&key("shared")).unwrap().outcome,
            Outcome::Failed { .. }
        ));
        assert_eq!(exec.state(&key("subnet")), Some(TaskState::Skipped));
    }

    #[test]
    fn test_access_denied_tolerated_only_when_allowed() {
        let cloud = || FakeCloud {
            deny_find: ["locked".to_string()].into(),
            ..FakeCloud::default()
        };

        let tolerant = TaskGraph::build(vec![
            Dummy::valued("locked", &[], 1)
                .with_lifecycle(Lifecycle::ExistsAndWarnIfInsufficientAccess)
                .boxed(),
        ])
        .unwrap();
        let ctx = ProviderContext::new(cloud());
        let exec = run(&tolerant, &ctx, ExecuteOptions::default());
        assert_eq!(exec.report.get(&key("locked")).unwrap().outcome, Outcome::NoOp);
        assert_eq!(exec.report.outcome(), RunOutcome::Converged);

        let strict = TaskGraph::build(vec![Dummy::task("locked", &[])]).unwrap();
        let ctx = ProviderContext::new(cloud());
        let exec = run(&strict, &ctx, ExecuteOptions::default());
        let entry = exec.report.get(&key("locked")).unwrap();
        assert!(entry.error().unwrap().contains("access denied"));
    }

    #[test]
    fn test_other_discovery_errors_are_fatal_even_when_tolerant() {
        let graph = TaskGraph::build(vec![
            Dummy::valued("flaky", &[], 1)
                .with_lifecycle(Lifecycle::ExistsAndWarnIfInsufficientAccess)
                .boxed(),
        ])
        .unwrap();
        let ctx = ProviderContext::new(FakeCloud {
            fail_find: ["flaky".to_string()].into(),
            ..FakeCloud::default()
        });
        let exec = run(&graph, &ctx, ExecuteOptions::default());
        assert_eq!(exec.state(&key("flaky")), Some(TaskState::Failed));
    }

    #[test]
    fn test_ignore_lifecycle_skips_provider_calls() {
        let graph = TaskGraph::build(vec![
            Dummy::valued("legacy", &[], 1)
                .with_lifecycle(Lifecycle::Ignore)
                .boxed(),
        ])
        .unwrap();
        let ctx = ProviderContext::new(FakeCloud::default());
        let exec = run(&graph, &ctx, ExecuteOptions::default());
        assert_eq!(exec.report.get(&key("legacy")).unwrap().outcome, Outcome::NoOp);
        assert!(ctx.cloud().calls().is_empty());
    }

    #[test]
    fn test_update_of_diverged_resource() {
        let graph = TaskGraph::build(vec![Dummy::valued("network", &[], 2).boxed()]).unwrap();
        let ctx = ProviderContext::new(FakeCloud::with_existing(&[("network", 1)]));

        let plan = run(&graph, &ctx, ExecuteOptions::plan());
        let entry = plan.report.get(&key("network")).unwrap();
        assert_eq!(entry.outcome, Outcome::WouldApply);
        assert_eq!(entry.changes.len(), 1);

        let apply = run(&graph, &ctx, ExecuteOptions::default());
        assert_eq!(apply.report.get(&key("network")).unwrap().outcome, Outcome::Applied);
        assert_eq!(ctx.cloud().existing.lock().unwrap()["network"], 2);
    }

    #[test]
    fn test_cancelled_run_dispatches_nothing() {
        let cancel = Cancellation::new();
        cancel.cancel();
        let graph = chain();
        let ctx = ProviderContext::new(FakeCloud::default()).with_cancellation(cancel);
        let exec = run(&graph, &ctx, ExecuteOptions::default());

        assert_eq!(exec.report.summary().skipped, 3);
        assert!(ctx.cloud().calls().is_empty());
        assert_eq!(
            exec.report.get(&key("network")).unwrap().outcome,
            Outcome::Skipped {
                because: SkipReason::Cancelled
            }
        );
        assert_eq!(exec.report.outcome(), RunOutcome::Error);
    }

    #[test]
    fn test_every_task_reported_once_under_parallelism() {
        let mut tasks = vec![Dummy::task("root", &[])];
        let names: Vec<String> = (0..32).map(|i| format!("leaf{i:02}")).collect();
        for name in &names {
            tasks.push(Dummy::task(name, &["root"]));
        }
        let graph = TaskGraph::build(tasks).unwrap();
        let ctx = ProviderContext::new(FakeCloud::default());
        let exec = run(&graph, &ctx, ExecuteOptions { dry_run: false, jobs: 6 });

        assert!(exec.report.missing().is_empty());
        assert_eq!(exec.report.summary().applied, 33);
    }

    #[test]
    fn test_empty_graph() {
        let graph: TaskGraph<FakeCloud> = TaskGraph::build(Vec::new()).unwrap();
        let ctx = ProviderContext::new(FakeCloud::default());
        let exec = run(&graph, &ctx, ExecuteOptions::default());
        assert_eq!(exec.report.summary().total(), 0);
        assert_eq!(exec.report.outcome(), RunOutcome::Converged);
    }
}
