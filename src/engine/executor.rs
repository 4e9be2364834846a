//! Run driver - plan or apply a task graph with UI integration

use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;
use declarative::{
    ExecuteOptions, Execution, Mode, ProviderContext, ReportSummary, RunOutcome, TaskGraph,
};

use crate::cloud::LocalCloud;
use crate::progress::TaskProgress;

use super::differ::display_report;

/// Options for one plan or apply run
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Number of parallel workers
    pub jobs: usize,
    /// Skip confirmation prompts
    pub yes: bool,
    /// List unchanged tasks too
    pub verbose: bool,
    /// No progress bar
    pub quiet: bool,
    /// Print the report as JSON
    pub json: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            jobs: 4,
            yes: false,
            verbose: false,
            quiet: false,
            json: false,
        }
    }
}

/// Execute the graph once in `mode` and display the report
pub fn run(
    graph: &TaskGraph<LocalCloud>,
    ctx: &ProviderContext<LocalCloud>,
    mode: Mode,
    opts: &RunOptions,
) -> Result<Execution> {
    let exec_opts = ExecuteOptions {
        dry_run: mode.is_dry_run(),
        jobs: opts.jobs,
    };
    let mut progress = TaskProgress::new(opts.quiet || opts.json);
    let execution = declarative::execute(graph, ctx, &exec_opts, &mut progress)
        .with_context(|| format!("Failed to start {mode}"))?;

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&execution.report)?);
    } else {
        display_report(&execution.report, opts.verbose);
        if ctx.cancellation().is_cancelled() {
            println!();
            println!("  {} Interrupted, tasks not yet started were skipped", "⚠".yellow());
        }
    }
    Ok(execution)
}

/// Plan, confirm, then apply
///
/// `before_apply` runs once the user agreed and before anything is mutated.
pub fn plan_and_apply(
    graph: &TaskGraph<LocalCloud>,
    ctx: &ProviderContext<LocalCloud>,
    opts: &RunOptions,
    before_apply: impl FnOnce() -> Result<()>,
) -> Result<(RunOutcome, ReportSummary)> {
    let plan = run(graph, ctx, Mode::Plan, opts)?;
    match plan.report.outcome() {
        RunOutcome::Error => {
            println!();
            println!("  {} Plan failed, nothing applied", "✗".red());
            return Ok((RunOutcome::Error, plan.report.summary()));
        }
        RunOutcome::Converged => {
            before_apply()?;
            println!();
            println!("  {} Infrastructure is up to date", "✓".green());
            return Ok((RunOutcome::Converged, plan.report.summary()));
        }
        RunOutcome::ChangesPending => {}
    }

    if (!opts.yes && !confirm_proceed()?) || ctx.cancellation().is_cancelled() {
        println!();
        println!("  {} Aborted", "✗".red());
        return Ok((RunOutcome::ChangesPending, plan.report.summary()));
    }

    before_apply()?;
    let applied = run(graph, ctx, Mode::Apply, opts)?;
    let summary = applied.report.summary();
    print_summary(&summary);
    Ok((applied.report.outcome(), summary))
}

/// Confirm with user
fn confirm_proceed() -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt("Apply these changes?")
        .default(false)
        .interact()?;

    Ok(confirmed)
}

/// Print final summary
fn print_summary(summary: &ReportSummary) {
    println!();
    if summary.is_success() {
        println!("  {} Changes applied successfully!", "✓".green().bold());
    } else {
        println!("  {} Changes applied with errors", "⚠".yellow().bold());
    }

    if summary.applied > 0 {
        println!("    • {} resources changed", summary.applied);
    }
    if summary.warned > 0 {
        println!("    • {} resources differ but were left alone", summary.warned);
    }
    if summary.skipped > 0 {
        println!("    • {} resources skipped", summary.skipped);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "resources".red());
    }
}
