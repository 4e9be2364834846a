//! `plan` and `apply` - reconcile the local provider with the cluster document

use anyhow::{Context as AnyhowContext, Result};
use clusterspec::Cluster;
use declarative::{Mode, ProviderContext, RunOutcome, TaskGraph};
use std::time::Duration;

use crate::Context;
use crate::cli::{ApplyArgs, PlanArgs, RunArgs};
use crate::cloud::LocalCloud;
use crate::engine::{self, RunOptions};
use crate::ui;

fn provider_context(ctx: &Context, cluster: &Cluster, args: &RunArgs) -> ProviderContext<LocalCloud> {
    let cloud = ctx.cloud(cluster);
    log::debug!("Local provider root: {}", cloud.root().display());
    let pctx = ProviderContext::new(cloud).with_cancellation(ctx.cancel.clone());
    match args.timeout {
        Some(secs) => pctx.with_timeout(Duration::from_secs(secs)),
        None => pctx,
    }
}

fn run_options(ctx: &Context, args: &RunArgs) -> RunOptions {
    RunOptions {
        jobs: args.jobs.unwrap_or(ctx.settings.jobs).max(1),
        verbose: ctx.verbose > 0,
        quiet: ctx.quiet,
        ..RunOptions::default()
    }
}

fn build_graph(ctx: &Context, cluster: &Cluster) -> Result<(TaskGraph<LocalCloud>, engine::Model)> {
    let mut model = engine::build(cluster, &ctx.settings)?;
    let tasks = std::mem::take(&mut model.tasks);
    let graph = TaskGraph::build(tasks).context("Invalid task graph")?;
    Ok((graph, model))
}

/// Show what apply would change
pub fn plan(ctx: &Context, args: &PlanArgs) -> Result<RunOutcome> {
    let cluster = ctx.load_cluster()?;
    let (graph, _) = build_graph(ctx, &cluster)?;
    let pctx = provider_context(ctx, &cluster, &args.run);
    let opts = RunOptions {
        json: args.json,
        ..run_options(ctx, &args.run)
    };

    let execution = engine::run(&graph, &pctx, Mode::Plan, &opts)?;
    let outcome = execution.report.outcome();
    if !args.json && outcome == RunOutcome::ChangesPending {
        println!();
        ui::info("Run 'kforge apply' to make these changes");
    }
    Ok(outcome)
}

/// Converge the local provider to the cluster document
pub fn apply(ctx: &Context, args: &ApplyArgs) -> Result<RunOutcome> {
    let cluster = ctx.load_cluster()?;
    let (graph, model) = build_graph(ctx, &cluster)?;
    let pctx = provider_context(ctx, &cluster, &args.run);
    let opts = RunOptions {
        yes: args.yes,
        ..run_options(ctx, &args.run)
    };

    let (outcome, summary) = engine::plan_and_apply(&graph, &pctx, &opts, || {
        // nodes must find their config before their group exists
        for (ig, bundle) in &model.bundles {
            let dir = ctx.state.write_bundle(&cluster.name, ig, bundle)?;
            log::info!("Wrote node config for {ig} to {}", dir.display());
        }
        Ok(())
    })?;

    if outcome != RunOutcome::ChangesPending {
        ctx.state.record_apply(&cluster, outcome, summary)?;
    }
    Ok(outcome)
}
