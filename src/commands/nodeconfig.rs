//! `nodeconfig` - print the bundle a node of an instance group boots with

use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;

use crate::Context;
use crate::cli::NodeconfigArgs;
use crate::ui;

pub fn run(ctx: &Context, args: &NodeconfigArgs) -> Result<()> {
    let cluster = ctx.load_cluster()?;
    let ig = cluster
        .instance_group(&args.instance_group)
        .with_context(|| format!("No instance group named '{}'", args.instance_group))?;
    let bundle = nodeup::assemble(&cluster, ig)
        .with_context(|| format!("Failed to assemble node config for {}", ig.name))?;

    if args.boot {
        println!("{}", serde_json::to_string_pretty(&bundle.boot)?);
    } else {
        println!("{}", serde_json::to_string_pretty(&bundle.node)?);
    }

    if args.write {
        let dir = ctx.state.write_bundle(&cluster.name, &ig.name, &bundle)?;
        // stdout carries the document
        if !ctx.quiet {
            eprintln!(
                "{} Wrote bundle to {} (node config {}, boot config {})",
                "✓".green(),
                dir.display(),
                ui::format_size(bundle.node_bytes.len() as u64),
                ui::format_size(bundle.boot_bytes.len() as u64)
            );
        }
    }
    Ok(())
}
