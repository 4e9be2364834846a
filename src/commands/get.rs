//! `get` - inspect cluster resources

use anyhow::Result;
use clusterspec::{Cluster, InstanceGroup};
use colored::Colorize;
use declarative::{FindError, Resource};
use serde::Serialize;

use crate::Context;
use crate::cli::OutputFormat;
use crate::cloud::LocalCloud;
use crate::resource::AutoscalingGroup;
use crate::ui;

/// How an instance group's machines relate to the current document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupStatus {
    /// Group exists and boots the current node config
    Ready,
    /// Group exists but its node config or sizing is stale
    NeedsUpdate,
    /// Group has not been created
    Missing,
}

#[derive(Debug, Serialize)]
struct Row<'a> {
    name: &'a str,
    role: &'static str,
    machine_type: &'a str,
    min_size: u32,
    max_size: u32,
    subnets: &'a [String],
    status: GroupStatus,
}

fn status(cloud: &LocalCloud, cluster: &Cluster, ig: &InstanceGroup) -> Result<GroupStatus, FindError> {
    let name = format!("{}.{}", ig.name, cluster.name);
    let Some(actual) = cloud.read::<AutoscalingGroup>(AutoscalingGroup::KIND, &name)? else {
        return Ok(GroupStatus::Missing);
    };
    let hash = nodeup::assemble(cluster, ig)
        .map_err(anyhow::Error::from)?
        .boot
        .nodeup_config_hash;
    let current = actual.nodeup_config_hash == hash
        && actual.machine_type == ig.machine_type
        && (actual.min_size, actual.max_size) == (ig.min_size, ig.max_size);
    Ok(if current {
        GroupStatus::Ready
    } else {
        GroupStatus::NeedsUpdate
    })
}

/// List instance groups with their provisioning status
pub fn instance_groups(ctx: &Context, output: OutputFormat) -> Result<()> {
    let cluster = ctx.load_cluster()?;
    let cloud = ctx.cloud(&cluster);

    let mut rows = Vec::new();
    for ig in &cluster.instance_groups {
        rows.push(Row {
            name: &ig.name,
            role: ig.role.as_str(),
            machine_type: &ig.machine_type,
            min_size: ig.min_size,
            max_size: ig.max_size,
            subnets: &ig.subnets,
            status: status(&cloud, &cluster, ig)?,
        });
    }

    if output == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    ui::header(&format!("Instance groups of {}", cluster.name));
    if let Some(last) = ctx.state.last_apply(&cluster.name)? {
        ui::kv("Last applied", &last.last_applied.format("%Y-%m-%d %H:%M:%S UTC").to_string());
    }
    println!();
    println!(
        "  {:<24} {:<14} {:<16} {:>4} {:>4}  {}",
        "NAME".bold(),
        "ROLE".bold(),
        "MACHINE TYPE".bold(),
        "MIN".bold(),
        "MAX".bold(),
        "SUBNETS".bold()
    );
    for row in &rows {
        let symbol = match row.status {
            GroupStatus::Ready => "✓".green(),
            GroupStatus::NeedsUpdate => "~".yellow(),
            GroupStatus::Missing => "✗".red(),
        };
        println!(
            "{} {:<24} {:<14} {:<16} {:>4} {:>4}  {}",
            symbol,
            row.name,
            row.role,
            row.machine_type,
            row.min_size,
            row.max_size,
            row.subnets.join(",").dimmed()
        );
    }

    let orphans = orphaned_groups(&cloud, &cluster)?;
    if !orphans.is_empty() {
        println!();
        println!(
            "  {} Not in the cluster document: {}",
            "⚠".yellow(),
            orphans.join(", ")
        );
    }
    if ctx
        .state
        .applied_cluster(&cluster.name)?
        .is_some_and(|applied| applied != cluster)
    {
        ui::info("Cluster document changed since the last apply");
    }
    Ok(())
}

/// Groups the provider still holds that no instance group maps to
fn orphaned_groups(cloud: &LocalCloud, cluster: &Cluster) -> Result<Vec<String>> {
    let suffix = format!(".{}", cluster.name);
    let orphans = cloud
        .list(AutoscalingGroup::KIND)?
        .into_iter()
        .filter(|name| {
            name.strip_suffix(&suffix)
                .is_none_or(|ig| cluster.instance_group(ig).is_none())
        })
        .collect();
    Ok(orphans)
}
