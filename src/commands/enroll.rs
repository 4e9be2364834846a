//! `enroll verify` - the node-side integrity check

use anyhow::{Context as AnyhowContext, Result};
use nodeup::BootConfig;
use std::path::Path;

use crate::Context;
use crate::ui;

/// Accept the fetched NodeConfig only if it hashes to what BootConfig pins
pub fn verify(ctx: &Context, boot_path: &Path, config_path: &Path) -> Result<()> {
    let boot: BootConfig = serde_json::from_slice(&crate::read_file(boot_path)?)
        .with_context(|| format!("Invalid BootConfig in {}", boot_path.display()))?;
    let fetched = crate::read_file(config_path)?;

    let node = nodeup::verify(&boot, &fetched)
        .with_context(|| format!("Rejected node config {}", config_path.display()))?;

    if !ctx.quiet {
        ui::success("Node config matches boot config");
        ui::kv("Cluster", &node.cluster_name);
        ui::kv("Instance group", &boot.instance_group_name);
        ui::kv("Role", boot.instance_group_role.as_str());
        ui::kv("Hash", &boot.nodeup_config_hash);
    }
    Ok(())
}
