//! State directory: last applied cluster spec and node bundles
//!
//! Layout under the state root:
//!
//! ```text
//! <cluster>/cluster.toml            last applied cluster document
//! <cluster>/status.toml             when it was applied, and how it went
//! <cluster>/igconfig/<ig>/nodeup.json
//! <cluster>/igconfig/<ig>/boot.json
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clusterspec::Cluster;
use declarative::{ReportSummary, RunOutcome};
use nodeup::Bundle;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const NODEUP_FILE: &str = "nodeup.json";
pub const BOOT_FILE: &str = "boot.json";

/// Result of the last apply of one cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyStatus {
    pub last_applied: DateTime<Utc>,
    pub outcome: RunOutcome,
    pub summary: ReportSummary,
}

#[derive(Debug, Clone)]
pub struct StateStore {
    root: PathBuf,
}

impl StateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn cluster_dir(&self, cluster: &str) -> PathBuf {
        self.root.join(cluster)
    }

    pub fn bundle_dir(&self, cluster: &str, instance_group: &str) -> PathBuf {
        self.cluster_dir(cluster).join("igconfig").join(instance_group)
    }

    /// Record a finished apply; the cluster document is kept only when it converged
    pub fn record_apply(&self, cluster: &Cluster, outcome: RunOutcome, summary: ReportSummary) -> Result<()> {
        let dir = self.cluster_dir(&cluster.name);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;

        if outcome != RunOutcome::Error {
            let spec = cluster
                .to_toml()
                .context("Failed to serialize cluster document")?;
            write(&dir.join("cluster.toml"), spec.as_bytes())?;
        }

        let status = ApplyStatus {
            last_applied: Utc::now(),
            outcome,
            summary,
        };
        let content = toml::to_string_pretty(&status).context("Failed to serialize apply status")?;
        write(&dir.join("status.toml"), content.as_bytes())?;
        log::debug!("Recorded apply of {} in {}", cluster.name, dir.display());
        Ok(())
    }

    /// Status of the last apply, if there was one
    pub fn last_apply(&self, cluster: &str) -> Result<Option<ApplyStatus>> {
        let path = self.cluster_dir(cluster).join("status.toml");
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;
        let status = toml::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;
        Ok(Some(status))
    }

    /// Last cluster document that applied cleanly
    pub fn applied_cluster(&self, cluster: &str) -> Result<Option<Cluster>> {
        let path = self.cluster_dir(cluster).join("cluster.toml");
        if !path.exists() {
            return Ok(None);
        }
        Cluster::load(&path)
            .map(Some)
            .with_context(|| format!("Failed to load applied cluster from {}", path.display()))
    }

    /// Write both artifacts of an instance group; returns their directory
    pub fn write_bundle(&self, cluster: &str, instance_group: &str, bundle: &Bundle) -> Result<PathBuf> {
        let dir = self.bundle_dir(cluster, instance_group);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        write(&dir.join(NODEUP_FILE), &bundle.node_bytes)?;
        write(&dir.join(BOOT_FILE), &bundle.boot_bytes)?;
        Ok(dir)
    }
}

fn write(path: &Path, content: &[u8]) -> Result<()> {
    fs::write(path, content).with_context(|| format!("Failed to write state file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLUSTER: &str = r#"
name = "dev.example.com"

[cloud_provider.local]

[networking]
network_cidr = "10.0.0.0/16"

[[networking.subnets]]
name = "zone-a"
cidr = "10.0.1.0/24"

[[instance_groups]]
name = "nodes"
role = "node"
machine_type = "small"
subnets = ["zone-a"]
"#;

    #[test]
    fn test_no_state_yet() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path());
        assert_eq!(store.last_apply("dev.example.com").unwrap(), None);
        assert!(store.applied_cluster("dev.example.com").unwrap().is_none());
    }

    #[test]
    fn test_record_apply_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path());
        let cluster = Cluster::from_toml(CLUSTER).unwrap();
        let summary = ReportSummary {
            applied: 3,
            ..ReportSummary::default()
        };

        store
            .record_apply(&cluster, RunOutcome::Converged, summary.clone())
            .unwrap();

        let status = store.last_apply(&cluster.name).unwrap().unwrap();
        assert_eq!(status.outcome, RunOutcome::Converged);
        assert_eq!(status.summary, summary);
        assert_eq!(store.applied_cluster(&cluster.name).unwrap(), Some(cluster));
    }

    #[test]
    fn test_failed_apply_keeps_previous_cluster() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path());
        let cluster = Cluster::from_toml(CLUSTER).unwrap();

        store
            .record_apply(&cluster, RunOutcome::Error, ReportSummary::default())
            .unwrap();
        assert!(store.applied_cluster(&cluster.name).unwrap().is_none());
        assert_eq!(
            store.last_apply(&cluster.name).unwrap().unwrap().outcome,
            RunOutcome::Error
        );
    }

    #[test]
    fn test_write_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path());
        let cluster = Cluster::from_toml(CLUSTER).unwrap();
        let bundle = nodeup::assemble(&cluster, &cluster.instance_groups[0]).unwrap();

        let out = store.write_bundle(&cluster.name, "nodes", &bundle).unwrap();
        assert_eq!(out, dir.path().join("dev.example.com/igconfig/nodes"));
        assert_eq!(fs::read(out.join(NODEUP_FILE)).unwrap(), bundle.node_bytes);
        assert_eq!(fs::read(out.join(BOOT_FILE)).unwrap(), bundle.boot_bytes);
    }
}
