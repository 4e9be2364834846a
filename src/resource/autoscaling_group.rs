//! Autoscaling group resource - the machines of one instance group

use anyhow::{Result, bail};
use clusterspec::InstanceGroupRole;
use declarative::{FieldChange, FindError, ProviderContext, Resource, TaskKey, TaskRef};
use serde::{Deserialize, Serialize};

use super::{SecurityGroup, Subnet, find_document, or_unset, render_document};
use crate::cloud::LocalCloud;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoscalingGroup {
    pub role: InstanceGroupRole,
    pub machine_type: String,
    pub min_size: u32,
    pub max_size: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub subnets: Vec<TaskRef<Subnet>>,
    pub security_group: TaskRef<SecurityGroup>,
    /// Hash of the NodeConfig machines in this group boot with
    pub nodeup_config_hash: String,
}

impl Resource for AutoscalingGroup {
    type Cloud = LocalCloud;
    const KIND: &'static str = "AutoscalingGroup";

    fn references(&self) -> Vec<TaskKey> {
        self.subnets
            .iter()
            .map(TaskRef::key)
            .chain(std::iter::once(self.security_group.key()))
            .collect()
    }

    fn find(&self, name: &str, ctx: &ProviderContext<LocalCloud>) -> Result<Option<Self>, FindError> {
        find_document(name, ctx)
    }

    fn render(
        &self,
        name: &str,
        actual: Option<&Self>,
        ctx: &ProviderContext<LocalCloud>,
        dry_run: bool,
    ) -> Result<bool> {
        if self.min_size > self.max_size {
            bail!("min size {} exceeds max size {}", self.min_size, self.max_size);
        }
        if self.subnets.is_empty() {
            bail!("autoscaling group {name} has no subnets");
        }
        render_document(self, name, actual, ctx, dry_run)
    }

    fn changes(&self, actual: &Self) -> Vec<FieldChange> {
        let mut changes = Vec::new();
        if self.role != actual.role {
            changes.push(FieldChange::new("role", actual.role.as_str(), self.role.as_str()));
        }
        if self.machine_type != actual.machine_type {
            changes.push(FieldChange::new("machine_type", &actual.machine_type, &self.machine_type));
        }
        if (self.min_size, self.max_size) != (actual.min_size, actual.max_size) {
            changes.push(FieldChange::new(
                "size",
                format_args!("{}..{}", actual.min_size, actual.max_size),
                format_args!("{}..{}", self.min_size, self.max_size),
            ));
        }
        if self.image != actual.image {
            changes.push(FieldChange::new("image", or_unset(actual.image.as_deref()), or_unset(self.image.as_deref())));
        }
        if self.subnets != actual.subnets {
            let names = |refs: &[TaskRef<Subnet>]| {
                refs.iter().map(TaskRef::name).collect::<Vec<_>>().join(", ")
            };
            changes.push(FieldChange::new("subnets", names(&actual.subnets), names(&self.subnets)));
        }
        if self.security_group != actual.security_group {
            changes.push(FieldChange::new(
                "security_group",
                actual.security_group.name(),
                self.security_group.name(),
            ));
        }
        if self.nodeup_config_hash != actual.nodeup_config_hash {
            changes.push(FieldChange::new(
                "nodeup_config_hash",
                &actual.nodeup_config_hash,
                &self.nodeup_config_hash,
            ));
        }
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::testing::context;

    fn nodes() -> AutoscalingGroup {
        AutoscalingGroup {
            role: InstanceGroupRole::Node,
            machine_type: "m5.large".to_string(),
            min_size: 1,
            max_size: 3,
            image: None,
            subnets: vec![TaskRef::new("a.dev"), TaskRef::new("b.dev")],
            security_group: TaskRef::new("nodes.dev"),
            nodeup_config_hash: "abc".to_string(),
        }
    }

    #[test]
    fn test_references() {
        assert_eq!(
            nodes().references(),
            vec![
                TaskKey::new("Subnet", "a.dev"),
                TaskKey::new("Subnet", "b.dev"),
                TaskKey::new("SecurityGroup", "nodes.dev"),
            ]
        );
    }

    #[test]
    fn test_new_node_config_is_an_update() {
        let (_dir, ctx) = context();
        let old = nodes();
        old.render("nodes.dev", None, &ctx, false).unwrap();

        let mut desired = nodes();
        desired.nodeup_config_hash = "def".to_string();
        desired.max_size = 5;
        let actual = desired.find("nodes.dev", &ctx).unwrap();
        let fields: Vec<_> = desired
            .changes(actual.as_ref().unwrap())
            .into_iter()
            .map(|c| (c.field, c.from, c.to))
            .collect();
        assert_eq!(
            fields,
            vec![
                ("size".to_string(), "1..3".to_string(), "1..5".to_string()),
                ("nodeup_config_hash".to_string(), "abc".to_string(), "def".to_string()),
            ]
        );

        assert!(desired.render("nodes.dev", actual.as_ref(), &ctx, false).unwrap());
        assert_eq!(desired.find("nodes.dev", &ctx).unwrap(), Some(desired));
    }

    #[test]
    fn test_rejects_bad_sizes() {
        let (_dir, ctx) = context();
        let mut desired = nodes();
        desired.min_size = 4;
        assert!(desired.render("nodes.dev", None, &ctx, true).is_err());
    }
}
