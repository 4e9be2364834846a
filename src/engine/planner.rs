//! Model builder - turns a cluster document into tasks and node bundles

use anyhow::{Context, Result};
use clusterspec::{Cluster, InstanceGroupRole};
use declarative::{BoxedTask, Lifecycle, Resource, Task, TaskRef};
use nodeup::Bundle;
use std::collections::{BTreeMap, BTreeSet};

use crate::cloud::LocalCloud;
use crate::config::Settings;
use crate::resource::{AutoscalingGroup, IngressRule, Network, SecurityGroup, Subnet};

const ANYWHERE: &str = "0.0.0.0/0";

/// Everything one run needs from the cluster document
pub struct Model {
    pub tasks: Vec<BoxedTask<LocalCloud>>,
    /// Node bundles per instance group; AutoscalingGroup tasks pin their hashes
    pub bundles: BTreeMap<String, Bundle>,
}

/// Security group shared by every instance group of a role
fn security_group_role(role: InstanceGroupRole) -> &'static str {
    match role {
        InstanceGroupRole::ControlPlane | InstanceGroupRole::ApiServer => "control-plane",
        InstanceGroupRole::Node => "nodes",
        InstanceGroupRole::Bastion => "bastion",
    }
}

struct Builder<'a> {
    cluster: &'a Cluster,
    settings: &'a Settings,
    tasks: Vec<BoxedTask<LocalCloud>>,
}

impl Builder<'_> {
    fn scoped(&self, name: &str) -> String {
        format!("{name}.{}", self.cluster.name)
    }

    fn add<R: Resource<Cloud = LocalCloud>>(&mut self, name: String, desired: R, default: Lifecycle) {
        let lifecycle = self.settings.lifecycle_override(R::KIND).unwrap_or(default);
        log::debug!("Planned {} {name} ({lifecycle})", R::KIND);
        self.tasks
            .push(Task::new(name, desired).with_lifecycle(lifecycle).boxed());
    }
}

/// Build the task set and node bundles for `cluster`
pub fn build(cluster: &Cluster, settings: &Settings) -> Result<Model> {
    let mut b = Builder {
        cluster,
        settings,
        tasks: Vec::new(),
    };
    let networking = &cluster.networking;

    // network
    let network_name = networking
        .network_id
        .clone()
        .unwrap_or_else(|| cluster.name.clone());
    let network = TaskRef::<Network>::new(network_name.as_str());
    let (tags, lifecycle) = if networking.is_shared() {
        (BTreeMap::new(), Lifecycle::ExistsAndWarnIfChanges)
    } else {
        (
            BTreeMap::from([("KubernetesCluster".to_string(), cluster.name.clone())]),
            Lifecycle::Sync,
        )
    };
    b.add(
        network_name,
        Network {
            cidr: networking.network_cidr.clone(),
            tags,
        },
        lifecycle,
    );

    // subnets
    for subnet in &networking.subnets {
        let name = b.scoped(&subnet.name);
        b.add(
            name,
            Subnet {
                network: network.clone(),
                cidr: subnet.cidr.clone(),
                zone: subnet.zone.clone(),
            },
            Lifecycle::Sync,
        );
    }

    // one security group per role present
    let roles: BTreeSet<&str> = cluster
        .instance_groups
        .iter()
        .map(|ig| security_group_role(ig.role))
        .collect();
    for &role in &roles {
        let ingress = match role {
            "nodes" => {
                let mut rules = vec![IngressRule::from_cidr("all", 0, u16::MAX, &networking.network_cidr)];
                if roles.contains("bastion") {
                    rules.push(IngressRule::from_group("tcp", 22, 22, &b.scoped("bastion")));
                }
                rules
            }
            "control-plane" => {
                let mut rules = vec![IngressRule::from_cidr("tcp", 443, 443, &networking.network_cidr)];
                if roles.contains("nodes") {
                    rules.push(IngressRule::from_group("tcp", 443, 443, &b.scoped("nodes")));
                }
                rules
            }
            _ => vec![IngressRule::from_cidr("tcp", 22, 22, ANYWHERE)],
        };
        let name = b.scoped(role);
        b.add(
            name,
            SecurityGroup {
                network: network.clone(),
                description: format!("{role} of {}", cluster.name),
                ingress,
            },
            Lifecycle::Sync,
        );
    }

    // instance groups
    let mut bundles = BTreeMap::new();
    for ig in &cluster.instance_groups {
        let bundle = nodeup::assemble(cluster, ig)
            .with_context(|| format!("Failed to assemble node config for {}", ig.name))?;
        let asg = AutoscalingGroup {
            role: ig.role,
            machine_type: ig.machine_type.clone(),
            min_size: ig.min_size,
            max_size: ig.max_size,
            image: ig.image.clone(),
            subnets: ig.subnets.iter().map(|s| TaskRef::new(b.scoped(s))).collect(),
            security_group: TaskRef::new(b.scoped(security_group_role(ig.role))),
            nodeup_config_hash: bundle.boot.nodeup_config_hash.clone(),
        };
        let name = b.scoped(&ig.name);
        b.add(name, asg, Lifecycle::Sync);
        bundles.insert(ig.name.clone(), bundle);
    }

    log::info!("Planned {} tasks for {}", b.tasks.len(), cluster.name);
    Ok(Model {
        tasks: b.tasks,
        bundles,
    })
}
