//! # Nodeup
//!
//! Builds the configuration bundle for the machines of one instance group
//! and verifies it on the other end.
//!
//! Each instance group gets two artifacts:
//! - [`NodeConfig`]: the full node configuration, fetched by the node agent
//! - [`BootConfig`]: the small bootstrap record delivered with the machine,
//!   carrying the hash of the NodeConfig it must accept
//!
//! ## Example
//!
//! ```no_run
//! use clusterspec::Cluster;
//! use std::path::Path;
//!
//! let cluster = Cluster::load(Path::new("cluster.toml"))?;
//! let ig = cluster.instance_group("nodes").expect("instance group");
//! let bundle = nodeup::assemble(&cluster, ig)?;
//!
//! // on the node
//! let config = nodeup::verify(&bundle.boot, &bundle.node_bytes)?;
//! assert_eq!(config, bundle.node);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod error;
mod types;

pub use error::{AssembleError, IntegrityError, Result};
pub use types::{ApiServerConfig, BOOT_CONFIG_LIMIT, BootConfig, Image, NodeConfig, StaticManifest};

use clusterspec::{Cluster, InstanceGroup, InstanceGroupRole, RoleScoped, WarmPool, filter_for_role};

/// Update policy used when neither the instance group nor the cluster sets one
pub const DEFAULT_UPDATE_POLICY: &str = "automatic";

/// The assembled artifacts of one instance group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    pub node: NodeConfig,
    /// Canonical encoding of `node`; the bytes `boot` was hashed from
    pub node_bytes: Vec<u8>,
    pub boot: BootConfig,
    pub boot_bytes: Vec<u8>,
}

/// Derive the NodeConfig and BootConfig for `ig`
///
/// Pure: the same inputs always give byte-identical output.
pub fn assemble(cluster: &Cluster, ig: &InstanceGroup) -> Result<Bundle> {
    let cloud_provider = cluster
        .cloud_provider
        .id()
        .ok_or_else(|| AssembleError::NoCloudProvider(cluster.name.clone()))?;
    let role = ig.role;

    let mut node = NodeConfig {
        cluster_name: cluster.name.clone(),
        sysctl_parameters: ig.sysctl_parameters.clone(),
        volume_mounts: ig.volume_mounts.clone(),
        file_assets: group_then_cluster(&ig.file_assets, &cluster.file_assets, role),
        static_manifests: group_then_cluster(&ig.static_manifests, &cluster.static_manifests, role)
            .into_iter()
            .map(|m| StaticManifest {
                key: m.key,
                path: m.path,
            })
            .collect(),
        channels: cluster.channels.clone(),
        cas: cluster
            .trusted_cas
            .iter()
            .map(|(name, ca)| (name.clone(), ca.certificate.clone()))
            .collect(),
        keypair_ids: cluster
            .trusted_cas
            .iter()
            .filter_map(|(name, ca)| Some((name.clone(), ca.keypair_id.clone()?)))
            .collect(),
        hooks: vec![
            filter_for_role(&ig.hooks, role),
            filter_for_role(&cluster.hooks, role),
        ],
        container_runtime: cluster.container_runtime.clone(),
        update_policy: ig
            .update_policy
            .clone()
            .or_else(|| cluster.update_policy.clone())
            .unwrap_or_else(|| DEFAULT_UPDATE_POLICY.to_string()),
        kubelet: ig.kubelet.clone(),
        ..NodeConfig::default()
    };

    for asset in group_then_cluster(&ig.assets, &cluster.assets, role) {
        for arch in &asset.architectures {
            node.assets.entry(*arch).or_default().push(asset.locator());
        }
    }
    for image in group_then_cluster(&ig.images, &cluster.images, role) {
        let preload = Image {
            name: image.name,
            sources: image.sources,
            hash: image.hash.unwrap_or_default(),
        };
        for arch in &image.architectures {
            node.images.entry(*arch).or_default().push(preload.clone());
        }
    }

    if let Some(aws) = &cluster.cloud_provider.aws {
        let warm_pool = WarmPool::resolve(aws.warm_pool.as_ref(), ig.warm_pool.as_ref());
        node.enable_lifecycle_hook = warm_pool.is_some_and(|w| w.lifecycle_hook_enabled());

        if ig.has_api_server() || cluster.is_kubernetes_lt(1, 24) {
            node.disable_security_group_ingress = aws.disable_security_group_ingress;
            node.elb_security_group = aws.elb_security_group.clone();
            node.node_ip_families = aws.node_ip_families.clone();
        }
    }

    if let Some(gce) = &cluster.cloud_provider.gce {
        node.multizone = gce.multizone;
        node.node_tags = gce.node_tags.clone();
        node.node_instance_prefix = gce.node_instance_prefix.clone();
    }

    if cluster.networking.is_amazon_vpc() {
        node.default_machine_type = Some(ig.primary_machine_type().to_string());
    }

    node.use_instance_id_for_node_name = cluster.uses_instance_id_for_node_name();

    if ig.has_api_server() {
        node.api_server_config = Some(ApiServerConfig {
            kube_api_server: cluster.kube_api_server.clone(),
            ..ApiServerConfig::default()
        });
    }

    let node_bytes = node.to_bytes()?;
    let boot = BootConfig {
        cloud_provider,
        config_base: cluster.config_base.clone(),
        config_server: cluster.config_server.clone(),
        api_server_ip: cluster.api_server_ip.clone(),
        instance_group_name: ig.name.clone(),
        instance_group_role: role,
        nodeup_config_hash: types::content_hash(&node_bytes),
    };
    let boot_bytes = boot.to_bytes()?;

    log::debug!(
        "Assembled node config for {}/{} ({} bytes, hash {})",
        cluster.name,
        ig.name,
        node_bytes.len(),
        boot.nodeup_config_hash
    );

    Ok(Bundle {
        node,
        node_bytes,
        boot,
        boot_bytes,
    })
}

/// Items of `ig` then of `cluster` that apply to `role`
fn group_then_cluster<T: RoleScoped>(ig: &[T], cluster: &[T], role: InstanceGroupRole) -> Vec<T> {
    let mut items = filter_for_role(ig, role);
    items.extend(filter_for_role(cluster, role));
    items
}

/// Check fetched NodeConfig bytes against the hash pinned in `boot`
///
/// The hash covers the exact bytes, so any re-encoding is rejected too.
pub fn verify(boot: &BootConfig, fetched: &[u8]) -> Result<NodeConfig, IntegrityError> {
    let actual = types::content_hash(fetched);
    if actual != boot.nodeup_config_hash {
        return Err(IntegrityError::Mismatch {
            expected: boot.nodeup_config_hash.clone(),
            actual,
        });
    }
    Ok(serde_json::from_slice(fetched)?)
}
