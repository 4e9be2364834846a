//! # Clusterspec
//!
//! The cluster document: cluster-wide settings, networking, provider
//! blocks, hooks, file assets and instance groups.
//!
//! Documents are TOML. [`Cluster::load`] parses and validates in one step.
//!
//! ## Example
//!
//! ```no_run
//! use clusterspec::Cluster;
//! use std::path::Path;
//!
//! let cluster = Cluster::load(Path::new("cluster.toml"))?;
//! for ig in &cluster.instance_groups {
//!     println!("{} ({}) in {:?}", ig.name, ig.role, ig.subnets);
//! }
//! # Ok::<(), clusterspec::Error>(())
//! ```

mod error;
mod role;
mod types;
mod version;

pub use error::{Error, Result};
pub use role::{AppliesTo, InstanceGroupRole};
pub use types::{
    Architecture, Asset, AwsSpec, CloudControllerManager, CloudProvider, CloudProviderId, Cluster,
    ConfigServer, ContainerImage, ExecContainer, FileAsset, GceSpec, Hook, InstanceGroup,
    KubeApiServerConfig, KubeletConfig, LocalSpec, Networking, NetworkingProvider, RoleScoped,
    StaticPodManifest, Subnet, TrustedCa, VolumeMount, WarmPool, filter_for_role,
};
pub use version::KubernetesVersion;

use std::collections::BTreeSet;
use std::path::Path;

impl Cluster {
    /// Read, parse and validate a cluster document
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let cluster = Self::from_toml(&content)?;
        log::debug!(
            "Loaded cluster {} with {} instance groups from {}",
            cluster.name,
            cluster.instance_groups.len(),
            path.display()
        );
        Ok(cluster)
    }

    /// Parse and validate a cluster document
    pub fn from_toml(content: &str) -> Result<Self> {
        let cluster: Self = toml::from_str(content)?;
        cluster.validate()?;
        Ok(cluster)
    }

    pub fn to_toml(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Check names, provider blocks and instance-group placement
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;

        let providers = self.cloud_provider.configured();
        if providers != 1 {
            return Err(Error::CloudProvider(providers));
        }

        let mut subnets = BTreeSet::new();
        for subnet in &self.networking.subnets {
            validate_name(&subnet.name)?;
            if !subnets.insert(subnet.name.as_str()) {
                return Err(Error::DuplicateSubnet(subnet.name.clone()));
            }
        }

        let mut groups = BTreeSet::new();
        for ig in &self.instance_groups {
            validate_name(&ig.name)?;
            if !groups.insert(ig.name.as_str()) {
                return Err(Error::DuplicateInstanceGroup(ig.name.clone()));
            }
            if ig.primary_machine_type().is_empty() {
                return Err(Error::NoMachineType(ig.name.clone()));
            }
            if ig.min_size > ig.max_size {
                return Err(Error::InvalidSize {
                    instance_group: ig.name.clone(),
                    min: ig.min_size,
                    max: ig.max_size,
                });
            }
            if ig.subnets.is_empty() {
                return Err(Error::NoSubnets(ig.name.clone()));
            }
            if let Some(missing) = ig.subnets.iter().find(|s| !subnets.contains(s.as_str())) {
                return Err(Error::UnknownSubnet {
                    instance_group: ig.name.clone(),
                    subnet: missing.clone(),
                });
            }
        }

        Ok(())
    }
}

fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= 253
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
        && !name.starts_with(['-', '.'])
        && !name.ends_with(['-', '.']);
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidName(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CLUSTER: &str = r#"
name = "dev.example.com"
kubernetes_version = "1.29.3"

[cloud_provider.aws]
elb_security_group = "sg-elb"

[networking]
network_cidr = "10.0.0.0/16"

[[networking.subnets]]
name = "us-east-1a"
cidr = "10.0.1.0/24"
zone = "us-east-1a"

[[hooks]]
name = "cluster-hook"
manifest = "[Unit]"

[[instance_groups]]
name = "control-plane-a"
role = "control-plane"
machine_type = "m5.large"
subnets = ["us-east-1a"]

[[instance_groups]]
name = "nodes"
role = "node"
machine_type = "m5.large"
min_size = 2
max_size = 4
subnets = ["us-east-1a"]
"#;

    fn cluster() -> Cluster {
        Cluster::from_toml(CLUSTER).unwrap()
    }

    #[test]
    fn test_parse_valid_document() {
        let cluster = cluster();
        assert_eq!(cluster.name, "dev.example.com");
        assert_eq!(cluster.kubernetes_version, KubernetesVersion::new(1, 29, 3));
        assert_eq!(cluster.cloud_provider.id(), Some(CloudProviderId::Aws));
        assert_eq!(cluster.container_runtime, "containerd");
        assert_eq!(cluster.instance_groups.len(), 2);
        assert!(cluster.instance_group("nodes").unwrap().role == InstanceGroupRole::Node);
        assert!(cluster.hooks[0].roles.is_all());
    }

    #[test]
    fn test_toml_round_trip_preserves_cluster() {
        let cluster = cluster();
        let encoded = cluster.to_toml().unwrap();
        assert_eq!(Cluster::from_toml(&encoded).unwrap(), cluster);
    }

    #[test]
    fn test_node_payload_sources() {
        let doc = CLUSTER.replace(
            "kubernetes_version = \"1.29.3\"",
            "kubernetes_version = \"1.29.3\"\nchannels = [\"s3://state/dev/addons/bootstrap-channel.yaml\"]",
        ) + r#"
[[instance_groups.assets]]
url = "https://dl.example.com/kubelet"
hash = "abc123"
architectures = ["amd64", "arm64"]

[[images]]
name = "registry.k8s.io/pause:3.9"
roles = ["node"]

[[static_manifests]]
key = "kube-proxy"
path = "manifests/static/kube-proxy.yaml"

[trusted_cas.kubernetes-ca]
certificate = "-----BEGIN CERTIFICATE-----"
keypair_id = "7043212475617128394"
"#;
        let cluster = Cluster::from_toml(&doc).unwrap();
        assert_eq!(cluster.channels.len(), 1);
        assert_eq!(cluster.images[0].architectures, vec![Architecture::Amd64]);
        assert_eq!(cluster.images[0].roles, AppliesTo::roles([InstanceGroupRole::Node]));
        assert_eq!(cluster.static_manifests[0].key, "kube-proxy");
        assert_eq!(
            cluster.trusted_cas["kubernetes-ca"].keypair_id.as_deref(),
            Some("7043212475617128394")
        );

        let asset = &cluster.instance_group("nodes").unwrap().assets[0];
        assert_eq!(asset.locator(), "abc123@https://dl.example.com/kubelet");
        assert_eq!(asset.architectures, vec![Architecture::Amd64, Architecture::Arm64]);

        let encoded = cluster.to_toml().unwrap();
        assert_eq!(Cluster::from_toml(&encoded).unwrap(), cluster);
    }

    #[test]
    fn test_rejects_unknown_architecture() {
        let doc = format!("{CLUSTER}\n[[assets]]\nurl = \"https://dl.example.com/x\"\narchitectures = [\"sparc\"]\n");
        assert!(matches!(Cluster::from_toml(&doc), Err(Error::Parse(_))));
    }

    #[test]
    fn test_rejects_unknown_subnet() {
        let doc = CLUSTER.replacen(r#"subnets = ["us-east-1a"]"#, r#"subnets = ["us-east-1z"]"#, 1);
        match Cluster::from_toml(&doc) {
            Err(Error::UnknownSubnet {
                instance_group,
                subnet,
            }) => {
                assert_eq!(instance_group, "control-plane-a");
                assert_eq!(subnet, "us-east-1z");
            }
            other => panic!("expected unknown subnet, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_duplicate_instance_group() {
        let mut cluster = cluster();
        let copy = cluster.instance_groups[0].clone();
        cluster.instance_groups.push(copy);
        assert!(matches!(
            cluster.validate(),
            Err(Error::DuplicateInstanceGroup(name)) if name == "control-plane-a"
        ));
    }

    #[test]
    fn test_rejects_provider_count() {
        let mut cluster = cluster();
        cluster.cloud_provider.gce = Some(GceSpec::default());
        assert!(matches!(cluster.validate(), Err(Error::CloudProvider(2))));

        cluster.cloud_provider = CloudProvider::default();
        assert!(matches!(cluster.validate(), Err(Error::CloudProvider(0))));
    }

    #[test]
    fn test_rejects_bad_sizes_and_names() {
        let mut cluster = cluster();
        cluster.instance_groups[1].min_size = 9;
        assert!(matches!(cluster.validate(), Err(Error::InvalidSize { min: 9, max: 4, .. })));

        let mut cluster = self::cluster();
        cluster.name = "Dev_Cluster".to_string();
        assert!(matches!(cluster.validate(), Err(Error::InvalidName(_))));
    }

    #[test]
    fn test_rejects_bad_version() {
        let doc = CLUSTER.replace("1.29.3", "latest");
        assert!(matches!(Cluster::from_toml(&doc), Err(Error::Parse(_))));
    }

    #[test]
    fn test_instance_id_node_names() {
        let mut cluster = cluster();
        assert!(!cluster.uses_instance_id_for_node_name());
        cluster.external_cloud_controller_manager = Some(CloudControllerManager::default());
        assert!(cluster.uses_instance_id_for_node_name());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CLUSTER.as_bytes()).unwrap();
        let cluster = Cluster::load(file.path()).unwrap();
        assert_eq!(cluster.name, "dev.example.com");

        let missing = Cluster::load(Path::new("/nonexistent/cluster.toml"));
        assert!(matches!(missing, Err(Error::Io { .. })));
    }
}
