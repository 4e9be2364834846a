//! Data types for the cluster document

use crate::role::{AppliesTo, InstanceGroupRole};
use crate::version::KubernetesVersion;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

fn default_container_runtime() -> String {
    "containerd".to_string()
}

/// Cluster-wide desired state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    /// DNS-style cluster name
    pub name: String,
    #[serde(default)]
    pub kubernetes_version: KubernetesVersion,
    pub cloud_provider: CloudProvider,
    /// Base path of the config store nodes read from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_base: Option<String>,
    /// Config server nodes enroll with, instead of reading `config_base`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_server: Option<ConfigServer>,
    /// Address added to /etc/hosts for the internal API name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_server_ip: Option<String>,
    pub networking: Networking,
    #[serde(default = "default_container_runtime")]
    pub container_runtime: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_policy: Option<String>,
    /// Addon channels nodes apply
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_cloud_controller_manager: Option<CloudControllerManager>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kube_api_server: Option<KubeApiServerConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hooks: Vec<Hook>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_assets: Vec<FileAsset>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assets: Vec<Asset>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ContainerImage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub static_manifests: Vec<StaticPodManifest>,
    /// CA certificates every node trusts, by keypair name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub trusted_cas: BTreeMap<String, TrustedCa>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instance_groups: Vec<InstanceGroup>,
}

impl Cluster {
    pub fn instance_group(&self, name: &str) -> Option<&InstanceGroup> {
        self.instance_groups.iter().find(|ig| ig.name == name)
    }

    pub fn is_kubernetes_lt(&self, major: u32, minor: u32) -> bool {
        self.kubernetes_version.is_lt(major, minor)
    }

    /// Nodes are named after their cloud instance ID
    pub fn uses_instance_id_for_node_name(&self) -> bool {
        self.external_cloud_controller_manager.is_some()
            && self.cloud_provider.id() == Some(CloudProviderId::Aws)
    }
}

/// Identifies the cloud a cluster runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudProviderId {
    Aws,
    Gce,
    Local,
}

impl fmt::Display for CloudProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aws => write!(f, "aws"),
            Self::Gce => write!(f, "gce"),
            Self::Local => write!(f, "local"),
        }
    }
}

/// Provider blocks; exactly one is set in a valid cluster
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CloudProvider {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<AwsSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gce: Option<GceSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local: Option<LocalSpec>,
}

impl CloudProvider {
    /// The configured provider; the first block wins if several are set
    pub fn id(&self) -> Option<CloudProviderId> {
        if self.aws.is_some() {
            Some(CloudProviderId::Aws)
        } else if self.gce.is_some() {
            Some(CloudProviderId::Gce)
        } else if self.local.is_some() {
            Some(CloudProviderId::Local)
        } else {
            None
        }
    }

    pub(crate) fn configured(&self) -> usize {
        usize::from(self.aws.is_some())
            + usize::from(self.gce.is_some())
            + usize::from(self.local.is_some())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwsSpec {
    /// Cluster-wide warm pool defaults
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warm_pool: Option<WarmPool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_security_group_ingress: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elb_security_group: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub node_ip_families: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GceSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multizone: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_tags: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_instance_prefix: Option<String>,
}

/// Resources are JSON documents under a directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
}

/// Pre-initialized instances kept ready to join an instance group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarmPool {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_lifecycle_hook: Option<bool>,
}

impl WarmPool {
    /// Merge instance-group settings over the cluster defaults
    pub fn resolve(cluster: Option<&Self>, instance_group: Option<&Self>) -> Option<Self> {
        match (cluster, instance_group) {
            (None, None) => None,
            (Some(c), None) => Some(c.clone()),
            (None, Some(ig)) => Some(ig.clone()),
            (Some(c), Some(ig)) => Some(Self {
                min_size: ig.min_size.or(c.min_size),
                max_size: ig.max_size.or(c.max_size),
                enable_lifecycle_hook: ig.enable_lifecycle_hook.or(c.enable_lifecycle_hook),
            }),
        }
    }

    /// A pool with `max_size = 0` is switched off
    pub fn is_enabled(&self) -> bool {
        self.max_size != Some(0)
    }

    pub fn lifecycle_hook_enabled(&self) -> bool {
        self.is_enabled() && self.enable_lifecycle_hook.unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigServer {
    /// Address of the config server
    pub server: String,
    /// PEM bundle nodes trust when talking to it
    #[serde(default)]
    pub ca_certificates: String,
}

/// Pod network implementation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NetworkingProvider {
    #[default]
    Kubenet,
    Calico,
    Cilium,
    AmazonVpc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Networking {
    pub network_cidr: String,
    /// Existing network to adopt instead of creating one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_id: Option<String>,
    #[serde(default)]
    pub provider: NetworkingProvider,
    #[serde(default)]
    pub subnets: Vec<Subnet>,
}

impl Networking {
    pub fn is_amazon_vpc(&self) -> bool {
        self.provider == NetworkingProvider::AmazonVpc
    }

    /// The network is owned by someone else
    pub fn is_shared(&self) -> bool {
        self.network_id.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnet {
    pub name: String,
    pub cidr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudControllerManager {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubeApiServerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_cluster_ip_range: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authorization_mode: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub feature_gates: BTreeMap<String, String>,
}

/// A unit run on nodes before or after kubelet starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hook {
    pub name: String,
    #[serde(default, skip_serializing_if = "AppliesTo::is_all")]
    pub roles: AppliesTo,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,
    /// Raw systemd unit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec_container: Option<ExecContainer>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub before: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecContainer {
    pub image: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
}

/// A file written to nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAsset {
    pub name: String,
    pub path: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "AppliesTo::is_all")]
    pub roles: AppliesTo,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_base64: bool,
}

/// CPU architecture of node machines
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    Amd64,
    Arm64,
}

impl Architecture {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Amd64 => "amd64",
            Self::Arm64 => "arm64",
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_architectures() -> Vec<Architecture> {
    vec![Architecture::Amd64]
}

/// A file nodes download at boot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub url: String,
    /// Expected SHA-256 of the download
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default = "default_architectures")]
    pub architectures: Vec<Architecture>,
    #[serde(default, skip_serializing_if = "AppliesTo::is_all")]
    pub roles: AppliesTo,
}

impl Asset {
    /// `hash@url` when the hash is known, the bare URL otherwise
    pub fn locator(&self) -> String {
        match &self.hash {
            Some(hash) => format!("{hash}@{}", self.url),
            None => self.url.clone(),
        }
    }
}

/// A container image nodes pre-load before kubelet starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerImage {
    /// Name the container runtime knows the image by
    pub name: String,
    /// Archive URLs, tried in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default = "default_architectures")]
    pub architectures: Vec<Architecture>,
    #[serde(default, skip_serializing_if = "AppliesTo::is_all")]
    pub roles: AppliesTo,
}

/// A static pod manifest stored under the config base
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticPodManifest {
    pub key: String,
    /// Location relative to the config base
    pub path: String,
    #[serde(default, skip_serializing_if = "AppliesTo::is_all")]
    pub roles: AppliesTo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustedCa {
    /// PEM bundle
    pub certificate: String,
    /// ID of the keypair currently signing with this CA
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keypair_id: Option<String>,
}

/// Role-filtered view of a role-scoped item
pub trait RoleScoped: Clone {
    fn applies_to(&self) -> &AppliesTo;

    fn clear_roles(&mut self);

    /// A copy for `role` with its predicate cleared, or `None` if it does not apply
    fn for_role(&self, role: InstanceGroupRole) -> Option<Self> {
        if !self.applies_to().matches(role) {
            return None;
        }
        let mut item = self.clone();
        item.clear_roles();
        Some(item)
    }
}

macro_rules! role_scoped {
    ($($item:ty),+ $(,)?) => {
        $(
            impl RoleScoped for $item {
                fn applies_to(&self) -> &AppliesTo {
                    &self.roles
                }

                fn clear_roles(&mut self) {
                    self.roles = AppliesTo::All;
                }
            }
        )+
    };
}

role_scoped!(Hook, FileAsset, Asset, ContainerImage, StaticPodManifest);

/// Keep the items that apply to `role`, predicates cleared
pub fn filter_for_role<T: RoleScoped>(items: &[T], role: InstanceGroupRole) -> Vec<T> {
    items.iter().filter_map(|item| item.for_role(role)).collect()
}

/// A set of identically configured machines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceGroup {
    pub name: String,
    pub role: InstanceGroupRole,
    /// One machine type, or a comma-separated list for mixed instances
    pub machine_type: String,
    #[serde(default = "default_group_size")]
    pub min_size: u32,
    #[serde(default = "default_group_size")]
    pub max_size: u32,
    #[serde(default)]
    pub subnets: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hooks: Vec<Hook>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_assets: Vec<FileAsset>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assets: Vec<Asset>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ContainerImage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub static_manifests: Vec<StaticPodManifest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubelet: Option<KubeletConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sysctl_parameters: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volume_mounts: Vec<VolumeMount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_policy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warm_pool: Option<WarmPool>,
}

fn default_group_size() -> u32 {
    1
}

impl InstanceGroup {
    pub fn has_api_server(&self) -> bool {
        self.role.has_api_server()
    }

    /// First entry of a mixed-instances machine type list
    pub fn primary_machine_type(&self) -> &str {
        self.machine_type
            .split(',')
            .next()
            .map(str::trim)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubeletConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pods: Option<u32>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub taints: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub feature_gates: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeMount {
    pub device: String,
    pub filesystem: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mount_options: Vec<String>,
}
