//! Data types for node bundles

use crate::error::{AssembleError, Result};
use clusterspec::{
    Architecture, CloudProviderId, ConfigServer, FileAsset, Hook, InstanceGroupRole,
    KubeApiServerConfig, KubeletConfig, VolumeMount,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Largest BootConfig encoding accepted; the smallest common user-data limit
pub const BOOT_CONFIG_LIMIT: usize = 16 * 1024;

/// A container image to pre-load
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    /// Name passed to the container runtime
    pub name: String,
    /// URLs the image can be downloaded from
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
    /// Hash of the image archive
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hash: String,
}

/// A static pod manifest kept in the config store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticManifest {
    pub key: String,
    pub path: String,
}

/// Extra configuration for machines running an API server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiServerConfig {
    /// Copy of the cluster's kube-apiserver settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kube_api_server: Option<KubeApiServerConfig>,
    /// Hash of the encryption config secret, when encryption is enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_config_secret_hash: Option<String>,
    #[serde(default)]
    pub service_account_public_keys: String,
}

/// Everything a node agent needs that is too big for the boot channel
///
/// Every map is ordered, so equal configs always encode to equal bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub cluster_name: String,
    /// Downloads as `hash@url` locators, per architecture
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub assets: BTreeMap<Architecture, Vec<String>>,
    /// Images to pre-load, per architecture
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub images: BTreeMap<Architecture, Vec<Image>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channels: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub static_manifests: Vec<StaticManifest>,
    /// CA certificates by keypair name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub cas: BTreeMap<String, String>,
    /// Signing keypair IDs by keypair name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub keypair_ids: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_machine_type: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub enable_lifecycle_hook: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubelet: Option<KubeletConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sysctl_parameters: Vec<String>,
    pub update_policy: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volume_mounts: Vec<VolumeMount>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_assets: Vec<FileAsset>,
    /// Instance-group hooks, then cluster hooks
    #[serde(default)]
    pub hooks: Vec<Vec<Hook>>,
    pub container_runtime: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_server_config: Option<ApiServerConfig>,

    // AWS
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_security_group_ingress: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elb_security_group: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub node_ip_families: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub use_instance_id_for_node_name: bool,

    // GCE
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multizone: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_tags: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_instance_prefix: Option<String>,
}

impl NodeConfig {
    /// Canonical encoding: compact JSON in field order
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Hex BLAKE3 hash of the canonical encoding
    pub fn hash(&self) -> Result<String> {
        Ok(content_hash(&self.to_bytes()?))
    }
}

/// Minimal bootstrap configuration delivered through the boot channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootConfig {
    pub cloud_provider: CloudProviderId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_base: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_server: Option<ConfigServer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_server_ip: Option<String>,
    pub instance_group_name: String,
    pub instance_group_role: InstanceGroupRole,
    /// Hash of the NodeConfig this node must accept
    pub nodeup_config_hash: String,
}

impl BootConfig {
    /// Encode, enforcing [`BOOT_CONFIG_LIMIT`]
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let bytes = serde_json::to_vec(self)?;
        if bytes.len() > BOOT_CONFIG_LIMIT {
            return Err(AssembleError::BootConfigTooLarge {
                size: bytes.len(),
                limit: BOOT_CONFIG_LIMIT,
            });
        }
        Ok(bytes)
    }
}

pub(crate) fn content_hash(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}
