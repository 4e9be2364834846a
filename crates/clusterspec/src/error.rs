//! Error types for the clusterspec crate

use std::path::PathBuf;
use thiserror::Error;

/// Errors found while loading or validating a cluster document
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid TOML for this schema
    #[error("failed to parse cluster document: {0}")]
    Parse(#[from] toml::de::Error),

    /// Cluster or instance group name is not a DNS-style label
    #[error("invalid name {0:?}: use lowercase letters, digits, '-' and '.'")]
    InvalidName(String),

    /// Unparseable Kubernetes version
    #[error("invalid kubernetes version {0:?}")]
    InvalidVersion(String),

    /// Zero or several provider blocks
    #[error("exactly one cloud provider must be configured, found {0}")]
    CloudProvider(usize),

    #[error("duplicate instance group {0:?}")]
    DuplicateInstanceGroup(String),

    #[error("duplicate subnet {0:?}")]
    DuplicateSubnet(String),

    /// Instance group placed in a subnet the cluster does not define
    #[error("instance group {instance_group:?} references unknown subnet {subnet:?}")]
    UnknownSubnet {
        instance_group: String,
        subnet: String,
    },

    #[error("instance group {0:?} has no subnets")]
    NoSubnets(String),

    #[error("instance group {0:?} has no machine type")]
    NoMachineType(String),

    #[error("instance group {instance_group:?} has min_size {min} greater than max_size {max}")]
    InvalidSize {
        instance_group: String,
        min: u32,
        max: u32,
    },
}

/// Result type for clusterspec operations
pub type Result<T> = std::result::Result<T, Error>;
