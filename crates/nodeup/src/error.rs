//! Error types for the nodeup crate

use thiserror::Error;

/// Errors while building a node bundle
#[derive(Error, Debug)]
pub enum AssembleError {
    /// The cluster has no provider block
    #[error("cluster {0} has no cloud provider configured")]
    NoCloudProvider(String),

    /// Serialization error
    #[error("failed to encode node config: {0}")]
    Encode(#[from] serde_json::Error),

    /// BootConfig does not fit the boot channel
    #[error("boot config is {size} bytes, the limit is {limit}")]
    BootConfigTooLarge { size: usize, limit: usize },
}

/// A fetched NodeConfig failed verification
#[derive(Error, Debug)]
pub enum IntegrityError {
    /// Content hash differs from the one in BootConfig
    #[error("node config hash mismatch: expected {expected}, got {actual}")]
    Mismatch { expected: String, actual: String },

    /// Hash matched but the content is not a NodeConfig
    #[error("node config is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Result type for assembly
pub type Result<T, E = AssembleError> = std::result::Result<T, E>;
