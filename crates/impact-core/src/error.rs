//! Error taxonomy for run-level failures.
//!
//! Item-level failures never surface here: they are folded into a
//! [`Classification`](crate::Classification) on the item's reply.

use std::path::PathBuf;

/// Errors that are fatal to a whole run.
#[derive(Debug, thiserror::Error)]
pub enum ImpactError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to load package list {path:?}: {source}")]
    PackageList {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read patch {path:?}: {source}")]
    Patch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write report {path:?}: {source}")]
    Report {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for run-level operations.
pub type Result<T> = std::result::Result<T, ImpactError>;
