//! Error types for stage execution and the run engine.
//!
//! Every variant raised while processing an item is folded into a
//! `FailedUnexpectedly` reply by the pipeline; none of them abort a run.

use impact_core::Stage;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("stage {stage} has empty command")]
    EmptyCommand { stage: Stage },

    #[error("failed to spawn `{program}` for stage {stage}: {source}")]
    Spawn {
        stage: Stage,
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to wait for stage {stage}: {source}")]
    Wait {
        stage: Stage,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open log {path:?} for stage {stage}: {source}")]
    LogFile {
        stage: Stage,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("workspace {path:?} already exists")]
    WorkspaceExists { path: PathBuf },

    #[error("failed to create workspace {path:?}: {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid toolchain: {0}")]
    InvalidToolchain(String),

    #[error("failed to read toolchain file {path:?}: {source}")]
    ToolchainFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("run task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
