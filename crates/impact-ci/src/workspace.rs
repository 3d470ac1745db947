//! Item-scoped workspaces.

use impact_core::{Stage, WorkItem};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{EngineError, Result};

/// A fresh directory owned by exactly one item, named by its index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    path: PathBuf,
}

impl Workspace {
    /// Directory an item's workspace lives in.
    pub fn path_for(work_root: &Path, item: &WorkItem) -> PathBuf {
        work_root.join(item.padded_index())
    }

    /// Create the workspace. Fails if the directory already exists, so a
    /// stale workspace from an earlier run is never reused.
    pub async fn create(work_root: &Path, item: &WorkItem) -> Result<Self> {
        let path = Self::path_for(work_root, item);
        match tokio::fs::create_dir(&path).await {
            Ok(()) => Ok(Self { path }),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(EngineError::WorkspaceExists { path })
            }
            Err(source) => Err(EngineError::Workspace { path, source }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Log artifact path for a test stage.
    pub fn log_path(&self, stage: Stage) -> Option<PathBuf> {
        stage.log_file_name().map(|name| self.path.join(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_fresh_workspace() {
        let root = tempfile::tempdir().unwrap();
        let item = WorkItem::new(12, "pkg");

        let ws = Workspace::create(root.path(), &item).await.unwrap();
        assert_eq!(ws.path(), root.path().join("0012"));
        assert!(ws.path().is_dir());
        assert_eq!(
            ws.log_path(Stage::PrePatchTest),
            Some(root.path().join("0012").join("pre-test.log"))
        );
        assert_eq!(ws.log_path(Stage::Fetch), None);
    }

    #[tokio::test]
    async fn test_existing_workspace_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let item = WorkItem::new(0, "pkg");
        std::fs::create_dir(root.path().join("0000")).unwrap();

        let err = Workspace::create(root.path(), &item).await.unwrap_err();
        assert!(matches!(err, EngineError::WorkspaceExists { .. }));
    }

    #[tokio::test]
    async fn test_missing_root_is_workspace_error() {
        let root = tempfile::tempdir().unwrap();
        let missing = root.path().join("not-created");
        let err = Workspace::create(&missing, &WorkItem::new(1, "pkg"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Workspace { .. }));
    }
}
