use graphcore::NodeError;
use std::path::{Path, PathBuf};

/// Directory that file and database nodes are confined to.
///
/// Caller-supplied paths are reduced to their final component, so no input
/// can name anything outside the root.
#[derive(Debug, Clone)]
pub struct StorageRoot {
    root: PathBuf,
}

impl StorageRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub async fn ensure(&self) -> Result<(), NodeError> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            NodeError::Initialization(format!(
                "Failed to create storage directory {}: {}",
                self.root.display(),
                e
            ))
        })
    }

    pub fn resolve(&self, requested: &str) -> Result<PathBuf, NodeError> {
        Path::new(requested)
            .file_name()
            .map(|name| self.root.join(name))
            .ok_or_else(|| NodeError::missing_input(format!("Invalid file path: {}", requested)))
    }
}
